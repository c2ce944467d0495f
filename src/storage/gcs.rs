//! Google Cloud Storage adapter speaking the JSON API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;

use super::{ObjectStore, StorageError};

/// Object store backed by a single GCS bucket.
pub struct GcsObjectStore {
    client: Client,
    base_url: Url,
    bucket: String,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectEntry {
    name: String,
}

impl GcsObjectStore {
    /// Construct a client for `bucket` at the given API endpoint.
    pub fn new(
        endpoint: &str,
        bucket: &str,
        access_token: Option<String>,
    ) -> Result<Self, StorageError> {
        let client = Client::builder()
            .user_agent("municipal-ingest/0.1")
            .build()?;
        let base_url = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|error| StorageError::InvalidUrl(format!("{endpoint}: {error}")))?;
        tracing::debug!(
            endpoint = %base_url,
            bucket,
            has_token = access_token.is_some(),
            "Initialized GCS client"
        );
        Ok(Self {
            client,
            base_url,
            bucket: bucket.to_string(),
            access_token,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StorageError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn unexpected(response: reqwest::Response) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StorageError::UnexpectedStatus { status, body }
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn read(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o", path])?;
        let response = self
            .authorize(self.client.get(url).query(&[("alt", "media")]))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(path.to_string())),
            _ => Err(Self::unexpected(response).await),
        }
    }

    async fn write(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let url = self.url(&["upload", "storage", "v1", "b", &self.bucket, "o"])?;
        let response = self
            .authorize(
                self.client
                    .post(url)
                    .query(&[("uploadType", "media"), ("name", path)])
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .body(bytes),
            )
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(bucket = %self.bucket, path, "Uploaded object");
            Ok(())
        } else {
            Err(Self::unexpected(response).await)
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let url = self.url(&["storage", "v1", "b", &self.bucket, "o"])?;
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }
            let response = self
                .authorize(self.client.get(url.clone()).query(&query))
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Self::unexpected(response).await);
            }

            let page: ListResponse = response.json().await?;
            names.extend(page.items.into_iter().map(|item| item.name));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::POST, MockServer};
    use serde_json::json;

    fn store(server: &MockServer) -> GcsObjectStore {
        GcsObjectStore::new(&server.base_url(), "council-docs", Some("token-123".into()))
            .expect("client")
    }

    #[tokio::test]
    async fn list_follows_page_tokens() {
        let server = MockServer::start_async().await;
        // Mocks are matched in registration order, so the page-token mock goes first.
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/storage/v1/b/council-docs/o")
                    .query_param("pageToken", "page-2");
                then.status(200).json_body(json!({
                    "items": [{ "name": "pdfs/a.pdf" }]
                }));
            })
            .await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/storage/v1/b/council-docs/o")
                    .query_param("prefix", "pdfs/")
                    .header("authorization", "Bearer token-123");
                then.status(200).json_body(json!({
                    "items": [{ "name": "pdfs/b.pdf" }],
                    "nextPageToken": "page-2"
                }));
            })
            .await;

        let names = store(&server).list("pdfs/").await.expect("list");

        first.assert();
        second.assert();
        assert_eq!(names, vec!["pdfs/a.pdf", "pdfs/b.pdf"]);
    }

    #[tokio::test]
    async fn read_downloads_media() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/storage/v1/b/council-docs/o/minutes.pdf")
                    .query_param("alt", "media");
                then.status(200).body("%PDF-1.4");
            })
            .await;

        let bytes = store(&server).read("minutes.pdf").await.expect("read");

        mock.assert();
        assert_eq!(bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn read_maps_404_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/storage/v1/b/council-docs/o/missing.pdf");
                then.status(404).body("No such object");
            })
            .await;

        let error = store(&server).read("missing.pdf").await.unwrap_err();
        assert!(matches!(error, StorageError::NotFound(path) if path == "missing.pdf"));
    }

    #[tokio::test]
    async fn write_uploads_with_content_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload/storage/v1/b/council-docs/o")
                    .query_param("uploadType", "media")
                    .query_param("name", "processed/chunks_1.json")
                    .header("content-type", "application/json")
                    .body("[]");
                then.status(200).json_body(json!({ "name": "processed/chunks_1.json" }));
            })
            .await;

        store(&server)
            .write("processed/chunks_1.json", b"[]".to_vec(), "application/json")
            .await
            .expect("write");

        mock.assert();
    }

    #[tokio::test]
    async fn server_errors_surface_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/storage/v1/b/council-docs/o");
                then.status(503).body("backend unavailable");
            })
            .await;

        let error = store(&server).list("").await.unwrap_err();
        assert!(matches!(
            error,
            StorageError::UnexpectedStatus { status, ref body }
                if status == StatusCode::SERVICE_UNAVAILABLE && body.contains("unavailable")
        ));
    }
}

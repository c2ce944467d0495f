use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use municipal_ingest::{
    config::Config,
    embedding::{EmbeddingBatchError, EmbeddingClient, EmbeddingClientError},
    extract::{ExtractionError, PageText, TextExtractor},
    metadata::DocumentType,
    processing::{
        ChunkRecord, IngestionService, ProcessedBundle, ProcessingError, pages::split_pages,
    },
    storage::{MemoryObjectStore, ObjectStore},
};

const SOURCE: &str = "esquimalt_data/pdfs/";

/// Pages are separated by form feeds; documents starting with `%BROKEN` fail to extract.
struct StubExtractor;

impl TextExtractor for StubExtractor {
    fn extract(&self, document: &[u8]) -> Result<Vec<PageText>, ExtractionError> {
        let text = String::from_utf8_lossy(document);
        if text.starts_with("%BROKEN") {
            return Err(ExtractionError::Pdf("invalid cross-reference table".into()));
        }
        Ok(text
            .split('\u{c}')
            .zip(1u32..)
            .map(|(page, number)| PageText {
                number,
                text: page.to_string(),
            })
            .collect())
    }
}

/// Returns one-element vectors holding the text length and fails on a chosen call.
struct ScriptedClient {
    calls: Mutex<usize>,
    fail_on_call: Option<usize>,
}

impl ScriptedClient {
    fn new(fail_on_call: Option<usize>) -> Self {
        Self {
            calls: Mutex::new(0),
            fail_on_call,
        }
    }
}

#[async_trait]
impl EmbeddingClient for ScriptedClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let call = {
            let mut calls = self.calls.lock().expect("calls lock");
            *calls += 1;
            *calls - 1
        };
        if self.fail_on_call == Some(call) {
            return Err(EmbeddingClientError::GenerationFailed(
                "resource exhausted".into(),
            ));
        }
        Ok(texts
            .iter()
            .map(|text| vec![text.chars().count() as f32])
            .collect())
    }

    fn model_name(&self) -> &str {
        "scripted-embedder"
    }
}

fn config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("EMBEDDING_PROVIDER", "hash"),
        ("CHUNK_SIZE", "80"),
        ("CHUNK_OVERLAP", "15"),
        ("EMBEDDING_BATCH_SIZE", "2"),
        ("EMBEDDING_RATE_LIMIT_MS", "0"),
        ("MUNICIPALITY", "esquimalt"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|value| value.to_string()))
        .expect("config loads")
}

fn seeded_store() -> Arc<MemoryObjectStore> {
    let store = Arc::new(MemoryObjectStore::new());
    store.insert(
        format!("{SOURCE}1_minutes_2021-05-03.pdf"),
        "Regular council meeting. Called to order at 7:00 p.m.\u{c}Motion to adopt the agenda. Carried."
            .as_bytes()
            .to_vec(),
    );
    store.insert(
        format!("{SOURCE}2_bylaw_2020.pdf"),
        "%BROKEN document body".as_bytes().to_vec(),
    );
    store.insert(
        format!("{SOURCE}3_policy_2019.pdf"),
        "Purchasing policy. All contracts above the threshold require council approval. Staff report annually."
            .as_bytes()
            .to_vec(),
    );
    store
}

fn service(store: Arc<MemoryObjectStore>, client: ScriptedClient) -> IngestionService {
    IngestionService::new(&config(), store, Arc::new(StubExtractor), Arc::new(client))
        .expect("service")
}

#[tokio::test]
async fn failing_document_does_not_affect_its_neighbours() {
    let store = seeded_store();
    let service = service(store.clone(), ScriptedClient::new(None));

    let summary = service.run(SOURCE).await.expect("run succeeds");

    assert_eq!(summary.documents_processed, 2);
    assert_eq!(summary.documents_failed, 1);
    assert_eq!(summary.failures[0].path, format!("{SOURCE}2_bylaw_2020.pdf"));
    assert_eq!(summary.metrics.documents_failed, 1);

    let chunks: Vec<ChunkRecord> =
        serde_json::from_slice(&store.read(&summary.chunks_file).await.expect("chunk file"))
            .expect("chunk json");
    assert_eq!(chunks.len(), summary.chunk_count);

    let mut per_document: HashMap<&str, Vec<&ChunkRecord>> = HashMap::new();
    for record in &chunks {
        per_document
            .entry(record.metadata.document.filename.as_str())
            .or_default()
            .push(record);
    }
    assert_eq!(per_document.len(), 2);
    assert!(!per_document.contains_key("2_bylaw_2020.pdf"));

    let minutes = &per_document["1_minutes_2021-05-03.pdf"];
    assert_eq!(minutes[0].metadata.document.document_type, DocumentType::Minutes);
    assert_eq!(minutes[0].metadata.document.year, Some(2021));
    let policy = &per_document["3_policy_2019.pdf"];
    assert_eq!(policy[0].metadata.document.document_type, DocumentType::Policy);
    assert_eq!(policy[0].metadata.document.municipality, "esquimalt");

    for records in per_document.values() {
        for (index, record) in records.iter().enumerate() {
            assert_eq!(record.metadata.chunk_index, index);
            assert_eq!(record.metadata.total_chunks, records.len());
        }
    }
}

#[tokio::test]
async fn bundle_vectors_line_up_with_chunks() {
    let store = seeded_store();
    let service = service(store.clone(), ScriptedClient::new(None));

    let summary = service.run(SOURCE).await.expect("run succeeds");
    let bundle =
        ProcessedBundle::from_json(&store.read(&summary.embeddings_file).await.expect("bundle"))
            .expect("bundle json");

    assert_eq!(bundle.chunks().len(), bundle.embeddings().len());
    for (chunk, vector) in bundle.chunks().iter().zip(bundle.embeddings()) {
        assert_eq!(vector, &vec![chunk.text.chars().count() as f32]);
    }
    assert_eq!(bundle.metadata().model, "scripted-embedder");
    assert_eq!(bundle.metadata().source_file, summary.chunks_file);
}

#[tokio::test]
async fn page_markers_in_chunks_map_back_to_pages() {
    let store = seeded_store();
    let service = service(store.clone(), ScriptedClient::new(None));
    let summary = service.process(SOURCE).await.expect("process succeeds");

    let chunks: Vec<ChunkRecord> =
        serde_json::from_slice(&store.read(&summary.chunks_file).await.expect("chunk file"))
            .expect("chunk json");
    let first = &chunks[0];
    let pages = split_pages(&first.text);
    assert_eq!(pages.first().map(|page| page.number), Some(1));
    assert_eq!(first.metadata.page_start, Some(1));
    let last_minutes = chunks
        .iter()
        .filter(|record| record.metadata.document.filename == "1_minutes_2021-05-03.pdf")
        .last()
        .expect("minutes chunks");
    assert_eq!(last_minutes.metadata.page_end, Some(2));
}

#[tokio::test]
async fn failed_embedding_batch_aborts_the_bundle() {
    let store = seeded_store();
    let service = service(store.clone(), ScriptedClient::new(Some(1)));

    let error = service.run(SOURCE).await.unwrap_err();

    match error {
        ProcessingError::Embedding(EmbeddingBatchError::Failed {
            batch, start, end, ..
        }) => {
            assert_eq!(batch, 1);
            assert_eq!(start, 2);
            assert!(end > start && end <= 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(
        store.list("embeddings/").await.expect("list").is_empty(),
        "no partial bundle may be written"
    );
    assert_eq!(
        store.list("processed/").await.expect("list").len(),
        1,
        "chunk file is kept for a retry"
    );
}

//! Timestamp helpers for artifact metadata and file names.

use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;

/// Last microsecond value handed out by [`file_stamp`].
static LAST_STAMP_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Current UTC time formatted as RFC3339.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// UTC time as `YYYYmmdd_HHMMSS_ffffff`, used to key write-once artifacts.
///
/// Stamps are strictly increasing within the process, so back-to-back passes never share a
/// name even when the clock has not advanced.
pub(crate) fn file_stamp() -> String {
    let now = OffsetDateTime::now_utc();
    let micros = i64::try_from(now.unix_timestamp_nanos() / 1_000).unwrap_or(i64::MAX);
    let previous = LAST_STAMP_MICROS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(micros.max(last.saturating_add(1)))
        })
        .unwrap_or(i64::MIN);
    let issued = micros.max(previous.saturating_add(1));
    let at = OffsetDateTime::from_unix_timestamp_nanos(i128::from(issued) * 1_000).unwrap_or(now);
    stamp(at)
}

fn stamp(at: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}_{:06}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second(),
        at.microsecond()
    )
}

//! Errors surfaced by the ingestion pipeline

use std::time::Duration;

use thiserror::Error;

use crate::report::DecodeError;
use crate::storage::StorageError;

/// Why a report was rejected
///
/// Unknown services referenced by events or group members never show up
/// here: they are skipped, logged and counted in the summary.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload could not be decoded; nothing was written
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] DecodeError),

    /// A storage step failed; the report's transaction was rolled back
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The report did not commit within the configured bound
    #[error("ingestion timed out after {0:?}")]
    Timeout(Duration),
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Storage(err.into())
    }
}

impl IngestError {
    /// Whether the sender is at fault (as opposed to the collector)
    pub fn is_client_error(&self) -> bool {
        matches!(self, IngestError::MalformedPayload(_))
    }
}

//! API shared state

use std::sync::Arc;

use crate::ingest::Ingestor;
use crate::storage::StorageBackend;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Applies incoming agent reports
    pub ingestor: Arc<Ingestor>,

    /// Read side of the store
    pub storage: Arc<dyn StorageBackend>,
}

impl ApiState {
    pub fn new(ingestor: Arc<Ingestor>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { ingestor, storage }
    }
}

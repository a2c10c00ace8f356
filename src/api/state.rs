use std::sync::Arc;

use tokio::sync::Mutex;

use crate::filter::{FilterStore, MemoryFilterStore};
use crate::pipeline::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub filters: Arc<dyn FilterStore>,
    /// Serializes pipeline runs so two refreshes never overlap.
    pub run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self::with_store(pipeline, Arc::new(MemoryFilterStore::new()))
    }

    pub fn with_store(pipeline: Pipeline, filters: Arc<dyn FilterStore>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            filters,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

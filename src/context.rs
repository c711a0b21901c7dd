use std::sync::Arc;

use crate::artifacts::ArtifactStore;
use crate::config::RecommendConfig;

/// Per-worker handle to the shared artifacts and the request settings.
#[derive(Clone)]
pub struct ServingContext {
    pub store: Arc<ArtifactStore>,
    pub recommend: RecommendConfig,
    pub qty_workers: usize,
}

impl ServingContext {
    pub fn new(store: Arc<ArtifactStore>, recommend: RecommendConfig, qty_workers: usize) -> Self {
        ServingContext {
            store,
            recommend,
            qty_workers,
        }
    }
}

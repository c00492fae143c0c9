//! Shared handler state

use finrag_common::{config::AppConfig, Embedder, QueryService, VectorStore};
use std::sync::Arc;

/// Application state shared across handlers.
///
/// The embedder and the store are built once at startup; handlers only hold
/// cheap `Arc` clones.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<VectorStore>,
    pub query: QueryService,
}

impl AppState {
    pub fn new(config: AppConfig, embedder: Arc<dyn Embedder>, store: Arc<VectorStore>) -> Self {
        Self {
            config: Arc::new(config),
            query: QueryService::new(embedder, store.clone()),
            store,
        }
    }
}

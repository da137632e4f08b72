// Shared resources for the service boundary

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::graph::builder::LinkHeuristics;
use crate::index::db::load_or_empty;
use crate::index::snapshot::SnapshotHandle;
use crate::provider::{EmbeddingProvider, GenerationProvider, OllamaClient};
use crate::query::engine::QueryEngine;
use crate::worker::WorkerPool;

/// Lives for the lifetime of the server; cheap to clone.
#[derive(Clone)]
pub struct ServiceState {
    pub config: Arc<Config>,
    pub snapshot: SnapshotHandle,
    pub pool: WorkerPool,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn GenerationProvider>,
}

impl ServiceState {
    /// Load the persisted index (empty when absent) and connect the HTTP providers.
    pub fn open(config: Config) -> Result<Self> {
        let heuristics = LinkHeuristics::from_config(&config.graph);
        let snapshot = load_or_empty(&config.db_path(), &heuristics)?;
        info!(
            "Loaded index with {} files and {} embeddings",
            snapshot.records.len(),
            snapshot.embeddings.len()
        );

        let embedder = Arc::new(OllamaClient::for_embeddings(&config.embedding)?);
        let generator = Arc::new(OllamaClient::for_generation(&config.generation)?);
        Ok(Self::with_providers(
            config,
            SnapshotHandle::new(snapshot),
            embedder,
            generator,
        ))
    }

    pub fn with_providers(
        config: Config,
        snapshot: SnapshotHandle,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        let pool = WorkerPool::new(config.performance.workers);
        Self {
            config: Arc::new(config),
            snapshot,
            pool,
            embedder,
            generator,
        }
    }

    /// Engine over the snapshot that is live right now
    pub fn engine(&self) -> QueryEngine {
        QueryEngine::new(self.snapshot.current(), self.config.retrieval.snippet_chars)
            .with_chunk_words(self.config.embedding.chunk_words)
    }

    /// Embed a user query with the code model.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        Ok(self
            .embedder
            .embed(query, &self.config.embedding.model)
            .await?)
    }
}

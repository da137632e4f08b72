// Immutable index snapshot and the handle readers share

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::embeddings::{EmbeddingIndex, RequirementIndex};
use super::{FileInfo, ReadmeEntry, SymbolRecord};
use crate::graph::builder::{build_file_graph, build_repo_graph, LinkHeuristics};
use crate::graph::DependencyGraph;

/// Everything a query needs, built once and never mutated
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub records: BTreeMap<String, SymbolRecord>,
    pub files: BTreeMap<String, FileInfo>,
    /// repo -> path -> source text
    pub sources: BTreeMap<String, BTreeMap<String, String>>,
    pub readmes: Vec<ReadmeEntry>,
    pub embeddings: EmbeddingIndex,
    pub requirements: RequirementIndex,
    pub file_graph: DependencyGraph,
    pub repo_graph: DependencyGraph,
    pub built_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStats {
    pub files: usize,
    pub repos: usize,
    pub functions: usize,
    pub classes: usize,
    pub embeddings: usize,
    pub requirements: usize,
    pub readmes: usize,
    pub file_links: usize,
    pub repo_links: usize,
    pub built_at: i64,
}

impl IndexSnapshot {
    /// Assemble a snapshot and derive both graphs from the records.
    pub fn build(
        records: BTreeMap<String, SymbolRecord>,
        files: BTreeMap<String, FileInfo>,
        sources: BTreeMap<String, BTreeMap<String, String>>,
        readmes: Vec<ReadmeEntry>,
        embeddings: EmbeddingIndex,
        requirements: RequirementIndex,
        heuristics: &LinkHeuristics,
    ) -> Self {
        let file_graph = build_file_graph(&records, &files, heuristics);
        let repo_graph = build_repo_graph(&file_graph);
        Self {
            records,
            files,
            sources,
            readmes,
            embeddings,
            requirements,
            file_graph,
            repo_graph,
            built_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Same code index with a different requirement set
    pub fn with_requirements(&self, requirements: RequirementIndex) -> Self {
        Self {
            requirements,
            built_at: chrono::Utc::now().timestamp(),
            ..self.clone()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.embeddings.is_empty() && self.requirements.is_empty()
    }

    pub fn record(&self, path: &str) -> Option<&SymbolRecord> {
        self.records.get(path)
    }

    pub fn repo_of_path(&self, path: &str) -> String {
        self.files
            .get(path)
            .map(|f| f.repo.clone())
            .unwrap_or_else(|| fallback_repo(path))
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            files: self.records.len(),
            repos: self.files.values().map(|f| &f.repo).collect::<BTreeSet<_>>().len(),
            functions: self.records.values().map(|r| r.functions.len()).sum(),
            classes: self.records.values().map(|r| r.class_names.len()).sum(),
            embeddings: self.embeddings.len(),
            requirements: self.requirements.len(),
            readmes: self.readmes.len(),
            file_links: self.file_graph.links().len(),
            repo_links: self.repo_graph.links().len(),
            built_at: self.built_at,
        }
    }
}

fn fallback_repo(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Shared, atomically swappable pointer to the live snapshot
#[derive(Debug, Clone, Default)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<IndexSnapshot>>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: IndexSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Current snapshot; stays valid after a later swap.
    pub fn current(&self) -> Arc<IndexSnapshot> {
        self.inner.read().clone()
    }

    /// Replace the live snapshot and return the previous one.
    pub fn swap(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let mut guard = self.inner.write();
        std::mem::replace(&mut *guard, Arc::new(snapshot))
    }

    /// Derive the next snapshot from the live one under the write lock, so a
    /// concurrent swap cannot be lost in between.
    pub fn update<F>(&self, next: F) -> Arc<IndexSnapshot>
    where
        F: FnOnce(&IndexSnapshot) -> IndexSnapshot,
    {
        let mut guard = self.inner.write();
        let updated = Arc::new(next(&guard));
        *guard = updated.clone();
        updated
    }
}

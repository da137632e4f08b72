// End-to-end processing: crawl, embed, build, persist, export

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use serde::Serialize;
use tracing::info;

use super::embedder::Embedder;
use super::requirements::{embed_requirements, read_requirements_file};
use super::Indexer;
use crate::config::Config;
use crate::graph::builder::LinkHeuristics;
use crate::graph::export::{write_graph_documents, write_readmes};
use crate::index::db::IndexDatabase;
use crate::index::embeddings::RequirementIndex;
use crate::index::snapshot::IndexSnapshot;
use crate::provider::EmbeddingProvider;
use crate::worker::WorkerPool;

/// Summary of one processing run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessReport {
    pub files: usize,
    pub repos: usize,
    pub skipped: usize,
    pub readmes: usize,
    pub embeddings: usize,
    pub failed_embeddings: usize,
    pub requirements: usize,
    pub file_links: usize,
    pub repo_links: usize,
    pub documents: Vec<PathBuf>,
    pub duration_ms: u128,
}

/// Crawl `root`, embed every element, build both graphs, persist and export.
///
/// Without a requirements CSV the previously persisted requirements are kept.
pub async fn process_root(
    config: &Config,
    root: &Path,
    requirements_csv: Option<&Path>,
    provider: &dyn EmbeddingProvider,
    pool: &WorkerPool,
    progress: Option<&ProgressBar>,
) -> Result<(IndexSnapshot, ProcessReport)> {
    let start = Instant::now();
    let indexer = Indexer::new(config)?;
    let crawl = indexer.crawl(root, progress).await?;

    let embedded = Embedder::new(provider, &config.embedding)
        .embed_records(&crawl.records, progress)
        .await;

    let db = IndexDatabase::new(config.db_path())?;
    let requirements = match requirements_csv {
        Some(csv) => load_requirements(config, csv, provider).await?,
        None => db.load_requirements()?,
    };

    let heuristics = LinkHeuristics::from_config(&config.graph);
    let data_dir = config.data_dir();
    let skipped = crawl.skipped.len();
    let failed_embeddings = embedded.failed;

    let (snapshot, documents) = pool
        .run(move || -> Result<(IndexSnapshot, Vec<PathBuf>)> {
            let snapshot = IndexSnapshot::build(
                crawl.records,
                crawl.files,
                crawl.sources,
                crawl.readmes,
                embedded.index,
                requirements,
                &heuristics,
            );
            db.save_snapshot(&snapshot)?;
            let mut documents =
                write_graph_documents(&data_dir, &snapshot.file_graph, &snapshot.repo_graph)?;
            documents.push(write_readmes(&data_dir, &snapshot.readmes)?);
            Ok((snapshot, documents))
        })
        .await??;

    let stats = snapshot.stats();
    let report = ProcessReport {
        files: stats.files,
        repos: stats.repos,
        skipped,
        readmes: stats.readmes,
        embeddings: stats.embeddings,
        failed_embeddings,
        requirements: stats.requirements,
        file_links: stats.file_links,
        repo_links: stats.repo_links,
        documents,
        duration_ms: start.elapsed().as_millis(),
    };
    info!(
        "Processed {} files ({} embeddings, {} links) in {} ms",
        report.files, report.embeddings, report.file_links, report.duration_ms
    );
    Ok((snapshot, report))
}

/// Read and embed a requirements CSV with the requirement model.
pub async fn load_requirements(
    config: &Config,
    csv: &Path,
    provider: &dyn EmbeddingProvider,
) -> Result<RequirementIndex> {
    let rows = read_requirements_file(csv)?;
    info!("Loaded {} requirement rows from {}", rows.len(), csv.display());
    Ok(embed_requirements(provider, &config.embedding.requirement_model, rows).await)
}

/// Embed a requirements CSV and persist it alongside the existing code index.
pub async fn process_requirements(
    config: &Config,
    csv: &Path,
    provider: &dyn EmbeddingProvider,
) -> Result<RequirementIndex> {
    let requirements = load_requirements(config, csv, provider).await?;
    let db = IndexDatabase::new(config.db_path())?;
    db.save_requirements(&requirements)
        .with_context(|| format!("Failed to save requirements to {}", db.path().display()))?;
    Ok(requirements)
}

use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use super::progress_bar;
use crate::config::Config;
use crate::indexer::pipeline::{process_requirements, process_root, ProcessReport};
use crate::provider::OllamaClient;
use crate::worker::WorkerPool;

/// Crawl a root directory of repositories and rebuild the persisted index.
pub async fn process_root_dir(
    config: &Config,
    root_dir: &Path,
    requirements_csv: Option<&Path>,
) -> Result<()> {
    if !root_dir.is_dir() {
        bail!("Root directory not found: {}", root_dir.display());
    }
    if let Some(csv) = requirements_csv {
        if !csv.is_file() {
            bail!("Requirements file not found: {}", csv.display());
        }
    }

    info!("Processing root directory: {}", root_dir.display());
    println!("CodeRAG v{}", env!("CARGO_PKG_VERSION"));
    println!("Root: {}", root_dir.display());
    println!("Embedding model: {} ({})", config.embedding.model, config.embedding.url);

    let provider = OllamaClient::for_embeddings(&config.embedding)?;
    let pool = WorkerPool::new(config.performance.workers);
    let pb = progress_bar("files");

    let (_snapshot, report) =
        process_root(config, root_dir, requirements_csv, &provider, &pool, Some(&pb)).await?;
    pb.finish_and_clear();

    print_report(&report);
    Ok(())
}

/// Embed a requirements CSV without re-crawling.
pub async fn process_requirements_file(config: &Config, csv: &Path) -> Result<()> {
    if !csv.is_file() {
        bail!("Requirements file not found: {}", csv.display());
    }

    let provider = OllamaClient::for_embeddings(&config.embedding)?;
    let requirements = process_requirements(config, csv, &provider).await?;

    println!(
        "Embedded {} requirements with {}",
        requirements.len(),
        config.embedding.requirement_model
    );
    println!("Saved to {}", config.db_path().display());
    Ok(())
}

fn print_report(report: &ProcessReport) {
    println!("\nIndex Statistics:");
    println!("  Repositories: {}", report.repos);
    println!("  Files: {}", report.files);
    if report.skipped > 0 {
        println!("  Skipped files: {}", report.skipped);
    }
    println!("  READMEs: {}", report.readmes);
    println!("  Embeddings: {}", report.embeddings);
    if report.failed_embeddings > 0 {
        println!("  Failed embeddings: {}", report.failed_embeddings);
    }
    println!("  Requirements: {}", report.requirements);
    println!("  File links: {}", report.file_links);
    println!("  Repository links: {}", report.repo_links);
    println!("  Time: {:.2}s", report.duration_ms as f64 / 1000.0);

    if !report.documents.is_empty() {
        println!("\nWrote:");
        for path in &report.documents {
            println!("  {}", path.display());
        }
    }
}

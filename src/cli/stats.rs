use std::path::Path;

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};

use crate::config::Config;
use crate::index::db::IndexDatabase;

pub fn show_stats(config: &Config, verbose: bool) -> Result<()> {
    let db_path = config.db_path();
    let Some(db) = IndexDatabase::open_existing(&db_path)? else {
        bail!(
            "No index at {}. Run 'coderag process --root-dir <DIR>' first.",
            db_path.display()
        );
    };

    let stats = db.get_stats()?;

    println!("CodeRAG Statistics v{}", env!("CARGO_PKG_VERSION"));
    println!("Index: {}", db_path.display());

    println!("\nIndex Statistics:");
    println!("  Total files: {}", stats.total_files);
    println!("  Total embeddings: {}", stats.total_embeddings);
    println!("  Total requirements: {}", stats.total_requirements);
    println!("  READMEs: {}", stats.total_readmes);
    println!("  Index size: {:.2} MB", db_size_mb(&db_path)?);
    if let Some(when) = Utc.timestamp_opt(stats.last_full_index, 0).single() {
        if stats.last_full_index > 0 {
            println!("  Last processed: {}", when.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }

    if verbose {
        let languages = db.languages_breakdown()?;
        if !languages.is_empty() {
            println!("\n  Languages:");
            for (language, count) in languages {
                println!("    {}: {} files", language, count);
            }
        }

        let repos = db.repos_breakdown()?;
        if !repos.is_empty() {
            println!("\n  Repositories:");
            for (repo, count) in repos {
                println!("    {}: {} files", repo, count);
            }
        }
    }

    Ok(())
}

fn db_size_mb(db_path: &Path) -> Result<f64> {
    let metadata = std::fs::metadata(db_path)?;
    Ok(metadata.len() as f64 / (1024.0 * 1024.0))
}

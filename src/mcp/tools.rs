// MCP tool handlers

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::state::ServiceState;
use crate::index::embeddings::key_path;
use crate::indexer::pipeline::{self, process_root};
use crate::query::rag::RagPipeline;

pub type Args = HashMap<String, Value>;

fn arg_str<'a>(args: &'a Args, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn arg_usize(args: &Args, name: &str, default: usize) -> usize {
    args.get(name)
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .unwrap_or(default)
}

fn arg_strings(args: &Args, name: &str) -> Vec<String> {
    args.get(name)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Wrap a serializable value as MCP text content
fn content<T: Serialize>(value: &T) -> Result<Value> {
    Ok(json!({
        "content": [{
            "type": "text",
            "text": serde_json::to_string_pretty(value)?
        }]
    }))
}

/// Crawl a root directory and swap in the new index
pub async fn process(state: &ServiceState, args: &Args) -> Result<Value> {
    let root = arg_str(args, "root_dir").ok_or_else(|| anyhow!("root_dir is required"))?;
    let csv = arg_str(args, "requirements_csv").map(PathBuf::from);

    let (snapshot, report) = process_root(
        &state.config,
        &PathBuf::from(root),
        csv.as_deref(),
        state.embedder.as_ref(),
        &state.pool,
        None,
    )
    .await?;
    state.snapshot.swap(snapshot);
    info!("Swapped in index for {}", root);

    content(&report)
}

/// Embed a requirements CSV into the live index without re-crawling
pub async fn process_requirements(state: &ServiceState, args: &Args) -> Result<Value> {
    let csv = arg_str(args, "requirements_csv")
        .ok_or_else(|| anyhow!("requirements_csv is required"))?;

    let requirements =
        pipeline::process_requirements(&state.config, Path::new(csv), state.embedder.as_ref())
            .await?;
    let count = requirements.len();
    state
        .snapshot
        .update(|current| current.with_requirements(requirements));

    content(&json!({ "requirements": count }))
}

/// Ranked code and requirement hits for a natural-language query
pub async fn query(state: &ServiceState, args: &Args) -> Result<Value> {
    let text = arg_str(args, "query").ok_or_else(|| anyhow!("query is required"))?;
    let retrieval = &state.config.retrieval;
    let top_k = arg_usize(args, "top_k", retrieval.top_k);
    let min_repos = arg_usize(args, "min_repos", retrieval.min_repos);
    let mode = arg_str(args, "mode").unwrap_or("flat");

    let vector = state.embed_query(text).await?;
    let engine = state.engine();

    match mode {
        "flat" => {
            let results = state.pool.run(move || engine.flat(&vector, top_k)).await?;
            content(&results)
        }
        "layered" => {
            let results = state
                .pool
                .run(move || engine.layered(&vector, top_k, min_repos))
                .await?;
            content(&results)
        }
        other => Err(anyhow!("Unknown mode: {} (expected flat or layered)", other)),
    }
}

/// Top code matches for every requirement
pub async fn similarity_matrix(state: &ServiceState, args: &Args) -> Result<Value> {
    let top_n = arg_usize(args, "top_n", state.config.retrieval.matrix_top_n);
    let engine = state.engine();
    let matrix = state.pool.run(move || engine.similarity_matrix(top_n)).await?;
    content(&matrix)
}

/// File-level graph restricted to the given files or result keys
pub async fn dependency_graph(state: &ServiceState, args: &Args) -> Result<Value> {
    let mut paths = arg_strings(args, "file_paths");
    if paths.is_empty() {
        paths = arg_strings(args, "keys")
            .iter()
            .map(|key| key_path(key).unwrap_or(key.as_str()).to_string())
            .collect();
    }
    if paths.is_empty() {
        return Err(anyhow!("Either file_paths or keys is required"));
    }

    let snapshot = state.snapshot.current();
    let document = state
        .pool
        .run(move || snapshot.file_graph.subset(&paths).to_document())
        .await?;
    content(&document)
}

/// Retrieval-augmented answer over graph-expanded context
pub async fn ask(state: &ServiceState, args: &Args) -> Result<Value> {
    let text = arg_str(args, "query").ok_or_else(|| anyhow!("query is required"))?;
    let top_k = arg_usize(args, "top_k", state.config.retrieval.top_k);
    let max_depth = arg_usize(args, "max_depth", state.config.retrieval.max_depth);

    let vector = state.embed_query(text).await?;
    let engine = state.engine();
    let snapshot = state.snapshot.current();
    let initial = state
        .pool
        .run(move || {
            let mut ranked = engine.rank_code(&vector);
            ranked.truncate(top_k);
            ranked
        })
        .await?;

    let pipeline = RagPipeline::new(
        state.generator.as_ref(),
        &state.config.generation.model,
        state.config.retrieval.context_chars,
    );
    let answer = pipeline.answer(&snapshot, text, initial, max_depth).await?;
    content(&answer)
}

/// Counts for the live index
pub async fn stats(state: &ServiceState, _args: &Args) -> Result<Value> {
    content(&state.snapshot.current().stats())
}

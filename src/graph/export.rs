// Graph and README documents written after a crawl

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use super::DependencyGraph;
use crate::index::ReadmeEntry;

pub const GRAPH_DIR: &str = "graph-data";
pub const FULL_GRAPH_FILE: &str = "full_graph.json";
pub const REPOS_GRAPH_FILE: &str = "repos_graph.json";
pub const COMPONENT_DIR: &str = "files";
pub const README_FILE: &str = "repos_readme.json";

/// Write the full file graph, the repo-level aggregate and one slice per component.
pub fn write_graph_documents(
    data_dir: &Path,
    file_graph: &DependencyGraph,
    repo_graph: &DependencyGraph,
) -> Result<Vec<PathBuf>> {
    let graph_dir = data_dir.join(GRAPH_DIR);
    let component_dir = graph_dir.join(COMPONENT_DIR);
    // slices of components that no longer exist must not survive a rewrite
    if component_dir.exists() {
        fs::remove_dir_all(&component_dir)
            .with_context(|| format!("Failed to clear directory: {}", component_dir.display()))?;
    }
    fs::create_dir_all(&component_dir)
        .with_context(|| format!("Failed to create directory: {}", component_dir.display()))?;

    let mut written = Vec::new();

    let full = graph_dir.join(FULL_GRAPH_FILE);
    write_json(&full, &file_graph.to_document())?;
    written.push(full);

    let repos = graph_dir.join(REPOS_GRAPH_FILE);
    write_json(&repos, &repo_graph.to_document())?;
    written.push(repos);

    for component in file_graph.components() {
        let path = component_dir.join(format!("{}.json", component_file_name(&component)));
        write_json(&path, &file_graph.component_slice(&component))?;
        written.push(path);
    }

    info!("Wrote {} graph documents to {}", written.len(), graph_dir.display());
    Ok(written)
}

pub fn write_readmes(data_dir: &Path, readmes: &[ReadmeEntry]) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create directory: {}", data_dir.display()))?;
    let path = data_dir.join(README_FILE);
    write_json(&path, &readmes)?;
    Ok(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn component_file_name(component: &str) -> String {
    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphDocument, GraphLink, GraphNode};
    use tempfile::tempdir;

    fn node(id: &str, user: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            user: Some(user.to_string()),
            description: String::new(),
            file_size: 4,
            link_count: None,
            file_count: None,
        }
    }

    #[test]
    fn test_write_graph_documents() {
        let dir = tempdir().unwrap();
        let file_graph = DependencyGraph::new(
            vec![node("/r/app/a.kt", "app"), node("/r/lib core/b.kt", "lib core")],
            vec![GraphLink {
                source: "/r/app/a.kt".to_string(),
                target: "/r/lib core/b.kt".to_string(),
            }],
        );
        let repo_graph = crate::graph::builder::build_repo_graph(&file_graph);

        let written = write_graph_documents(dir.path(), &file_graph, &repo_graph).unwrap();
        assert_eq!(written.len(), 4);

        let slice_path = dir.path().join(GRAPH_DIR).join(COMPONENT_DIR).join("lib_core.json");
        let slice: GraphDocument =
            serde_json::from_str(&std::fs::read_to_string(slice_path).unwrap()).unwrap();
        assert_eq!(slice.nodes.len(), 1);
        assert_eq!(slice.links.len(), 1);
        assert_eq!(slice.nodes[0].link_count, Some(1));

        let repos: GraphDocument = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(GRAPH_DIR).join(REPOS_GRAPH_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(repos.links.len(), 1);
        assert_eq!(repos.nodes.iter().map(|n| n.file_count).sum::<Option<usize>>(), Some(2));
    }

    #[test]
    fn test_rewrite_drops_vanished_components() {
        let dir = tempdir().unwrap();
        let both = DependencyGraph::new(vec![node("/r/app/a.kt", "app"), node("/r/lib/b.kt", "lib")], vec![]);
        write_graph_documents(dir.path(), &both, &crate::graph::builder::build_repo_graph(&both)).unwrap();

        let component_dir = dir.path().join(GRAPH_DIR).join(COMPONENT_DIR);
        assert!(component_dir.join("lib.json").exists());

        let app_only = DependencyGraph::new(vec![node("/r/app/a.kt", "app")], vec![]);
        let written =
            write_graph_documents(dir.path(), &app_only, &crate::graph::builder::build_repo_graph(&app_only))
                .unwrap();
        assert_eq!(written.len(), 3);
        assert!(component_dir.join("app.json").exists());
        assert!(!component_dir.join("lib.json").exists());
    }

    #[test]
    fn test_write_readmes() {
        let dir = tempdir().unwrap();
        let path = write_readmes(
            dir.path(),
            &[ReadmeEntry {
                id: "app".to_string(),
                path: "/r/app/README.md".to_string(),
                content: "# App".to_string(),
            }],
        )
        .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json[0]["id"], "app");
    }
}

// Crawl orchestration: directory walk, extractor dispatch, index accumulation

pub mod embedder;
pub mod parser;
pub mod pipeline;
pub mod requirements;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use indicatif::ProgressBar;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::index::{FileInfo, ReadmeEntry, SymbolRecord};
use parser::{ExtractorRegistry, Language};

/// A file selected for extraction
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub repo: String,
    pub language: Option<Language>,
    pub is_readme: bool,
}

/// Everything one crawl accumulates, keyed by absolute path
#[derive(Debug, Default)]
pub struct CrawlOutput {
    pub records: BTreeMap<String, SymbolRecord>,
    pub files: BTreeMap<String, FileInfo>,
    /// repo -> path -> content
    pub sources: BTreeMap<String, BTreeMap<String, String>>,
    pub readmes: Vec<ReadmeEntry>,
    /// (path, reason) for every file that was dropped
    pub skipped: Vec<(String, String)>,
}

enum Outcome {
    Indexed {
        record: SymbolRecord,
        info: FileInfo,
        content: String,
    },
    Readme(ReadmeEntry),
    Skipped(String),
}

/// The main indexer that walks a root and dispatches files to extractors
pub struct Indexer {
    registry: Arc<ExtractorRegistry>,
    skip_dirs: HashSet<String>,
    component_pattern: Regex,
    threads: usize,
}

impl Indexer {
    pub fn new(config: &Config) -> Result<Self> {
        let component_pattern = Regex::new(&config.graph.component_pattern)
            .context("Invalid component pattern")?;

        Ok(Self {
            registry: Arc::new(ExtractorRegistry::new(&config.enabled_languages())),
            skip_dirs: config.crawl.skip_dirs.iter().cloned().collect(),
            component_pattern,
            threads: config.crawl.threads.max(1),
        })
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Walk `root` in sorted order, pruning skip-listed directories at any depth.
    ///
    /// Repositories are the immediate subdirectories of `root`; files directly
    /// under `root` belong to a repository named after the root itself.
    pub fn discover(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && self.skip_dirs.contains(&*e.file_name().to_string_lossy()))
            });

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let path_str = path.to_string_lossy();
            let language = self.registry.language_for(&path_str);
            let is_readme = entry.file_name().to_string_lossy().contains("README");
            if language.is_none() && !is_readme {
                continue;
            }

            let repo = match path.strip_prefix(root).ok().and_then(|rel| {
                let mut parts = rel.components();
                let first = parts.next()?;
                parts.next().map(|_| first.as_os_str().to_string_lossy().to_string())
            }) {
                Some(repo) => repo,
                None => root_name.clone(),
            };

            files.push(SourceFile {
                path: path.to_path_buf(),
                repo,
                language,
                is_readme,
            });
        }

        Ok(files)
    }

    /// Component label: first group of the component pattern, else the repo
    pub fn component_of(&self, path: &str, repo: &str) -> String {
        self.component_pattern
            .captures(path)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| repo.to_string())
    }

    /// Crawl `root`, extracting every supported file on a bounded set of blocking workers.
    ///
    /// Per-file failures are logged and recorded in `skipped`; they never abort the crawl.
    pub async fn crawl(&self, root: &Path, progress: Option<&ProgressBar>) -> Result<CrawlOutput> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Root directory not found: {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("Not a directory: {}", root.display());
        }

        let files = self.discover(&root)?;
        info!("Discovered {} candidate files under {}", files.len(), root.display());
        if let Some(pb) = progress {
            pb.set_length(files.len() as u64);
        }

        let outcomes: Arc<DashMap<String, Outcome>> = Arc::new(DashMap::new());
        let semaphore = Arc::new(Semaphore::new(self.threads));
        let mut handles = Vec::with_capacity(files.len());
        let mut paths = Vec::with_capacity(files.len());

        for file in files {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .context("Extraction pool closed")?;
            let registry = self.registry.clone();
            let outcomes = outcomes.clone();
            let path = file.path.to_string_lossy().to_string();
            let component = self.component_of(&path, &file.repo);
            let key = path.clone();

            let handle = tokio::task::spawn_blocking(move || {
                let outcome = process_file(&registry, &file, component);
                outcomes.insert(key, outcome);
                drop(permit);
            });
            paths.push(path);
            handles.push(handle);
        }

        let joined = futures::future::join_all(handles).await;
        for (path, result) in paths.into_iter().zip(joined) {
            settle(&outcomes, path, result);
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        let outcomes = Arc::try_unwrap(outcomes)
            .map_err(|_| anyhow::anyhow!("Extraction tasks still hold the result map"))?;
        Ok(merge(outcomes))
    }
}

/// A task that died before storing its outcome still counts as skipped
fn settle(outcomes: &DashMap<String, Outcome>, path: String, result: Result<(), JoinError>) {
    if let Err(e) = result {
        warn!("Extraction task for {} panicked: {}", path, e);
        outcomes
            .entry(path)
            .or_insert_with(|| Outcome::Skipped(format!("extraction panicked: {}", e)));
    }
}

fn process_file(registry: &ExtractorRegistry, file: &SourceFile, component: String) -> Outcome {
    let path = file.path.to_string_lossy().to_string();

    let bytes = match std::fs::read(&file.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to read {}: {}", path, e);
            return Outcome::Skipped(format!("read failed: {}", e));
        }
    };
    let content = match decode(bytes) {
        Some(content) => content,
        None => {
            warn!("Skipping binary or undecodable file: {}", path);
            return Outcome::Skipped("binary or undecodable".to_string());
        }
    };

    let Some((language, extractor)) = registry.for_path(&path) else {
        if file.is_readme {
            return Outcome::Readme(ReadmeEntry {
                id: file.repo.clone(),
                path,
                content,
            });
        }
        return Outcome::Skipped("no extractor".to_string());
    };

    match extractor.extract(&content, &path) {
        Ok(record) => {
            debug!("Extracted {} elements from {}", record.element_count(), path);
            let info = FileInfo {
                path: path.clone(),
                repo: file.repo.clone(),
                component,
                language: language.name().to_string(),
                size: content.len() as u64,
                content_hash: blake3::hash(content.as_bytes()).to_string(),
            };
            Outcome::Indexed {
                record,
                info,
                content,
            }
        }
        Err(e) => {
            warn!("Failed to parse {}: {}", path, e);
            Outcome::Skipped(format!("parse failed: {}", e))
        }
    }
}

/// UTF-8 text without NUL bytes, or `None` for binary content
fn decode(bytes: Vec<u8>) -> Option<String> {
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

fn merge(outcomes: DashMap<String, Outcome>) -> CrawlOutput {
    // BTreeMap ordering makes the result independent of completion order
    let ordered: BTreeMap<String, Outcome> = outcomes.into_iter().collect();
    let mut out = CrawlOutput::default();

    for (path, outcome) in ordered {
        match outcome {
            Outcome::Indexed {
                record,
                info,
                content,
            } => {
                out.sources
                    .entry(info.repo.clone())
                    .or_default()
                    .insert(path.clone(), content);
                out.files.insert(path.clone(), info);
                out.records.insert(path, record);
            }
            Outcome::Readme(entry) => out.readmes.push(entry),
            Outcome::Skipped(reason) => out.skipped.push((path, reason)),
        }
    }

    let repos: HashSet<&String> = out.files.values().map(|f| &f.repo).collect();
    info!(
        "Crawl finished: {} files in {} repositories, {} READMEs, {} skipped",
        out.records.len(),
        repos.len(),
        out.readmes.len(),
        out.skipped.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::{build_file_graph, LinkHeuristics};
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn indexer() -> Indexer {
        Indexer::new(&Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_crawl_collects_records_sources_and_readmes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "billing/src/invoice.py", b"def total(items):\n    return sum(items)\n");
        write(root, "billing/README.md", b"# Billing\nInvoices.");
        write(root, "web/app/src/main/App.js", b"function render() { return 1; }\n");
        write(root, "web/notes.txt", b"not code");

        let out = indexer().crawl(root, None).await.unwrap();

        assert_eq!(out.records.len(), 2);
        let invoice = out
            .records
            .iter()
            .find(|(p, _)| p.ends_with("invoice.py"))
            .map(|(_, r)| r)
            .unwrap();
        assert_eq!(invoice.functions[0].name, "total");

        let info = out.files.values().find(|f| f.path.ends_with("App.js")).unwrap();
        assert_eq!(info.repo, "web");
        assert_eq!(info.component, "web");
        assert_eq!(info.language, "javascript");

        assert_eq!(out.sources.len(), 2);
        assert_eq!(out.sources["billing"].len(), 1);

        assert_eq!(out.readmes.len(), 1);
        assert_eq!(out.readmes[0].id, "billing");
        assert!(out.readmes[0].content.starts_with("# Billing"));
    }

    #[tokio::test]
    async fn test_skip_dirs_at_any_depth() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "svc/src/keep.go", b"package svc\n");
        write(root, "svc/node_modules/dep/index.js", b"function x() {}\n");
        write(root, "svc/src/deep/build/gen.go", b"package gen\n");
        write(root, "svc/.git/hooks/hook.py", b"x = 1\n");

        let out = indexer().crawl(root, None).await.unwrap();
        let paths: Vec<_> = out.records.keys().collect();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("keep.go"));
    }

    #[tokio::test]
    async fn test_binary_and_undecodable_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "r/a.c", b"int main() { return 0; }\n");
        write(root, "r/blob.c", b"int\0\0\x01binary");
        write(root, "r/latin.py", &[0x78, 0x20, 0x3d, 0x20, 0xe9, 0x0a]);

        let out = indexer().crawl(root, None).await.unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.skipped.len(), 2);
        assert!(out.skipped.iter().all(|(_, reason)| reason.contains("binary")));
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(indexer().crawl(&missing, None).await.is_err());
    }

    #[tokio::test]
    async fn test_crawl_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for i in 0..20 {
            write(
                root,
                &format!("repo{}/mod{}.py", i % 3, i),
                format!("def f{}():\n    return {}\n", i, i).as_bytes(),
            );
        }

        let a = indexer().crawl(root, None).await.unwrap();
        let b = indexer().crawl(root, None).await.unwrap();
        assert_eq!(a.records, b.records);
        assert_eq!(a.files, b.files);
    }

    #[tokio::test]
    async fn test_import_and_call_scenario() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "proj/a.py", b"def foo():\n    return 1\n");
        write(root, "proj/b.py", b"import a\n\ndef bar():\n    return foo()\n");

        let out = indexer().crawl(root, None).await.unwrap();
        let (a_path, a) = out.records.iter().find(|(p, _)| p.ends_with("a.py")).unwrap();
        let (b_path, b) = out.records.iter().find(|(p, _)| p.ends_with("b.py")).unwrap();

        assert_eq!(a.functions.len(), 1);
        assert_eq!(a.functions[0].name, "foo");
        assert_eq!(b.imports, vec!["import a"]);
        assert_eq!(b.functions.len(), 1);
        assert_eq!(b.functions[0].name, "bar");

        let graph = build_file_graph(&out.records, &out.files, &LinkHeuristics::default());
        assert!(graph.has_edge(b_path, a_path));
        assert!(!graph.has_edge(a_path, b_path));
    }

    #[test]
    fn test_component_label() {
        let indexer = indexer();
        assert_eq!(
            indexer.component_of("/root/mobile/checkout/app/src/main/Cart.kt", "mobile"),
            "checkout"
        );
        assert_eq!(indexer.component_of("/root/tools/run.py", "tools"), "tools");
    }

    #[tokio::test]
    async fn test_panicked_extraction_is_recorded_as_skipped() {
        let outcomes = DashMap::new();
        outcomes.insert("/r/ok.py".to_string(), Outcome::Skipped("no extractor".to_string()));

        let crashed: Result<(), JoinError> =
            tokio::task::spawn_blocking(|| panic!("grammar blew up")).await;
        assert!(crashed.is_err());
        settle(&outcomes, "/r/bad.py".to_string(), crashed);
        settle(&outcomes, "/r/ok.py".to_string(), Ok(()));

        let out = merge(outcomes);
        assert_eq!(out.skipped.len(), 2);
        let (path, reason) = &out.skipped[0];
        assert_eq!(path, "/r/bad.py");
        assert!(reason.starts_with("extraction panicked"));
        assert_eq!(out.skipped[1].1, "no extractor");
    }
}

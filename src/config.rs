// Configuration management for coderag

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::graph::builder::ImportMatch;
use crate::indexer::parser::Language;

pub const CONFIG_FILE: &str = ".coderag.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub languages: LanguagesConfig,
    pub crawl: CrawlConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
    pub retrieval: RetrievalConfig,
    pub graph: GraphConfig,
    pub storage: StorageConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    pub enabled: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Directory names skipped at any depth
    pub skip_dirs: Vec<String>,
    /// Concurrent extraction tasks
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub url: String,
    pub model: String,
    pub requirement_model: String,
    /// Words per function body chunk
    pub chunk_words: usize,
    /// In-flight embedding requests
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_repos: usize,
    pub max_depth: usize,
    pub snippet_chars: usize,
    pub context_chars: usize,
    pub matrix_top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Regex whose first group names a file's component; falls back to the repo
    pub component_pattern: String,
    pub reactive_markers: Vec<String>,
    pub import_match: ImportMatch,
    pub match_function_names: bool,
    pub match_class_names: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Slots in the blocking worker pool used by the server
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

const DEFAULT_URL: &str = "http://localhost:11434";

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            enabled: Language::ALL.iter().map(|l| l.name().to_string()).collect(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            skip_dirs: [
                "node_modules", "build", "dist", "out", "bin", ".git", ".svn", ".vscode",
                "__pycache__", ".idea", "obj", "lib", "vendor", "target", ".next", "pkg",
                "venv", ".tox", "wheels", "Debug", "Release", "deps",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
            threads: 4,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            model: "unclemusclez/jina-embeddings-v2-base-code:q4".to_string(),
            requirement_model: "unclemusclez/jina-embeddings-v2-base-code:q4".to_string(),
            chunk_words: 500,
            concurrency: 8,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            model: "qwen2:7b".to_string(),
            timeout_secs: 300,
            max_retries: 2,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_repos: 2,
            max_depth: 2,
            snippet_chars: 200,
            context_chars: 1000,
            matrix_top_n: 10,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            component_pattern: r"/([^/]+)/(?:app/)?src/".to_string(),
            reactive_markers: ["@ObservedObject", "@State", "@EnvironmentObject", "@Binding"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            import_match: ImportMatch::Suffix,
            match_function_names: true,
            match_class_names: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: ".coderag".to_string(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, looking for .coderag.toml
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(CONFIG_FILE);

        match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        }
    }

    /// Enabled languages, in declaration order
    pub fn enabled_languages(&self) -> Vec<Language> {
        self.languages
            .enabled
            .iter()
            .filter_map(|name| Language::from_name(name))
            .collect()
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("index.db")
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        for lang in &self.languages.enabled {
            if Language::from_name(lang).is_none() {
                return Err(anyhow::anyhow!("Unsupported language: {}", lang));
            }
        }

        if self.crawl.threads == 0 {
            return Err(anyhow::anyhow!("Crawl thread count must be greater than 0"));
        }

        if self.embedding.url.is_empty() || self.generation.url.is_empty() {
            return Err(anyhow::anyhow!("Provider URL cannot be empty"));
        }
        if self.embedding.chunk_words == 0 {
            return Err(anyhow::anyhow!("Chunk size must be greater than 0"));
        }
        if self.embedding.concurrency == 0 {
            return Err(anyhow::anyhow!("Embedding concurrency must be greater than 0"));
        }
        if self.embedding.timeout_secs == 0 || self.generation.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Provider timeout must be greater than 0"));
        }

        let retrieval = &self.retrieval;
        if retrieval.top_k == 0 {
            return Err(anyhow::anyhow!("top_k must be greater than 0"));
        }
        if retrieval.min_repos == 0 {
            return Err(anyhow::anyhow!("min_repos must be greater than 0"));
        }
        if retrieval.snippet_chars == 0 || retrieval.context_chars == 0 {
            return Err(anyhow::anyhow!("Snippet and context lengths must be greater than 0"));
        }
        if retrieval.matrix_top_n == 0 {
            return Err(anyhow::anyhow!("matrix_top_n must be greater than 0"));
        }

        regex::Regex::new(&self.graph.component_pattern)
            .map_err(|e| anyhow::anyhow!("Invalid component pattern: {}", e))?;

        if self.storage.data_dir.is_empty() {
            return Err(anyhow::anyhow!("Data directory cannot be empty"));
        }

        if self.performance.workers == 0 {
            return Err(anyhow::anyhow!("Worker count must be greater than 0"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format));
        }

        Ok(())
    }
}

/// Load configuration from an explicit path, or from the working directory.
///
/// An explicit path that cannot be loaded is an error; a missing default file is not.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => Config::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e)),
        None => Ok(Config::from_project_dir(".")),
    }
}

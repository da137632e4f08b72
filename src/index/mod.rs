// Index data model and storage

pub mod db;
pub mod embeddings;
pub mod schema;
pub mod snapshot;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One function or method recovered from a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub parameters: Vec<String>,
    pub return_type: String,
    pub body: String,
    pub is_abstract: bool,
    /// Enclosing class names joined with a space, empty for free functions
    pub class_name: String,
    pub annotations: Vec<String>,
}

impl FunctionRecord {
    /// Two records with the same name, return type and parameter list are duplicates.
    pub fn same_signature(&self, other: &FunctionRecord) -> bool {
        self.name == other.name
            && self.return_type == other.return_type
            && self.parameters == other.parameters
    }
}

/// Normalized per-file symbol record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub file_path: String,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub class_names: Vec<String>,
    pub package: Option<String>,
    pub property_declarations: Vec<String>,
    pub functions: Vec<FunctionRecord>,
    /// `package.symbol` -> `symbol`
    pub package_import_paths: BTreeMap<String, String>,
}

impl SymbolRecord {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionRecord> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Number of embeddable elements, excluding body chunks
    pub fn element_count(&self) -> usize {
        self.imports.len()
            + self.exports.len()
            + self.class_names.len()
            + self.property_declarations.len()
            + self.functions.len()
    }
}

/// Crawl metadata for one indexed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    /// Top-level directory under the crawl root
    pub repo: String,
    /// Component label used by graph aggregation
    pub component: String,
    pub language: String,
    pub size: u64,
    pub content_hash: String,
}

/// README content grouped by owning repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadmeEntry {
    pub id: String,
    pub path: String,
    pub content: String,
}

/// Errors raised while turning source text into a symbol record
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to load {language} grammar: {source}")]
    Grammar {
        language: &'static str,
        #[source]
        source: tree_sitter::LanguageError,
    },

    #[error("{language} parser produced no tree for {path}")]
    Parse { language: &'static str, path: String },
}

/// Language-specific extraction behind one capability
pub trait Extractor: Send + Sync {
    fn language(&self) -> &'static str;
    fn extract(&self, source: &str, file_path: &str) -> Result<SymbolRecord, ExtractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, ret: &str, params: &[&str], body: &str) -> FunctionRecord {
        FunctionRecord {
            name: name.to_string(),
            parameters: params.iter().map(|p| p.to_string()).collect(),
            return_type: ret.to_string(),
            body: body.to_string(),
            is_abstract: false,
            class_name: String::new(),
            annotations: Vec::new(),
        }
    }

    #[test]
    fn test_same_signature_ignores_body() {
        let a = function("run", "void", &["int x"], "a();");
        let b = function("run", "void", &["int x"], "b();");
        let c = function("run", "void", &["long x"], "a();");

        assert!(a.same_signature(&b));
        assert!(!a.same_signature(&c));
    }

    #[test]
    fn test_record_lookup() {
        let mut record = SymbolRecord::new("/repo/a.py");
        record.functions.push(function("foo", "None", &[], "pass"));
        record.imports.push("import os".to_string());

        assert!(record.function("foo").is_some());
        assert!(record.function("bar").is_none());
        assert_eq!(record.element_count(), 2);
    }
}

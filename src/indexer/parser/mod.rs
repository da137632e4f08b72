// Language extractors

pub mod builder;
pub mod text;
pub mod walk;

mod c;
mod cpp;
mod go;
mod java;
mod javascript;
mod kotlin;
mod python;
mod swift;

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::{Node, Parser as TreeParser, Tree};

use crate::index::{ExtractError, Extractor};

pub use c::CExtractor;
pub use cpp::CppExtractor;
pub use go::GoExtractor;
pub use java::JavaExtractor;
pub use javascript::JavaScriptExtractor;
pub use kotlin::KotlinExtractor;
pub use python::PythonExtractor;
pub use swift::SwiftExtractor;

/// Supported source languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Language {
    Java,
    Kotlin,
    JavaScript,
    Go,
    Python,
    C,
    Cpp,
    Swift,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::Java,
        Language::Kotlin,
        Language::JavaScript,
        Language::Go,
        Language::Python,
        Language::C,
        Language::Cpp,
        Language::Swift,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::JavaScript => "javascript",
            Language::Go => "go",
            Language::Python => "python",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Swift => "swift",
        }
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Java => &["java"],
            Language::Kotlin => &["kt", "kts"],
            Language::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Language::Go => &["go"],
            Language::Python => &["py"],
            Language::C => &["c", "h"],
            Language::Cpp => &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
            Language::Swift => &["swift"],
        }
    }

    pub fn from_name(name: &str) -> Option<Language> {
        Language::ALL.into_iter().find(|l| l.name() == name)
    }

    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::Kotlin => tree_sitter_kotlin_ng::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::C => tree_sitter_c::LANGUAGE.into(),
            Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
            Language::Swift => tree_sitter_swift::LANGUAGE.into(),
        }
    }

    fn extractor(&self) -> Box<dyn Extractor> {
        match self {
            Language::Java => Box::new(JavaExtractor),
            Language::Kotlin => Box::new(KotlinExtractor),
            Language::JavaScript => Box::new(JavaScriptExtractor),
            Language::Go => Box::new(GoExtractor),
            Language::Python => Box::new(PythonExtractor),
            Language::C => Box::new(CExtractor),
            Language::Cpp => Box::new(CppExtractor),
            Language::Swift => Box::new(SwiftExtractor),
        }
    }
}

/// Parse `source` with the grammar for `language`.
pub fn parse_source(language: Language, source: &str, path: &str) -> Result<Tree, ExtractError> {
    let mut parser = TreeParser::new();
    parser
        .set_language(&language.grammar())
        .map_err(|source| ExtractError::Grammar {
            language: language.name(),
            source,
        })?;

    parser.parse(source, None).ok_or_else(|| ExtractError::Parse {
        language: language.name(),
        path: path.to_string(),
    })
}

/// Names of the enclosing declarations of `kinds`, outermost first, space separated.
pub fn enclosing_names<F>(node: Node<'_>, kinds: &[&str], name_of: F) -> String
where
    F: Fn(Node<'_>) -> Option<String>,
{
    let mut names: Vec<String> = walk::ancestors(node)
        .filter(|n| kinds.contains(&n.kind()))
        .filter_map(|n| name_of(n))
        .collect();
    names.reverse();
    names.join(" ")
}

/// Extension -> extractor lookup for the enabled languages
pub struct ExtractorRegistry {
    by_extension: HashMap<&'static str, Language>,
    extractors: HashMap<Language, Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new(languages: &[Language]) -> Self {
        let mut by_extension = HashMap::new();
        let mut extractors = HashMap::new();

        for &language in languages {
            for ext in language.extensions() {
                by_extension.insert(*ext, language);
            }
            extractors.insert(language, language.extractor());
        }

        Self {
            by_extension,
            extractors,
        }
    }

    pub fn all() -> Self {
        Self::new(&Language::ALL)
    }

    pub fn language_for(&self, path: &str) -> Option<Language> {
        let ext = Path::new(path).extension()?.to_str()?;
        self.by_extension.get(ext).copied()
    }

    pub fn for_path(&self, path: &str) -> Option<(Language, &dyn Extractor)> {
        let language = self.language_for(path)?;
        let extractor = self.extractors.get(&language)?;
        Some((language, extractor.as_ref()))
    }

    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<_> = self.extractors.keys().copied().collect();
        languages.sort();
        languages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_path() {
        let registry = ExtractorRegistry::all();
        assert_eq!(registry.language_for("/a/b/Main.java"), Some(Language::Java));
        assert_eq!(registry.language_for("x.kt"), Some(Language::Kotlin));
        assert_eq!(registry.language_for("x.jsx"), Some(Language::JavaScript));
        assert_eq!(registry.language_for("x.h"), Some(Language::C));
        assert_eq!(registry.language_for("x.hpp"), Some(Language::Cpp));
        assert_eq!(registry.language_for("README.md"), None);
        assert_eq!(registry.language_for("Makefile"), None);
    }

    #[test]
    fn test_every_grammar_loads() {
        for language in Language::ALL {
            let tree = parse_source(language, "", "empty").unwrap();
            assert_eq!(tree.root_node().child_count(), 0, "{}", language.name());
        }
    }

    #[test]
    fn test_registry_respects_enabled_languages() {
        let registry = ExtractorRegistry::new(&[Language::Python, Language::Go]);
        assert!(registry.for_path("a.py").is_some());
        assert!(registry.for_path("a.go").is_some());
        assert!(registry.for_path("A.java").is_none());
        assert_eq!(registry.languages(), vec![Language::Go, Language::Python]);

        let all = ExtractorRegistry::all();
        let (language, extractor) = all.for_path("main.swift").unwrap();
        assert_eq!(language, Language::Swift);
        assert_eq!(extractor.language(), "swift");
    }

    #[test]
    fn test_from_name() {
        for language in Language::ALL {
            assert_eq!(Language::from_name(language.name()), Some(language));
        }
        assert_eq!(Language::from_name("rust"), None);
    }
}

// Embedding keys and the in-memory vector indices

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

const PATH_MARKER: &str = "|path:";
const CLASS_MARKER: &str = "|class:";
const CHUNK_MARKER: &str = "_body_chunk_";

/// Kind of embeddable element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Class,
    Import,
    Export,
    Property,
    Function,
    BodyChunk,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Class => "class",
            ElementKind::Import => "import",
            ElementKind::Export => "export",
            ElementKind::Property => "property",
            ElementKind::Function => "function",
            ElementKind::BodyChunk => "body_chunk",
        }
    }

    fn from_prefix(s: &str) -> Option<Self> {
        match s {
            "class" => Some(ElementKind::Class),
            "import" => Some(ElementKind::Import),
            "export" => Some(ElementKind::Export),
            "property" => Some(ElementKind::Property),
            "function" => Some(ElementKind::Function),
            _ => None,
        }
    }
}

/// Composite key identifying one embeddable unit.
///
/// Rendered as `{kind}:{name}|path:{file}` for classes, imports, exports and
/// properties, `function:{name}|class:{class}|path:{file}` for functions and
/// `function_{name}_body_chunk_{i}|class:{class}|path:{file}` for body chunks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmbeddingKey {
    pub kind: ElementKind,
    pub name: String,
    pub class_name: Option<String>,
    pub chunk: Option<usize>,
    pub path: String,
}

impl EmbeddingKey {
    pub fn element(kind: ElementKind, name: &str, path: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            class_name: None,
            chunk: None,
            path: path.to_string(),
        }
    }

    pub fn function(name: &str, class_name: &str, path: &str) -> Self {
        Self {
            kind: ElementKind::Function,
            name: name.to_string(),
            class_name: Some(class_name.to_string()),
            chunk: None,
            path: path.to_string(),
        }
    }

    pub fn body_chunk(name: &str, class_name: &str, index: usize, path: &str) -> Self {
        Self {
            kind: ElementKind::BodyChunk,
            name: name.to_string(),
            class_name: Some(class_name.to_string()),
            chunk: Some(index),
            path: path.to_string(),
        }
    }

    /// Parse a rendered key. Returns `None` for anything that is not a
    /// well-formed key.
    pub fn parse(key: &str) -> Option<Self> {
        let (head, path) = key.rsplit_once(PATH_MARKER)?;

        let (element, class_name) = match head.rsplit_once(CLASS_MARKER) {
            Some((element, class)) if element.starts_with("function") => {
                (element, Some(class.to_string()))
            }
            _ => (head, None),
        };

        if let Some(rest) = element.strip_prefix("function_") {
            if let Some((name, index)) = rest.rsplit_once(CHUNK_MARKER) {
                if let Ok(index) = index.parse::<usize>() {
                    return Some(Self {
                        kind: ElementKind::BodyChunk,
                        name: name.to_string(),
                        class_name,
                        chunk: Some(index),
                        path: path.to_string(),
                    });
                }
            }
        }

        let (prefix, name) = element.split_once(':')?;
        let kind = ElementKind::from_prefix(prefix)?;

        Some(Self {
            kind,
            name: name.to_string(),
            class_name,
            chunk: None,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for EmbeddingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self.class_name.as_deref().unwrap_or("");
        match self.kind {
            ElementKind::Function => {
                write!(f, "function:{}{}{}{}{}", self.name, CLASS_MARKER, class, PATH_MARKER, self.path)
            }
            ElementKind::BodyChunk => write!(
                f,
                "function_{}{}{}{}{}{}{}",
                self.name,
                CHUNK_MARKER,
                self.chunk.unwrap_or(0),
                CLASS_MARKER,
                class,
                PATH_MARKER,
                self.path
            ),
            kind => write!(f, "{}:{}{}{}", kind.as_str(), self.name, PATH_MARKER, self.path),
        }
    }
}

/// File path carried by a rendered key, or `None` when the key has no path part.
pub fn key_path(key: &str) -> Option<&str> {
    key.rsplit_once(PATH_MARKER).map(|(_, path)| path)
}

/// Split text into chunks of at most `words_per_chunk` whitespace-separated words.
pub fn chunk_words(text: &str, words_per_chunk: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || words_per_chunk == 0 {
        return Vec::new();
    }
    words
        .chunks(words_per_chunk)
        .map(|chunk| chunk.join(" "))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingEntry {
    pub key: String,
    pub path: String,
    pub vector: Vec<f32>,
}

/// Key -> vector map that remembers insertion order
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    entries: Vec<EmbeddingEntry>,
    positions: HashMap<String, usize>,
}

impl EmbeddingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.positions
            .get(key)
            .map(|&i| self.entries[i].vector.as_slice())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    /// Insert or overwrite in place; a new key goes to the end.
    pub fn insert(&mut self, key: String, vector: Vec<f32>) {
        if let Some(&i) = self.positions.get(&key) {
            self.entries[i].vector = vector;
            return;
        }
        let path = key_path(&key).unwrap_or_default().to_string();
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push(EmbeddingEntry { key, path, vector });
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmbeddingEntry> {
        self.entries.iter()
    }
}

impl FromIterator<(String, Vec<f32>)> for EmbeddingIndex {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f32>)>>(iter: I) -> Self {
        let mut index = EmbeddingIndex::new();
        for (key, vector) in iter {
            index.insert(key, vector);
        }
        index
    }
}

/// One embedded requirement row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub description: String,
    pub row: BTreeMap<String, String>,
    pub vector: Vec<f32>,
}

/// Requirement rows in load order
#[derive(Debug, Clone, Default)]
pub struct RequirementIndex {
    entries: Vec<Requirement>,
}

impl RequirementIndex {
    pub fn new(entries: Vec<Requirement>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.entries.iter()
    }
}

// Retrieval engine: similarity ranking, diverse selection and result views

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::index::embeddings::{chunk_words, key_path, ElementKind, EmbeddingKey};
use crate::index::snapshot::IndexSnapshot;
use crate::index::SymbolRecord;

/// Returned whenever a key cannot be resolved to source text
pub const SNIPPET_UNAVAILABLE: &str = "Snippet not available";

/// Cosine similarity (1 - cosine distance).
///
/// `None` when the dimensions differ or either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some((dot / (na.sqrt() * nb.sqrt())) as f32)
}

/// One embedding key scored against a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredKey {
    pub key: String,
    pub path: String,
    pub repo: String,
    pub similarity: f32,
}

/// Sort descending by similarity; equal scores keep their input order.
pub fn sort_ranked(scored: &mut [ScoredKey]) {
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
}

/// Pick `top_k` results that span at least `min_repos` repositories.
///
/// Scans the ranking until it holds `top_k` results from enough distinct
/// repositories. When the ranking has fewer repositories than `min_repos`
/// the requirement drops to the number available. Within the scanned window
/// the best hit of each required repository is kept, remaining slots go to
/// the best of the rest, and ranking order is preserved.
pub fn select_diverse(ranked: &[ScoredKey], top_k: usize, min_repos: usize) -> Vec<ScoredKey> {
    if top_k == 0 {
        return Vec::new();
    }
    let available: HashSet<&str> = ranked.iter().map(|r| r.repo.as_str()).collect();
    let required = min_repos.min(available.len());

    let mut window = 0;
    let mut seen: HashSet<&str> = HashSet::new();
    for result in ranked {
        window += 1;
        seen.insert(result.repo.as_str());
        if window >= top_k && seen.len() >= required {
            break;
        }
    }
    let window = &ranked[..window];

    let mut keep = vec![false; window.len()];
    let mut represented: HashSet<&str> = HashSet::new();
    let mut slots = top_k;
    for (i, result) in window.iter().enumerate() {
        if represented.len() >= required || slots == 0 {
            break;
        }
        if represented.insert(result.repo.as_str()) {
            keep[i] = true;
            slots -= 1;
        }
    }
    for flag in keep.iter_mut() {
        if slots == 0 {
            break;
        }
        if !*flag {
            *flag = true;
            slots -= 1;
        }
    }

    window
        .iter()
        .zip(keep)
        .filter(|(_, kept)| *kept)
        .map(|(result, _)| result.clone())
        .collect()
}

/// A resolved code hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementHit {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub similarity: f32,
    pub file_path: String,
    pub repo_name: String,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementHit {
    pub id: String,
    pub similarity: f32,
    pub description: String,
    pub snippet: String,
    pub row: BTreeMap<String, String>,
}

/// Flat top-k over code and requirements
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlatResults {
    pub code: Vec<ElementHit>,
    pub requirements: Vec<RequirementHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileHits {
    pub file_path: String,
    pub similarity: f32,
    pub top_elements: Vec<ElementHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoHits {
    pub repo_name: String,
    pub similarity: f32,
    pub top_files: Vec<FileHits>,
}

/// Four views over one ranked list, each capped at `top_k`
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrganizedResults {
    pub top_repos: Vec<RepoHits>,
    pub overall_top_elements: Vec<ElementHit>,
    pub repo_specific_elements: BTreeMap<String, Vec<ElementHit>>,
    pub file_specific_elements: BTreeMap<String, Vec<ElementHit>>,
}

/// Top code matches for one requirement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixCell {
    pub code_key: String,
    pub similarity: f32,
    pub snippet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    pub requirement_id: String,
    pub requirement_description: String,
    pub code_snippets: Vec<MatrixCell>,
}

/// Query engine over one immutable snapshot
pub struct QueryEngine {
    snapshot: Arc<IndexSnapshot>,
    snippet_chars: usize,
    chunk_words: usize,
}

impl QueryEngine {
    pub fn new(snapshot: Arc<IndexSnapshot>, snippet_chars: usize) -> Self {
        Self {
            snapshot,
            snippet_chars,
            chunk_words: 500,
        }
    }

    /// Chunk size the body-chunk keys were embedded with
    pub fn with_chunk_words(mut self, chunk_words: usize) -> Self {
        self.chunk_words = chunk_words;
        self
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Every code key scored against `query`, best first.
    pub fn rank_code(&self, query: &[f32]) -> Vec<ScoredKey> {
        let mut scored: Vec<ScoredKey> = self
            .snapshot
            .embeddings
            .iter()
            .filter_map(|entry| {
                let Some(similarity) = cosine_similarity(query, &entry.vector) else {
                    debug!("Skipping incomparable vector for {}", entry.key);
                    return None;
                };
                Some(ScoredKey {
                    key: entry.key.clone(),
                    path: entry.path.clone(),
                    repo: self.snapshot.repo_of_path(&entry.path),
                    similarity,
                })
            })
            .collect();
        sort_ranked(&mut scored);
        scored
    }

    /// Independent top-k over code keys and requirements.
    pub fn flat(&self, query: &[f32], top_k: usize) -> FlatResults {
        let code = self
            .rank_code(query)
            .into_iter()
            .take(top_k)
            .map(|scored| self.element_hit(&scored))
            .collect();

        let mut requirements: Vec<(f32, usize)> = self
            .snapshot
            .requirements
            .iter()
            .enumerate()
            .filter_map(|(i, r)| cosine_similarity(query, &r.vector).map(|s| (s, i)))
            .collect();
        requirements.sort_by(|a, b| b.0.total_cmp(&a.0));

        let all: Vec<_> = self.snapshot.requirements.iter().collect();
        let requirements = requirements
            .into_iter()
            .take(top_k)
            .map(|(similarity, i)| {
                let requirement = all[i];
                RequirementHit {
                    id: requirement.id.clone(),
                    similarity,
                    description: requirement.description.clone(),
                    snippet: truncate_chars(&requirement.description, self.snippet_chars),
                    row: requirement.row.clone(),
                }
            })
            .collect();

        FlatResults { code, requirements }
    }

    /// Diversity-constrained selection organized into the four views.
    pub fn layered(&self, query: &[f32], top_k: usize, min_repos: usize) -> OrganizedResults {
        let ranked = self.rank_code(query);
        let selected = select_diverse(&ranked, top_k, min_repos);
        self.organize(&selected, top_k)
    }

    /// Build the overall, per-repo, per-file and nested views from one ranked list.
    pub fn organize(&self, ranked: &[ScoredKey], top_k: usize) -> OrganizedResults {
        let mut results = OrganizedResults::default();
        let mut repos: Vec<RepoHits> = Vec::new();

        for scored in ranked {
            let hit = self.element_hit(scored);

            let repo_pos = match repos.iter().position(|r| r.repo_name == hit.repo_name) {
                Some(pos) => pos,
                None => {
                    repos.push(RepoHits {
                        repo_name: hit.repo_name.clone(),
                        similarity: hit.similarity,
                        top_files: Vec::new(),
                    });
                    repos.len() - 1
                }
            };
            let files = &mut repos[repo_pos].top_files;
            let file_pos = match files.iter().position(|f| f.file_path == hit.file_path) {
                Some(pos) => pos,
                None => {
                    files.push(FileHits {
                        file_path: hit.file_path.clone(),
                        similarity: hit.similarity,
                        top_elements: Vec::new(),
                    });
                    files.len() - 1
                }
            };
            if files[file_pos].top_elements.len() < top_k {
                files[file_pos].top_elements.push(hit.clone());
            }

            if results.overall_top_elements.len() < top_k {
                results.overall_top_elements.push(hit.clone());
            }
            let per_repo = results
                .repo_specific_elements
                .entry(hit.repo_name.clone())
                .or_default();
            if per_repo.len() < top_k {
                per_repo.push(hit.clone());
            }
            let per_file = results
                .file_specific_elements
                .entry(hit.file_path.clone())
                .or_default();
            if per_file.len() < top_k {
                per_file.push(hit);
            }
        }

        repos.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        repos.truncate(top_k);
        results.top_repos = repos;
        results
    }

    /// For every requirement, the `top_n` most similar code keys.
    pub fn similarity_matrix(&self, top_n: usize) -> Vec<MatrixRow> {
        self.snapshot
            .requirements
            .iter()
            .map(|requirement| MatrixRow {
                requirement_id: requirement.id.clone(),
                requirement_description: requirement.description.clone(),
                code_snippets: self
                    .rank_code(&requirement.vector)
                    .into_iter()
                    .take(top_n)
                    .map(|scored| MatrixCell {
                        snippet: self.snippet(&scored.key),
                        code_key: scored.key,
                        similarity: scored.similarity,
                    })
                    .collect(),
            })
            .collect()
    }

    /// Bounded excerpt for a key, or [`SNIPPET_UNAVAILABLE`].
    pub fn snippet(&self, key: &str) -> String {
        let record = key_path(key).and_then(|path| self.snapshot.record(path));
        match (record, EmbeddingKey::parse(key)) {
            (Some(record), Some(parsed)) => {
                resolve_snippet(record, &parsed, self.chunk_words, self.snippet_chars)
                    .unwrap_or_else(|| SNIPPET_UNAVAILABLE.to_string())
            }
            _ => SNIPPET_UNAVAILABLE.to_string(),
        }
    }

    fn element_hit(&self, scored: &ScoredKey) -> ElementHit {
        let (kind, name) = match EmbeddingKey::parse(&scored.key) {
            Some(parsed) => (parsed.kind.as_str().to_string(), parsed.name),
            None => ("unknown".to_string(), scored.key.clone()),
        };
        ElementHit {
            key: scored.key.clone(),
            kind,
            name,
            similarity: scored.similarity,
            file_path: scored.path.clone(),
            repo_name: scored.repo.clone(),
            snippet: self.snippet(&scored.key),
        }
    }
}

fn resolve_snippet(
    record: &SymbolRecord,
    key: &EmbeddingKey,
    chunk_size: usize,
    limit: usize,
) -> Option<String> {
    let name = key.name.as_str();
    let find_function = || {
        record
            .functions
            .iter()
            .find(|f| f.name == name && Some(f.class_name.as_str()) == key.class_name.as_deref())
            .or_else(|| record.function(name))
    };

    let text = match key.kind {
        ElementKind::Function => find_function()?.body.clone(),
        ElementKind::BodyChunk => {
            let chunk = key.chunk?;
            chunk_words(&find_function()?.body, chunk_size)
                .into_iter()
                .nth(chunk)?
        }
        ElementKind::Class => record
            .class_names
            .iter()
            .find(|c| *c == name)
            .map(|c| format!("class {}", c))?,
        ElementKind::Property => record
            .property_declarations
            .iter()
            .find(|p| p.contains(name))?
            .clone(),
        ElementKind::Import => record
            .imports
            .iter()
            .find(|i| i.contains(name))
            .or_else(|| {
                record
                    .imports
                    .iter()
                    .find(|i| name.split('.').any(|part| !part.is_empty() && i.contains(part)))
            })?
            .clone(),
        ElementKind::Export => record.exports.iter().find(|e| e.contains(name))?.clone(),
    };

    Some(truncate_chars(&text, limit))
}

/// First `limit` characters, with `...` appended when something was cut.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// Lexical link heuristics and graph construction
//
// Files are linked by name matching, not import resolution. Base filenames
// that collide across unrelated repositories produce false-positive edges.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DependencyGraph, GraphLink, GraphNode};
use crate::config::GraphConfig;
use crate::index::{FileInfo, SymbolRecord};

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'`]([^"'`\n]+)["'`]"#).unwrap());
static ANGLED: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^>\n]+)>").unwrap());
static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").unwrap());

const IMPORT_KEYWORDS: &[&str] = &[
    "import", "static", "from", "export", "#include", "#import", "using", "package", "type",
    "typealias", "@testable",
];

/// How a normalized import is compared to a candidate file's base name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMatch {
    /// Import text ends with the base name
    Suffix,
    /// Last path or package segment equals the base name
    Segment,
}

/// Named, tunable rules used to derive file-level edges
#[derive(Debug, Clone)]
pub struct LinkHeuristics {
    pub import_match: ImportMatch,
    pub reactive_markers: Vec<String>,
    pub match_function_names: bool,
    pub match_class_names: bool,
}

impl Default for LinkHeuristics {
    fn default() -> Self {
        Self {
            import_match: ImportMatch::Suffix,
            reactive_markers: ["@ObservedObject", "@State", "@EnvironmentObject", "@Binding"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            match_function_names: true,
            match_class_names: true,
        }
    }
}

impl LinkHeuristics {
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            import_match: config.import_match,
            reactive_markers: config.reactive_markers.clone(),
            match_function_names: config.match_function_names,
            match_class_names: config.match_class_names,
        }
    }

    fn import_matches(&self, import: &str, stem: &str) -> bool {
        match self.import_match {
            ImportMatch::Suffix => import.ends_with(stem),
            ImportMatch::Segment => import
                .rsplit(|c| c == '/' || c == '.' || c == ':' || c == '\\')
                .next()
                .map_or(false, |segment| segment == stem),
        }
    }

    /// Why `record` references a file whose base name is `stem`, if it does
    pub fn link_reason(&self, record: &RecordTerms, stem: &str) -> Option<LinkReason> {
        if stem.is_empty() {
            return None;
        }
        if record.imports.iter().any(|imp| self.import_matches(imp, stem)) {
            return Some(LinkReason::Import);
        }
        if record.reactive.iter().any(|name| name == stem) {
            return Some(LinkReason::ReactiveProperty);
        }
        if self.match_function_names && record.function_names.iter().any(|f| f.contains(stem)) {
            return Some(LinkReason::FunctionName);
        }
        if self.match_class_names && record.class_names.iter().any(|c| c.contains(stem)) {
            return Some(LinkReason::ClassName);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkReason {
    Import,
    ReactiveProperty,
    FunctionName,
    ClassName,
}

/// The pieces of a symbol record the heuristics look at, normalized once
#[derive(Debug, Clone, Default)]
pub struct RecordTerms {
    pub imports: Vec<String>,
    pub reactive: Vec<String>,
    pub function_names: Vec<String>,
    pub class_names: Vec<String>,
}

impl RecordTerms {
    pub fn from_record(record: &SymbolRecord, heuristics: &LinkHeuristics) -> Self {
        Self {
            imports: record
                .imports
                .iter()
                .flat_map(|imp| normalize_import(imp))
                .collect(),
            reactive: reactive_dependencies(record, &heuristics.reactive_markers),
            function_names: record.functions.iter().map(|f| f.name.clone()).collect(),
            class_names: record.class_names.clone(),
        }
    }
}

/// Reduce raw import text to the module paths it names.
///
/// Quoted and angle-bracketed paths lose their file extension; bare module
/// paths lose keyword prefixes and trailing semicolons. `from a import b`
/// yields both `a` and `a.b`.
pub fn normalize_import(import: &str) -> Vec<String> {
    let text = import.trim();

    let quoted: Vec<String> = QUOTED
        .captures_iter(text)
        .chain(ANGLED.captures_iter(text))
        .map(|c| strip_extension(c[1].trim()))
        .filter(|s| !s.is_empty())
        .collect();
    if !quoted.is_empty() {
        return quoted;
    }

    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .map(|t| t.trim_end_matches(';'))
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.first() == Some(&"from") {
        if let Some(module) = tokens.get(1) {
            let mut out = vec![module.to_string()];
            let names = tokens
                .iter()
                .skip_while(|t| **t != "import")
                .skip(1)
                .filter(|t| **t != "as" && **t != "*");
            out.extend(names.map(|name| format!("{}.{}", module, name)));
            return out;
        }
    }

    tokens
        .iter()
        .find(|t| !IMPORT_KEYWORDS.contains(t))
        .map(|t| vec![t.to_string()])
        .unwrap_or_default()
}

fn strip_extension(path: &str) -> String {
    let (dir, file) = match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    };
    match file.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}", dir, &file[..dot]),
        _ => path.to_string(),
    }
}

/// Symbol names referenced by reactive property wrappers (last word of the declaration)
pub fn reactive_dependencies(record: &SymbolRecord, markers: &[String]) -> Vec<String> {
    record
        .property_declarations
        .iter()
        .filter(|prop| markers.iter().any(|m| prop.contains(m.as_str())))
        .filter_map(|prop| WORD.find_iter(prop).last().map(|m| m.as_str().to_string()))
        .collect()
}

/// Base filename without extension
pub fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// File-level graph: one node per record, edge A -> B when A lexically references B.
pub fn build_file_graph(
    records: &BTreeMap<String, SymbolRecord>,
    files: &BTreeMap<String, FileInfo>,
    heuristics: &LinkHeuristics,
) -> DependencyGraph {
    let stems: Vec<(&String, String)> = records.keys().map(|p| (p, file_stem(p))).collect();
    let mut links = BTreeSet::new();

    for (path, record) in records {
        let terms = RecordTerms::from_record(record, heuristics);
        for (other, stem) in &stems {
            if *other == path {
                continue;
            }
            if let Some(reason) = heuristics.link_reason(&terms, stem) {
                debug!("{} -> {} ({:?})", path, other, reason);
                links.insert(GraphLink {
                    source: path.clone(),
                    target: (*other).clone(),
                });
            }
        }
    }

    let nodes = records
        .keys()
        .map(|path| {
            let info = files.get(path);
            GraphNode {
                id: path.clone(),
                user: info.map(|f| f.component.clone()),
                description: String::new(),
                file_size: info.map_or(0, |f| f.size),
                link_count: None,
                file_count: None,
            }
        })
        .collect();

    DependencyGraph::new(nodes, links)
}

/// Collapse file nodes to their component; nodes carry the aggregate size and
/// file count, links are the set of component pairs crossed by a file edge.
pub fn build_repo_graph(file_graph: &DependencyGraph) -> DependencyGraph {
    let nodes = file_graph
        .component_totals()
        .into_iter()
        .map(|(component, (count, size))| GraphNode {
            id: component.clone(),
            user: None,
            description: component,
            file_size: size,
            link_count: None,
            file_count: Some(count),
        })
        .collect();

    let owner = |id: &str| file_graph.node(id).and_then(|n| n.user.clone());
    let links: BTreeSet<GraphLink> = file_graph
        .links()
        .iter()
        .filter_map(|l| match (owner(&l.source), owner(&l.target)) {
            (Some(s), Some(t)) if s != t => Some(GraphLink { source: s, target: t }),
            _ => None,
        })
        .collect();

    DependencyGraph::new(nodes, links)
}

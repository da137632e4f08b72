// Dependency graphs derived from symbol records

pub mod builder;
pub mod export;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Node as written to graph documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

/// Serialized `{nodes, links}` shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

/// Immutable directed graph with precomputed adjacency and link counts
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    links: Vec<GraphLink>,
    positions: HashMap<String, usize>,
    adjacency: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build from nodes and links. Self-edges and links to unknown nodes are
    /// dropped, duplicates collapse, and link counts are computed once here.
    pub fn new(mut nodes: Vec<GraphNode>, links: impl IntoIterator<Item = GraphLink>) -> Self {
        let positions: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();

        let links: BTreeSet<GraphLink> = links
            .into_iter()
            .filter(|l| l.source != l.target)
            .filter(|l| positions.contains_key(&l.source) && positions.contains_key(&l.target))
            .collect();

        let mut counts = vec![0usize; nodes.len()];
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for link in &links {
            counts[positions[&link.source]] += 1;
            counts[positions[&link.target]] += 1;
            adjacency
                .entry(link.source.clone())
                .or_default()
                .push(link.target.clone());
        }
        for (node, count) in nodes.iter_mut().zip(counts) {
            node.link_count = Some(count);
        }

        Self {
            nodes,
            links: links.into_iter().collect(),
            positions,
            adjacency,
        }
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn links(&self) -> &[GraphLink] {
        &self.links
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.positions.get(id).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Outgoing neighbours in sorted order
    pub fn neighbors(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[cfg(test)]
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.neighbors(source).iter().any(|n| n == target)
    }

    pub fn link_count(&self, id: &str) -> usize {
        self.node(id).and_then(|n| n.link_count).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.clone(),
            links: self.links.clone(),
        }
    }

    /// Nodes owned by `component` plus every link touching them
    pub fn component_slice(&self, component: &str) -> GraphDocument {
        let nodes: Vec<GraphNode> = self
            .nodes
            .iter()
            .filter(|n| n.user.as_deref() == Some(component))
            .cloned()
            .collect();
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let links = self
            .links
            .iter()
            .filter(|l| ids.contains(l.source.as_str()) || ids.contains(l.target.as_str()))
            .cloned()
            .collect();
        GraphDocument { nodes, links }
    }

    /// Component labels in sorted order
    pub fn components(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter_map(|n| n.user.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Subgraph induced by `ids`; unknown ids are ignored.
    pub fn subset(&self, ids: &[String]) -> DependencyGraph {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let nodes = self
            .nodes
            .iter()
            .filter(|n| wanted.contains(n.id.as_str()))
            .map(|n| GraphNode {
                link_count: None,
                ..n.clone()
            })
            .collect();
        let links: Vec<GraphLink> = self
            .links
            .iter()
            .filter(|l| wanted.contains(l.source.as_str()) && wanted.contains(l.target.as_str()))
            .cloned()
            .collect();
        DependencyGraph::new(nodes, links)
    }

    /// Per-component file counts and total byte size
    pub fn component_totals(&self) -> BTreeMap<String, (usize, u64)> {
        let mut totals: BTreeMap<String, (usize, u64)> = BTreeMap::new();
        for node in &self.nodes {
            if let Some(user) = &node.user {
                let entry = totals.entry(user.clone()).or_default();
                entry.0 += 1;
                entry.1 += node.file_size;
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, user: &str, size: u64) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            user: Some(user.to_string()),
            description: String::new(),
            file_size: size,
            link_count: None,
            file_count: None,
        }
    }

    fn link(s: &str, t: &str) -> GraphLink {
        GraphLink {
            source: s.to_string(),
            target: t.to_string(),
        }
    }

    #[test]
    fn test_new_drops_self_and_duplicate_edges() {
        let graph = DependencyGraph::new(
            vec![node("a", "r1", 1), node("b", "r1", 2)],
            vec![link("a", "b"), link("a", "b"), link("a", "a"), link("a", "missing")],
        );

        assert_eq!(graph.links().len(), 1);
        assert!(graph.has_edge("a", "b"));
        assert!(!graph.has_edge("b", "a"));
        assert_eq!(graph.link_count("a"), 1);
        assert_eq!(graph.link_count("b"), 1);
    }

    #[test]
    fn test_component_slice_keeps_cross_links() {
        let graph = DependencyGraph::new(
            vec![node("a", "r1", 1), node("b", "r2", 2), node("c", "r2", 3)],
            vec![link("a", "b"), link("b", "c")],
        );

        let slice = graph.component_slice("r1");
        assert_eq!(slice.nodes.len(), 1);
        assert_eq!(slice.links, vec![link("a", "b")]);

        let slice = graph.component_slice("r2");
        assert_eq!(slice.nodes.len(), 2);
        assert_eq!(slice.links.len(), 2);
    }

    #[test]
    fn test_subset_recomputes_counts() {
        let graph = DependencyGraph::new(
            vec![node("a", "r1", 1), node("b", "r1", 2), node("c", "r1", 3)],
            vec![link("a", "b"), link("b", "c"), link("a", "c")],
        );
        assert_eq!(graph.link_count("c"), 2);

        let sub = graph.subset(&["a".to_string(), "c".to_string()]);
        assert_eq!(sub.nodes().len(), 2);
        assert_eq!(sub.links(), &[link("a", "c")]);
        assert_eq!(sub.link_count("c"), 1);
    }

    #[test]
    fn test_document_roundtrip_uses_camel_case() {
        let graph = DependencyGraph::new(vec![node("a", "r1", 10)], vec![]);
        let json = serde_json::to_value(graph.to_document()).unwrap();
        assert_eq!(json["nodes"][0]["fileSize"], 10);
        assert_eq!(json["nodes"][0]["linkCount"], 0);
        assert!(json["nodes"][0].get("fileCount").is_none());
    }

    #[test]
    fn test_component_totals() {
        let graph = DependencyGraph::new(
            vec![node("a", "r1", 1), node("b", "r2", 2), node("c", "r2", 3)],
            vec![],
        );
        let totals = graph.component_totals();
        assert_eq!(totals["r1"], (1, 1));
        assert_eq!(totals["r2"], (2, 5));
    }
}

// Graph-guided context expansion

use std::collections::HashSet;

use tracing::debug;

use crate::graph::DependencyGraph;
use crate::index::embeddings::key_path;

/// Distinct file paths behind ranked keys, in ranking order
pub fn seed_files<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(|key| key_path(key).unwrap_or(key))
        .filter(|path| seen.insert(*path))
        .map(str::to_string)
        .collect()
}

/// Depth-first expansion from every seed over outgoing edges.
///
/// A seed sits at hop 0 and nodes up to `max_depth` hops away are collected.
/// One visited set is shared by all seeds, so a node is entered at most once
/// and cycles terminate. The walk is iterative and visits neighbours in
/// their stored order. Seeds missing from the graph are still collected.
pub fn expand(graph: &DependencyGraph, seeds: &[String], max_depth: usize) -> Vec<String> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();

    for seed in seeds {
        let mut stack: Vec<(&str, usize)> = vec![(seed.as_str(), 0)];
        while let Some((node, depth)) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            debug!("Visited {} at hop {}", node, depth);
            order.push(node.to_string());

            if depth < max_depth {
                for next in graph.neighbors(node).iter().rev() {
                    if !visited.contains(next.as_str()) {
                        stack.push((next.as_str(), depth + 1));
                    }
                }
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphLink, GraphNode};
    use proptest::prelude::*;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let nodes = nodes
            .iter()
            .map(|id| GraphNode {
                id: id.to_string(),
                user: None,
                description: String::new(),
                file_size: 0,
                link_count: None,
                file_count: None,
            })
            .collect();
        let links: Vec<GraphLink> = edges
            .iter()
            .map(|(s, t)| GraphLink {
                source: s.to_string(),
                target: t.to_string(),
            })
            .collect();
        DependencyGraph::new(nodes, links)
    }

    fn seeds(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_seed_files_dedup() {
        let keys = [
            "function:a|class:|path:/r/x.py",
            "class:B|path:/r/y.py",
            "import:os|path:/r/x.py",
        ];
        assert_eq!(seed_files(keys), vec!["/r/x.py", "/r/y.py"]);
    }

    #[test]
    fn test_depth_is_bounded() {
        let g = graph(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]);

        assert_eq!(expand(&g, &seeds(&["a"]), 0), vec!["a"]);
        assert_eq!(expand(&g, &seeds(&["a"]), 2), vec!["a", "b", "c"]);
        assert_eq!(expand(&g, &seeds(&["a"]), 10), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(expand(&g, &seeds(&["a"]), 100), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_visited_set_is_shared_across_seeds() {
        let g = graph(&["a", "b", "c"], &[("a", "c"), ("b", "c")]);
        assert_eq!(expand(&g, &seeds(&["a", "b"]), 2), vec!["a", "c", "b"]);
    }

    #[test]
    fn test_depth_first_order() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d")],
        );
        assert_eq!(expand(&g, &seeds(&["a"]), 2), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_unknown_seed_is_kept() {
        let g = graph(&["a"], &[]);
        assert_eq!(expand(&g, &seeds(&["/elsewhere.py"]), 2), vec!["/elsewhere.py"]);
    }

    proptest! {
        #[test]
        fn prop_expansion_never_revisits(
            edges in prop::collection::vec((0u8..8, 0u8..8), 0..40),
            seed_ids in prop::collection::vec(0u8..8, 1..4),
            max_depth in 0usize..5,
        ) {
            let ids: Vec<String> = (0..8).map(|i| format!("n{}", i)).collect();
            let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let edge_refs: Vec<(&str, &str)> = edges
                .iter()
                .map(|(s, t)| (id_refs[*s as usize], id_refs[*t as usize]))
                .collect();
            let g = graph(&id_refs, &edge_refs);
            let seeds: Vec<String> = seed_ids.iter().map(|i| ids[*i as usize].clone()).collect();

            let visited = expand(&g, &seeds, max_depth);

            let unique: HashSet<&String> = visited.iter().collect();
            prop_assert_eq!(unique.len(), visited.len());
            for seed in &seeds {
                prop_assert!(visited.contains(seed));
            }
            if max_depth == 0 {
                let distinct_seeds: HashSet<&String> = seeds.iter().collect();
                prop_assert_eq!(visited.len(), distinct_seeds.len());
            }
        }
    }
}

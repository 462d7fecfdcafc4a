//! Neighborhood slicing over an already fetched edge list.

use std::collections::{BTreeSet, HashMap, VecDeque};

use sapds_core::types::Edge;

/// Nodes within `depth` undirected hops of `focus`, and the edges induced on them.
///
/// Edge direction is ignored while walking. The focus is always included.
pub fn slice_subgraph(focus: &str, edges: &[Edge], depth: usize) -> (BTreeSet<String>, Vec<Edge>) {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        adjacency.entry(&edge.source).or_default().push(&edge.target);
        adjacency.entry(&edge.target).or_default().push(&edge.source);
    }

    let mut visited: BTreeSet<&str> = BTreeSet::from([focus]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(focus, 0)]);

    while let Some((current, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }
        for &next in adjacency.get(current).into_iter().flatten() {
            if visited.insert(next) {
                queue.push_back((next, hops + 1));
            }
        }
    }

    let induced = edges
        .iter()
        .filter(|e| visited.contains(e.source.as_str()) && visited.contains(e.target.as_str()))
        .cloned()
        .collect();
    let nodes = visited.into_iter().map(str::to_string).collect();
    (nodes, induced)
}

/// Edges whose relation is one of `rel_types`, compared case-insensitively.
///
/// An empty filter keeps every edge.
pub fn filter_edges_by_rel<S: AsRef<str>>(edges: Vec<Edge>, rel_types: &[S]) -> Vec<Edge> {
    if rel_types.is_empty() {
        return edges;
    }
    edges
        .into_iter()
        .filter(|e| rel_types.iter().any(|r| e.has_relation(r.as_ref())))
        .collect()
}

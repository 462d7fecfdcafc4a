//! Tree construction from a raw edge list.
//!
//! Only structural edges define parent/child. Levels and parents are assigned
//! once by BFS from the root (first discovery wins), bounded by depth.

use std::collections::{BTreeMap, HashMap, VecDeque};

use sapds_core::types::{Edge, NestedNode, TreeMeta, TreeNode, TreeNodeData, TreePayload};
use sapds_odata::escape_odata_literal;
use tracing::info;
use uuid::Uuid;

use crate::constants::{DEFAULT_ICON_URL, ES_FORCE_ELEMENT_TP, ID_FIELD, REL_STRUCTURE};

/// Fiori launchpad URL that opens the Force Element object page.
pub fn deep_link(host: &str, id: &str) -> String {
    format!(
        "https://{host}/sap/bc/ui2/flp#ForceElement-manageFE?sap-keep-alive=true\
         &/{ES_FORCE_ELEMENT_TP}({ID_FIELD}='{}',DraftUUID=guid'{}',IsActiveEntity=true)/",
        escape_odata_literal(id),
        Uuid::nil()
    )
}

/// Build the flat and nested tree views rooted at `root_id`.
///
/// Nodes beyond `depth` are left out entirely, including dangling targets of
/// structural edges. Children are sorted by ID; the flat list is ordered by
/// `(level, id)`. Names fall back to the node ID.
pub fn build_tree(
    root_id: &str,
    edges: &[Edge],
    names: &BTreeMap<String, String>,
    depth: usize,
    deeplink_host: &str,
) -> TreePayload {
    info!(root_id, depth, edges = edges.len(), "building tree");

    let structural: Vec<&Edge> = edges
        .iter()
        .filter(|e| e.has_relation(REL_STRUCTURE))
        .collect();

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &structural {
        let (source, target) = (edge.source.trim(), edge.target.trim());
        if source.is_empty() || target.is_empty() {
            continue;
        }
        adjacency.entry(source).or_default().push(target);
    }

    let mut level: HashMap<&str, usize> = HashMap::from([(root_id, 0)]);
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::from([root_id]);

    while let Some(current) = queue.pop_front() {
        let current_level = level[current];
        if current_level >= depth {
            continue;
        }
        for &child in adjacency.get(current).into_iter().flatten() {
            if level.contains_key(child) {
                continue;
            }
            level.insert(child, current_level + 1);
            parent.insert(child, current);
            queue.push_back(child);
        }
    }

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for (&child, &par) in &parent {
        children.entry(par).or_default().push(child);
    }
    for list in children.values_mut() {
        list.sort_unstable();
    }

    let mut order: Vec<&str> = level.keys().copied().collect();
    order.sort_by(|a, b| level[a].cmp(&level[b]).then_with(|| a.cmp(b)));

    let data_for = |id: &str| TreeNodeData {
        id: id.to_string(),
        name: names
            .get(id)
            .filter(|n| !n.is_empty())
            .cloned()
            .unwrap_or_else(|| id.to_string()),
        parent_id: parent.get(id).map(|p| p.to_string()),
        level: level[id],
        deep_link: deep_link(deeplink_host, id),
        icon_url: DEFAULT_ICON_URL.to_string(),
        readiness: None,
        sidc: None,
    };

    let nodes: Vec<TreeNode> = order
        .iter()
        .map(|&id| TreeNode {
            data: data_for(id),
            children: children
                .get(id)
                .map(|c| c.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default(),
        })
        .collect();

    let by_id: HashMap<&str, &TreeNode> = nodes.iter().map(|n| (n.data.id.as_str(), n)).collect();
    let roots = by_id
        .get(root_id)
        .map(|root| vec![nest(root, &by_id)])
        .unwrap_or_default();

    let meta = TreeMeta {
        depth_requested: depth,
        depth_reached: level.values().copied().max().unwrap_or(0),
        node_count: nodes.len(),
        struct_rel: REL_STRUCTURE.to_string(),
        edge_count_total: edges.len(),
        edge_count_struct: structural.len(),
    };

    TreePayload {
        root: root_id.to_string(),
        nodes,
        roots,
        meta,
        edges: Vec::new(),
    }
}

fn nest(node: &TreeNode, by_id: &HashMap<&str, &TreeNode>) -> NestedNode {
    NestedNode {
        data: node.data.clone(),
        children: node
            .children
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .map(|child| nest(child, by_id))
            .collect(),
    }
}

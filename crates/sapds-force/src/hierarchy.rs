//! Parent-field hierarchies: node lookups, child queries, and traversal.

use std::collections::{BTreeMap, HashSet};

use sapds_core::types::{ChildRecord, HierarchyType, NodeInfo};
use sapds_odata::{or_filter, ODataService, QueryParams};
use tracing::{debug, info, warn};

use crate::constants::*;
use crate::rows::{normalize_ids, parse_rows, ForceElementRow};

/// Batch sizes for hierarchy queries.
#[derive(Debug, Clone, Copy)]
pub struct HierarchyChunks {
    pub nodes: usize,
    pub children: usize,
}

impl Default for HierarchyChunks {
    fn default() -> Self {
        Self {
            nodes: 40,
            children: 25,
        }
    }
}

fn active_filter(field: &str, values: &[String]) -> String {
    format!("({}) and ({ACTIVE_ENTITY_FILTER})", or_filter(field, values))
}

fn node_info(row: &ForceElementRow, id: String) -> NodeInfo {
    NodeInfo {
        name: row.text(NAME_FIELDS[0]).unwrap_or_else(|| id.clone()),
        symbol: row.symbol.clone(),
        parent_structure: row.parent_structure.clone(),
        parent_peacetime: row.parent_peacetime.clone(),
        parent_wartime: row.parent_wartime.clone(),
        id,
    }
}

/// Basic fields of active records for `ids`. Failed batches are skipped.
pub async fn fetch_nodes_bulk<I, S>(
    svc: &ODataService,
    ids: I,
    chunk_size: usize,
) -> BTreeMap<String, NodeInfo>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ids = normalize_ids(ids);
    let mut out = BTreeMap::new();
    let select = [
        ID_FIELD,
        NAME_FIELDS[0],
        SYMBOL_FIELD,
        PARENT_STRUCTURE_FIELD,
        PARENT_PEACETIME_FIELD,
        PARENT_WARTIME_FIELD,
    ]
    .join(",");

    for batch in ids.chunks(chunk_size.max(1)) {
        let params = QueryParams::from([
            ("$select".to_string(), select.clone()),
            ("$filter".to_string(), active_filter(ID_FIELD, batch)),
        ]);
        match svc.read(ES_FORCE_ELEMENT_TP, &params, None).await {
            Ok(rows) => {
                for row in parse_rows::<ForceElementRow>(rows) {
                    if let Some(id) = row.id.clone() {
                        out.insert(id.clone(), node_info(&row, id));
                    }
                }
            }
            Err(e) => warn!(batch = batch.len(), error = %e, "node batch failed, skipping"),
        }
    }
    out
}

/// Active children of `parent_ids` under `hierarchy`. Failed batches are skipped.
pub async fn fetch_children_bulk<I, S>(
    svc: &ODataService,
    parent_ids: I,
    hierarchy: HierarchyType,
    chunk_size: usize,
) -> Vec<ChildRecord>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parents = normalize_ids(parent_ids);
    let pfield = parent_field(hierarchy);
    let select = [ID_FIELD, NAME_FIELDS[0], SYMBOL_FIELD, pfield].join(",");
    let mut out = Vec::new();

    for batch in parents.chunks(chunk_size.max(1)) {
        let params = QueryParams::from([
            ("$select".to_string(), select.clone()),
            ("$filter".to_string(), active_filter(pfield, batch)),
        ]);
        match svc.read(ES_FORCE_ELEMENT_TP, &params, None).await {
            Ok(rows) => {
                for row in parse_rows::<ForceElementRow>(rows) {
                    let Some(id) = row.id.clone() else {
                        continue;
                    };
                    out.push(ChildRecord {
                        name: row.text(NAME_FIELDS[0]).unwrap_or_else(|| id.clone()),
                        symbol: row.symbol.clone(),
                        parent_id: row.text(pfield),
                        id,
                    });
                }
            }
            Err(e) => {
                warn!(batch = batch.len(), %hierarchy, error = %e, "children batch failed, skipping")
            }
        }
    }
    debug!(%hierarchy, parents = parents.len(), children = out.len(), "children fetched");
    out
}

/// All nodes reachable from `root_id` through `hierarchy` children within `max_depth` levels.
///
/// Empty when the root itself is not found.
pub async fn traverse_hierarchy(
    svc: &ODataService,
    root_id: &str,
    hierarchy: HierarchyType,
    max_depth: usize,
    chunks: HierarchyChunks,
) -> BTreeMap<String, NodeInfo> {
    info!(root_id, %hierarchy, max_depth, "traversing hierarchy");

    let mut nodes = fetch_nodes_bulk(svc, [root_id], chunks.nodes).await;
    if !nodes.contains_key(root_id.trim()) {
        return BTreeMap::new();
    }

    let mut seen: HashSet<String> = nodes.keys().cloned().collect();
    let mut frontier: Vec<String> = nodes.keys().cloned().collect();

    for _ in 0..max_depth {
        if frontier.is_empty() {
            break;
        }
        let children = fetch_children_bulk(svc, &frontier, hierarchy, chunks.children).await;
        let mut next = Vec::new();

        for child in children {
            if !seen.insert(child.id.clone()) {
                continue;
            }
            let mut info = NodeInfo {
                id: child.id.clone(),
                name: child.name,
                symbol: child.symbol,
                parent_structure: None,
                parent_peacetime: None,
                parent_wartime: None,
            };
            match hierarchy {
                HierarchyType::Structure => info.parent_structure = child.parent_id,
                HierarchyType::Peacetime => info.parent_peacetime = child.parent_id,
                HierarchyType::Wartime => info.parent_wartime = child.parent_id,
                HierarchyType::Operation | HierarchyType::Exercise => {}
            }
            next.push(child.id.clone());
            nodes.insert(child.id, info);
        }
        frontier = next;
    }

    info!(root_id, nodes = nodes.len(), "hierarchy traversal complete");
    nodes
}

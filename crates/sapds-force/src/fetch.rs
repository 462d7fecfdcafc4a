//! Bounded breadth-first expansion of the Force Element network graph.
//!
//! Each BFS level splits the frontier into batches, issues one paged
//! OR-filter query per batch against the edge entity set, and collects new
//! edges and newly discovered targets. Batches run strictly one after another.

use std::collections::HashSet;

use sapds_core::types::Edge;
use sapds_odata::{or_filter, ODataService, QueryParams};
use tracing::{debug, info};

use crate::constants::{DST_FIELD, ES_GRAPH_EDGE, REL_FIELD, SRC_FIELD};
use crate::error::Result;
use crate::rows::{parse_rows, EdgeRow};

/// Batching and paging limits for [`fetch_edges`].
#[derive(Debug, Clone, Copy)]
pub struct EdgeFetchOptions {
    /// Frontier IDs per query.
    pub batch_size: usize,
    /// `$top` per page.
    pub page_top: usize,
    /// Page cap per batch query.
    pub max_pages: Option<usize>,
}

impl Default for EdgeFetchOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            page_top: 5000,
            max_pages: None,
        }
    }
}

/// Collect all edges reachable from `root_id` within `depth` hops, all relation types.
///
/// Edges are deduplicated by `(source, target, relation)` and returned in
/// discovery order. Rows missing a source or target are ignored. An upstream
/// error on any batch aborts the traversal.
pub async fn fetch_edges(
    svc: &ODataService,
    root_id: &str,
    depth: usize,
    opts: &EdgeFetchOptions,
) -> Result<Vec<Edge>> {
    info!(root_id, depth, "fetching force element edges");

    let mut discovered: HashSet<String> = HashSet::from([root_id.to_string()]);
    let mut frontier: Vec<String> = vec![root_id.to_string()];
    let mut edge_seen: HashSet<(String, String, String)> = HashSet::new();
    let mut edges: Vec<Edge> = Vec::new();

    for level in 0..depth {
        if frontier.is_empty() {
            break;
        }
        let mut next_frontier = Vec::new();

        for batch in frontier.chunks(opts.batch_size.max(1)) {
            let params = QueryParams::from([
                (
                    "$select".to_string(),
                    format!("{SRC_FIELD},{DST_FIELD},{REL_FIELD}"),
                ),
                ("$filter".to_string(), or_filter(SRC_FIELD, batch)),
                ("$top".to_string(), opts.page_top.to_string()),
            ]);

            let rows = svc
                .read_all(ES_GRAPH_EDGE, params, None, opts.max_pages)
                .await?;
            debug!(level, batch = batch.len(), rows = rows.len(), "edge batch fetched");

            for row in parse_rows::<EdgeRow>(rows) {
                let (Some(source), Some(target)) = (row.source, row.target) else {
                    continue;
                };
                let relation = row.relation.unwrap_or_default();

                if edge_seen.insert((source.clone(), target.clone(), relation.clone())) {
                    edges.push(Edge::new(source, target.clone(), relation));
                }
                if discovered.insert(target.clone()) {
                    next_frontier.push(target);
                }
            }
        }

        debug!(level, discovered = discovered.len(), next = next_frontier.len(), "BFS level done");
        frontier = next_frontier;
    }

    info!(root_id, edges = edges.len(), nodes = discovered.len(), "edge fetch complete");
    Ok(edges)
}

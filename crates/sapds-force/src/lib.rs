//! sapds-force: Force Element graph traversal for SAP Defense & Security.
//!
//! Expands the Force Element network graph by bounded BFS over the graph
//! OData service, builds structural trees from the fetched edges, and
//! enriches them with names, readiness KPIs, and military symbol codes from
//! the Force Element entity service.
//!
//! Graph and tree construction fail on upstream errors. Enrichment degrades:
//! names fall back to IDs, and readiness and symbol lookups skip failed batches.

pub mod constants;
pub mod error;
pub mod fetch;
pub mod hierarchy;
pub mod labels;
pub mod readiness;
pub mod rows;
pub mod subgraph;
pub mod symbol;
pub mod tree;
pub mod types;

pub use error::{ForceError, Result};
pub use types::{ChildrenRequest, GraphRequest, SubgraphRequest, TreeRequest};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use sapds_core::config::ForceElementConfig;
use sapds_core::types::{
    ChildRecord, Edge, ForceElementSummary, GraphMeta, GraphNode, GraphPayload, HierarchyType,
    NodeInfo, Readiness, SubgraphPayload, TreePayload,
};
use sapds_odata::{FieldValidation, ODataService, QueryOptions, Transport};
use serde_json::Value;
use tracing::info;

use crate::constants::{ES_FORCE_ELEMENT_TP, ES_GRAPH_EDGE, SVC_FORCE_ELEMENT, SVC_GRAPH};
use crate::fetch::EdgeFetchOptions;
use crate::hierarchy::HierarchyChunks;
use crate::symbol::SidcFieldCache;

/// Logical entity set name for Force Element master data.
pub const LOGICAL_FORCE_ELEMENTS: &str = "force_elements";
/// Logical entity set name for network graph edges.
pub const LOGICAL_GRAPH_EDGES: &str = "graph_edges";

/// Default hop count for [`ForceElementClient::get_subgraph`].
pub const DEFAULT_SUBGRAPH_DEPTH: usize = 2;

/// High-level client over the Force Element entity and graph services.
pub struct ForceElementClient {
    entities: ODataService,
    graph: ODataService,
    config: ForceElementConfig,
    sidc: SidcFieldCache,
}

impl ForceElementClient {
    /// Create a client using the transport's default `sap-client`.
    pub fn new(transport: Arc<dyn Transport>, config: ForceElementConfig) -> Self {
        Self::with_sap_client(transport, config, None)
    }

    /// Create a client bound to an explicit `sap-client`.
    pub fn with_sap_client(
        transport: Arc<dyn Transport>,
        config: ForceElementConfig,
        sap_client: Option<String>,
    ) -> Self {
        Self {
            entities: ODataService::with_sap_client(
                Arc::clone(&transport),
                SVC_FORCE_ELEMENT,
                sap_client.clone(),
            ),
            graph: ODataService::with_sap_client(transport, SVC_GRAPH, sap_client),
            config,
            sidc: SidcFieldCache::new(),
        }
    }

    pub fn config(&self) -> &ForceElementConfig {
        &self.config
    }

    pub fn sap_client(&self) -> Option<&str> {
        self.entities.sap_client()
    }

    fn edge_options(&self) -> EdgeFetchOptions {
        EdgeFetchOptions {
            batch_size: self.config.edge_batch_size,
            page_top: self.config.edge_page_top,
            max_pages: self.config.edge_max_pages,
        }
    }

    fn hierarchy_chunks(&self) -> HierarchyChunks {
        HierarchyChunks {
            nodes: self.config.bulk_chunk_size,
            children: self.config.children_chunk_size,
        }
    }

    // ── Graph ─────────────────────────────────────────────────────

    /// Expand the network graph around `root_id`, all relations unless filtered.
    pub async fn get_graph(&self, request: GraphRequest) -> Result<GraphPayload> {
        let root = require_id(&request.root_id, "root_id")?;
        let depth = request.depth.unwrap_or(self.config.default_depth);

        let edges = fetch::fetch_edges(&self.graph, root, depth, &self.edge_options()).await?;
        let edges = match request.rel_types.as_deref() {
            Some(rel_types) => subgraph::filter_edges_by_rel(edges, rel_types),
            None => edges,
        };

        let ids = endpoint_ids(root, &edges);
        let names = if request.include_names.unwrap_or(true) {
            labels::fetch_names_for_ids(&self.entities, &ids, self.config.name_chunk_size).await
        } else {
            BTreeMap::new()
        };

        let nodes: Vec<GraphNode> = ids
            .into_iter()
            .map(|id| GraphNode {
                name: names.get(&id).cloned().unwrap_or_else(|| id.clone()),
                id,
            })
            .collect();

        info!(root, depth, nodes = nodes.len(), edges = edges.len(), "graph built");
        Ok(GraphPayload {
            root: root.to_string(),
            meta: GraphMeta {
                depth,
                node_count: nodes.len(),
                edge_count: edges.len(),
            },
            nodes,
            edges,
        })
    }

    /// Nodes within `depth` undirected hops of `focus_id` in `edges`, with the induced edges.
    pub fn get_subgraph(
        &self,
        focus_id: &str,
        edges: &[Edge],
        depth: Option<usize>,
    ) -> Result<SubgraphPayload> {
        let focus = require_id(focus_id, "focus_id")?;
        let (node_ids, edges) =
            subgraph::slice_subgraph(focus, edges, depth.unwrap_or(DEFAULT_SUBGRAPH_DEPTH));
        Ok(SubgraphPayload {
            focus: focus.to_string(),
            node_ids: node_ids.into_iter().collect(),
            edges,
        })
    }

    // ── Tree ──────────────────────────────────────────────────────

    /// Build the structural tree under `root_id`, optionally enriched.
    pub async fn get_tree(&self, request: TreeRequest) -> Result<TreePayload> {
        let root = require_id(&request.root_id, "root_id")?;
        let depth = request.depth.unwrap_or(self.config.default_depth);

        let edges = fetch::fetch_edges(&self.graph, root, depth, &self.edge_options()).await?;
        let names = labels::fetch_names_for_ids(
            &self.entities,
            endpoint_ids(root, &edges),
            self.config.name_chunk_size,
        )
        .await;

        let mut payload = tree::build_tree(root, &edges, &names, depth, &self.config.deeplink_host);
        payload.edges = edges;

        let node_ids = payload.node_ids();
        if request.include_readiness.unwrap_or(false) && !node_ids.is_empty() {
            let readiness = self.get_readiness(&node_ids).await;
            payload.apply_readiness(&readiness);
        }
        if request.include_sidc.unwrap_or(false) && !node_ids.is_empty() {
            let sidcs = self.get_sidcs(&node_ids).await;
            payload.apply_sidc(&sidcs, &self.config.icon_base_url);
        }

        Ok(payload)
    }

    // ── Hierarchy ─────────────────────────────────────────────────

    /// Direct children of `request.parent_ids` under `request.hierarchy`.
    pub async fn get_children(&self, request: ChildrenRequest) -> Vec<ChildRecord> {
        hierarchy::fetch_children_bulk(
            &self.entities,
            &request.parent_ids,
            request.hierarchy,
            self.config.children_chunk_size,
        )
        .await
    }

    /// Every node under `root_id` in `hierarchy` within `max_depth` levels.
    pub async fn traverse(
        &self,
        root_id: &str,
        hierarchy: HierarchyType,
        max_depth: usize,
    ) -> Result<BTreeMap<String, NodeInfo>> {
        let root = require_id(root_id, "root_id")?;
        Ok(hierarchy::traverse_hierarchy(
            &self.entities,
            root,
            hierarchy,
            max_depth,
            self.hierarchy_chunks(),
        )
        .await)
    }

    pub async fn get_nodes<I, S>(&self, ids: I) -> BTreeMap<String, NodeInfo>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        hierarchy::fetch_nodes_bulk(&self.entities, ids, self.config.bulk_chunk_size).await
    }

    // ── Single elements and enrichment ────────────────────────────

    /// ID, display name, and launchpad link for one element.
    pub async fn get_force_element(&self, id: &str) -> Result<ForceElementSummary> {
        let id = require_id(id, "id")?;
        let names = self.get_names([id]).await;
        Ok(ForceElementSummary {
            id: id.to_string(),
            name: names.get(id).cloned().unwrap_or_else(|| id.to_string()),
            url: self.deep_link(id),
        })
    }

    pub async fn get_names<I, S>(&self, ids: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels::fetch_names_for_ids(&self.entities, ids, self.config.name_chunk_size).await
    }

    pub async fn get_readiness<I, S>(&self, ids: I) -> BTreeMap<String, Readiness>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        readiness::fetch_readiness_bulk(&self.entities, ids, self.config.bulk_chunk_size).await
    }

    pub async fn get_sidcs<I, S>(&self, ids: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        symbol::fetch_sidc_bulk(&self.entities, &self.sidc, ids, self.config.bulk_chunk_size).await
    }

    /// The SIDC-carrying field, probed once per client.
    pub async fn probe_sidc_field(&self) -> Option<String> {
        self.sidc.field(&self.entities).await.map(str::to_string)
    }

    pub fn deep_link(&self, id: &str) -> String {
        tree::deep_link(&self.config.deeplink_host, id)
    }

    // ── Generic queries ───────────────────────────────────────────

    /// Map a logical or real entity set name to its service and real name.
    ///
    /// Unknown names are assumed to live in the Force Element entity service.
    pub fn resolve_entity_set<'a>(&'a self, name: &'a str) -> (&'a ODataService, &'a str) {
        match name {
            LOGICAL_FORCE_ELEMENTS => (&self.entities, ES_FORCE_ELEMENT_TP),
            LOGICAL_GRAPH_EDGES | ES_GRAPH_EDGE => (&self.graph, ES_GRAPH_EDGE),
            other => (&self.entities, other),
        }
    }

    /// Run a generic query against a logical or real entity set.
    pub async fn query(&self, entity_set: &str, opts: QueryOptions) -> Result<Vec<Value>> {
        let (svc, entity_set) = self.resolve_entity_set(entity_set);
        let opts = if self.config.strict_select {
            opts.validation(FieldValidation::Strict)
        } else {
            opts
        };
        Ok(svc.query(entity_set, &opts).await?)
    }

    /// Entity sets of both services, keyed by service name.
    pub async fn list_entity_sets(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let mut out = BTreeMap::new();
        for svc in [&self.entities, &self.graph] {
            out.insert(svc.name().to_string(), svc.list_entity_sets().await?);
        }
        Ok(out)
    }

    /// Property names of a logical or real entity set.
    pub async fn list_fields(&self, entity_set: &str) -> Result<Vec<String>> {
        let (svc, entity_set) = self.resolve_entity_set(entity_set);
        Ok(svc.list_fields(entity_set).await?)
    }
}

fn require_id<'a>(id: &'a str, what: &str) -> Result<&'a str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ForceError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(id)
}

/// `root` plus both endpoints of every edge, sorted.
fn endpoint_ids(root: &str, edges: &[Edge]) -> BTreeSet<String> {
    std::iter::once(root)
        .chain(edges.iter().flat_map(|e| [e.source.as_str(), e.target.as_str()]))
        .map(str::to_string)
        .collect()
}

//! Core domain types for the Force Element graph and tree views.
//!
//! These types are produced by the traversal engine and handed to callers
//! (CLI, HTTP gateway, library users) as plain serializable payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Edges ─────────────────────────────────────────────────────────

/// A directed relationship between two force elements.
///
/// Deduplicated by the `(source, target, relation)` triple, so parallel
/// edges with different relation codes are distinct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "rel")]
    pub relation: String,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
        }
    }

    /// Dedup key for this edge.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.source, &self.target, &self.relation)
    }

    /// Case-insensitive relation code match.
    pub fn has_relation(&self, code: &str) -> bool {
        self.relation.eq_ignore_ascii_case(code)
    }
}

// ── Readiness ─────────────────────────────────────────────────────

/// Mission capability classification derived from a readiness score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReadinessStatus {
    /// Fully mission capable.
    Fmc,
    /// Partially mission capable.
    Pmc,
    /// Not mission capable.
    Nmc,
    /// No readiness data available.
    #[default]
    Unk,
}

impl ReadinessStatus {
    /// Threshold mapping: `>= 85` FMC, `>= 60` PMC, otherwise NMC.
    pub fn from_score(score: u8) -> Self {
        if score >= 85 {
            Self::Fmc
        } else if score >= 60 {
            Self::Pmc
        } else {
            Self::Nmc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fmc => "FMC",
            Self::Pmc => "PMC",
            Self::Nmc => "NMC",
            Self::Unk => "UNK",
        }
    }
}

impl fmt::Display for ReadinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three independent readiness percentages, each in `0..=100`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReadinessKpis {
    pub material_pct: Option<u8>,
    pub personnel_pct: Option<u8>,
    pub training_pct: Option<u8>,
}

impl ReadinessKpis {
    /// Conservative aggregate: the minimum of the available KPIs, or 0.
    pub fn score(&self) -> u8 {
        [self.material_pct, self.personnel_pct, self.training_pct]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(0)
    }
}

/// Aggregated readiness for a single force element.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Readiness {
    pub status: ReadinessStatus,
    pub score: u8,
    pub kpis: ReadinessKpis,
}

impl Readiness {
    pub fn from_kpis(kpis: ReadinessKpis) -> Self {
        let score = kpis.score();
        Self {
            status: ReadinessStatus::from_score(score),
            score,
            kpis,
        }
    }
}

// ── Tree ──────────────────────────────────────────────────────────

/// Fields shared by the flat and nested tree representations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeNodeData {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub level: usize,
    pub deep_link: String,
    pub icon_url: String,
    pub readiness: Option<Readiness>,
    pub sidc: Option<String>,
}

/// A node in the flat (BFS-ordered) tree list. Children are referenced by ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeNode {
    #[serde(flatten)]
    pub data: TreeNodeData,
    pub children: Vec<String>,
}

/// A node in the recursive tree view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NestedNode {
    #[serde(flatten)]
    pub data: TreeNodeData,
    pub children: Vec<NestedNode>,
}

impl NestedNode {
    fn visit_mut<F: FnMut(&mut TreeNodeData)>(&mut self, f: &mut F) {
        f(&mut self.data);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    /// Total number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(NestedNode::size).sum::<usize>()
    }
}

/// Summary statistics for a built tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeMeta {
    pub depth_requested: usize,
    pub depth_reached: usize,
    pub node_count: usize,
    pub struct_rel: String,
    pub edge_count_total: usize,
    pub edge_count_struct: usize,
}

/// A materialized tree with both flat and nested views.
///
/// Owned by the caller once returned. Enrichment passes update it through
/// [`TreePayload::for_each_node_mut`], which keeps both views in step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreePayload {
    pub root: String,
    pub nodes: Vec<TreeNode>,
    pub roots: Vec<NestedNode>,
    pub meta: TreeMeta,
    /// Every edge fetched during traversal, all relation types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<Edge>,
}

impl TreePayload {
    /// IDs of all nodes in the flat list, in BFS order.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.data.id.clone()).collect()
    }

    /// Look up a flat node by ID.
    pub fn node(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.iter().find(|n| n.data.id == id)
    }

    /// Apply `f` to every node in the flat list and every node in the nested view.
    pub fn for_each_node_mut<F: FnMut(&mut TreeNodeData)>(&mut self, mut f: F) {
        for node in &mut self.nodes {
            f(&mut node.data);
        }
        for root in &mut self.roots {
            root.visit_mut(&mut f);
        }
    }

    /// Merge readiness results into the tree. Nodes absent from `by_id` are left untouched.
    pub fn apply_readiness(&mut self, by_id: &BTreeMap<String, Readiness>) {
        self.for_each_node_mut(|node| {
            if let Some(r) = by_id.get(&node.id) {
                node.readiness = Some(*r);
            }
        });
    }

    /// Merge symbol codes into the tree, pointing each icon at `{icon_base_url}/{sidc}.svg`.
    pub fn apply_sidc(&mut self, by_id: &BTreeMap<String, String>, icon_base_url: &str) {
        let base = icon_base_url.trim_end_matches('/');
        self.for_each_node_mut(|node| {
            if let Some(sidc) = by_id.get(&node.id) {
                node.icon_url = format!("{base}/{sidc}.svg");
                node.sidc = Some(sidc.clone());
            }
        });
    }
}

// ── Graph ─────────────────────────────────────────────────────────

/// A graph vertex with its resolved display name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphMeta {
    pub depth: usize,
    pub node_count: usize,
    pub edge_count: usize,
}

/// Result of a bounded graph expansion around a root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphPayload {
    pub root: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<Edge>,
    pub meta: GraphMeta,
}

/// Induced neighborhood of a focus node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubgraphPayload {
    pub focus: String,
    pub node_ids: Vec<String>,
    pub edges: Vec<Edge>,
}

// ── Hierarchy ─────────────────────────────────────────────────────

/// Which parent assignment defines the hierarchy.
///
/// Deserializes leniently: unknown names become `Structure`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum HierarchyType {
    #[default]
    Structure,
    Peacetime,
    Wartime,
    Operation,
    Exercise,
}

impl HierarchyType {
    pub const ALL: [HierarchyType; 5] = [
        Self::Structure,
        Self::Peacetime,
        Self::Wartime,
        Self::Operation,
        Self::Exercise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Peacetime => "peacetime",
            Self::Wartime => "wartime",
            Self::Operation => "operation",
            Self::Exercise => "exercise",
        }
    }

    /// Parse a hierarchy name, falling back to `Structure` for unknown input.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl FromStr for HierarchyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == lower)
            .ok_or_else(|| format!("unknown hierarchy type: {s}"))
    }
}

impl From<String> for HierarchyType {
    fn from(s: String) -> Self {
        Self::parse_or_default(&s)
    }
}

impl fmt::Display for HierarchyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A child force element found under one of the requested parents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChildRecord {
    pub id: String,
    pub name: String,
    pub symbol: Option<String>,
    pub parent_id: Option<String>,
}

/// Basic node fields for a force element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
    pub symbol: Option<String>,
    pub parent_structure: Option<String>,
    pub parent_peacetime: Option<String>,
    pub parent_wartime: Option<String>,
}

/// Minimal single-element view with its launchpad link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForceElementSummary {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(id: &str) -> TreeNodeData {
        TreeNodeData {
            id: id.to_string(),
            name: id.to_string(),
            parent_id: None,
            level: 0,
            deep_link: String::new(),
            icon_url: String::new(),
            readiness: None,
            sidc: None,
        }
    }

    #[test]
    fn test_edge_serializes_relation_as_rel() {
        let edge = Edge::new("A", "B", "B002");
        let json = serde_json::to_value(&edge).unwrap();
        assert_eq!(json, serde_json::json!({"source": "A", "target": "B", "rel": "B002"}));
    }

    #[test]
    fn test_edge_relation_match_ignores_case() {
        let edge = Edge::new("A", "B", "b002");
        assert!(edge.has_relation("B002"));
        assert!(!edge.has_relation("B005"));
    }

    #[test]
    fn test_readiness_uses_minimum_of_available_kpis() {
        let r = Readiness::from_kpis(ReadinessKpis {
            material_pct: Some(90),
            personnel_pct: None,
            training_pct: Some(70),
        });
        assert_eq!(r.score, 70);
        assert_eq!(r.status, ReadinessStatus::Pmc);
    }

    #[test]
    fn test_readiness_without_kpis_is_not_capable() {
        let r = Readiness::from_kpis(ReadinessKpis::default());
        assert_eq!(r.score, 0);
        assert_eq!(r.status, ReadinessStatus::Nmc);
    }

    #[test]
    fn test_status_thresholds() {
        assert_eq!(ReadinessStatus::from_score(100), ReadinessStatus::Fmc);
        assert_eq!(ReadinessStatus::from_score(85), ReadinessStatus::Fmc);
        assert_eq!(ReadinessStatus::from_score(84), ReadinessStatus::Pmc);
        assert_eq!(ReadinessStatus::from_score(60), ReadinessStatus::Pmc);
        assert_eq!(ReadinessStatus::from_score(59), ReadinessStatus::Nmc);
        assert_eq!(
            serde_json::to_string(&ReadinessStatus::Unk).unwrap(),
            "\"UNK\""
        );
    }

    #[test]
    fn test_hierarchy_type_parsing() {
        assert_eq!("Wartime".parse::<HierarchyType>(), Ok(HierarchyType::Wartime));
        assert!("bogus".parse::<HierarchyType>().is_err());
        assert_eq!(HierarchyType::parse_or_default("bogus"), HierarchyType::Structure);
    }

    #[test]
    fn test_hierarchy_type_deserialize_unknown_falls_back() {
        let parse = |s: &str| serde_json::from_str::<HierarchyType>(s).unwrap();
        assert_eq!(parse(r#""bogus""#), HierarchyType::Structure);
        assert_eq!(parse(r#""""#), HierarchyType::Structure);
        assert_eq!(parse(r#"" WARTIME ""#), HierarchyType::Wartime);
        assert_eq!(parse(r#""exercise""#), HierarchyType::Exercise);
        assert!(serde_json::from_str::<HierarchyType>("3").is_err());
        assert_eq!(
            serde_json::to_string(&HierarchyType::Peacetime).unwrap(),
            r#""peacetime""#
        );
    }

    #[test]
    fn test_for_each_node_mut_reaches_both_views() {
        let mut payload = TreePayload {
            root: "A".to_string(),
            nodes: vec![
                TreeNode { data: data("A"), children: vec!["B".to_string()] },
                TreeNode { data: data("B"), children: vec![] },
            ],
            roots: vec![NestedNode {
                data: data("A"),
                children: vec![NestedNode { data: data("B"), children: vec![] }],
            }],
            meta: TreeMeta {
                depth_requested: 1,
                depth_reached: 1,
                node_count: 2,
                struct_rel: "B002".to_string(),
                edge_count_total: 1,
                edge_count_struct: 1,
            },
            edges: vec![],
        };

        let mut visits = 0;
        payload.for_each_node_mut(|n| {
            visits += 1;
            n.sidc = Some(format!("S-{}", n.id));
        });

        assert_eq!(visits, 4);
        assert_eq!(payload.roots[0].children[0].data.sidc.as_deref(), Some("S-B"));
        assert_eq!(payload.node("B").unwrap().data.sidc.as_deref(), Some("S-B"));
        assert_eq!(payload.roots[0].size(), 2);
    }

    #[test]
    fn test_apply_sidc_sets_icon_url() {
        let mut payload = TreePayload {
            root: "A".to_string(),
            nodes: vec![TreeNode { data: data("A"), children: vec![] }],
            roots: vec![NestedNode { data: data("A"), children: vec![] }],
            meta: TreeMeta {
                depth_requested: 0,
                depth_reached: 0,
                node_count: 1,
                struct_rel: "B002".to_string(),
                edge_count_total: 0,
                edge_count_struct: 0,
            },
            edges: vec![],
        };
        let sidcs = BTreeMap::from([("A".to_string(), "SFGPU".to_string())]);
        payload.apply_sidc(&sidcs, "/icons/cache/");
        assert_eq!(payload.nodes[0].data.icon_url, "/icons/cache/SFGPU.svg");
        assert_eq!(payload.roots[0].data.sidc.as_deref(), Some("SFGPU"));

        let readiness = BTreeMap::from([(
            "A".to_string(),
            Readiness::from_kpis(ReadinessKpis {
                material_pct: Some(95),
                personnel_pct: Some(88),
                training_pct: None,
            }),
        )]);
        payload.apply_readiness(&readiness);
        let r = payload.roots[0].data.readiness.unwrap();
        assert_eq!(r.score, 88);
        assert_eq!(r.status, ReadinessStatus::Fmc);
    }

    #[test]
    fn test_tree_node_flattens_data() {
        let node = TreeNode { data: data("X"), children: vec![] };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["id"], "X");
        assert_eq!(json["level"], 0);
        assert!(json["readiness"].is_null());
    }
}

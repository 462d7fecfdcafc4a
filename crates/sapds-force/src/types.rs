//! Request types for the Force Element facade.

use serde::{Deserialize, Serialize};

use sapds_core::types::{Edge, HierarchyType};

/// Request to expand the network graph around a root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphRequest {
    pub root_id: String,
    /// BFS depth (default: configured `default_depth`).
    pub depth: Option<usize>,
    /// Relation codes to keep. All relations when absent or empty.
    pub rel_types: Option<Vec<String>>,
    /// Resolve display names (default: true).
    pub include_names: Option<bool>,
}

/// Request to build the structural tree under a root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeRequest {
    pub root_id: String,
    pub depth: Option<usize>,
    /// Attach readiness KPIs (default: false).
    pub include_readiness: Option<bool>,
    /// Attach symbol codes and icons (default: false).
    pub include_sidc: Option<bool>,
}

/// Request to slice a neighborhood out of a known edge list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphRequest {
    pub focus_id: String,
    pub edges: Vec<Edge>,
    /// Undirected hops (default: 2).
    pub depth: Option<usize>,
}

/// Request for the direct children of a set of parents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChildrenRequest {
    pub parent_ids: Vec<String>,
    #[serde(default)]
    pub hierarchy: HierarchyType,
}

impl GraphRequest {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            ..Default::default()
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_rel_types<I, S>(mut self, rel_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rel_types = Some(rel_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_names(mut self, include: bool) -> Self {
        self.include_names = Some(include);
        self
    }
}

impl TreeRequest {
    pub fn new(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            ..Default::default()
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_readiness(mut self, include: bool) -> Self {
        self.include_readiness = Some(include);
        self
    }

    pub fn with_sidc(mut self, include: bool) -> Self {
        self.include_sidc = Some(include);
        self
    }
}

impl ChildrenRequest {
    pub fn new<I, S>(parent_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parent_ids: parent_ids.into_iter().map(Into::into).collect(),
            hierarchy: HierarchyType::default(),
        }
    }

    pub fn with_hierarchy(mut self, hierarchy: HierarchyType) -> Self {
        self.hierarchy = hierarchy;
        self
    }
}

//! Graph data model for the organization/network graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Current on-disk graph format version.
pub const GRAPH_VERSION: &str = "1.0.0";

/// Edge label used for VPC peering relationships.
pub const PEERING_LABEL: &str = "vpc-peering";

/// Edge label used for shared-VPC host → service project relationships.
pub const SHARED_VPC_LABEL: &str = "shared-vpc";

/// The finished graph for one organization: G = (V, E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub version: String,
    pub organization_id: String,
    pub generated_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// A vertex of the graph: one organization, folder, project or network resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within one graph.
    pub id: String,
    pub label: String,
    /// Depth in the hierarchical layout (organization = 0).
    pub level: u32,
    pub category: NodeCategory,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        level: u32,
        category: NodeCategory,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            level,
            category,
        }
    }
}

/// What kind of resource a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Organization,
    Folder,
    Project,
    /// A project referenced by a peering or shared-VPC link that the walk never reached.
    ExternalProject,
    Vpc,
    Subnet,
    Nat,
    /// The provider-managed network on the far side of a private-service-access peering.
    ManagedVpc,
}

impl NodeCategory {
    /// Display colour handed to the renderer.
    pub fn color(self) -> &'static str {
        match self {
            Self::Organization => "#4169E1",
            Self::Folder => "#FFA500",
            Self::Project | Self::ExternalProject => "#90EE90",
            Self::Vpc | Self::ManagedVpc => "#90d8ee",
            Self::Subnet => "#ee90b7",
            Self::Nat => "#e3d914",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Folder => "folder",
            Self::Project => "project",
            Self::ExternalProject => "external_project",
            Self::Vpc => "vpc",
            Self::Subnet => "subnet",
            Self::Nat => "nat",
            Self::ManagedVpc => "managed_vpc",
        }
    }
}

/// A directed edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
}

/// Rendering hints for relationship edges (peering, shared VPC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeStyle {
    pub dashed: bool,
    pub curve: CurveHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveHint {
    Straight,
    CurvedCw,
    CurvedCcw,
}

impl Edge {
    /// Plain containment edge (parent → child).
    pub fn contains(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
            style: None,
        }
    }

    /// Dashed, curved peering edge between two VPC nodes.
    pub fn peering(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: Some(PEERING_LABEL.to_string()),
            style: Some(EdgeStyle {
                dashed: true,
                curve: CurveHint::CurvedCcw,
            }),
        }
    }

    /// Dashed shared-VPC edge from the host project to a service project.
    pub fn shared_vpc(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            from: host.into(),
            to: service.into(),
            label: Some(SHARED_VPC_LABEL.to_string()),
            style: Some(EdgeStyle {
                dashed: true,
                curve: CurveHint::CurvedCw,
            }),
        }
    }

    pub fn is_peering(&self) -> bool {
        self.label.as_deref() == Some(PEERING_LABEL)
    }

    fn sort_key(&self) -> (&str, &str, &str) {
        (
            self.from.as_str(),
            self.to.as_str(),
            self.label.as_deref().unwrap_or(""),
        )
    }
}

impl Graph {
    /// Create a new empty graph for the given organization.
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            version: GRAPH_VERSION.to_string(),
            organization_id: organization_id.into(),
            generated_at: Utc::now(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// All edges touching `id` on either end.
    pub fn edges_for(&self, id: &str) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.from == id || e.to == id)
            .collect()
    }

    /// Edges whose source or target id has no node.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        let ids = self.node_ids();
        self.edges
            .iter()
            .filter(|e| !ids.contains(e.from.as_str()) || !ids.contains(e.to.as_str()))
            .collect()
    }

    /// Node ids that occur more than once. Always empty for graphs built by the accumulator.
    pub fn duplicate_node_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dups: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| !seen.insert(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        dups.sort();
        dups.dedup();
        dups
    }

    /// Node counts per category, in category order.
    pub fn category_counts(&self) -> BTreeMap<NodeCategory, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.category).or_insert(0) += 1;
        }
        counts
    }

    /// Put nodes and edges into a canonical order so that identical inputs serialize identically.
    pub fn canonicalize(&mut self) {
        self.nodes.sort_by(|a, b| a.id.cmp(&b.id));
        self.edges.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    }
}

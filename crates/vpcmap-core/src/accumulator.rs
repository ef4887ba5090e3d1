//! Run-scoped accumulator that owns the growing node and edge collections.

use crate::graph::{Edge, Graph, Node};
use std::collections::{HashMap, HashSet};

/// Node and edge additions decided by a classifier, applied in one step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphOps {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphOps {
    pub fn node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }
}

/// What [`GraphAccumulator::apply`] actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub nodes_added: usize,
    pub nodes_skipped: usize,
    pub edges_added: usize,
}

/// Monotonically growing node/edge log for one discovery run.
///
/// Node ids are unique: the first writer wins and later adds of the same id are dropped.
/// Edges are appended as given.
#[derive(Debug)]
pub struct GraphAccumulator {
    organization_id: String,
    nodes: Vec<Node>,
    node_index: HashMap<String, usize>,
    edges: Vec<Edge>,
}

impl GraphAccumulator {
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            nodes: Vec::new(),
            node_index: HashMap::new(),
            edges: Vec::new(),
        }
    }

    /// Insert `node` unless its id is already present. Returns whether it was inserted.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.node_index.contains_key(&node.id) {
            return false;
        }
        self.node_index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Apply classifier output: nodes first (deduplicated), then edges.
    pub fn apply(&mut self, ops: GraphOps) -> Applied {
        let mut applied = Applied::default();
        for node in ops.nodes {
            if self.add_node(node) {
                applied.nodes_added += 1;
            } else {
                applied.nodes_skipped += 1;
            }
        }
        applied.edges_added = ops.edges.len();
        self.edges.extend(ops.edges);
        applied
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    /// Read-only view for classifiers.
    pub fn snapshot(&self) -> GraphView<'_> {
        GraphView { acc: self }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Remove edges with an endpoint that never became a node and return them.
    pub fn prune_dangling(&mut self) -> Vec<Edge> {
        let index = &self.node_index;
        let (kept, dangling): (Vec<Edge>, Vec<Edge>) = std::mem::take(&mut self.edges)
            .into_iter()
            .partition(|e| index.contains_key(&e.from) && index.contains_key(&e.to));
        self.edges = kept;
        dangling
    }

    /// Hand off the finished graph in canonical order.
    pub fn finish(self) -> Graph {
        let mut graph = Graph::new(self.organization_id);
        graph.nodes = self.nodes;
        graph.edges = self.edges;
        graph.canonicalize();
        graph
    }
}

/// Borrowed, read-only view of the accumulator state.
#[derive(Debug, Clone, Copy)]
pub struct GraphView<'a> {
    acc: &'a GraphAccumulator,
}

impl<'a> GraphView<'a> {
    pub fn contains(&self, id: &str) -> bool {
        self.acc.contains(id)
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.acc.node_index.get(id).map(|&i| &self.acc.nodes[i])
    }

    pub fn node_ids(&self) -> HashSet<&'a str> {
        self.acc.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

//! JSON serialization and version handling for graph files.

use crate::graph::{GRAPH_VERSION, Graph};
use anyhow::{Context, Result};

/// Validate a graph's format version.
pub fn validate_version(graph: &Graph) -> Result<()> {
    if graph.version != GRAPH_VERSION {
        anyhow::bail!(
            "graph version mismatch: expected {}, found {}",
            GRAPH_VERSION,
            graph.version
        );
    }
    Ok(())
}

/// Serialize a graph to a pretty-printed JSON string.
pub fn to_json(graph: &Graph) -> Result<String> {
    serde_json::to_string_pretty(graph).context("failed to serialize graph to JSON")
}

/// Deserialize a graph from a JSON string.
pub fn from_json(json: &str) -> Result<Graph> {
    let graph: Graph = serde_json::from_str(json).context("failed to deserialize graph from JSON")?;
    validate_version(&graph)?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, NodeCategory};

    #[test]
    fn test_json_shape() {
        let mut graph = Graph::new("123");
        graph
            .nodes
            .push(Node::new("123", "Organization\n123", 0, NodeCategory::Organization));
        graph.edges.push(Edge::peering("a", "b"));
        let json = to_json(&graph).unwrap();
        assert!(json.contains("\"category\": \"organization\""));
        assert!(json.contains("\"label\": \"vpc-peering\""));
        assert!(json.contains("\"curve\": \"curved_ccw\""));
    }

    #[test]
    fn test_rejects_other_version() {
        let mut graph = Graph::new("123");
        graph.version = "0.1.0".to_string();
        let json = serde_json::to_string(&graph).unwrap();
        assert!(from_json(&json).is_err());
    }
}

use vpcmap_core::graph::{Edge, Graph, Node, NodeCategory};
use vpcmap_export::{ExportFormat, export, export_dot, export_mermaid};

fn sample() -> Graph {
    let mut graph = Graph::new("100");
    graph.nodes = vec![
        Node::new("100", "Organization\n100", 0, NodeCategory::Organization),
        Node::new("p1", "p1\nWeb", 1, NodeCategory::Project),
        Node::new("p1_default", "default", 2, NodeCategory::Vpc),
        Node::new("partner", "partner\n(external)", 1, NodeCategory::ExternalProject),
        Node::new("partner_edge", "edge", 2, NodeCategory::Vpc),
    ];
    graph.edges = vec![
        Edge::contains("100", "p1"),
        Edge::contains("p1", "p1_default"),
        Edge::contains("partner", "partner_edge"),
        Edge::peering("p1_default", "partner_edge"),
    ];
    graph.canonicalize();
    graph
}

#[test]
fn test_dot_nodes_ranks_and_edges() {
    let dot = export_dot(&sample());
    assert!(dot.starts_with("digraph \"organization_100\" {"));
    assert!(dot.contains("\"100\" [shape=house, style=filled, fillcolor=\"#4169E1\", label=\"Organization\\n100\"];"));
    assert!(dot.contains("{ rank=same; \"p1\"; \"partner\" } // level 1"));
    assert!(dot.contains("\"100\" -> \"p1\";"));
    assert!(dot.contains(
        "\"p1_default\" -> \"partner_edge\" [style=dashed, constraint=false, label=\"vpc-peering\"];"
    ));
    assert!(dot.contains("style=\"filled,dashed\""));
    assert!(dot.trim_end().ends_with('}'));
}

#[test]
fn test_mermaid_classes_and_arrows() {
    let mmd = export_mermaid(&sample());
    assert!(mmd.starts_with("flowchart TB"));
    assert!(mmd.contains("classDef vpc fill:#90d8ee,stroke:#333;"));
    assert!(mmd.contains("n1[\"p1<br/>Web\"]:::project"));
    assert!(mmd.contains("n2 -.->|vpc-peering| n4"));
    assert!(mmd.contains("n0 --> n1"));
}

#[test]
fn test_mermaid_keeps_lookalike_ids_apart() {
    let mut graph = Graph::new("100");
    graph.nodes = vec![
        Node::new("p", "p", 1, NodeCategory::Project),
        Node::new("p_a-b", "a-b", 2, NodeCategory::Vpc),
        Node::new("p_a_b", "a_b", 2, NodeCategory::Vpc),
    ];
    graph.edges = vec![Edge::contains("p", "p_a-b"), Edge::contains("p", "p_a_b")];
    graph.canonicalize();

    let mmd = export_mermaid(&graph);
    assert!(mmd.contains("n1[\"a-b\"]:::vpc"));
    assert!(mmd.contains("n2[\"a_b\"]:::vpc"));
    assert!(mmd.contains("n0 --> n1"));
    assert!(mmd.contains("n0 --> n2"));
}

#[test]
fn test_export_dispatch() {
    let graph = sample();
    assert_eq!(export(&graph, ExportFormat::Dot), export_dot(&graph));
    assert_eq!(export(&graph, ExportFormat::Mermaid), export_mermaid(&graph));
}

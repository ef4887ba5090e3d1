use vpcmap_core::accumulator::{GraphAccumulator, GraphOps};
use vpcmap_core::graph::*;
use vpcmap_core::keys::VpcKey;

fn org_with_projects(projects: &[&str]) -> GraphAccumulator {
    let mut acc = GraphAccumulator::new("100");
    acc.add_node(Node::new("100", "Organization\n100", 0, NodeCategory::Organization));
    for p in projects {
        acc.add_node(Node::new(*p, *p, 1, NodeCategory::Project));
        acc.add_edge(Edge::contains("100", *p));
    }
    acc
}

#[test]
fn test_single_project_graph() {
    let graph = org_with_projects(&["p1"]).finish();
    let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["100", "p1"]);
    assert_eq!(graph.edges, vec![Edge::contains("100", "p1")]);
    assert_eq!(graph.organization_id, "100");
}

#[test]
fn test_node_ids_unique_after_repeated_adds() {
    let mut acc = org_with_projects(&["p1", "p2"]);
    for _ in 0..3 {
        acc.apply(
            GraphOps::default()
                .node(Node::new("p2", "p2 again", 2, NodeCategory::ExternalProject))
                .node(Node::new(
                    VpcKey::new("p2", "shared").to_string(),
                    "shared",
                    3,
                    NodeCategory::Vpc,
                )),
        );
    }
    let graph = acc.finish();
    assert!(graph.duplicate_node_ids().is_empty());
    assert_eq!(graph.nodes.len(), 4);
    // First writer's node survives
    assert_eq!(graph.node("p2").unwrap().category, NodeCategory::Project);
}

#[test]
fn test_edges_for_node() {
    let mut acc = org_with_projects(&["p1", "p2"]);
    acc.add_edge(Edge::shared_vpc("p1", "p2"));
    let graph = acc.finish();
    assert_eq!(graph.edges_for("p2").len(), 2);
    assert_eq!(graph.edges_for("100").len(), 2);
}

#[test]
fn test_category_counts() {
    let graph = org_with_projects(&["a", "b", "c"]).finish();
    let counts = graph.category_counts();
    assert_eq!(counts[&NodeCategory::Organization], 1);
    assert_eq!(counts[&NodeCategory::Project], 3);
    assert!(!counts.contains_key(&NodeCategory::Vpc));
}

#[test]
fn test_dangling_edges_detected_on_plain_graph() {
    let mut graph = Graph::new("1");
    graph.nodes.push(Node::new("1", "org", 0, NodeCategory::Organization));
    graph.edges.push(Edge::contains("1", "ghost"));
    assert_eq!(graph.dangling_edges().len(), 1);
}

#[test]
fn test_finish_is_order_independent() {
    let mut a = GraphAccumulator::new("o");
    a.add_node(Node::new("x", "x", 1, NodeCategory::Folder));
    a.add_node(Node::new("y", "y", 1, NodeCategory::Folder));
    a.add_edge(Edge::contains("o", "y"));
    a.add_edge(Edge::contains("o", "x"));

    let mut b = GraphAccumulator::new("o");
    b.add_node(Node::new("y", "y", 1, NodeCategory::Folder));
    b.add_node(Node::new("x", "x", 1, NodeCategory::Folder));
    b.add_edge(Edge::contains("o", "x"));
    b.add_edge(Edge::contains("o", "y"));

    let (a, b) = (a.finish(), b.finish());
    assert_eq!(a.nodes, b.nodes);
    assert_eq!(a.edges, b.edges);
}

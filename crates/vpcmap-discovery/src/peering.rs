//! Peering classification: decides which nodes and edges one peering record contributes.
//!
//! Classification is a pure function of the peering, the owning VPC and a read-only view of
//! the accumulator. The caller applies the returned [`GraphOps`] while still holding the
//! lock the view was taken under, so two classifications of the same external project can
//! never both decide to create it.

use crate::api::{AllocatedRange, PeeringRecord};
use std::collections::HashSet;
use vpcmap_core::accumulator::{GraphOps, GraphView};
use vpcmap_core::graph::{Edge, Node, NodeCategory};
use vpcmap_core::keys::VpcKey;
use vpcmap_core::resource::{NetworkRef, ResourceNameError};

/// Where a peering sits: its owner and what the walk knows about the organization.
#[derive(Debug, Clone, Copy)]
pub struct PeeringContext<'a> {
    pub owner_project: &'a str,
    pub owner_vpc: &'a str,
    /// Level of the owner's project node.
    pub project_level: u32,
    /// Every active project enumerated under the organization.
    pub org_projects: &'a HashSet<String>,
    /// Private-service-access ranges of the owner VPC, shown on a managed peer.
    pub psa_ranges: &'a [AllocatedRange],
}

/// How a peering was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeeringKind {
    ServiceNetworking,
    SameProject,
    InOrganization,
    External,
}

/// Classify one peering against the current graph state.
///
/// Node ops for ids already present in `view` are never produced.
pub fn classify(
    peering: &PeeringRecord,
    ctx: &PeeringContext<'_>,
    view: GraphView<'_>,
) -> Result<(PeeringKind, GraphOps), ResourceNameError> {
    let peer: NetworkRef = peering.peered_network_ref.parse()?;
    let owner = VpcKey::new(ctx.owner_project, ctx.owner_vpc);
    let vpc_level = ctx.project_level + 1;

    if peer.is_service_networking() {
        let managed = owner.managed_peer();
        let managed_id = managed.to_string();
        let mut ops = GraphOps::default();
        if !view.contains(&managed_id) {
            ops = ops.node(Node::new(
                &managed_id,
                managed_peer_label(&managed.label(), ctx.psa_ranges),
                vpc_level + 1,
                NodeCategory::ManagedVpc,
            ));
        }
        return Ok((
            PeeringKind::ServiceNetworking,
            ops.edge(Edge::peering(owner.to_string(), managed_id)),
        ));
    }

    let target = VpcKey::new(&peer.project_id, &peer.network);
    let edge = Edge::peering(owner.to_string(), target.to_string());

    if peer.project_id == ctx.owner_project {
        return Ok((PeeringKind::SameProject, GraphOps::default().edge(edge)));
    }

    if ctx.org_projects.contains(&peer.project_id) {
        return Ok((PeeringKind::InOrganization, GraphOps::default().edge(edge)));
    }

    let target_id = target.to_string();
    let mut ops = GraphOps::default();
    if !view.contains(&peer.project_id) {
        ops = ops.node(Node::new(
            &peer.project_id,
            format!("{}\n(external)", peer.project_id),
            ctx.project_level,
            NodeCategory::ExternalProject,
        ));
    }
    if !view.contains(&target_id) {
        ops = ops
            .node(Node::new(&target_id, &peer.network, vpc_level, NodeCategory::Vpc))
            .edge(Edge::contains(&peer.project_id, &target_id));
    }
    Ok((PeeringKind::External, ops.edge(edge)))
}

fn managed_peer_label(base: &str, ranges: &[AllocatedRange]) -> String {
    let mut label = base.to_string();
    for range in ranges {
        label.push_str(&format!("\n{}: {}", range.name, range.cidr()));
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use vpcmap_core::accumulator::GraphAccumulator;

    fn peering(target: &str) -> PeeringRecord {
        PeeringRecord {
            source_network: "vpc-a".into(),
            peered_network_ref: target.into(),
            state: "ACTIVE".into(),
            auto_create_routes: true,
        }
    }

    fn seeded() -> GraphAccumulator {
        let mut acc = GraphAccumulator::new("100");
        acc.add_node(Node::new("p1", "p1", 1, NodeCategory::Project));
        acc.add_node(Node::new("p1_vpc-a", "vpc-a", 2, NodeCategory::Vpc));
        acc
    }

    fn ctx<'a>(org: &'a HashSet<String>, ranges: &'a [AllocatedRange]) -> PeeringContext<'a> {
        PeeringContext {
            owner_project: "p1",
            owner_vpc: "vpc-a",
            project_level: 1,
            org_projects: org,
            psa_ranges: ranges,
        }
    }

    #[test]
    fn test_service_networking_creates_managed_peer() {
        let acc = seeded();
        let org = HashSet::from(["p1".to_string()]);
        let ranges = vec![AllocatedRange {
            name: "google-managed".into(),
            address: "10.10.0.0".into(),
            prefix_length: 16,
        }];
        let (kind, ops) = classify(
            &peering("projects/abc123-tp/global/networks/servicenetworking"),
            &ctx(&org, &ranges),
            acc.snapshot(),
        )
        .unwrap();
        assert_eq!(kind, PeeringKind::ServiceNetworking);
        assert_eq!(ops.nodes.len(), 1);
        assert_eq!(ops.nodes[0].id, "gcp-managed-vpc-p1_vpc-a");
        assert!(ops.nodes[0].label.starts_with("gcp-managed-vpc-vpc-a"));
        assert!(ops.nodes[0].label.contains("google-managed: 10.10.0.0/16"));
        assert_eq!(ops.edges.len(), 1);
        assert_eq!(ops.edges[0].from, "p1_vpc-a");
        assert_eq!(ops.edges[0].to, "gcp-managed-vpc-p1_vpc-a");
        assert!(ops.edges[0].style.unwrap().dashed);
    }

    #[test]
    fn test_same_project_is_edge_only() {
        let acc = seeded();
        let org = HashSet::from(["p1".to_string()]);
        let (kind, ops) = classify(
            &peering("https://www.googleapis.com/compute/v1/projects/p1/global/networks/vpc-b"),
            &ctx(&org, &[]),
            acc.snapshot(),
        )
        .unwrap();
        assert_eq!(kind, PeeringKind::SameProject);
        assert!(ops.nodes.is_empty());
        assert_eq!(ops.edges, vec![Edge::peering("p1_vpc-a", "p1_vpc-b")]);
    }

    #[test]
    fn test_in_organization_project_is_edge_only() {
        let acc = seeded();
        let org = HashSet::from(["p1".to_string(), "p2".to_string()]);
        let (kind, ops) = classify(
            &peering("projects/p2/global/networks/shared"),
            &ctx(&org, &[]),
            acc.snapshot(),
        )
        .unwrap();
        assert_eq!(kind, PeeringKind::InOrganization);
        assert!(ops.nodes.is_empty());
        assert_eq!(ops.edges, vec![Edge::peering("p1_vpc-a", "p2_shared")]);
    }

    #[test]
    fn test_external_project_gets_project_and_vpc_nodes() {
        let acc = seeded();
        let org = HashSet::from(["p1".to_string()]);
        let (kind, ops) = classify(
            &peering("projects/partner/global/networks/edge"),
            &ctx(&org, &[]),
            acc.snapshot(),
        )
        .unwrap();
        assert_eq!(kind, PeeringKind::External);
        let ids: Vec<&str> = ops.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["partner", "partner_edge"]);
        assert_eq!(ops.nodes[0].category, NodeCategory::ExternalProject);
        assert_eq!(ops.edges.len(), 2);
        assert_eq!(ops.edges[0], Edge::contains("partner", "partner_edge"));
        assert!(ops.edges[1].is_peering());
    }

    #[test]
    fn test_classifying_twice_adds_nodes_once() {
        let mut acc = seeded();
        let org = HashSet::from(["p1".to_string()]);
        let record = peering("projects/partner/global/networks/edge");

        let (_, first) = classify(&record, &ctx(&org, &[]), acc.snapshot()).unwrap();
        acc.apply(first);
        let (_, second) = classify(&record, &ctx(&org, &[]), acc.snapshot()).unwrap();
        assert!(second.nodes.is_empty());
        assert_eq!(second.edges.len(), 1);
        acc.apply(second);

        let graph = acc.finish();
        assert_eq!(
            graph.nodes.iter().filter(|n| n.id == "partner").count(),
            1
        );
        assert_eq!(
            graph.nodes.iter().filter(|n| n.id == "partner_edge").count(),
            1
        );
    }

    #[test]
    fn test_known_external_project_adds_missing_vpc() {
        let mut acc = seeded();
        acc.add_node(Node::new(
            "partner",
            "partner",
            1,
            NodeCategory::ExternalProject,
        ));
        let org = HashSet::from(["p1".to_string()]);
        let (_, ops) = classify(
            &peering("projects/partner/global/networks/other"),
            &ctx(&org, &[]),
            acc.snapshot(),
        )
        .unwrap();
        let ids: Vec<&str> = ops.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["partner_other"]);
        assert_eq!(ops.edges.len(), 2);
    }

    #[test]
    fn test_malformed_reference_is_an_error() {
        let acc = seeded();
        let org = HashSet::new();
        let err = classify(&peering("networks/oops"), &ctx(&org, &[]), acc.snapshot());
        assert!(matches!(err, Err(ResourceNameError::Malformed { .. })));
    }
}

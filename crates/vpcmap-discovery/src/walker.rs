//! Organization hierarchy walk.
//!
//! A run has two phases. The walk visits organization → folders → projects with bounded
//! sibling concurrency, emitting hierarchy and per-project network nodes as it goes and
//! collecting peerings and shared-VPC links. Once the hierarchy is complete the set of
//! organization projects is known, and peerings are classified one at a time under the
//! accumulator lock. Shared-VPC edges and dangling-edge pruning happen last.

use crate::api::{CloudApi, CloudError, Folder, OrgResource, PeeringRecord, Project};
use crate::control::RunControl;
use crate::error::{Diagnostic, DiagnosticKind, DiscoveryError};
use crate::peering::{self, PeeringContext};
use crate::topology::{NetworkTopologyResolver, ProjectTopology, ResolveError, ResolveOptions};
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::Mutex;
use vpcmap_core::accumulator::GraphAccumulator;
use vpcmap_core::config::DiscoveryConfig;
use vpcmap_core::graph::{Edge, Graph, Node, NodeCategory};
use vpcmap_core::keys::{NatKey, VpcKey};
use vpcmap_core::resource::ParentRef;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of a discovery run that reached the organization.
#[derive(Debug)]
pub struct Discovery {
    pub graph: Graph,
    pub diagnostics: Vec<Diagnostic>,
    /// Resources (`folders/…`, `projects/…`) whose subtree was cut short by cancellation.
    pub incomplete: Vec<String>,
}

impl Discovery {
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }
}

/// A peering waiting for the hierarchy to be complete.
#[derive(Debug, Clone)]
struct PendingPeering {
    owner_project: String,
    project_level: u32,
    peering: PeeringRecord,
    psa_ranges: Vec<crate::api::AllocatedRange>,
}

impl PendingPeering {
    fn sort_key(&self) -> (&str, &str, &str) {
        (
            &self.owner_project,
            &self.peering.source_network,
            &self.peering.peered_network_ref,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct SharedLink {
    host: String,
    service: String,
    level: u32,
}

/// What a subtree contributed besides graph nodes.
#[derive(Debug, Default)]
struct Branch {
    projects: Vec<String>,
    peerings: Vec<PendingPeering>,
    shared_links: Vec<SharedLink>,
    diagnostics: Vec<Diagnostic>,
    incomplete: Vec<String>,
}

impl Branch {
    fn absorb(&mut self, other: Branch) {
        self.projects.extend(other.projects);
        self.peerings.extend(other.peerings);
        self.shared_links.extend(other.shared_links);
        self.diagnostics.extend(other.diagnostics);
        self.incomplete.extend(other.incomplete);
    }

    fn cancelled(&mut self, subject: String) {
        self.diagnostics.push(Diagnostic::new(
            DiagnosticKind::Cancelled,
            &subject,
            "run cancelled before this subtree finished",
        ));
        self.incomplete.push(subject);
    }
}

/// Children of one parent; a failed listing leaves its list empty and is recorded.
#[derive(Debug, Default)]
struct Children {
    folders: Vec<Folder>,
    projects: Vec<Project>,
    failures: Vec<(&'static str, CloudError)>,
}

/// Shared-VPC host state of one visited project after its topology resolution.
#[derive(Debug)]
enum HostLookup {
    Resolved(Option<String>),
    /// Topology resolution failed; the host is queried in the shared-VPC pass.
    Pending,
    Skipped,
}

struct ProjectVisit {
    project_id: String,
    level: u32,
    host: HostLookup,
    branch: Branch,
}

/// State shared by every task of one run.
struct Run {
    acc: Mutex<GraphAccumulator>,
    control: RunControl,
}

/// Drives one discovery run against a [`CloudApi`].
pub struct ResourceTreeWalker<C> {
    api: C,
    config: DiscoveryConfig,
    control: Option<RunControl>,
}

impl<C: CloudApi> ResourceTreeWalker<C> {
    pub fn new(api: C, config: DiscoveryConfig) -> Self {
        Self {
            api,
            config,
            control: None,
        }
    }

    /// Use an externally cancellable control. `timeout_secs` still applies on top.
    #[must_use]
    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = Some(control);
        self
    }

    fn concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    fn resolver<'a>(&'a self, run: &'a Run) -> NetworkTopologyResolver<'a> {
        NetworkTopologyResolver::new(&self.api, &run.control, ResolveOptions::from(&self.config))
    }

    /// Discover the organization `org_id` and return its graph.
    ///
    /// Fails only when the organization itself, or a listing directly under it, is not found
    /// or denied. Everything else ends up in [`Discovery::diagnostics`].
    pub async fn discover(&self, org_id: &str) -> Result<Discovery, DiscoveryError> {
        let control = self.run_control();

        tracing::info!("discovering organization {}", org_id);
        let organization = match control.run(self.api.get_organization(org_id)).await {
            Some(Ok(org)) => org,
            Some(Err(source)) => {
                return Err(DiscoveryError::Organization {
                    org_id: org_id.to_string(),
                    source,
                });
            }
            None => {
                return Err(DiscoveryError::Cancelled {
                    org_id: org_id.to_string(),
                });
            }
        };

        let mut acc = GraphAccumulator::new(org_id);
        acc.add_node(OrgResource::Organization(organization).to_node(0));
        let run = Run {
            acc: Mutex::new(acc),
            control,
        };

        let root = ParentRef::organization(org_id);
        let mut branch = Branch::default();
        match self.list_children(&run, &root).await {
            Some(mut children) => {
                if let Some(pos) = children.failures.iter().position(|(_, e)| {
                    matches!(
                        e,
                        CloudError::NotFound { .. } | CloudError::PermissionDenied { .. }
                    )
                }) {
                    let (_, source) = children.failures.swap_remove(pos);
                    return Err(DiscoveryError::Organization {
                        org_id: org_id.to_string(),
                        source,
                    });
                }
                branch.absorb(self.descend(&run, &root, 0, 0, children).await);
            }
            None => branch.cancelled(root.to_string()),
        }

        Ok(self.finalize(run, branch).await)
    }

    /// Resolve a single project's network topology without walking an organization.
    ///
    /// The project is the root node (level 0) and the graph's `organization_id` holds the
    /// project id. Peerings to any other project are treated as external.
    pub async fn discover_project(&self, project_id: &str) -> Discovery {
        tracing::info!("discovering project {}", project_id);
        let mut acc = GraphAccumulator::new(project_id);
        acc.add_node(Node::new(project_id, project_id, 0, NodeCategory::Project));
        let run = Run {
            acc: Mutex::new(acc),
            control: self.run_control(),
        };

        let visit = self.resolve_project(&run, project_id.to_string(), 0).await;
        let mut branch = Branch::default();
        branch.shared_links = self
            .shared_vpc_pass(&run, std::slice::from_ref(&visit))
            .await;
        branch.absorb(visit.branch);
        self.finalize(run, branch).await
    }

    fn run_control(&self) -> RunControl {
        let control = self.control.clone().unwrap_or_else(RunControl::unbounded);
        match self.config.timeout_secs {
            Some(secs) => control.with_timeout(Duration::from_secs(secs)),
            None => control,
        }
    }

    /// Folders and projects directly under `parent`, listed independently so that one
    /// failed listing keeps the other. `None` when the run was cancelled.
    async fn list_children(&self, run: &Run, parent: &ParentRef) -> Option<Children> {
        let mut children = Children::default();
        match run.control.run(self.api.list_folders(parent)).await? {
            Ok(folders) => children.folders = folders,
            Err(e) => children.failures.push(("folder", e)),
        }
        match run.control.run(self.api.list_projects(parent)).await? {
            Ok(projects) => children.projects = projects,
            Err(e) => children.failures.push(("project", e)),
        }
        Some(children)
    }

    fn walk<'a>(
        &'a self,
        run: &'a Run,
        parent: ParentRef,
        level: u32,
        depth: usize,
    ) -> BoxFuture<'a, Branch> {
        Box::pin(async move {
            let mut branch = Branch::default();
            match self.list_children(run, &parent).await {
                Some(children) => {
                    branch.absorb(self.descend(run, &parent, level, depth, children).await);
                }
                None => branch.cancelled(parent.to_string()),
            }
            branch
        })
    }

    /// Emit the children of `parent` (a node at `level`) and walk them.
    async fn descend(
        &self,
        run: &Run,
        parent: &ParentRef,
        level: u32,
        depth: usize,
        children: Children,
    ) -> Branch {
        let Children {
            folders,
            projects,
            failures,
        } = children;

        let mut failed = Branch::default();
        for (listing, err) in failures {
            tracing::warn!("{} listing under {} failed: {}", listing, parent, err);
            failed.diagnostics.push(Diagnostic::branch_failure(
                parent.to_string(),
                listing,
                &err,
            ));
        }

        {
            let mut acc = run.acc.lock().await;
            for folder in &folders {
                let resource = OrgResource::Folder(folder.clone());
                acc.add_node(resource.to_node(level + 1));
                acc.add_edge(Edge::contains(parent.id(), &folder.id));
            }
        }

        let (mut branch, projects) = tokio::join!(
            self.walk_folders(run, folders, level, depth),
            self.visit_projects(run, parent, level, projects),
        );
        branch.absorb(projects);
        branch.absorb(failed);
        branch
    }

    async fn walk_folders(
        &self,
        run: &Run,
        folders: Vec<Folder>,
        level: u32,
        depth: usize,
    ) -> Branch {
        let mut branch = Branch::default();
        let mut nested = Vec::new();
        for folder in folders {
            if depth + 1 > self.config.max_depth {
                tracing::warn!(
                    "folder {} is deeper than max_depth {}; not descending",
                    folder.id,
                    self.config.max_depth
                );
                branch.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::BranchFailure,
                    ParentRef::folder(&folder.id).to_string(),
                    format!("depth bound {} exceeded", self.config.max_depth),
                ));
            } else {
                tracing::debug!("folder {} ({})", folder.id, folder.display_name);
                nested.push(ParentRef::folder(folder.id));
            }
        }

        let results: Vec<Branch> = stream::iter(nested)
            .map(|parent| self.walk(run, parent, level + 1, depth + 1))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;
        for result in results {
            branch.absorb(result);
        }
        branch
    }

    async fn visit_projects(
        &self,
        run: &Run,
        parent: &ParentRef,
        level: u32,
        projects: Vec<Project>,
    ) -> Branch {
        let active: Vec<Project> = projects
            .into_iter()
            .filter(|p| {
                if !p.is_active() {
                    tracing::debug!("skipping project {} in state {:?}", p.project_id, p.state);
                }
                p.is_active()
            })
            .collect();

        let visits: Vec<ProjectVisit> = stream::iter(active)
            .map(|project| self.visit_project(run, parent, level + 1, project))
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        let mut branch = Branch::default();
        branch.shared_links = self.shared_vpc_pass(run, &visits).await;
        for visit in visits {
            branch.absorb(visit.branch);
        }
        branch
    }

    async fn visit_project(
        &self,
        run: &Run,
        parent: &ParentRef,
        level: u32,
        project: Project,
    ) -> ProjectVisit {
        let project_id = project.project_id.clone();
        {
            let mut acc = run.acc.lock().await;
            acc.add_node(OrgResource::Project(project).to_node(level));
            acc.add_edge(Edge::contains(parent.id(), &project_id));
        }
        self.resolve_project(run, project_id, level).await
    }

    /// Resolve and emit the network topology of a project whose node is at `level`.
    async fn resolve_project(&self, run: &Run, project_id: String, level: u32) -> ProjectVisit {
        let mut branch = Branch {
            projects: vec![project_id.clone()],
            ..Branch::default()
        };

        let host = match self.resolver(run).resolve(&project_id).await {
            Ok(topology) => {
                tracing::info!(
                    "project {}: {} VPCs, {} peerings",
                    project_id,
                    topology.vpcs.len(),
                    topology.peerings.len()
                );
                emit_topology(&mut *run.acc.lock().await, &topology, level);
                if let Some(err) = &topology.nat_error {
                    branch.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::FeatureUnavailable,
                        &project_id,
                        format!("Cloud NAT not listed: {err}"),
                    ));
                }
                for peering in &topology.peerings {
                    branch.peerings.push(PendingPeering {
                        owner_project: project_id.clone(),
                        project_level: level,
                        peering: peering.clone(),
                        psa_ranges: topology
                            .psa_ranges
                            .get(&peering.source_network)
                            .cloned()
                            .unwrap_or_default(),
                    });
                }
                if self.config.include_shared_vpc {
                    HostLookup::Resolved(topology.shared_host)
                } else {
                    HostLookup::Skipped
                }
            }
            Err(ResolveError::Cloud(err)) => {
                tracing::warn!("network topology unavailable for {}: {}", project_id, err);
                branch
                    .diagnostics
                    .push(Diagnostic::feature_unavailable(&project_id, &err));
                if self.config.include_shared_vpc {
                    HostLookup::Pending
                } else {
                    HostLookup::Skipped
                }
            }
            Err(ResolveError::Cancelled) => {
                branch.cancelled(format!("projects/{project_id}"));
                HostLookup::Skipped
            }
        };

        ProjectVisit {
            project_id,
            level,
            host,
            branch,
        }
    }

    /// Shared-VPC host links for the projects of one level.
    async fn shared_vpc_pass(&self, run: &Run, visits: &[ProjectVisit]) -> Vec<SharedLink> {
        let resolver = self.resolver(run);
        let resolver = &resolver;
        let links: BoxFuture<'_, Vec<Option<SharedLink>>> = Box::pin(
            stream::iter(visits)
                .map(|visit| async move {
                    let host = match &visit.host {
                        HostLookup::Resolved(host) => host.clone(),
                        HostLookup::Pending => {
                            match resolver.shared_host(&visit.project_id).await {
                                Ok(host) => host,
                                Err(e) => {
                                    tracing::debug!(
                                        "no shared VPC host for {}: {}",
                                        visit.project_id,
                                        e
                                    );
                                    None
                                }
                            }
                        }
                        HostLookup::Skipped => None,
                    };
                    host.map(|host| SharedLink {
                        host,
                        service: visit.project_id.clone(),
                        level: visit.level,
                    })
                })
                .buffer_unordered(self.concurrency())
                .collect(),
        );
        let links = links.await;
        links.into_iter().flatten().collect()
    }

    async fn finalize(&self, run: Run, mut branch: Branch) -> Discovery {
        let org_projects: HashSet<String> = branch.projects.iter().cloned().collect();
        let mut diagnostics = std::mem::take(&mut branch.diagnostics);

        branch
            .peerings
            .sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        for pending in &branch.peerings {
            let ctx = PeeringContext {
                owner_project: &pending.owner_project,
                owner_vpc: &pending.peering.source_network,
                project_level: pending.project_level,
                org_projects: &org_projects,
                psa_ranges: &pending.psa_ranges,
            };
            let mut acc = run.acc.lock().await;
            let classified = peering::classify(&pending.peering, &ctx, acc.snapshot());
            match classified {
                Ok((kind, ops)) => {
                    let applied = acc.apply(ops);
                    tracing::debug!(
                        "peering {} -> {} classified as {:?}: {} nodes added, {} already present, {} edges",
                        VpcKey::new(&pending.owner_project, &pending.peering.source_network),
                        pending.peering.peered_network_ref,
                        kind,
                        applied.nodes_added,
                        applied.nodes_skipped,
                        applied.edges_added
                    );
                }
                Err(e) => {
                    tracing::warn!("skipping peering of {}: {}", pending.owner_project, e);
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::MalformedReference,
                        VpcKey::new(&pending.owner_project, &pending.peering.source_network)
                            .to_string(),
                        e.to_string(),
                    ));
                }
            }
        }

        let mut acc = run.acc.into_inner();

        branch.shared_links.sort();
        branch.shared_links.dedup();
        for link in branch.shared_links {
            if !acc.contains(&link.host) {
                acc.add_node(Node::new(
                    &link.host,
                    format!("{}\n(shared VPC host)", link.host),
                    link.level,
                    NodeCategory::ExternalProject,
                ));
            }
            acc.add_edge(Edge::shared_vpc(&link.host, &link.service));
        }

        for edge in acc.prune_dangling() {
            tracing::debug!("dropping dangling edge {} -> {}", edge.from, edge.to);
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DanglingEdge,
                format!("{} -> {}", edge.from, edge.to),
                "edge endpoint never became a node",
            ));
        }

        diagnostics.sort_by(|a, b| (&a.subject, &a.message).cmp(&(&b.subject, &b.message)));
        let mut incomplete = branch.incomplete;
        incomplete.sort();

        let graph = acc.finish();
        tracing::info!(
            "organization {}: {} nodes, {} edges, {} diagnostics",
            graph.organization_id,
            graph.nodes.len(),
            graph.edges.len(),
            diagnostics.len()
        );
        Discovery {
            graph,
            diagnostics,
            incomplete,
        }
    }
}

/// VPC, subnet and NAT nodes of one resolved project at `project_level`.
fn emit_topology(acc: &mut GraphAccumulator, topology: &ProjectTopology, project_level: u32) {
    let project_id = &topology.project_id;
    for vpc in &topology.vpcs {
        let key = VpcKey::new(project_id, &vpc.name);
        let vpc_id = key.to_string();
        acc.add_node(Node::new(
            &vpc_id,
            &vpc.name,
            project_level + 1,
            NodeCategory::Vpc,
        ));
        acc.add_edge(Edge::contains(project_id, &vpc_id));

        for subnet in &vpc.subnets {
            let subnet_id = key.subnet(&subnet.name, &subnet.region).to_string();
            acc.add_node(Node::new(
                &subnet_id,
                subnet.label(),
                project_level + 2,
                NodeCategory::Subnet,
            ));
            acc.add_edge(Edge::contains(&vpc_id, subnet_id));
        }
    }

    for nat in topology.nat_by_router.values().flatten() {
        let nat_id = NatKey {
            project_id: project_id.clone(),
            region: nat.region.clone(),
            router: nat.router_name.clone(),
            nat: nat.nat_name.clone(),
        }
        .to_string();
        acc.add_node(Node::new(
            &nat_id,
            format!(
                "NAT : {}\nRouter : {}\nRegion : {}\nVPC : {}",
                nat.nat_name, nat.router_name, nat.region, nat.vpc_network_name
            ),
            project_level + 3,
            NodeCategory::Nat,
        ));
        acc.add_edge(Edge::contains(
            VpcKey::new(&nat.vpc_project_id, &nat.vpc_network_name).to_string(),
            nat_id,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{NatConfig, Subnet, VpcNetwork};
    use std::collections::BTreeMap;

    #[test]
    fn test_emit_topology_levels_and_ids() {
        let mut acc = GraphAccumulator::new("100");
        let topology = ProjectTopology {
            project_id: "p1".into(),
            vpcs: vec![VpcNetwork {
                project_id: "p1".into(),
                name: "default".into(),
                subnets: vec![Subnet {
                    name: "s1".into(),
                    region: "us-central1".into(),
                    cidr: "10.0.0.0/24".into(),
                    private_google_access: false,
                    secondary_ranges: vec![],
                }],
            }],
            nat_by_router: BTreeMap::from([(
                "r1".to_string(),
                vec![NatConfig {
                    router_name: "r1".into(),
                    nat_name: "nat-a".into(),
                    region: "us-central1".into(),
                    vpc_project_id: "p1".into(),
                    vpc_network_name: "default".into(),
                }],
            )]),
            ..ProjectTopology::default()
        };
        emit_topology(&mut acc, &topology, 1);

        let view = acc.snapshot();
        assert_eq!(view.node("p1_default").unwrap().level, 2);
        assert_eq!(view.node("p1_default_s1_us-central1").unwrap().level, 3);
        let nat = view.node("p1_us-central1_r1_nat-a").unwrap();
        assert_eq!(nat.level, 4);
        assert_eq!(nat.category, NodeCategory::Nat);
        assert_eq!(acc.edge_count(), 3);
    }

    #[test]
    fn test_nat_on_host_network_hangs_off_host_vpc() {
        let mut acc = GraphAccumulator::new("100");
        let topology = ProjectTopology {
            project_id: "svc".into(),
            nat_by_router: BTreeMap::from([(
                "r1".to_string(),
                vec![NatConfig {
                    router_name: "r1".into(),
                    nat_name: "nat-a".into(),
                    region: "europe-west1".into(),
                    vpc_project_id: "host".into(),
                    vpc_network_name: "shared".into(),
                }],
            )]),
            ..ProjectTopology::default()
        };
        emit_topology(&mut acc, &topology, 1);

        let nat_id = "svc_europe-west1_r1_nat-a";
        assert!(
            acc.snapshot()
                .node(nat_id)
                .unwrap()
                .label
                .ends_with("\nVPC : shared")
        );
        let graph = acc.finish();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].from, "host_shared");
        assert_eq!(graph.edges[0].to, nat_id);
    }

    #[test]
    fn test_branch_cancelled_records_incomplete() {
        let mut branch = Branch::default();
        branch.cancelled("folders/9".into());
        assert_eq!(branch.incomplete, vec!["folders/9".to_string()]);
        assert_eq!(branch.diagnostics[0].kind, DiagnosticKind::Cancelled);
    }
}

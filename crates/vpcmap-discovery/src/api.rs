//! Cloud API abstraction consumed by the discovery pipeline.
//!
//! Implementations wrap the real resource-manager and compute clients (or a recorded
//! inventory, see [`crate::inventory`]). They return structured records or a typed
//! [`CloudError`]; pagination and credentials are the implementation's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vpcmap_core::graph::{Node, NodeCategory};
use vpcmap_core::resource::ParentRef;

/// Errors from cloud API calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CloudError {
    #[error("{resource} not found")]
    NotFound { resource: String },
    #[error("permission denied on {resource}")]
    PermissionDenied { resource: String },
    #[error("{api} API is not enabled for project {project}")]
    ApiDisabled { project: String, api: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl CloudError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn permission_denied(resource: impl Into<String>) -> Self {
        Self::PermissionDenied {
            resource: resource.into(),
        }
    }

    pub fn compute_disabled(project: impl Into<String>) -> Self {
        Self::ApiDisabled {
            project: project.into(),
            api: "compute.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub display_name: String,
    pub parent: ParentRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectState {
    Active,
    DeleteRequested,
    StateUnspecified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    #[serde(default)]
    pub display_name: String,
    pub parent: ParentRef,
    pub state: ProjectState,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.state == ProjectState::Active
    }
}

/// One level of the organization hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgResource {
    Organization(Organization),
    Folder(Folder),
    Project(Project),
}

impl OrgResource {
    /// The graph node for this resource at `level`.
    pub fn to_node(&self, level: u32) -> Node {
        match self {
            Self::Organization(org) => Node::new(
                &org.id,
                format!("Organization\n{}", org.id),
                level,
                NodeCategory::Organization,
            ),
            Self::Folder(folder) => Node::new(
                &folder.id,
                &folder.display_name,
                level,
                NodeCategory::Folder,
            ),
            Self::Project(project) => Node::new(
                &project.project_id,
                format!("{}\n{}", project.project_id, project.display_name),
                level,
                NodeCategory::Project,
            ),
        }
    }
}

/// A VPC network as listed by the compute API, with its peerings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub name: String,
    #[serde(default)]
    pub peerings: Vec<PeeringRecord>,
}

/// One peering of a VPC network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeeringRecord {
    /// Name of the VPC that owns this peering.
    #[serde(default)]
    pub source_network: String,
    /// Fully-qualified reference to the peered network.
    pub peered_network_ref: String,
    #[serde(default = "default_peering_state")]
    pub state: String,
    #[serde(default)]
    pub auto_create_routes: bool,
}

fn default_peering_state() -> String {
    "ACTIVE".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryRange {
    pub range_name: String,
    pub cidr: String,
}

/// A subnet as listed per region; `network` is the owning network's reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRecord {
    pub name: String,
    pub region: String,
    pub network: String,
    pub cidr: String,
    #[serde(default)]
    pub private_google_access: bool,
    #[serde(default)]
    pub secondary_ranges: Vec<SecondaryRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterNat {
    pub name: String,
}

/// A Cloud Router; `network` is the reference of the VPC it is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Router {
    pub name: String,
    pub region: String,
    pub network: String,
    #[serde(default)]
    pub nats: Vec<RouterNat>,
}

/// An address range reserved for private service access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedRange {
    pub name: String,
    pub address: String,
    pub prefix_length: u8,
}

impl AllocatedRange {
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.prefix_length)
    }
}

/// Collaborator interface over the resource-manager and compute APIs.
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn get_organization(&self, org_id: &str) -> Result<Organization, CloudError>;

    async fn list_folders(&self, parent: &ParentRef) -> Result<Vec<Folder>, CloudError>;

    /// All projects under `parent`, in any state. Callers filter to active ones.
    async fn list_projects(&self, parent: &ParentRef) -> Result<Vec<Project>, CloudError>;

    async fn list_networks(&self, project_id: &str) -> Result<Vec<NetworkRecord>, CloudError>;

    async fn list_regions(&self, project_id: &str) -> Result<Vec<String>, CloudError>;

    async fn list_subnets(
        &self,
        project_id: &str,
        region: &str,
    ) -> Result<Vec<SubnetRecord>, CloudError>;

    async fn list_routers(&self, project_id: &str, region: &str)
    -> Result<Vec<Router>, CloudError>;

    /// Host project of a shared-VPC service project; `NotFound` when there is none.
    async fn get_shared_vpc_host(&self, project_id: &str) -> Result<String, CloudError>;

    async fn list_psa_ranges(
        &self,
        project_id: &str,
        network: &str,
    ) -> Result<Vec<AllocatedRange>, CloudError>;
}

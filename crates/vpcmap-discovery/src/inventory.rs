//! `CloudApi` backed by a JSON inventory document.
//!
//! The inventory is a recorded snapshot of an organization: hierarchy, per-project network
//! listings, and a `failures` map that makes specific calls fail with a chosen error. Keys of
//! the failure map are resource references:
//!
//! - `organizations/{id}`, `folders/{id}`: folder and project listings under that parent
//! - `projects/{id}`: every compute call for that project
//! - `projects/{id}/networks`, `projects/{id}/routers`, `projects/{id}/xpn`,
//!   `projects/{id}/psa`: one call family only

use crate::api::{
    AllocatedRange, CloudApi, CloudError, Folder, NetworkRecord, Organization, Project, Router,
    SubnetRecord,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use vpcmap_core::resource::ParentRef;

/// Error kind injected for a resource reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    PermissionDenied,
    ApiDisabled,
    Transport,
}

/// On-disk inventory format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Inventory {
    pub organization: Option<Organization>,
    pub folders: Vec<Folder>,
    pub projects: Vec<Project>,
    /// Regions per project id.
    pub regions: BTreeMap<String, Vec<String>>,
    pub networks: BTreeMap<String, Vec<NetworkRecord>>,
    /// Subnets per project id, across all regions.
    pub subnets: BTreeMap<String, Vec<SubnetRecord>>,
    pub routers: BTreeMap<String, Vec<Router>>,
    /// Service project id → host project id.
    pub shared_vpc_hosts: BTreeMap<String, String>,
    /// Project id → VPC name → allocated ranges.
    pub psa_ranges: BTreeMap<String, BTreeMap<String, Vec<AllocatedRange>>>,
    pub failures: BTreeMap<String, FailureKind>,
    /// Artificial delay added to every call, in milliseconds.
    pub latency_ms: u64,
}

/// A `CloudApi` answering from an [`Inventory`].
#[derive(Debug, Clone)]
pub struct InventoryCloud {
    inventory: Inventory,
}

impl InventoryCloud {
    pub fn new(inventory: Inventory) -> Self {
        Self { inventory }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let inventory: Inventory = serde_json::from_str(json).context("invalid inventory JSON")?;
        Ok(Self::new(inventory))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read inventory {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in {}", path.display()))
    }

    async fn delay(&self) {
        if self.inventory.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.inventory.latency_ms)).await;
        }
    }

    /// Fail with the first injected failure among `keys`.
    fn check(&self, project: &str, keys: &[&str]) -> Result<(), CloudError> {
        for key in keys {
            if let Some(kind) = self.inventory.failures.get(*key) {
                return Err(match kind {
                    FailureKind::NotFound => CloudError::not_found(*key),
                    FailureKind::PermissionDenied => CloudError::permission_denied(*key),
                    FailureKind::ApiDisabled => CloudError::compute_disabled(project),
                    FailureKind::Transport => {
                        CloudError::Transport(format!("injected failure for {key}"))
                    }
                });
            }
        }
        Ok(())
    }

    fn check_compute(&self, project_id: &str, feature: Option<&str>) -> Result<(), CloudError> {
        let project_key = format!("projects/{project_id}");
        match feature {
            Some(feature) => {
                let feature_key = format!("{project_key}/{feature}");
                self.check(project_id, &[project_key.as_str(), feature_key.as_str()])
            }
            None => self.check(project_id, &[project_key.as_str()]),
        }
    }

    fn per_project<T: Clone>(map: &BTreeMap<String, Vec<T>>, project_id: &str) -> Vec<T> {
        map.get(project_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CloudApi for InventoryCloud {
    async fn get_organization(&self, org_id: &str) -> Result<Organization, CloudError> {
        self.delay().await;
        let key = format!("organizations/{org_id}");
        self.check(org_id, &[key.as_str()])?;
        match &self.inventory.organization {
            Some(org) if org.id == org_id => Ok(org.clone()),
            _ => Err(CloudError::not_found(key)),
        }
    }

    async fn list_folders(&self, parent: &ParentRef) -> Result<Vec<Folder>, CloudError> {
        self.delay().await;
        let key = parent.to_string();
        self.check(parent.id(), &[key.as_str()])?;
        Ok(self
            .inventory
            .folders
            .iter()
            .filter(|f| &f.parent == parent)
            .cloned()
            .collect())
    }

    async fn list_projects(&self, parent: &ParentRef) -> Result<Vec<Project>, CloudError> {
        self.delay().await;
        let key = parent.to_string();
        self.check(parent.id(), &[key.as_str()])?;
        Ok(self
            .inventory
            .projects
            .iter()
            .filter(|p| &p.parent == parent)
            .cloned()
            .collect())
    }

    async fn list_networks(&self, project_id: &str) -> Result<Vec<NetworkRecord>, CloudError> {
        self.delay().await;
        self.check_compute(project_id, Some("networks"))?;
        Ok(Self::per_project(&self.inventory.networks, project_id))
    }

    async fn list_regions(&self, project_id: &str) -> Result<Vec<String>, CloudError> {
        self.delay().await;
        self.check_compute(project_id, None)?;
        Ok(Self::per_project(&self.inventory.regions, project_id))
    }

    async fn list_subnets(
        &self,
        project_id: &str,
        region: &str,
    ) -> Result<Vec<SubnetRecord>, CloudError> {
        self.delay().await;
        self.check_compute(project_id, None)?;
        Ok(Self::per_project(&self.inventory.subnets, project_id)
            .into_iter()
            .filter(|s| s.region == region)
            .collect())
    }

    async fn list_routers(
        &self,
        project_id: &str,
        region: &str,
    ) -> Result<Vec<Router>, CloudError> {
        self.delay().await;
        self.check_compute(project_id, Some("routers"))?;
        Ok(Self::per_project(&self.inventory.routers, project_id)
            .into_iter()
            .filter(|r| r.region == region)
            .collect())
    }

    async fn get_shared_vpc_host(&self, project_id: &str) -> Result<String, CloudError> {
        self.delay().await;
        self.check_compute(project_id, Some("xpn"))?;
        self.inventory
            .shared_vpc_hosts
            .get(project_id)
            .cloned()
            .ok_or_else(|| CloudError::not_found(format!("projects/{project_id}/xpnHost")))
    }

    async fn list_psa_ranges(
        &self,
        project_id: &str,
        network: &str,
    ) -> Result<Vec<AllocatedRange>, CloudError> {
        self.delay().await;
        self.check_compute(project_id, Some("psa"))?;
        Ok(self
            .inventory
            .psa_ranges
            .get(project_id)
            .and_then(|by_vpc| by_vpc.get(network))
            .cloned()
            .unwrap_or_default())
    }
}

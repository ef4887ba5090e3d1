//! Per-project network topology resolution.
//!
//! Gathers VPCs with their subnets, peerings, Cloud NAT configs, private-service-access
//! ranges and the shared-VPC host for one project. Returns plain data; the walker decides
//! what becomes nodes and edges.

use crate::api::{
    AllocatedRange, CloudApi, CloudError, PeeringRecord, SecondaryRange, SubnetRecord,
};
use crate::control::RunControl;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, warn};
use vpcmap_core::config::DiscoveryConfig;
use vpcmap_core::resource::{NetworkRef, last_segment};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Cloud(#[from] CloudError),
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub name: String,
    pub region: String,
    pub cidr: String,
    pub private_google_access: bool,
    pub secondary_ranges: Vec<SecondaryRange>,
}

impl Subnet {
    /// Multi-line node label: name, CIDR, region, private Google access, secondary ranges.
    pub fn label(&self) -> String {
        let mut label = format!(
            "subnet : {}\nCIDR : {}\nRegion : {}\nPGA : {}",
            self.name,
            self.cidr,
            self.region,
            if self.private_google_access {
                "On"
            } else {
                "Off"
            }
        );
        if !self.secondary_ranges.is_empty() {
            label.push_str("\nSecondary ranges:");
            for range in &self.secondary_ranges {
                label.push_str(&format!("\n  {}: {}", range.range_name, range.cidr));
            }
        }
        label
    }
}

impl From<SubnetRecord> for Subnet {
    fn from(record: SubnetRecord) -> Self {
        Self {
            name: record.name,
            region: record.region,
            cidr: record.cidr,
            private_google_access: record.private_google_access,
            secondary_ranges: record.secondary_ranges,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VpcNetwork {
    pub project_id: String,
    pub name: String,
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatConfig {
    pub router_name: String,
    pub nat_name: String,
    pub region: String,
    /// Project owning the router's network; differs from the router's project on a
    /// shared-VPC service project.
    pub vpc_project_id: String,
    pub vpc_network_name: String,
}

/// Everything the walker needs to emit one project's network nodes.
#[derive(Debug, Clone, Default)]
pub struct ProjectTopology {
    pub project_id: String,
    pub vpcs: Vec<VpcNetwork>,
    pub peerings: Vec<PeeringRecord>,
    pub nat_by_router: BTreeMap<String, Vec<NatConfig>>,
    /// Set when routers could not be listed; the rest of the topology is still valid.
    pub nat_error: Option<CloudError>,
    pub shared_host: Option<String>,
    /// Private-service-access ranges keyed by VPC name.
    pub psa_ranges: BTreeMap<String, Vec<AllocatedRange>>,
}

/// Which parts of a project's topology to gather.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub region_fanout: usize,
    pub include_nat: bool,
    pub include_shared_vpc: bool,
    pub include_psa_ranges: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from(&DiscoveryConfig::default())
    }
}

impl From<&DiscoveryConfig> for ResolveOptions {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            region_fanout: config.region_fanout.max(1),
            include_nat: config.include_nat,
            include_shared_vpc: config.include_shared_vpc,
            include_psa_ranges: config.include_psa_ranges,
        }
    }
}

pub struct NetworkTopologyResolver<'a> {
    api: &'a dyn CloudApi,
    control: &'a RunControl,
    options: ResolveOptions,
}

impl<'a> NetworkTopologyResolver<'a> {
    pub fn new(api: &'a dyn CloudApi, control: &'a RunControl, options: ResolveOptions) -> Self {
        Self {
            api,
            control,
            options,
        }
    }

    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, CloudError>>,
    ) -> Result<T, ResolveError> {
        match self.control.run(fut).await {
            Some(result) => Ok(result?),
            None => Err(ResolveError::Cancelled),
        }
    }

    /// Resolve the network topology of `project_id`.
    ///
    /// Network and subnet listing failures (typically the compute API being disabled)
    /// fail the whole resolution. NAT, PSA range and shared-host failures only drop
    /// that part.
    pub async fn resolve(&self, project_id: &str) -> Result<ProjectTopology, ResolveError> {
        let regions = self.call(self.api.list_regions(project_id)).await?;
        let networks = self.call(self.api.list_networks(project_id)).await?;

        let subnets = self.list_subnets(project_id, &regions).await?;

        let mut topology = ProjectTopology {
            project_id: project_id.to_string(),
            ..ProjectTopology::default()
        };

        for network in &networks {
            let mut vpc_subnets: Vec<Subnet> = subnets
                .iter()
                .filter(|s| last_segment(&s.network) == Some(network.name.as_str()))
                .cloned()
                .map(Subnet::from)
                .collect();
            vpc_subnets.sort_by(|a, b| (&a.region, &a.name).cmp(&(&b.region, &b.name)));

            topology.vpcs.push(VpcNetwork {
                project_id: project_id.to_string(),
                name: network.name.clone(),
                subnets: vpc_subnets,
            });

            for peering in &network.peerings {
                let mut peering = peering.clone();
                if peering.source_network.is_empty() {
                    peering.source_network = network.name.clone();
                }
                topology.peerings.push(peering);
            }
        }

        if self.options.include_nat {
            match self.list_nat_configs(project_id, &regions).await {
                Ok(nats) => topology.nat_by_router = nats,
                Err(ResolveError::Cloud(err)) => {
                    warn!("NAT listing failed for {}: {}", project_id, err);
                    topology.nat_error = Some(err);
                }
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
            }
        }

        if self.options.include_psa_ranges {
            topology.psa_ranges = self.list_psa_ranges(project_id, &topology.peerings).await?;
        }

        if self.options.include_shared_vpc {
            topology.shared_host = match self.shared_host(project_id).await {
                Ok(host) => host,
                Err(ResolveError::Cloud(err)) => {
                    debug!("shared VPC host lookup failed for {}: {}", project_id, err);
                    None
                }
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
            };
        }

        Ok(topology)
    }

    /// Host project of `project_id`, or `None` when it is not a shared-VPC service project.
    pub async fn shared_host(&self, project_id: &str) -> Result<Option<String>, ResolveError> {
        match self.call(self.api.get_shared_vpc_host(project_id)).await {
            Ok(host) if host.is_empty() || host == project_id => Ok(None),
            Ok(host) => Ok(Some(host)),
            Err(ResolveError::Cloud(CloudError::NotFound { .. })) => {
                debug!("{} has no shared VPC host", project_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn list_subnets(
        &self,
        project_id: &str,
        regions: &[String],
    ) -> Result<Vec<SubnetRecord>, ResolveError> {
        let per_region: BoxFuture<'_, Vec<Result<Vec<SubnetRecord>, ResolveError>>> = Box::pin(
            stream::iter(regions)
                .map(|region| self.call(self.api.list_subnets(project_id, region)))
                .buffer_unordered(self.options.region_fanout)
                .collect(),
        );
        let per_region = per_region.await;

        let mut subnets = Vec::new();
        for result in per_region {
            subnets.extend(result?);
        }
        Ok(subnets)
    }

    async fn list_nat_configs(
        &self,
        project_id: &str,
        regions: &[String],
    ) -> Result<BTreeMap<String, Vec<NatConfig>>, ResolveError> {
        let per_region: BoxFuture<'_, Vec<Result<_, ResolveError>>> = Box::pin(
            stream::iter(regions)
                .map(|region| self.call(self.api.list_routers(project_id, region)))
                .buffer_unordered(self.options.region_fanout)
                .collect(),
        );
        let per_region = per_region.await;

        let mut nat_by_router: BTreeMap<String, Vec<NatConfig>> = BTreeMap::new();
        for result in per_region {
            for router in result? {
                let vpc = match router.network.parse::<NetworkRef>() {
                    Ok(net) => net,
                    Err(e) => {
                        warn!("skipping router {} in {}: {}", router.name, project_id, e);
                        continue;
                    }
                };
                let configs = nat_by_router.entry(router.name.clone()).or_default();
                for nat in &router.nats {
                    configs.push(NatConfig {
                        router_name: router.name.clone(),
                        nat_name: nat.name.clone(),
                        region: router.region.clone(),
                        vpc_project_id: vpc.project_id.clone(),
                        vpc_network_name: vpc.network.clone(),
                    });
                }
            }
        }
        for configs in nat_by_router.values_mut() {
            configs.sort_by(|a, b| (&a.region, &a.nat_name).cmp(&(&b.region, &b.nat_name)));
        }
        Ok(nat_by_router)
    }

    async fn list_psa_ranges(
        &self,
        project_id: &str,
        peerings: &[PeeringRecord],
    ) -> Result<BTreeMap<String, Vec<AllocatedRange>>, ResolveError> {
        let mut vpcs: Vec<&str> = peerings
            .iter()
            .filter(|p| {
                p.peered_network_ref
                    .parse::<NetworkRef>()
                    .is_ok_and(|r| r.is_service_networking())
            })
            .map(|p| p.source_network.as_str())
            .collect();
        vpcs.sort_unstable();
        vpcs.dedup();

        let mut ranges = BTreeMap::new();
        for vpc in vpcs {
            match self.call(self.api.list_psa_ranges(project_id, vpc)).await {
                Ok(found) if !found.is_empty() => {
                    ranges.insert(vpc.to_string(), found);
                }
                Ok(_) => {}
                Err(ResolveError::Cloud(err)) => {
                    warn!(
                        "allocated ranges unavailable for {}/{}: {}",
                        project_id, vpc, err
                    );
                }
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
            }
        }
        Ok(ranges)
    }
}

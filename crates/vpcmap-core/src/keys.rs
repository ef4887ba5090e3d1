//! Structured composite keys for network nodes.
//!
//! Keys keep their parts as named fields and are turned into the canonical id string
//! (via `Display`) only when a node or edge is emitted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of the synthetic node id for a private-service-access managed peer.
pub const MANAGED_VPC_PREFIX: &str = "gcp-managed-vpc-";

/// Identifies a VPC network node: `{project}_{vpc}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VpcKey {
    pub project_id: String,
    pub vpc: String,
}

impl VpcKey {
    pub fn new(project_id: impl Into<String>, vpc: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            vpc: vpc.into(),
        }
    }

    pub fn subnet(&self, subnet: impl Into<String>, region: impl Into<String>) -> SubnetKey {
        SubnetKey {
            vpc: self.clone(),
            subnet: subnet.into(),
            region: region.into(),
        }
    }

    pub fn managed_peer(&self) -> ManagedPeerKey {
        ManagedPeerKey {
            owner: self.clone(),
        }
    }
}

impl fmt::Display for VpcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.project_id, self.vpc)
    }
}

/// Identifies a subnet node: `{project}_{vpc}_{subnet}_{region}`.
///
/// The region is part of the key because default-VPC subnets share names across regions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubnetKey {
    pub vpc: VpcKey,
    pub subnet: String,
    pub region: String,
}

impl fmt::Display for SubnetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.vpc, self.subnet, self.region)
    }
}

/// Identifies one Cloud NAT config: `{project}_{region}_{router}_{nat}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NatKey {
    pub project_id: String,
    pub region: String,
    pub router: String,
    pub nat: String,
}

impl fmt::Display for NatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.project_id, self.region, self.router, self.nat
        )
    }
}

/// The managed network peered with a VPC through private service access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManagedPeerKey {
    pub owner: VpcKey,
}

impl ManagedPeerKey {
    pub fn label(&self) -> String {
        format!("{}{}", MANAGED_VPC_PREFIX, self.owner.vpc)
    }
}

impl fmt::Display for ManagedPeerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MANAGED_VPC_PREFIX, self.owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subnet_key_includes_region() {
        let key = VpcKey::new("p1", "default").subnet("s1", "us-central1");
        assert_eq!(key.to_string(), "p1_default_s1_us-central1");
    }

    #[test]
    fn test_same_subnet_name_in_two_regions_differs() {
        let vpc = VpcKey::new("p1", "default");
        assert_ne!(
            vpc.subnet("default", "us-central1").to_string(),
            vpc.subnet("default", "europe-west1").to_string()
        );
    }

    #[test]
    fn test_vpc_and_nat_keys() {
        assert_eq!(VpcKey::new("p1", "prod").to_string(), "p1_prod");
        let nat = NatKey {
            project_id: "p1".into(),
            region: "us-east1".into(),
            router: "r1".into(),
            nat: "nat-a".into(),
        };
        assert_eq!(nat.to_string(), "p1_us-east1_r1_nat-a");
    }

    #[test]
    fn test_managed_peer_key() {
        let key = VpcKey::new("p1", "prod").managed_peer();
        assert_eq!(key.to_string(), "gcp-managed-vpc-p1_prod");
        assert_eq!(key.label(), "gcp-managed-vpc-prod");
    }
}

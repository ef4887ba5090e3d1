//! Typed parsing of cloud resource names.
//!
//! Accepted forms:
//! - parents: `organizations/{id}`, `folders/{id}`
//! - networks: `projects/{project}/global/networks/{name}`, optionally preceded by an API
//!   URL such as `https://www.googleapis.com/compute/v1/`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network name of the provider-managed network used by private service access.
pub const SERVICE_NETWORKING: &str = "servicenetworking";

const NETWORK_GRAMMAR: &str = "projects/{project}/global/networks/{name}";
const PARENT_GRAMMAR: &str = "organizations/{id} or folders/{id}";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceNameError {
    #[error("empty resource name")]
    Empty,
    #[error("malformed resource name '{input}', expected {expected}")]
    Malformed {
        input: String,
        expected: &'static str,
    },
}

/// The parent a folder or project listing is made against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParentRef {
    Organization(String),
    Folder(String),
}

impl ParentRef {
    pub fn organization(id: impl Into<String>) -> Self {
        Self::Organization(id.into())
    }

    pub fn folder(id: impl Into<String>) -> Self {
        Self::Folder(id.into())
    }

    /// The bare id, which is also the id of the parent's graph node.
    pub fn id(&self) -> &str {
        match self {
            Self::Organization(id) | Self::Folder(id) => id,
        }
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Organization(id) => write!(f, "organizations/{id}"),
            Self::Folder(id) => write!(f, "folders/{id}"),
        }
    }
}

impl FromStr for ParentRef {
    type Err = ResourceNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ResourceNameError::Empty);
        }
        let malformed = || ResourceNameError::Malformed {
            input: s.to_string(),
            expected: PARENT_GRAMMAR,
        };
        let (kind, id) = s.split_once('/').ok_or_else(malformed)?;
        if id.is_empty() || id.contains('/') {
            return Err(malformed());
        }
        match kind {
            "organizations" => Ok(Self::Organization(id.to_string())),
            "folders" => Ok(Self::Folder(id.to_string())),
            _ => Err(malformed()),
        }
    }
}

impl TryFrom<String> for ParentRef {
    type Error = ResourceNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ParentRef> for String {
    fn from(value: ParentRef) -> Self {
        value.to_string()
    }
}

/// A fully-qualified VPC network reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NetworkRef {
    pub project_id: String,
    pub network: String,
}

impl NetworkRef {
    /// Whether this is the managed network on the far side of a private-service-access peering.
    pub fn is_service_networking(&self) -> bool {
        self.network == SERVICE_NETWORKING
    }
}

impl fmt::Display for NetworkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/global/networks/{}",
            self.project_id, self.network
        )
    }
}

impl FromStr for NetworkRef {
    type Err = ResourceNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ResourceNameError::Empty);
        }
        let malformed = || ResourceNameError::Malformed {
            input: s.to_string(),
            expected: NETWORK_GRAMMAR,
        };

        let segments: Vec<&str> = s.split('/').collect();
        // Skip any API URL prefix up to the first `projects` segment.
        let start = segments
            .iter()
            .position(|seg| *seg == "projects")
            .ok_or_else(malformed)?;
        match &segments[start..] {
            ["projects", project, "global", "networks", network]
                if is_name(project) && is_name(network) =>
            {
                Ok(Self {
                    project_id: (*project).to_string(),
                    network: (*network).to_string(),
                })
            }
            _ => Err(malformed()),
        }
    }
}

fn is_name(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(['?', '#', ' '])
}

/// Final non-empty path segment of a resource reference (e.g. the network of a subnet).
pub fn last_segment(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|seg| !seg.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_network_ref() {
        let r: NetworkRef = "projects/p2/global/networks/prod".parse().unwrap();
        assert_eq!(r.project_id, "p2");
        assert_eq!(r.network, "prod");
        assert!(!r.is_service_networking());
    }

    #[test]
    fn test_parse_url_network_ref() {
        let r: NetworkRef =
            "https://www.googleapis.com/compute/v1/projects/tenant-x/global/networks/servicenetworking"
                .parse()
                .unwrap();
        assert_eq!(r.project_id, "tenant-x");
        assert!(r.is_service_networking());
        assert_eq!(
            r.to_string(),
            "projects/tenant-x/global/networks/servicenetworking"
        );
    }

    #[test]
    fn test_reject_malformed_network_refs() {
        assert_eq!(
            "".parse::<NetworkRef>().unwrap_err(),
            ResourceNameError::Empty
        );
        for bad in [
            "networks/prod",
            "projects/p1/networks/prod",
            "projects/p1/global/networks/",
            "projects//global/networks/prod",
            "projects/p1/global/networks/prod/extra",
            "projects/p1/regions/us-east1/subnetworks/s1",
        ] {
            assert!(
                bad.parse::<NetworkRef>().is_err(),
                "expected {bad} to be rejected"
            );
        }
    }

    #[test]
    fn test_parent_ref_roundtrip() {
        let org: ParentRef = "organizations/123".parse().unwrap();
        assert_eq!(org, ParentRef::organization("123"));
        assert_eq!(org.id(), "123");
        assert_eq!(org.to_string(), "organizations/123");

        let folder: ParentRef = "folders/456".parse().unwrap();
        assert_eq!(folder.id(), "456");
        assert!("projects/1".parse::<ParentRef>().is_err());
        assert!("folders/".parse::<ParentRef>().is_err());
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(
            last_segment("https://x/projects/p/global/networks/default"),
            Some("default")
        );
        assert_eq!(last_segment("default"), Some("default"));
        assert_eq!(last_segment("projects/p/"), None);
    }
}

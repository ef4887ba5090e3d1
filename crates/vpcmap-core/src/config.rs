//! Configuration for discovery and output settings.
//!
//! Load order: `.vpcmap/config.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level vpcmap configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VpcmapConfig {
    pub discovery: DiscoveryConfig,
    pub output: OutputConfig,
}

/// Hierarchy walk and network resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Maximum number of sibling folders/projects processed at once.
    pub concurrency: usize,
    /// Maximum number of per-region calls in flight for one project.
    pub region_fanout: usize,
    /// Folder nesting depth below the organization that the walk will descend into.
    pub max_depth: usize,
    /// Whole-run deadline in seconds. `None` means no deadline.
    pub timeout_secs: Option<u64>,
    /// Enumerate routers and add Cloud NAT nodes.
    pub include_nat: bool,
    /// Look up shared-VPC host projects.
    pub include_shared_vpc: bool,
    /// Fetch private-service-access allocated ranges for managed peers.
    pub include_psa_ranges: bool,
}

/// Output settings for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: `json`, `dot` or `mermaid`.
    pub format: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            region_fanout: 4,
            max_depth: 16,
            timeout_secs: None,
            include_nat: true,
            include_shared_vpc: true,
            include_psa_ranges: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl VpcmapConfig {
    /// Load config from `.vpcmap/config.toml` under `base_dir`, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(base_dir: &Path) -> Result<Self> {
        let config_path = base_dir.join(".vpcmap").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override("VPCMAP_CONCURRENCY", &mut config.discovery.concurrency);
        env_override("VPCMAP_REGION_FANOUT", &mut config.discovery.region_fanout);
        env_override("VPCMAP_MAX_DEPTH", &mut config.discovery.max_depth);
        if let Ok(v) = std::env::var("VPCMAP_TIMEOUT_SECS")
            && let Ok(secs) = v.parse()
        {
            config.discovery.timeout_secs = Some(secs);
        }

        config.output.format = config.output.format.to_lowercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery.concurrency == 0 {
            anyhow::bail!("discovery.concurrency must be at least 1");
        }
        if self.discovery.region_fanout == 0 {
            anyhow::bail!("discovery.region_fanout must be at least 1");
        }
        if self.discovery.max_depth == 0 {
            anyhow::bail!("discovery.max_depth must be at least 1");
        }
        Ok(())
    }
}

//! Integration tests for vpcmap-cli functionality.
//! Tests the library calls the CLI commands make, then the binary end to end.

use std::path::Path;
use std::process::Command;
use vpcmap_core::config::VpcmapConfig;
use vpcmap_discovery::inventory::InventoryCloud;
use vpcmap_discovery::walker::ResourceTreeWalker;

const INVENTORY: &str = r#"{
    "organization": {"id": "100", "display_name": "acme"},
    "folders": [{"id": "f1", "display_name": "Engineering", "parent": "organizations/100"}],
    "projects": [
        {"project_id": "p1", "display_name": "Web", "parent": "folders/f1", "state": "ACTIVE"}
    ],
    "regions": {"p1": ["us-central1"]},
    "networks": {"p1": [{"name": "default", "peerings": [
        {"peered_network_ref": "projects/partner/global/networks/edge"}
    ]}]},
    "subnets": {"p1": [
        {"name": "s1", "region": "us-central1", "network": "projects/p1/global/networks/default", "cidr": "10.0.0.0/24"}
    ]}
}"#;

fn write_inventory(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("inventory.json");
    std::fs::write(&path, INVENTORY).unwrap();
    path
}

#[test]
fn test_storage_load_nonexistent() {
    let tmpdir = tempfile::tempdir().unwrap();
    let result = vpcmap_core::storage::load(&tmpdir.path().join("missing.json"));
    assert!(result.is_err(), "loading a missing graph should fail");
}

#[test]
fn test_config_defaults_without_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let config = VpcmapConfig::load(tmpdir.path()).unwrap();
    assert_eq!(config.discovery.region_fanout, 4);
    assert_eq!(config.discovery.max_depth, 16);
    assert_eq!(config.output.format, "json");
}

#[tokio::test]
async fn test_discover_save_and_export() {
    let tmpdir = tempfile::tempdir().unwrap();
    let cloud = InventoryCloud::load(&write_inventory(tmpdir.path())).unwrap();
    let discovery = ResourceTreeWalker::new(cloud, VpcmapConfig::default().discovery)
        .discover("100")
        .await
        .unwrap();

    let out = tmpdir.path().join("out").join("graph.json");
    vpcmap_core::storage::save(&out, &discovery.graph).unwrap();
    let loaded = vpcmap_core::storage::load(&out).unwrap();
    assert_eq!(loaded.nodes, discovery.graph.nodes);

    let dot = vpcmap_export::export_dot(&loaded);
    assert!(dot.contains("\"p1_default_s1_us-central1\""));
    assert!(dot.contains("\"partner\""));
}

#[test]
fn test_binary_discover_then_info() {
    let tmpdir = tempfile::tempdir().unwrap();
    let inventory = write_inventory(tmpdir.path());
    let graph_path = tmpdir.path().join("graph.json");

    let status = Command::new(env!("CARGO_BIN_EXE_vpcmap"))
        .arg("--base")
        .arg(tmpdir.path())
        .args(["discover", "100", "--inventory"])
        .arg(&inventory)
        .arg("--output")
        .arg(&graph_path)
        .env("RUST_LOG", "warn")
        .status()
        .unwrap();
    assert!(status.success());

    let graph: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&graph_path).unwrap()).unwrap();
    assert_eq!(graph["organization_id"], "100");

    let info = Command::new(env!("CARGO_BIN_EXE_vpcmap"))
        .args(["info", "--input"])
        .arg(&graph_path)
        .output()
        .unwrap();
    assert!(info.status.success());
    let stdout = String::from_utf8_lossy(&info.stdout);
    assert!(stdout.contains("Organization: 100"));
    assert!(stdout.contains("external_project: 1"));
}

#[test]
fn test_binary_project_mode() {
    let tmpdir = tempfile::tempdir().unwrap();
    let inventory = write_inventory(tmpdir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_vpcmap"))
        .current_dir(tmpdir.path())
        .args(["project", "p1", "--inventory"])
        .arg(&inventory)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    assert!(output.status.success());

    let graph_path = tmpdir.path().join("gcp_project_p1_structure.json");
    let graph = vpcmap_core::storage::load(&graph_path).unwrap();
    assert_eq!(graph.organization_id, "p1");
    assert_eq!(graph.node("p1").unwrap().level, 0);
    assert!(graph.contains_node("p1_default_s1_us-central1"));
    assert!(!graph.contains_node("100"));
    assert!(!graph.contains_node("f1"));
}

#[test]
fn test_binary_rejects_unknown_format() {
    let tmpdir = tempfile::tempdir().unwrap();
    let inventory = write_inventory(tmpdir.path());
    let output = Command::new(env!("CARGO_BIN_EXE_vpcmap"))
        .arg("--base")
        .arg(tmpdir.path())
        .args(["discover", "100", "--format", "svg", "--inventory"])
        .arg(&inventory)
        .output()
        .unwrap();
    assert!(!output.status.success());
}

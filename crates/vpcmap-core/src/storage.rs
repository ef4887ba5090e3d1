//! Write a finished graph for an external renderer, and read it back for export.

use crate::graph::Graph;
use crate::schema;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default output file name for an organization's graph.
pub fn default_output_file(organization_id: &str) -> PathBuf {
    PathBuf::from(format!("gcp_organization_{organization_id}_structure.json"))
}

/// Default output file name for a single project's graph.
pub fn default_project_output_file(project_id: &str) -> PathBuf {
    PathBuf::from(format!("gcp_project_{project_id}_structure.json"))
}

/// Load a graph file.
pub fn load(path: &Path) -> Result<Graph> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph from {}", path.display()))?;
    schema::from_json(&json)
}

/// Save a graph as JSON, creating the parent directory if needed.
pub fn save(path: &Path, graph: &Graph) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    }

    let json = schema::to_json(graph)?;
    fs::write(path, json).with_context(|| format!("failed to write graph to {}", path.display()))?;

    Ok(())
}

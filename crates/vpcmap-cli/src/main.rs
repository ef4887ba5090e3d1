//! CLI binary for vpcmap: discover an organization's hierarchy and network topology, or a
//! single project's topology.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vpcmap_core::config::VpcmapConfig;
use vpcmap_core::graph::Graph;
use vpcmap_discovery::control::RunControl;
use vpcmap_discovery::inventory::InventoryCloud;
use vpcmap_discovery::walker::{Discovery, ResourceTreeWalker};
use vpcmap_export::ExportFormat;

#[derive(Parser)]
#[command(
    name = "vpcmap",
    about = "Map a cloud organization's folders, projects and VPC networks"
)]
struct Cli {
    /// Base directory holding .vpcmap/config.toml (defaults to current directory)
    #[arg(short, long, global = true)]
    base: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover an organization and write its graph
    Discover {
        /// Organization id (numeric, without the organizations/ prefix)
        org_id: String,

        /// Inventory JSON document to discover from
        #[arg(short, long)]
        inventory: PathBuf,

        /// Output file (defaults to gcp_organization_<ORG_ID>_structure.json for json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: json, dot, mermaid (defaults to output.format from config)
        #[arg(short, long)]
        format: Option<String>,

        /// Abandon the run after this many seconds and keep the partial graph
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Discover a single project's network topology without an organization
    Project {
        /// Project id
        project_id: String,

        /// Inventory JSON document to discover from
        #[arg(short, long)]
        inventory: PathBuf,

        /// Output file (defaults to gcp_project_<PROJECT_ID>_structure.json for json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: json, dot, mermaid (defaults to output.format from config)
        #[arg(short, long)]
        format: Option<String>,

        /// Abandon the run after this many seconds and keep the partial graph
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Render a saved graph as DOT (Graphviz) or Mermaid flowchart
    Export {
        /// Graph JSON written by `vpcmap discover`
        #[arg(short, long)]
        input: PathBuf,

        /// Output format: dot, mermaid
        #[arg(short, long, default_value = "dot")]
        format: String,
    },

    /// Show statistics and integrity checks for a saved graph
    Info {
        /// Graph JSON written by `vpcmap discover`
        #[arg(short, long)]
        input: PathBuf,
    },
}

/// Where a discovered graph goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Rendered(ExportFormat),
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("json") {
            return Ok(Self::Json);
        }
        s.parse::<ExportFormat>()
            .map(Self::Rendered)
            .map_err(anyhow::Error::msg)
    }
}

fn get_base_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.base {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = get_base_dir(&cli)?;

    match cli.command {
        Commands::Discover {
            org_id,
            inventory,
            output,
            format,
            timeout,
        } => cmd_discover(&base_dir, &org_id, &inventory, output, format, timeout).await,
        Commands::Project {
            project_id,
            inventory,
            output,
            format,
            timeout,
        } => cmd_project(&base_dir, &project_id, &inventory, output, format, timeout).await,
        Commands::Export { input, format } => cmd_export(&input, &format),
        Commands::Info { input } => cmd_info(&input),
    }
}

/// Config, output format and a Ctrl-C cancellable walker for one discovery run.
fn prepare(
    base_dir: &Path,
    inventory: &Path,
    format: Option<String>,
    timeout: Option<u64>,
) -> Result<(ResourceTreeWalker<InventoryCloud>, OutputFormat)> {
    let mut config = VpcmapConfig::load(base_dir).context("failed to load config")?;
    if let Some(secs) = timeout {
        config.discovery.timeout_secs = Some(secs);
    }
    let format: OutputFormat = format
        .as_deref()
        .unwrap_or(&config.output.format)
        .parse()?;

    let cloud = InventoryCloud::load(inventory)?;

    let (control, cancel) = RunControl::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing with a partial graph");
            cancel.cancel();
        }
    });

    let walker = ResourceTreeWalker::new(cloud, config.discovery).with_control(control);
    Ok((walker, format))
}

fn spinner(message: String) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

async fn cmd_discover(
    base_dir: &Path,
    org_id: &str,
    inventory: &Path,
    output: Option<PathBuf>,
    format: Option<String>,
    timeout: Option<u64>,
) -> Result<()> {
    let (walker, format) = prepare(base_dir, inventory, format, timeout)?;

    let progress = spinner(format!("Discovering organization {}...", org_id));
    let result = walker.discover(org_id).await;
    progress.finish_and_clear();

    let discovery = result.with_context(|| format!("discovery of organization {org_id} failed"))?;
    report(&discovery);
    let default_path = vpcmap_core::storage::default_output_file(org_id);
    write_output(&discovery.graph, format, output, default_path)
}

async fn cmd_project(
    base_dir: &Path,
    project_id: &str,
    inventory: &Path,
    output: Option<PathBuf>,
    format: Option<String>,
    timeout: Option<u64>,
) -> Result<()> {
    let (walker, format) = prepare(base_dir, inventory, format, timeout)?;

    let progress = spinner(format!("Discovering project {}...", project_id));
    let discovery = walker.discover_project(project_id).await;
    progress.finish_and_clear();

    report(&discovery);
    let default_path = vpcmap_core::storage::default_project_output_file(project_id);
    write_output(&discovery.graph, format, output, default_path)
}

fn report(discovery: &Discovery) {
    let graph = &discovery.graph;
    eprintln!(
        "Discovered {} nodes and {} edges.",
        graph.nodes.len(),
        graph.edges.len()
    );
    if !discovery.diagnostics.is_empty() {
        eprintln!("\n{} diagnostic(s):", discovery.diagnostics.len());
        for diagnostic in &discovery.diagnostics {
            eprintln!("  {}", diagnostic);
        }
    }
    if !discovery.is_complete() {
        eprintln!(
            "\nRun stopped early; {} subtree(s) incomplete:",
            discovery.incomplete.len()
        );
        for subject in &discovery.incomplete {
            eprintln!("  {}", subject);
        }
    }
}

/// JSON goes to `output` or `default_path`; rendered formats go to `output` or stdout.
fn write_output(
    graph: &Graph,
    format: OutputFormat,
    output: Option<PathBuf>,
    default_path: PathBuf,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let path = output.unwrap_or(default_path);
            vpcmap_core::storage::save(&path, graph)?;
            eprintln!("Graph written to {}", path.display());
        }
        OutputFormat::Rendered(export_format) => {
            let rendered = vpcmap_export::export(graph, export_format);
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("{} written to {}", export_format, path.display());
                }
                None => print!("{}", rendered),
            }
        }
    }
    Ok(())
}

fn cmd_export(input: &Path, format: &str) -> Result<()> {
    let graph = vpcmap_core::storage::load(input)?;

    let export_format: ExportFormat = format.parse().map_err(anyhow::Error::msg)?;

    let output = vpcmap_export::export(&graph, export_format);
    print!("{}", output);

    Ok(())
}

fn cmd_info(input: &Path) -> Result<()> {
    let graph = vpcmap_core::storage::load(input)?;

    println!("vpcmap graph v{}", graph.version);
    println!("Organization: {}", graph.organization_id);
    println!("Generated: {}", graph.generated_at);
    println!();
    println!("Nodes: {}", graph.nodes.len());
    for (category, count) in graph.category_counts() {
        println!("  {}: {}", category.as_str(), count);
    }
    let relationship_edges = graph.edges.iter().filter(|e| e.style.is_some()).count();
    println!("Edges: {}", graph.edges.len());
    println!("  containment: {}", graph.edges.len() - relationship_edges);
    println!(
        "  peering: {}",
        graph.edges.iter().filter(|e| e.is_peering()).count()
    );
    println!(
        "  shared-vpc: {}",
        relationship_edges - graph.edges.iter().filter(|e| e.is_peering()).count()
    );

    let mut issues = 0;
    for id in graph.duplicate_node_ids() {
        println!("WARN: duplicate node id: {}", id);
        issues += 1;
    }
    for edge in graph.dangling_edges() {
        println!("WARN: dangling edge: {} -> {}", edge.from, edge.to);
        issues += 1;
    }
    if issues == 0 {
        eprintln!("Graph is valid. No integrity issues found.");
    } else {
        eprintln!("\nFound {} integrity issue(s).", issues);
    }

    Ok(())
}

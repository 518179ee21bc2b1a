//! resgpu CLI
//!
//! Plugin binary invoked by the orchestrator: one subcommand per
//! operation, a JSON request on stdin and a JSON response on stdout.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resgpu_core::{LogFormat, LoggingConfig, PluginConfig, StoreBackend};
use resgpu_plugin::Plugin;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use commands::read_request;

/// Exit status reported to the host on any failure
const EXIT_FAILURE: i32 = 128;

const DEFAULT_CONFIG_PATH: &str = "gpu.toml";

/// resgpu - GPU resource plugin
#[derive(Parser, Debug)]
#[command(name = "resgpu")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(
        long,
        global = true,
        env = "ERU_RESOURCE_CONFIG_PATH",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    /// Keep node records in memory instead of the configured store
    #[arg(long, global = true)]
    embedded_storage: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the plugin name
    Name,
    /// Register a node
    AddNode,
    /// Forget a node
    RemoveNode,
    /// Estimate how many workloads fit on each node
    GetNodesDeployCapacity,
    /// Update node capacity
    SetNodeResourceCapacity,
    /// Update node usage
    SetNodeResourceUsage,
    /// Show a node record and its drift against workloads
    GetNodeResourceInfo,
    /// Replace a node record
    SetNodeResourceInfo,
    /// Rewrite node usage from workloads
    FixNodeResource,
    /// Plan a deploy on one node
    CalculateDeploy,
    /// Plan a workload resize
    CalculateRealloc,
    /// Plan a remap of running workloads
    CalculateRemap,
    /// Pick the least utilized node
    GetMostIdleNode,
    /// Describe reported metrics
    GetMetricsDescription,
    /// Report node metrics
    GetMetrics,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(EXIT_FAILURE);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    init_logging(&config.logging)?;

    if cli.embedded_storage {
        config.store.backend = StoreBackend::Memory;
    }
    let plugin = Plugin::new(&config, resgpu_store::open(&config.store));
    debug!(command = ?cli.command, "Running command");

    let response = match cli.command {
        Commands::Name => commands::name(&plugin),
        Commands::AddNode => commands::add_node(&plugin, read_request().await?).await?,
        Commands::RemoveNode => commands::remove_node(&plugin, read_request().await?).await?,
        Commands::GetNodesDeployCapacity => {
            commands::get_nodes_deploy_capacity(&plugin, read_request().await?).await?
        }
        Commands::SetNodeResourceCapacity => {
            commands::set_node_resource_capacity(&plugin, read_request().await?).await?
        }
        Commands::SetNodeResourceUsage => {
            commands::set_node_resource_usage(&plugin, read_request().await?).await?
        }
        Commands::GetNodeResourceInfo => {
            commands::get_node_resource_info(&plugin, read_request().await?).await?
        }
        Commands::SetNodeResourceInfo => {
            commands::set_node_resource_info(&plugin, read_request().await?).await?
        }
        Commands::FixNodeResource => {
            commands::fix_node_resource(&plugin, read_request().await?).await?
        }
        Commands::CalculateDeploy => {
            commands::calculate_deploy(&plugin, read_request().await?).await?
        }
        Commands::CalculateRealloc => {
            commands::calculate_realloc(&plugin, read_request().await?).await?
        }
        Commands::CalculateRemap => {
            commands::calculate_remap(&plugin, read_request().await?).await?
        }
        Commands::GetMostIdleNode => {
            commands::get_most_idle_node(&plugin, read_request().await?).await?
        }
        Commands::GetMetricsDescription => commands::get_metrics_description(&plugin)?,
        Commands::GetMetrics => commands::get_metrics(&plugin, read_request().await?).await?,
    };

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

/// Load the configuration; a missing file at the default path means defaults
fn load_config(path: &Path) -> Result<PluginConfig> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        return Ok(PluginConfig::default());
    }
    PluginConfig::from_file(path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

/// Log to stderr; stdout carries the response
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level {:?}", config.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}

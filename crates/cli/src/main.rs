//! vmictl - CLI for the VMI network observability agent
//!
//! Queries a running agent for derived VMI stats and network links, and can
//! run the same derivation and link discovery locally against files.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{agent, link, stats};
use std::path::PathBuf;

/// VMI network observability CLI
#[derive(Parser)]
#[command(name = "vmictl")]
#[command(author, version, about = "CLI for the VMI network observability agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (also VMICTL_API_URL; falls back to the config file)
    #[arg(long, env = "VMICTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show VMI stats derived by the agent
    Stats {
        /// Only this metric family (e.g. kubevirt_vmi_info)
        #[arg(long)]
        family: Option<String>,

        /// Only VMIs in this namespace
        #[arg(long, short)]
        namespace: Option<String>,
    },

    /// Resolve the pod link behind a VMI network through the agent
    Link {
        namespace: String,
        vmi: String,
        network: String,
    },

    /// Agent commands
    #[command(subcommand)]
    Agent(AgentCommands),

    /// Resolve a network link for a VMI manifest against a local sysfs tree
    Discover {
        /// VMI JSON file
        #[arg(long)]
        vmi: PathBuf,

        /// Network name as declared in the VMI spec
        #[arg(long)]
        network: String,

        /// sysfs net directory to look links up in
        #[arg(long, default_value = "/sys/class/net")]
        sysfs_root: PathBuf,
    },

    /// Derive VMI stats from a snapshot file without an agent
    Derive {
        /// Cluster snapshot JSON file
        #[arg(long)]
        snapshot: PathBuf,

        /// Only this metric family
        #[arg(long)]
        family: Option<String>,

        /// Only VMIs in this namespace
        #[arg(long, short)]
        namespace: Option<String>,

        /// Print Prometheus text exposition instead of a table
        #[arg(long)]
        text: bool,
    },
}

#[derive(Subcommand)]
pub enum AgentCommands {
    /// Show agent health and readiness
    Status,
}

fn api_client(config: &config::Config, flag: Option<&str>) -> Result<client::ApiClient> {
    client::ApiClient::new(&config.resolve_api_url(flag))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Stats { family, namespace } => {
            let config = config::Config::load()?;
            let client = api_client(&config, cli.api_url.as_deref())?;
            let namespace = namespace.or(config.default_namespace);
            stats::show_stats(&client, family.as_deref(), namespace.as_deref(), cli.format).await?;
        }
        Commands::Link {
            namespace,
            vmi,
            network,
        } => {
            let client = api_client(&config::Config::load()?, cli.api_url.as_deref())?;
            link::show_link(&client, &namespace, &vmi, &network, cli.format).await?;
        }
        Commands::Agent(AgentCommands::Status) => {
            let client = api_client(&config::Config::load()?, cli.api_url.as_deref())?;
            agent::show_status(&client, cli.format).await?;
        }
        Commands::Discover {
            vmi,
            network,
            sysfs_root,
        } => {
            link::discover(&vmi, &network, &sysfs_root, cli.format).await?;
        }
        Commands::Derive {
            snapshot,
            family,
            namespace,
            text,
        } => {
            stats::derive(&snapshot, family.as_deref(), namespace.as_deref(), text, cli.format)
                .await?;
        }
    }

    Ok(())
}

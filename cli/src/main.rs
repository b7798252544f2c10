//! Perfman CLI - Forward local ports to pods and services
//!
//! A command-line tool for opening port forwards to cluster workloads
//! and managing saved forwarding targets.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "perfman")]
#[command(author, version, about = "Forward local ports to pods and services")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Forward local ports to one or more targets until interrupted
    #[command(alias = "fw")]
    Forward {
        /// `<kind>/<name>[:<local>[:<remote>]]` or the name of a preset
        #[arg(required = true)]
        targets: Vec<String>,

        /// Namespace for targets that do not set one
        #[arg(short = 'n', long)]
        namespace: Option<String>,

        /// Local address to bind
        #[arg(long)]
        address: Option<String>,
    },

    /// Manage saved targets
    Presets {
        #[command(subcommand)]
        action: Option<PresetsAction>,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum PresetsAction {
    /// Save a target under a name
    Save {
        name: String,
        /// `<kind>/<name>[:<local>[:<remote>]]`
        target: String,
        /// Namespace of the target
        #[arg(short = 'n', long)]
        namespace: Option<String>,
    },
    /// Remove a saved target
    #[command(alias = "rm")]
    Remove { name: String },
    /// List built-in and saved targets
    #[command(alias = "ls")]
    List,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| cli.log_level.clone()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Forward {
            targets,
            namespace,
            address,
        } => commands::forward::run(targets, namespace, address, cli.json).await?,
        Commands::Presets { action } => match action.unwrap_or(PresetsAction::List) {
            PresetsAction::Save {
                name,
                target,
                namespace,
            } => commands::presets::save(&name, &target, namespace).await?,
            PresetsAction::Remove { name } => commands::presets::remove(&name).await?,
            PresetsAction::List => commands::presets::list(cli.json).await?,
        },
        Commands::Config => {
            commands::config::show(cli.json).await?;
        }
    }

    Ok(())
}

//! gcompute CLI - Main Entry Point
//!
//! Validates, plans and applies compute resources through the provider's
//! lifecycle, backed by a local simulated compute API.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::warn;

mod commands;
mod output;

use commands::{resource, schema, Session};

/// gcompute - compute resource lifecycle from the command line
#[derive(Parser)]
#[command(name = "gcompute")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Provider configuration file (TOML)
    #[arg(long, default_value = "gcompute.toml", global = true, env = "GCOMPUTE_CONFIG")]
    config: PathBuf,

    /// Snapshot of the simulated compute backend
    #[arg(long, default_value = ".gcompute/sim.json", global = true, env = "GCOMPUTE_SIM_STORE")]
    sim_store: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show resource schemas
    Schema(schema::SchemaArgs),

    /// Check a resource configuration without contacting the API
    Validate(resource::ValidateArgs),

    /// Show the changes apply would make
    Plan(resource::ChangeArgs),

    /// Create, update, replace or destroy a resource to match its configuration
    Apply(resource::ChangeArgs),

    /// Refresh a resource state from the API
    Read(resource::StateArgs),

    /// Destroy the resource tracked by a state file
    Destroy(resource::StateArgs),

    /// Adopt an existing entity into a new state file
    Import(resource::ImportArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Schema(args) => schema::execute(args, cli.format)?,
        Commands::Version => {
            println!("gcompute CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Provider core v{}", gcompute_provider::VERSION);
        }
        command => {
            let session = Session::open(&cli.config, &cli.sim_store)?;

            // Ctrl-C aborts any operation wait; the state file still gets written
            let cancel = session.provider.context().cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, abandoning operation wait");
                    cancel.cancel();
                }
            });

            let result = match command {
                Commands::Validate(args) => resource::validate(&session, args),
                Commands::Plan(args) => resource::plan(&session, args, cli.format),
                Commands::Apply(args) => resource::apply(&session, args, cli.format).await,
                Commands::Read(args) => resource::read(&session, args, cli.format).await,
                Commands::Destroy(args) => resource::destroy(&session, args).await,
                Commands::Import(args) => resource::import(&session, args, cli.format).await,
                Commands::Schema(_) | Commands::Version => Ok(()),
            };

            session.close()?;
            result?;
        }
    }

    Ok(())
}

//! EMS CLI - Command-line interface for the EMS access gateway.

mod commands;
mod ui;

use clap::{Parser, Subcommand};
use ems_core::config::LogFormat;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "ems")]
#[command(about = "EMS - role-based access gateway for the employee management frontend")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway operations
    Gateway {
        #[command(subcommand)]
        action: GatewayCommands,
    },

    /// Print and validate the route table
    Routes,

    /// Dry-run a gate decision against the live identity service
    Check {
        /// Request path to evaluate (e.g., /hr/employees)
        #[arg(long)]
        path: String,

        /// Credential to present
        #[arg(long, conflicts_with = "prompt")]
        token: Option<String>,

        /// Read the credential from a hidden prompt
        #[arg(long)]
        prompt: bool,
    },

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum GatewayCommands {
    /// Start the gateway server
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (loopback, lan, or IP)
        #[arg(long)]
        bind: Option<String>,

        /// Force start even if port is in use
        #[arg(long)]
        force: bool,
    },

    /// Check gateway status
    Status,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., identity.baseUrl)
        key: String,
    },

    /// Show effective configuration
    Show,

    /// Validate configuration
    Validate,
}

fn init_logging(verbose: bool) {
    // Logging settings come from the config file when it parses.
    let settings = ems_core::Config::load_default()
        .map(|c| c.settings)
        .unwrap_or_default();

    let filter = if verbose || settings.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (pretty, json) = match settings.log_format {
        LogFormat::Pretty => (Some(fmt::layer().with_target(false)), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(pretty)
        .with(json)
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let Some(command) = cli.command else {
        commands::run_gateway(commands::gateway::GatewayArgs::default()).await?;
        return Ok(());
    };

    match command {
        Commands::Gateway { action } => {
            let args = match action {
                GatewayCommands::Run { port, bind, force } => commands::gateway::GatewayArgs {
                    action: commands::gateway::GatewayAction::Run { port, bind, force },
                },
                GatewayCommands::Status => commands::gateway::GatewayArgs {
                    action: commands::gateway::GatewayAction::Status,
                },
            };
            commands::run_gateway(args).await?;
        }

        Commands::Routes => commands::run_routes()?,

        Commands::Check {
            path,
            token,
            prompt,
        } => {
            let args = commands::check::CheckArgs {
                path,
                token,
                prompt,
            };
            commands::run_check(args).await?;
        }

        Commands::Config { action } => {
            let action = match action {
                Some(ConfigCommands::Get { key }) => commands::config::ConfigAction::Get(key),
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Show) | None => commands::config::ConfigAction::Show,
            };
            commands::run_config(&action)?;
        }
    }

    Ok(())
}

//! Flowgraph - Main Server
//!
//! REST persistence service for the flow editor, backed by Neo4j.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flowgraph::neo4j::models::NewUser;
use flowgraph::{AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flowgraph")]
#[command(about = "Flow editor graph service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config.yaml and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create the Neo4j constraints and indexes, then exit
    InitSchema,

    /// Register a user
    CreateUser {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flowgraph=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            flowgraph::start_server(config).await
        }
        Commands::InitSchema => {
            // AppState::new applies the schema on connect
            AppState::new(config).await?;
            tracing::info!("Schema is in place");
            Ok(())
        }
        Commands::CreateUser { username, password } => {
            run_create_user(config, username, password).await
        }
    }
}

async fn run_create_user(config: Config, username: String, password: String) -> Result<()> {
    let state = AppState::new(config).await?;
    let manager = state.flow_manager();

    let id = manager
        .register_user(&NewUser {
            username: username.clone(),
            password,
        })
        .await
        .with_context(|| format!("Failed to register user '{}'", username))?;

    tracing::info!("Created user {} ({})", username, id);
    Ok(())
}

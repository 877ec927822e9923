//! Flowgraph
//!
//! Persistence service for a visual flow editor:
//! - Users own Modules, Modules own Nodes
//! - Each Node owns one Data record and five input plus five output slots
//! - Wires between slots are stored as mirrored Connection pairs
//! - Everything lives in Neo4j, served over a small REST API

pub mod api;
pub mod auth;
pub mod flow;
pub mod neo4j;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub neo4j: Neo4jYamlConfig,
    pub auth: AuthYamlConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 3333 }
    }
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_sessions: usize,
    pub retry_interval_ms: u64,
    /// 0 retries the initial login forever
    pub max_login_attempts: u32,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "neo4j".into(),
            max_sessions: 16,
            retry_interval_ms: 1000,
            max_login_attempts: 30,
        }
    }
}

/// Token configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthYamlConfig {
    pub jwt_secret: String,
    pub token_expiry_secs: u64,
}

impl Default for AuthYamlConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "flowgraph-dev-secret-change-me".into(),
            token_expiry_secs: 28800, // 8 hours
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub neo4j_max_sessions: usize,
    pub neo4j_retry_interval_ms: u64,
    pub neo4j_max_login_attempts: u32,
    pub server_port: u16,
    pub jwt_secret: String,
    pub token_expiry_secs: u64,
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if file not found)
        let yaml = Self::load_yaml(yaml_path);

        // 2. Build Config with env var overrides
        let config = Self {
            neo4j_uri: std::env::var("NEO4J_URI").unwrap_or(yaml.neo4j.uri),
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or(yaml.neo4j.user),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.neo4j.password),
            neo4j_max_sessions: env_parse("NEO4J_MAX_SESSIONS")
                .unwrap_or(yaml.neo4j.max_sessions),
            neo4j_retry_interval_ms: env_parse("NEO4J_RETRY_INTERVAL_MS")
                .unwrap_or(yaml.neo4j.retry_interval_ms),
            neo4j_max_login_attempts: env_parse("NEO4J_MAX_LOGIN_ATTEMPTS")
                .unwrap_or(yaml.neo4j.max_login_attempts),
            server_port: env_parse("SERVER_PORT").unwrap_or(yaml.server.port),
            jwt_secret: std::env::var("FLOW_JWT_SECRET").unwrap_or(yaml.auth.jwt_secret),
            token_expiry_secs: env_parse("FLOW_TOKEN_EXPIRY_SECS")
                .unwrap_or(yaml.auth.token_expiry_secs),
        };

        if config.neo4j_max_sessions == 0 {
            anyhow::bail!("neo4j.max_sessions must be at least 1");
        }
        Ok(config)
    }

    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    pub fn store_settings(&self) -> neo4j::StoreSettings {
        neo4j::StoreSettings {
            uri: self.neo4j_uri.clone(),
            user: self.neo4j_user.clone(),
            password: self.neo4j_password.clone(),
            max_sessions: self.neo4j_max_sessions,
            retry: neo4j::RetryPolicy {
                interval: Duration::from_millis(self.neo4j_retry_interval_ms),
                max_attempts: match self.neo4j_max_login_attempts {
                    0 => None,
                    n => Some(n),
                },
            },
        }
    }

    pub fn token_settings(&self) -> auth::TokenSettings {
        auth::TokenSettings {
            secret: self.jwt_secret.clone(),
            expiry_secs: self.token_expiry_secs,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub neo4j: Arc<dyn neo4j::GraphStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to Neo4j (retrying per config) and make sure the schema exists
    pub async fn new(config: Config) -> Result<Self> {
        let neo4j = Arc::new(
            neo4j::Neo4jClient::new(&config.store_settings())
                .await
                .context("Failed to connect to Neo4j")?,
        );

        Ok(Self {
            neo4j,
            config: Arc::new(config),
        })
    }

    pub fn flow_manager(&self) -> flow::FlowManager {
        flow::FlowManager::new(self.neo4j.clone(), self.config.token_settings())
    }
}

/// Connect, build the router and serve until the process is stopped
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config).await?;
    tracing::info!("Connected to Neo4j");

    let server_state = Arc::new(api::ServerState {
        flow: Arc::new(state.flow_manager()),
    });
    let app = api::create_router(server_state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Flowgraph listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

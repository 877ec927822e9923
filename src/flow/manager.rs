//! Flow manager
//!
//! One method per user-facing operation. Each validates its input, then composes
//! the store primitives with [`ConnectionPairing`] and [`CascadeDelete`].

use super::cascade::CascadeDelete;
use super::error::{FlowError, FlowResult};
use super::pairing::ConnectionPairing;
use super::validation::{self, FieldErrors, WireRequest};
use crate::auth::TokenSettings;
use crate::neo4j::models::*;
use crate::neo4j::GraphStore;
use serde::Serialize;
use std::sync::Arc;

/// A module as listed for its owner: owner redacted, nodes expanded
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub id: ModuleId,
    pub name: String,
    pub nodes: Vec<Node>,
}

/// Successful sign-in
#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    pub token: String,
    pub username: String,
}

pub struct FlowManager {
    store: Arc<dyn GraphStore>,
    pairing: ConnectionPairing,
    cascade: CascadeDelete,
    tokens: TokenSettings,
}

impl FlowManager {
    pub fn new(store: Arc<dyn GraphStore>, tokens: TokenSettings) -> Self {
        Self {
            pairing: ConnectionPairing::new(store.clone()),
            cascade: CascadeDelete::new(store.clone()),
            store,
            tokens,
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn register_user(&self, user: &NewUser) -> FlowResult<UserId> {
        validation::validate_new_user(user)?;
        if !self.store.find_users(&user.username).await?.is_empty() {
            return Err(FlowError::field("username", "is already registered"));
        }
        let id = self.store.create_user(user).await?;
        tracing::info!("Registered user {}", user.username);
        Ok(id)
    }

    /// Compare the credentials in plaintext and issue a token on success
    pub async fn sign_in(&self, credentials: &NewUser) -> FlowResult<SignedIn> {
        validation::validate_new_user(credentials)?;

        let user = self
            .store
            .find_users(&credentials.username)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::field("username", "unknown user"))?;
        if user.password != credentials.password {
            return Err(FlowError::field("password", "wrong password"));
        }

        let token = self
            .tokens
            .issue(&user)
            .map_err(|e| FlowError::Token(e.to_string()))?;
        tracing::info!("User {} signed in", user.username);
        Ok(SignedIn {
            token,
            username: user.username,
        })
    }

    // ========================================================================
    // Modules
    // ========================================================================

    pub async fn create_module(&self, module: &NewModule) -> FlowResult<ModuleId> {
        validation::validate_new_module(module)?;
        if self.module_exists(module).await? {
            return Err(FlowError::field(
                "name",
                format!("module '{}' already exists", module.name),
            ));
        }
        let id = self.store.create_module(module).await?;
        tracing::info!("Created module {} '{}'", id, module.name);
        Ok(id)
    }

    /// Whether `owner` already has a module called `name`
    pub async fn module_exists(&self, module: &NewModule) -> FlowResult<bool> {
        validation::validate_new_module(module)?;
        let found = self
            .store
            .find_modules(&ModuleFilter::named(&module.name, &module.owner))
            .await?;
        Ok(!found.is_empty())
    }

    /// Modules of `owner`, each with its nodes.
    ///
    /// A supplied token must be valid and issued to `owner`.
    pub async fn list_modules(
        &self,
        owner: &str,
        token: Option<&str>,
    ) -> FlowResult<Vec<ModuleSummary>> {
        let mut errs = FieldErrors::new();
        errs.require("username", owner);
        errs.result()?;

        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            let claims = self
                .tokens
                .verify(token)
                .map_err(|e| FlowError::Token(e.to_string()))?;
            if claims.username != owner {
                return Err(FlowError::Token(format!(
                    "token was issued to '{}'",
                    claims.username
                )));
            }
        }

        let modules = self
            .store
            .find_modules(&ModuleFilter::owned_by(owner))
            .await?;
        let mut summaries = Vec::with_capacity(modules.len());
        for module in modules {
            let nodes = self
                .store
                .find_nodes(&NodeFilter::in_module(module.id.clone()))
                .await?;
            summaries.push(ModuleSummary {
                id: module.id,
                name: module.name,
                nodes,
            });
        }
        Ok(summaries)
    }

    /// Every node of a module; empty for an unknown module
    pub async fn list_nodes(&self, module: &ModuleId) -> FlowResult<Vec<Node>> {
        Ok(self
            .store
            .find_nodes(&NodeFilter::in_module(module.clone()))
            .await?)
    }

    pub async fn delete_module(&self, id: &ModuleId) -> FlowResult<usize> {
        self.cascade.delete_module(id).await
    }

    pub async fn clear_module(&self, id: &ModuleId) -> FlowResult<usize> {
        self.cascade.clear_module(id).await
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Create a node and return it fully expanded
    pub async fn create_node(&self, node: &NewNode) -> FlowResult<Node> {
        validation::validate_new_node(node)?;
        let id = self.store.create_node(node).await?;

        let filter = NodeFilter::in_module(node.module_id.clone()).with_seq(node.seq);
        let created = self
            .store
            .find_nodes(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::NotFound(format!("Node '{}' not found", id)))?;
        tracing::info!(
            "Created node {} '{}' in module {}",
            created.id,
            created.name,
            created.module_id
        );
        Ok(created)
    }

    pub async fn update_node_position(&self, id: &NodeId, position: Position) -> FlowResult<()> {
        validation::validate_position(&position)?;
        if !self.store.update_node_position(id, position).await? {
            return Err(FlowError::NotFound(format!("Node '{}' not found", id)));
        }
        Ok(())
    }

    pub async fn update_node_data(&self, id: &DataId, fields: &DataFields) -> FlowResult<()> {
        let mut errs = FieldErrors::new();
        errs.require("id", id.as_str());
        errs.result()?;

        if !self.store.update_data(id, fields).await? {
            return Err(FlowError::NotFound(format!("Data '{}' not found", id)));
        }
        Ok(())
    }

    /// Delete a node by id; the stored tree decides what goes
    pub async fn delete_node(&self, id: &NodeId) -> FlowResult<usize> {
        self.cascade.delete_node_by_id(id).await
    }

    // ========================================================================
    // Connections
    // ========================================================================

    pub async fn connect(&self, request: &WireRequest) -> FlowResult<ConnectionPair> {
        let wire = validation::validate_wire(request)?;
        self.pairing.create_pair(&wire).await
    }

    pub async fn disconnect(&self, request: &WireRequest) -> FlowResult<()> {
        let wire = validation::validate_wire(request)?;
        self.pairing.delete_pair(&wire).await
    }
}

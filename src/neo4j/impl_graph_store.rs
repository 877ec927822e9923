//! `GraphStore` implementation for `Neo4jClient`.
//!
//! Every method simply delegates to the corresponding inherent method on `Neo4jClient`.

use async_trait::async_trait;

use super::client::Neo4jClient;
use super::models::*;
use super::traits::{GraphStore, StoreResult};

#[async_trait]
impl GraphStore for Neo4jClient {
    // ========================================================================
    // Users
    // ========================================================================

    async fn create_user(&self, user: &NewUser) -> StoreResult<UserId> {
        self.create_user(user).await
    }

    async fn find_users(&self, username: &str) -> StoreResult<Vec<User>> {
        self.find_users(username).await
    }

    // ========================================================================
    // Modules
    // ========================================================================

    async fn create_module(&self, module: &NewModule) -> StoreResult<ModuleId> {
        self.create_module(module).await
    }

    async fn find_modules(&self, filter: &ModuleFilter) -> StoreResult<Vec<Module>> {
        self.find_modules(filter).await
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    async fn create_node(&self, node: &NewNode) -> StoreResult<NodeId> {
        self.create_node(node).await
    }

    async fn find_nodes(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        self.find_nodes(filter).await
    }

    async fn update_node_position(&self, id: &NodeId, position: Position) -> StoreResult<bool> {
        self.update_node_position(id, position).await
    }

    async fn update_data(&self, id: &DataId, fields: &DataFields) -> StoreResult<bool> {
        self.update_data(id, fields).await
    }

    // ========================================================================
    // Connections
    // ========================================================================

    async fn create_connection_pair(&self, wire: &Wire) -> StoreResult<ConnectionPair> {
        self.create_connection_pair(wire).await
    }

    async fn detach_connections(&self, memberships: &[Membership]) -> StoreResult<usize> {
        self.detach_connections(memberships).await
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    async fn delete_by_id(&self, entity: &EntityRef) -> StoreResult<bool> {
        self.delete_by_id(entity).await
    }

    async fn delete_batch(&self, set: &DeletionSet) -> StoreResult<usize> {
        self.delete_batch(set).await
    }

    async fn health_check(&self) -> bool {
        self.health_check().await
    }
}

//! GraphStore trait definition
//!
//! The typed primitives every higher layer is built from. `Neo4jClient` implements
//! them with Cypher; the test-only `MockGraphStore` implements them in memory.
//! Each method is one store transaction.

use crate::neo4j::error::StoreError;
use crate::neo4j::models::*;
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait GraphStore: Send + Sync {
    // ========================================================================
    // Users
    // ========================================================================

    /// Register a user; a taken username is a `Conflict`
    async fn create_user(&self, user: &NewUser) -> StoreResult<UserId>;

    /// Users with exactly this username (zero or one)
    async fn find_users(&self, username: &str) -> StoreResult<Vec<User>>;

    // ========================================================================
    // Modules
    // ========================================================================

    async fn create_module(&self, module: &NewModule) -> StoreResult<ModuleId>;

    /// Modules matching every set field of `filter`
    async fn find_modules(&self, filter: &ModuleFilter) -> StoreResult<Vec<Module>>;

    // ========================================================================
    // Nodes
    // ========================================================================

    /// Create a node with its Data record and both (empty) slot containers.
    ///
    /// Fails with `NotFound` when the module is missing and `Conflict` when
    /// `(module_id, seq)` is already taken.
    async fn create_node(&self, node: &NewNode) -> StoreResult<NodeId>;

    /// Fully expanded nodes matching `filter`, ordered by `seq`.
    ///
    /// An unrestricted filter matches nothing.
    async fn find_nodes(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>>;

    /// Overwrite the coordinates only; `false` when the node does not exist
    async fn update_node_position(&self, id: &NodeId, position: Position) -> StoreResult<bool>;

    /// Overwrite the Data fields only; `false` when the record does not exist
    async fn update_data(&self, id: &DataId, fields: &DataFields) -> StoreResult<bool>;

    // ========================================================================
    // Connections
    // ========================================================================

    /// Write both halves of a wire, creating the slot groups on demand
    async fn create_connection_pair(&self, wire: &Wire) -> StoreResult<ConnectionPair>;

    /// Remove connections from their groups and delete them, all or nothing
    async fn detach_connections(&self, memberships: &[Membership]) -> StoreResult<usize>;

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete exactly one entity, without cascading
    async fn delete_by_id(&self, entity: &EntityRef) -> StoreResult<bool>;

    /// Delete every id of `set` in one transaction; returns the number removed
    async fn delete_batch(&self, set: &DeletionSet) -> StoreResult<usize>;

    async fn health_check(&self) -> bool;
}

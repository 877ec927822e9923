//! Constraint and index declarations for the flow graph

use super::error::StoreError;
use super::session::SessionPool;
use neo4rs::query;

/// Ordered list of idempotent schema statements
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub constraints: Vec<&'static str>,
    pub indexes: Vec<&'static str>,
}

impl SchemaDefinition {
    pub fn flow_editor() -> Self {
        Self {
            constraints: vec![
                "CREATE CONSTRAINT user_id IF NOT EXISTS FOR (u:User) REQUIRE u.id IS UNIQUE",
                "CREATE CONSTRAINT user_username IF NOT EXISTS FOR (u:User) REQUIRE u.username IS UNIQUE",
                "CREATE CONSTRAINT module_id IF NOT EXISTS FOR (m:Module) REQUIRE m.id IS UNIQUE",
                "CREATE CONSTRAINT node_id IF NOT EXISTS FOR (n:Node) REQUIRE n.id IS UNIQUE",
                "CREATE CONSTRAINT data_id IF NOT EXISTS FOR (d:Data) REQUIRE d.id IS UNIQUE",
                "CREATE CONSTRAINT slots_id IF NOT EXISTS FOR (s:Slots) REQUIRE s.id IS UNIQUE",
                "CREATE CONSTRAINT group_id IF NOT EXISTS FOR (g:ConnectionGroup) REQUIRE g.id IS UNIQUE",
                "CREATE CONSTRAINT connection_id IF NOT EXISTS FOR (c:Connection) REQUIRE c.id IS UNIQUE",
                "CREATE CONSTRAINT node_module_seq IF NOT EXISTS FOR (n:Node) REQUIRE (n.module_id, n.seq) IS UNIQUE",
            ],
            indexes: vec![
                "CREATE INDEX module_name IF NOT EXISTS FOR (m:Module) ON (m.name)",
                "CREATE INDEX module_owner IF NOT EXISTS FOR (m:Module) ON (m.owner)",
                "CREATE INDEX node_module IF NOT EXISTS FOR (n:Node) ON (n.module_id)",
            ],
        }
    }

    /// Constraints first, since a constraint brings its own backing index
    pub fn statements(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constraints.iter().chain(self.indexes.iter()).copied()
    }
}

/// Apply every statement of `schema`. Safe to call repeatedly.
pub async fn ensure_schema(pool: &SessionPool, schema: &SchemaDefinition) -> Result<(), StoreError> {
    let mut applied = 0usize;
    for statement in schema.statements() {
        match pool.run_standalone(query(statement)).await {
            Ok(()) => applied += 1,
            Err(e) if is_equivalent_rule(&e.to_string()) => {
                tracing::warn!("Schema rule already present, skipping: {}", statement);
            }
            Err(e) => {
                return Err(StoreError::Schema(format!("{}: {}", statement, e)));
            }
        }
    }
    tracing::info!("Schema ensured ({} statements applied)", applied);
    Ok(())
}

/// Older servers reject `IF NOT EXISTS` duplicates under a different name
fn is_equivalent_rule(message: &str) -> bool {
    message.contains("EquivalentSchemaRuleAlreadyExists")
        || message.contains("IndexAlreadyExists")
        || message.contains("ConstraintAlreadyExists")
}

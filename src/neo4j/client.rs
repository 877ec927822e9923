//! Neo4j client for the flow graph

use super::error::{is_constraint_violation, is_transient, StoreError};
use super::models::*;
use super::schema::{ensure_schema, SchemaDefinition};
use super::session::{SessionPool, StoreSession, StoreSettings};
use super::traits::StoreResult;
use neo4rs::{query, BoltType, Query, Row};
use serde::Deserialize;
use std::fmt::Display;

/// Client for Neo4j operations
pub struct Neo4jClient {
    pool: SessionPool,
}

/// Builder for dynamic WHERE clauses with bound parameters
#[derive(Default)]
pub struct WhereBuilder {
    conditions: Vec<String>,
    params: Vec<(String, BoltType)>,
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `alias.property = $property`
    pub fn add_eq(
        &mut self,
        alias: &str,
        property: &str,
        value: Option<impl Into<BoltType>>,
    ) -> &mut Self {
        if let Some(value) = value {
            self.conditions
                .push(format!("{}.{} = ${}", alias, property, property));
            self.params.push((property.to_string(), value.into()));
        }
        self
    }

    /// `alias.property IN $param`; an empty list adds nothing
    pub fn add_in(&mut self, alias: &str, property: &str, param: &str, values: Vec<String>) -> &mut Self {
        if !values.is_empty() {
            self.conditions
                .push(format!("{}.{} IN ${}", alias, property, param));
            self.params.push((param.to_string(), values.into()));
        }
        self
    }

    /// Build the WHERE clause (returns empty string if no conditions)
    pub fn build(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Bind the collected parameters onto `q`
    pub fn bind(self, q: Query) -> Query {
        self.params
            .into_iter()
            .fold(q, |q, (name, value)| q.param(&name, value))
    }
}

fn read_failed(e: neo4rs::Error) -> StoreError {
    if is_transient(&e) {
        StoreError::Transient {
            attempts: 1,
            message: e.to_string(),
        }
    } else {
        StoreError::Query(e.to_string())
    }
}

fn write_failed(e: neo4rs::Error) -> StoreError {
    if is_constraint_violation(&e) {
        StoreError::Conflict(e.to_string())
    } else if is_transient(&e) {
        StoreError::Transient {
            attempts: 1,
            message: e.to_string(),
        }
    } else {
        StoreError::Write(e.to_string())
    }
}

fn decode_failed(e: impl Display) -> StoreError {
    StoreError::Decode(e.to_string())
}

fn count_column(rows: &[Row], column: &str) -> StoreResult<i64> {
    match rows.first() {
        Some(row) => row.get::<i64>(column).map_err(decode_failed),
        None => Ok(0),
    }
}

// ============================================================================
// Node tree decoding
// ============================================================================

/// Nested map projection of one node, as returned by `find_nodes`
#[derive(Debug, Deserialize)]
struct NodeRecord {
    id: NodeId,
    module_id: ModuleId,
    seq: i64,
    name: Option<String>,
    class: Option<String>,
    html: Option<String>,
    typenode: Option<bool>,
    pos_x: Option<f64>,
    pos_y: Option<f64>,
    data: Option<DataRecord>,
    #[serde(default)]
    containers: Vec<ContainerRecord>,
}

#[derive(Debug, Deserialize)]
struct DataRecord {
    id: DataId,
    name: Option<String>,
    value: Option<String>,
    operator: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerRecord {
    id: SlotsId,
    direction: String,
    #[serde(default)]
    groups: Vec<GroupRecord>,
}

#[derive(Debug, Deserialize)]
struct GroupRecord {
    label: SlotLabel,
    id: GroupId,
    #[serde(default)]
    connections: Vec<ConnectionRecord>,
}

#[derive(Debug, Deserialize)]
struct ConnectionRecord {
    id: ConnectionId,
    peer_node: NodeId,
    peer_slot: SlotLabel,
}

impl TryFrom<NodeRecord> for Node {
    type Error = StoreError;

    fn try_from(record: NodeRecord) -> Result<Self, Self::Error> {
        let mut inputs: Option<SlotContainer> = None;
        let mut outputs: Option<SlotContainer> = None;
        let mut strays = Strays::default();

        for container in record.containers {
            let direction: SlotDirection = container.direction.parse().map_err(decode_failed)?;
            let mut decoded = SlotContainer::empty(container.id.clone(), direction);
            for group in container.groups {
                let label = group.label;
                let built = ConnectionGroup {
                    connections: group
                        .connections
                        .into_iter()
                        .map(|c| Connection {
                            id: c.id,
                            peer_node: c.peer_node,
                            peer_slot: c.peer_slot,
                            group: group.id.clone(),
                        })
                        .collect(),
                    id: group.id,
                };
                let slot = decoded.slot_mut(label).ok_or_else(|| {
                    StoreError::Decode(format!(
                        "node {}: slot {} hangs off the {} container",
                        record.id, label, direction
                    ))
                })?;
                if slot.group.is_none() {
                    slot.group = Some(built);
                    continue;
                }
                tracing::warn!(
                    "Node {} slot {} holds more than one group; keeping {} as stray",
                    record.id,
                    label,
                    built.id
                );
                strays.groups.push(StrayGroup {
                    container: container.id.clone(),
                    label,
                    group: built,
                });
            }

            let target = match decoded.direction {
                SlotDirection::Input => &mut inputs,
                SlotDirection::Output => &mut outputs,
            };
            if target.is_some() {
                tracing::warn!(
                    "Node {} has a second {} container {}; keeping it as stray",
                    record.id,
                    decoded.direction,
                    decoded.id
                );
                strays.containers.push(decoded);
                continue;
            }
            *target = Some(decoded);
        }

        Ok(Node {
            id: record.id,
            module_id: record.module_id,
            seq: record.seq,
            name: record.name.unwrap_or_default(),
            class: record.class.unwrap_or_default(),
            html: record.html.unwrap_or_default(),
            typenode: record.typenode.unwrap_or_default(),
            pos_x: record.pos_x.unwrap_or_default(),
            pos_y: record.pos_y.unwrap_or_default(),
            data: record.data.map(|d| Data {
                id: d.id,
                name: d.name.unwrap_or_default(),
                value: d.value.unwrap_or_default(),
                operator: d.operator.unwrap_or_default(),
            }),
            inputs,
            outputs,
            strays,
        })
    }
}

/// Expands each matched `n` into the full ownership tree in one round trip
const NODE_TREE_PROJECTION: &str = r#"
    CALL {
        WITH n
        OPTIONAL MATCH (n)-[:HAS_DATA]->(d:Data)
        RETURN head(collect(d {.id, .name, .value, .operator})) AS data
    }
    CALL {
        WITH n
        OPTIONAL MATCH (n)-[:HAS_SLOTS]->(s:Slots)
        CALL {
            WITH s
            OPTIONAL MATCH (s)-[r:SLOT]->(g:ConnectionGroup)
            OPTIONAL MATCH (g)-[:HAS_CONNECTION]->(c:Connection)
            WITH r, g, collect(c {.id, .peer_node, .peer_slot}) AS connections
            RETURN collect(
                CASE WHEN g IS NULL THEN null
                ELSE {label: r.label, id: g.id, connections: connections} END
            ) AS groups
        }
        RETURN collect(
            CASE WHEN s IS NULL THEN null
            ELSE {id: s.id, direction: s.direction, groups: groups} END
        ) AS containers
    }
    RETURN n {
        .id, .module_id, .seq, .name, .class, .html, .typenode, .pos_x, .pos_y,
        data: data,
        containers: containers
    } AS node
    ORDER BY n.seq
"#;

impl Neo4jClient {
    /// Connect and make sure the schema is in place
    pub async fn new(settings: &StoreSettings) -> StoreResult<Self> {
        let client = Self::connect(settings).await?;
        client.init_schema().await?;
        Ok(client)
    }

    /// Connect without touching the schema
    pub async fn connect(settings: &StoreSettings) -> StoreResult<Self> {
        let pool = SessionPool::connect(settings).await?;
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        ensure_schema(&self.pool, &SchemaDefinition::flow_editor()).await
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn create_user(&self, user: &NewUser) -> StoreResult<UserId> {
        let mut session = self.pool.acquire().await?;
        let outcome = Self::create_user_in(&mut session, user).await;
        session.finish(outcome).await
    }

    async fn create_user_in(session: &mut StoreSession, user: &NewUser) -> StoreResult<UserId> {
        let existing = session
            .fetch(
                query("MATCH (u:User {username: $username}) RETURN u.id AS id")
                    .param("username", user.username.as_str()),
            )
            .await
            .map_err(read_failed)?;
        if !existing.is_empty() {
            return Err(StoreError::Conflict(format!(
                "username '{}' is already registered",
                user.username
            )));
        }

        let rows = session
            .fetch(
                query(
                    r#"
                    CREATE (u:User {id: randomUUID(), username: $username, password: $password})
                    RETURN u.id AS id
                    "#,
                )
                .param("username", user.username.as_str())
                .param("password", user.password.as_str()),
            )
            .await
            .map_err(write_failed)?;

        let row = rows
            .first()
            .ok_or_else(|| StoreError::Write("user creation returned no id".to_string()))?;
        let id: String = row.get("id").map_err(decode_failed)?;
        tracing::debug!("Created user {} ({})", user.username, id);
        Ok(UserId::new(id))
    }

    pub async fn find_users(&self, username: &str) -> StoreResult<Vec<User>> {
        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session
                .fetch(
                    query(
                        "MATCH (u:User {username: $username}) RETURN u {.id, .username, .password} AS user",
                    )
                    .param("username", username),
                )
                .await
                .map_err(read_failed)?;
            rows.iter()
                .map(|row| row.get::<User>("user").map_err(decode_failed))
                .collect::<StoreResult<Vec<User>>>()
        }
        .await;
        session.finish(outcome).await
    }

    // ========================================================================
    // Modules
    // ========================================================================

    pub async fn create_module(&self, module: &NewModule) -> StoreResult<ModuleId> {
        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session
                .fetch(
                    query(
                        r#"
                        CREATE (m:Module {id: randomUUID(), owner: $owner, name: $name})
                        RETURN m.id AS id
                        "#,
                    )
                    .param("owner", module.owner.as_str())
                    .param("name", module.name.as_str()),
                )
                .await
                .map_err(write_failed)?;
            let row = rows
                .first()
                .ok_or_else(|| StoreError::Write("module creation returned no id".to_string()))?;
            let id: String = row.get("id").map_err(decode_failed)?;
            Ok::<_, StoreError>(ModuleId::new(id))
        }
        .await;
        let id = session.finish(outcome).await?;
        tracing::debug!("Created module {} '{}' for {}", id, module.name, module.owner);
        Ok(id)
    }

    pub async fn find_modules(&self, filter: &ModuleFilter) -> StoreResult<Vec<Module>> {
        let mut wb = WhereBuilder::new();
        wb.add_eq("m", "id", filter.id.as_ref().map(|id| id.to_string()))
            .add_eq("m", "name", filter.name.clone())
            .add_eq("m", "owner", filter.owner.clone());

        let cypher = format!(
            "MATCH (m:Module) {} RETURN m {{.id, .owner, .name}} AS module ORDER BY m.name, m.id",
            wb.build()
        );
        let q = wb.bind(query(&cypher));

        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session.fetch(q).await.map_err(read_failed)?;
            rows.iter()
                .map(|row| row.get::<Module>("module").map_err(decode_failed))
                .collect::<StoreResult<Vec<Module>>>()
        }
        .await;
        session.finish(outcome).await
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    pub async fn create_node(&self, node: &NewNode) -> StoreResult<NodeId> {
        let mut session = self.pool.acquire().await?;
        let outcome = Self::create_node_in(&mut session, node).await;
        let id = session.finish(outcome).await?;
        tracing::debug!(
            "Created node {} (module {}, seq {})",
            id,
            node.module_id,
            node.seq
        );
        Ok(id)
    }

    async fn create_node_in(session: &mut StoreSession, node: &NewNode) -> StoreResult<NodeId> {
        let check = session
            .fetch(
                query(
                    r#"
                    OPTIONAL MATCH (m:Module {id: $module_id})
                    OPTIONAL MATCH (taken:Node {module_id: $module_id, seq: $seq})
                    RETURN m IS NOT NULL AS module_exists, count(taken) AS taken
                    "#,
                )
                .param("module_id", node.module_id.as_str())
                .param("seq", node.seq),
            )
            .await
            .map_err(read_failed)?;

        let row = check
            .first()
            .ok_or_else(|| StoreError::Query("node pre-check returned no row".to_string()))?;
        let module_exists: bool = row.get("module_exists").map_err(decode_failed)?;
        let taken: i64 = row.get("taken").map_err(decode_failed)?;
        if !module_exists {
            return Err(StoreError::not_found("Module", node.module_id.as_str()));
        }
        if taken > 0 {
            return Err(StoreError::Conflict(format!(
                "module {} already has a node with seq {}",
                node.module_id, node.seq
            )));
        }

        let rows = session
            .fetch(
                query(
                    r#"
                    MATCH (m:Module {id: $module_id})
                    CREATE (m)-[:HAS_NODE]->(n:Node {
                        id: randomUUID(),
                        module_id: $module_id,
                        seq: $seq,
                        name: $name,
                        class: $class,
                        html: $html,
                        typenode: $typenode,
                        pos_x: $pos_x,
                        pos_y: $pos_y
                    })
                    CREATE (n)-[:HAS_DATA]->(:Data {
                        id: randomUUID(),
                        name: $data_name,
                        value: $data_value,
                        operator: $data_operator
                    })
                    CREATE (n)-[:HAS_SLOTS]->(:Slots {id: randomUUID(), direction: 'input'})
                    CREATE (n)-[:HAS_SLOTS]->(:Slots {id: randomUUID(), direction: 'output'})
                    RETURN n.id AS id
                    "#,
                )
                .param("module_id", node.module_id.as_str())
                .param("seq", node.seq)
                .param("name", node.name.as_str())
                .param("class", node.class.as_str())
                .param("html", node.html.as_str())
                .param("typenode", node.typenode)
                .param("pos_x", node.pos_x)
                .param("pos_y", node.pos_y)
                .param("data_name", node.data.name.as_str())
                .param("data_value", node.data.value.as_str())
                .param("data_operator", node.data.operator.as_str()),
            )
            .await
            .map_err(write_failed)?;

        let row = rows
            .first()
            .ok_or_else(|| StoreError::not_found("Module", node.module_id.as_str()))?;
        let id: String = row.get("id").map_err(decode_failed)?;
        Ok(NodeId::new(id))
    }

    pub async fn find_nodes(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        if filter.is_unrestricted() {
            return Ok(Vec::new());
        }

        let mut wb = WhereBuilder::new();
        wb.add_in(
            "n",
            "id",
            "ids",
            filter.ids.iter().map(|id| id.to_string()).collect(),
        )
        .add_eq(
            "n",
            "module_id",
            filter.module_id.as_ref().map(|m| m.to_string()),
        )
        .add_eq("n", "seq", filter.seq);

        let cypher = format!("MATCH (n:Node) {} {}", wb.build(), NODE_TREE_PROJECTION);
        let q = wb.bind(query(&cypher));

        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session.fetch(q).await.map_err(read_failed)?;
            rows.iter()
                .map(|row| {
                    let record: NodeRecord = row.get("node").map_err(decode_failed)?;
                    Node::try_from(record)
                })
                .collect::<StoreResult<Vec<Node>>>()
        }
        .await;
        session.finish(outcome).await
    }

    pub async fn update_node_position(&self, id: &NodeId, position: Position) -> StoreResult<bool> {
        let q = query(
            r#"
            MATCH (n:Node {id: $id})
            SET n.pos_x = $pos_x, n.pos_y = $pos_y
            RETURN count(n) AS updated
            "#,
        )
        .param("id", id.as_str())
        .param("pos_x", position.pos_x)
        .param("pos_y", position.pos_y);

        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session.fetch(q).await.map_err(write_failed)?;
            Ok::<_, StoreError>(count_column(&rows, "updated")? > 0)
        }
        .await;
        session.finish(outcome).await
    }

    pub async fn update_data(&self, id: &DataId, fields: &DataFields) -> StoreResult<bool> {
        let q = query(
            r#"
            MATCH (d:Data {id: $id})
            SET d.name = $name, d.value = $value, d.operator = $operator
            RETURN count(d) AS updated
            "#,
        )
        .param("id", id.as_str())
        .param("name", fields.name.as_str())
        .param("value", fields.value.as_str())
        .param("operator", fields.operator.as_str());

        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session.fetch(q).await.map_err(write_failed)?;
            Ok::<_, StoreError>(count_column(&rows, "updated")? > 0)
        }
        .await;
        session.finish(outcome).await
    }

    // ========================================================================
    // Connections
    // ========================================================================

    pub async fn create_connection_pair(&self, wire: &Wire) -> StoreResult<ConnectionPair> {
        let q = query(
            r#"
            MATCH (:Node {id: $out_node})-[:HAS_SLOTS]->(outs:Slots {direction: 'output'})
            MATCH (:Node {id: $in_node})-[:HAS_SLOTS]->(ins:Slots {direction: 'input'})
            WITH outs, ins LIMIT 1
            MERGE (outs)-[:SLOT {label: $out_slot}]->(og:ConnectionGroup)
                ON CREATE SET og.id = randomUUID()
            WITH ins, og LIMIT 1
            MERGE (ins)-[:SLOT {label: $in_slot}]->(ig:ConnectionGroup)
                ON CREATE SET ig.id = randomUUID()
            WITH og, ig LIMIT 1
            CREATE (og)-[:HAS_CONNECTION]->(oc:Connection {
                id: randomUUID(), peer_node: $in_node, peer_slot: $in_slot
            })
            CREATE (ig)-[:HAS_CONNECTION]->(ic:Connection {
                id: randomUUID(), peer_node: $out_node, peer_slot: $out_slot
            })
            RETURN oc.id AS output, ic.id AS input
            "#,
        )
        .param("out_node", wire.output.node.as_str())
        .param("out_slot", wire.output.slot.to_string())
        .param("in_node", wire.input.node.as_str())
        .param("in_slot", wire.input.slot.to_string());

        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session.fetch(q).await.map_err(write_failed)?;
            let row = rows.first().ok_or_else(|| {
                StoreError::not_found(
                    "Slots",
                    format!("{} / {}", wire.output.node, wire.input.node),
                )
            })?;
            let output: String = row.get("output").map_err(decode_failed)?;
            let input: String = row.get("input").map_err(decode_failed)?;
            Ok::<_, StoreError>(ConnectionPair {
                output: ConnectionId::new(output),
                input: ConnectionId::new(input),
            })
        }
        .await;
        let pair = session.finish(outcome).await?;
        tracing::debug!(
            "Wired {}:{} -> {}:{} ({} / {})",
            wire.output.node,
            wire.output.slot,
            wire.input.node,
            wire.input.slot,
            pair.output,
            pair.input
        );
        Ok(pair)
    }

    pub async fn detach_connections(&self, memberships: &[Membership]) -> StoreResult<usize> {
        if memberships.is_empty() {
            return Ok(0);
        }

        let groups: Vec<String> = memberships.iter().map(|m| m.group.to_string()).collect();
        let connections: Vec<String> = memberships
            .iter()
            .map(|m| m.connection.to_string())
            .collect();
        let q = query(
            r#"
            UNWIND range(0, size($groups) - 1) AS i
            MATCH (:ConnectionGroup {id: $groups[i]})-[:HAS_CONNECTION]->(c:Connection {id: $connections[i]})
            WITH DISTINCT c
            DETACH DELETE c
            RETURN count(*) AS removed
            "#,
        )
        .param("groups", groups)
        .param("connections", connections);

        let expected = memberships.len();
        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session.fetch(q).await.map_err(write_failed)?;
            let removed = count_column(&rows, "removed")? as usize;
            if removed != expected {
                return Err(StoreError::Write(format!(
                    "expected to detach {} connection(s), found {}",
                    expected, removed
                )));
            }
            Ok::<_, StoreError>(removed)
        }
        .await;
        session.finish(outcome).await
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    pub async fn delete_by_id(&self, entity: &EntityRef) -> StoreResult<bool> {
        let cypher = format!(
            "MATCH (n:{} {{id: $id}}) DETACH DELETE n RETURN count(*) AS removed",
            entity.label()
        );
        let q = query(&cypher).param("id", entity.id());

        let mut session = self.pool.acquire().await?;
        let outcome = async {
            let rows = session.fetch(q).await.map_err(write_failed)?;
            Ok::<_, StoreError>(count_column(&rows, "removed")? > 0)
        }
        .await;
        session.finish(outcome).await
    }

    pub async fn delete_batch(&self, set: &DeletionSet) -> StoreResult<usize> {
        if set.is_empty() {
            return Ok(0);
        }

        let mut session = self.pool.acquire().await?;
        let outcome = Self::delete_batch_in(&mut session, set).await;
        let removed = session.finish(outcome).await?;
        tracing::debug!("Deleted {} entities in one batch", removed);
        Ok(removed)
    }

    async fn delete_batch_in(session: &mut StoreSession, set: &DeletionSet) -> StoreResult<usize> {
        let mut removed = 0usize;
        for (label, ids) in set.by_label() {
            let cypher = format!(
                "MATCH (n:{}) WHERE n.id IN $ids DETACH DELETE n RETURN count(*) AS removed",
                label
            );
            let rows = session
                .fetch(query(&cypher).param("ids", ids))
                .await
                .map_err(write_failed)?;
            removed += count_column(&rows, "removed")? as usize;
        }
        Ok(removed)
    }

    pub async fn health_check(&self) -> bool {
        self.pool.health_check().await
    }
}

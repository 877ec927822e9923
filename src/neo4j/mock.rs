//! In-memory mock implementation of GraphStore for testing.
//!
//! Entities are kept in the same normalized shape the Cypher schema uses: each
//! row points at its owner, and deleting a row does not touch its children.
//! That lets tests observe orphans exactly as they would appear in Neo4j.
//! A single `tokio::sync::RwLock` around the whole graph makes every trait
//! method atomic. Conditionally compiled with `#[cfg(test)]`.

use crate::neo4j::error::StoreError;
use crate::neo4j::models::*;
use crate::neo4j::traits::{GraphStore, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NodeRow {
    pub module_id: ModuleId,
    pub seq: i64,
    pub name: String,
    pub class: String,
    pub html: String,
    pub typenode: bool,
    pub pos_x: f64,
    pub pos_y: f64,
}

#[derive(Debug, Clone)]
pub struct DataRow {
    pub node: NodeId,
    pub name: String,
    pub value: String,
    pub operator: String,
}

#[derive(Debug, Clone)]
pub struct SlotsRow {
    pub node: NodeId,
    pub direction: SlotDirection,
}

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub slots: SlotsId,
    pub label: SlotLabel,
}

#[derive(Debug, Clone)]
pub struct ConnectionRow {
    pub group: GroupId,
    pub peer_node: NodeId,
    pub peer_slot: SlotLabel,
    /// Insertion order, so connections list the way they were created
    pub order: u64,
}

/// The whole in-memory graph
#[derive(Debug, Default)]
pub struct MockGraph {
    pub users: HashMap<UserId, User>,
    pub modules: HashMap<ModuleId, Module>,
    pub nodes: HashMap<NodeId, NodeRow>,
    pub data: HashMap<DataId, DataRow>,
    pub slots: HashMap<SlotsId, SlotsRow>,
    pub groups: HashMap<GroupId, GroupRow>,
    pub connections: HashMap<ConnectionId, ConnectionRow>,
    next_order: u64,
}

fn new_id<T: From<String>>() -> T {
    T::from(Uuid::new_v4().to_string())
}

impl MockGraph {
    fn assemble(&self, id: &NodeId) -> Option<Node> {
        let row = self.nodes.get(id)?;

        let data = self
            .data
            .iter()
            .find(|(_, d)| d.node == *id)
            .map(|(data_id, d)| Data {
                id: data_id.clone(),
                name: d.name.clone(),
                value: d.value.clone(),
                operator: d.operator.clone(),
            });

        let group_of = |group_id: &GroupId| {
            let mut connections: Vec<(u64, Connection)> = self
                .connections
                .iter()
                .filter(|(_, c)| c.group == *group_id)
                .map(|(conn_id, c)| {
                    (
                        c.order,
                        Connection {
                            id: conn_id.clone(),
                            peer_node: c.peer_node.clone(),
                            peer_slot: c.peer_slot,
                            group: group_id.clone(),
                        },
                    )
                })
                .collect();
            connections.sort_by_key(|(order, _)| *order);
            ConnectionGroup {
                id: group_id.clone(),
                connections: connections.into_iter().map(|(_, c)| c).collect(),
            }
        };

        let mut inputs: Option<SlotContainer> = None;
        let mut outputs: Option<SlotContainer> = None;
        let mut strays = Strays::default();

        let mut owned: Vec<(&SlotsId, &SlotsRow)> =
            self.slots.iter().filter(|(_, s)| s.node == *id).collect();
        owned.sort_by(|a, b| a.0.cmp(b.0));
        for (slots_id, slots) in owned {
            let mut built = SlotContainer::empty(slots_id.clone(), slots.direction);
            let mut groups: Vec<(&GroupId, &GroupRow)> = self
                .groups
                .iter()
                .filter(|(_, g)| g.slots == *slots_id)
                .collect();
            groups.sort_by(|a, b| a.0.cmp(b.0));
            for (group_id, group) in groups {
                let Some(slot) = built.slot_mut(group.label) else {
                    continue;
                };
                if slot.group.is_none() {
                    slot.group = Some(group_of(group_id));
                } else {
                    strays.groups.push(StrayGroup {
                        container: slots_id.clone(),
                        label: group.label,
                        group: group_of(group_id),
                    });
                }
            }
            let target = match slots.direction {
                SlotDirection::Input => &mut inputs,
                SlotDirection::Output => &mut outputs,
            };
            if target.is_some() {
                strays.containers.push(built);
            } else {
                *target = Some(built);
            }
        }

        Some(Node {
            id: id.clone(),
            module_id: row.module_id.clone(),
            seq: row.seq,
            name: row.name.clone(),
            class: row.class.clone(),
            html: row.html.clone(),
            typenode: row.typenode,
            pos_x: row.pos_x,
            pos_y: row.pos_y,
            data,
            inputs,
            outputs,
            strays,
        })
    }

    /// Store an already expanded node tree verbatim, ids included
    fn insert_tree(&mut self, node: &Node) {
        self.nodes.insert(
            node.id.clone(),
            NodeRow {
                module_id: node.module_id.clone(),
                seq: node.seq,
                name: node.name.clone(),
                class: node.class.clone(),
                html: node.html.clone(),
                typenode: node.typenode,
                pos_x: node.pos_x,
                pos_y: node.pos_y,
            },
        );
        if let Some(data) = &node.data {
            self.data.insert(
                data.id.clone(),
                DataRow {
                    node: node.id.clone(),
                    name: data.name.clone(),
                    value: data.value.clone(),
                    operator: data.operator.clone(),
                },
            );
        }
        for container in node.all_containers() {
            self.slots.insert(
                container.id.clone(),
                SlotsRow {
                    node: node.id.clone(),
                    direction: container.direction,
                },
            );
            for (label, group) in container.groups() {
                self.insert_group(&container.id, label, group);
            }
        }
        for stray in &node.strays.groups {
            self.insert_group(&stray.container, stray.label, &stray.group);
        }
    }

    fn insert_group(&mut self, slots: &SlotsId, label: SlotLabel, group: &ConnectionGroup) {
        self.groups.insert(
            group.id.clone(),
            GroupRow {
                slots: slots.clone(),
                label,
            },
        );
        for connection in &group.connections {
            self.push_connection(
                connection.id.clone(),
                group.id.clone(),
                connection.peer_node.clone(),
                connection.peer_slot,
            );
        }
    }

    fn push_connection(&mut self, id: ConnectionId, group: GroupId, peer_node: NodeId, peer_slot: SlotLabel) {
        self.next_order += 1;
        self.connections.insert(
            id,
            ConnectionRow {
                group,
                peer_node,
                peer_slot,
                order: self.next_order,
            },
        );
    }

    fn container_of(&self, node: &NodeId, direction: SlotDirection) -> Option<SlotsId> {
        self.slots
            .iter()
            .find(|(_, s)| s.node == *node && s.direction == direction)
            .map(|(id, _)| id.clone())
    }

    fn group_at(&mut self, slots: &SlotsId, label: SlotLabel) -> GroupId {
        if let Some((id, _)) = self
            .groups
            .iter()
            .find(|(_, g)| g.slots == *slots && g.label == label)
        {
            return id.clone();
        }
        let id: GroupId = new_id();
        self.groups.insert(
            id.clone(),
            GroupRow {
                slots: slots.clone(),
                label,
            },
        );
        id
    }

    fn remove(&mut self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::User(id) => self.users.remove(id).is_some(),
            EntityRef::Module(id) => self.modules.remove(id).is_some(),
            EntityRef::Node(id) => self.nodes.remove(id).is_some(),
            EntityRef::Data(id) => self.data.remove(id).is_some(),
            EntityRef::Slots(id) => self.slots.remove(id).is_some(),
            EntityRef::Group(id) => self.groups.remove(id).is_some(),
            EntityRef::Connection(id) => self.connections.remove(id).is_some(),
        }
    }

    fn entity_count(&self) -> usize {
        self.users.len()
            + self.modules.len()
            + self.nodes.len()
            + self.data.len()
            + self.slots.len()
            + self.groups.len()
            + self.connections.len()
    }

    fn orphan_count(&self) -> usize {
        let nodes = self
            .nodes
            .values()
            .filter(|n| !self.modules.contains_key(&n.module_id))
            .count();
        let data = self
            .data
            .values()
            .filter(|d| !self.nodes.contains_key(&d.node))
            .count();
        let slots = self
            .slots
            .values()
            .filter(|s| !self.nodes.contains_key(&s.node))
            .count();
        let groups = self
            .groups
            .values()
            .filter(|g| !self.slots.contains_key(&g.slots))
            .count();
        let connections = self
            .connections
            .values()
            .filter(|c| !self.groups.contains_key(&c.group))
            .count();
        nodes + data + slots + groups + connections
    }
}

/// In-memory mock implementation of GraphStore for testing.
#[derive(Default)]
pub struct MockGraphStore {
    pub graph: RwLock<MockGraph>,
    fail_next_write: AtomicBool,
    batch_calls: AtomicUsize,
}

impl MockGraphStore {
    /// Create a new empty MockGraphStore.
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Builder / seeding methods for tests
    // ========================================================================

    /// Seed a user with known credentials
    pub async fn with_user(self, username: &str, password: &str) -> Self {
        let id: UserId = new_id();
        self.graph.write().await.users.insert(
            id.clone(),
            User {
                id,
                username: username.to_string(),
                password: password.to_string(),
            },
        );
        self
    }

    /// Seed a module as-is
    pub async fn with_module(self, module: Module) -> Self {
        self.graph
            .write()
            .await
            .modules
            .insert(module.id.clone(), module);
        self
    }

    /// Seed an expanded node tree as-is, including damaged shapes
    pub async fn with_node(self, node: Node) -> Self {
        self.graph.write().await.insert_tree(&node);
        self
    }

    // ========================================================================
    // Inspection and failure injection
    // ========================================================================

    /// Make the next mutating call fail with a write error, changing nothing
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// How many times `delete_batch` has been called
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Total number of stored entities of every kind
    pub async fn entity_count(&self) -> usize {
        self.graph.read().await.entity_count()
    }

    /// Entities whose owner no longer exists
    pub async fn orphan_count(&self) -> usize {
        self.graph.read().await.orphan_count()
    }

    /// Connections anywhere in the graph whose peer is `node`
    pub async fn connections_to(&self, node: &NodeId) -> usize {
        self.graph
            .read()
            .await
            .connections
            .values()
            .filter(|c| c.peer_node == *node)
            .count()
    }

    fn injected_failure(&self) -> StoreResult<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Write("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GraphStore for MockGraphStore {
    // ========================================================================
    // Users
    // ========================================================================

    async fn create_user(&self, user: &NewUser) -> StoreResult<UserId> {
        self.injected_failure()?;
        let mut graph = self.graph.write().await;
        if graph.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "username '{}' is already registered",
                user.username
            )));
        }
        let id: UserId = new_id();
        graph.users.insert(
            id.clone(),
            User {
                id: id.clone(),
                username: user.username.clone(),
                password: user.password.clone(),
            },
        );
        Ok(id)
    }

    async fn find_users(&self, username: &str) -> StoreResult<Vec<User>> {
        Ok(self
            .graph
            .read()
            .await
            .users
            .values()
            .filter(|u| u.username == username)
            .cloned()
            .collect())
    }

    // ========================================================================
    // Modules
    // ========================================================================

    async fn create_module(&self, module: &NewModule) -> StoreResult<ModuleId> {
        self.injected_failure()?;
        let id: ModuleId = new_id();
        self.graph.write().await.modules.insert(
            id.clone(),
            Module {
                id: id.clone(),
                owner: module.owner.clone(),
                name: module.name.clone(),
            },
        );
        Ok(id)
    }

    async fn find_modules(&self, filter: &ModuleFilter) -> StoreResult<Vec<Module>> {
        let graph = self.graph.read().await;
        let mut modules: Vec<Module> = graph
            .modules
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(modules)
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    async fn create_node(&self, node: &NewNode) -> StoreResult<NodeId> {
        self.injected_failure()?;
        let mut graph = self.graph.write().await;
        if !graph.modules.contains_key(&node.module_id) {
            return Err(StoreError::not_found("Module", node.module_id.as_str()));
        }
        if graph
            .nodes
            .values()
            .any(|n| n.module_id == node.module_id && n.seq == node.seq)
        {
            return Err(StoreError::Conflict(format!(
                "module {} already has a node with seq {}",
                node.module_id, node.seq
            )));
        }

        let id: NodeId = new_id();
        graph.nodes.insert(
            id.clone(),
            NodeRow {
                module_id: node.module_id.clone(),
                seq: node.seq,
                name: node.name.clone(),
                class: node.class.clone(),
                html: node.html.clone(),
                typenode: node.typenode,
                pos_x: node.pos_x,
                pos_y: node.pos_y,
            },
        );
        graph.data.insert(
            new_id(),
            DataRow {
                node: id.clone(),
                name: node.data.name.clone(),
                value: node.data.value.clone(),
                operator: node.data.operator.clone(),
            },
        );
        for direction in [SlotDirection::Input, SlotDirection::Output] {
            graph.slots.insert(
                new_id(),
                SlotsRow {
                    node: id.clone(),
                    direction,
                },
            );
        }
        Ok(id)
    }

    async fn find_nodes(&self, filter: &NodeFilter) -> StoreResult<Vec<Node>> {
        if filter.is_unrestricted() {
            return Ok(Vec::new());
        }
        let graph = self.graph.read().await;
        let mut nodes: Vec<Node> = graph
            .nodes
            .keys()
            .filter_map(|id| graph.assemble(id))
            .filter(|n| filter.matches(n))
            .collect();
        nodes.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.id.cmp(&b.id)));
        Ok(nodes)
    }

    async fn update_node_position(&self, id: &NodeId, position: Position) -> StoreResult<bool> {
        self.injected_failure()?;
        let mut graph = self.graph.write().await;
        Ok(match graph.nodes.get_mut(id) {
            Some(row) => {
                row.pos_x = position.pos_x;
                row.pos_y = position.pos_y;
                true
            }
            None => false,
        })
    }

    async fn update_data(&self, id: &DataId, fields: &DataFields) -> StoreResult<bool> {
        self.injected_failure()?;
        let mut graph = self.graph.write().await;
        Ok(match graph.data.get_mut(id) {
            Some(row) => {
                row.name = fields.name.clone();
                row.value = fields.value.clone();
                row.operator = fields.operator.clone();
                true
            }
            None => false,
        })
    }

    // ========================================================================
    // Connections
    // ========================================================================

    async fn create_connection_pair(&self, wire: &Wire) -> StoreResult<ConnectionPair> {
        self.injected_failure()?;
        let mut graph = self.graph.write().await;
        let missing = || {
            StoreError::not_found(
                "Slots",
                format!("{} / {}", wire.output.node, wire.input.node),
            )
        };
        let out_slots = graph
            .container_of(&wire.output.node, SlotDirection::Output)
            .ok_or_else(missing)?;
        let in_slots = graph
            .container_of(&wire.input.node, SlotDirection::Input)
            .ok_or_else(missing)?;

        let out_group = graph.group_at(&out_slots, wire.output.slot);
        let in_group = graph.group_at(&in_slots, wire.input.slot);

        let output: ConnectionId = new_id();
        let input: ConnectionId = new_id();
        graph.push_connection(
            output.clone(),
            out_group,
            wire.input.node.clone(),
            wire.input.slot,
        );
        graph.push_connection(
            input.clone(),
            in_group,
            wire.output.node.clone(),
            wire.output.slot,
        );
        Ok(ConnectionPair { output, input })
    }

    async fn detach_connections(&self, memberships: &[Membership]) -> StoreResult<usize> {
        if memberships.is_empty() {
            return Ok(0);
        }
        self.injected_failure()?;
        let mut graph = self.graph.write().await;
        let all_present = memberships.iter().all(|m| {
            graph
                .connections
                .get(&m.connection)
                .is_some_and(|c| c.group == m.group)
        });
        if !all_present {
            return Err(StoreError::Write(format!(
                "expected to detach {} connection(s), some were missing",
                memberships.len()
            )));
        }
        for m in memberships {
            graph.connections.remove(&m.connection);
        }
        Ok(memberships.len())
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    async fn delete_by_id(&self, entity: &EntityRef) -> StoreResult<bool> {
        self.injected_failure()?;
        Ok(self.graph.write().await.remove(entity))
    }

    async fn delete_batch(&self, set: &DeletionSet) -> StoreResult<usize> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if set.is_empty() {
            return Ok(0);
        }
        self.injected_failure()?;
        let mut graph = self.graph.write().await;
        let refs = set
            .connections
            .iter()
            .cloned()
            .map(EntityRef::Connection)
            .chain(set.groups.iter().cloned().map(EntityRef::Group))
            .chain(set.slots.iter().cloned().map(EntityRef::Slots))
            .chain(set.data.iter().cloned().map(EntityRef::Data))
            .chain(set.nodes.iter().cloned().map(EntityRef::Node))
            .chain(set.modules.iter().cloned().map(EntityRef::Module));
        let mut removed = 0;
        for entity in refs {
            if graph.remove(&entity) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{new_node, wire};

    async fn store_with_module() -> (MockGraphStore, ModuleId) {
        let store = MockGraphStore::new();
        let module = store
            .create_module(&NewModule {
                name: "flow".into(),
                owner: "alice".into(),
            })
            .await
            .unwrap();
        (store, module)
    }

    #[tokio::test]
    async fn test_create_node_builds_full_tree() {
        let (store, module) = store_with_module().await;
        let id = store.create_node(&new_node(&module, 1)).await.unwrap();

        let nodes = store.find_nodes(&NodeFilter::by_id(id)).await.unwrap();
        assert_eq!(nodes.len(), 1);
        let node = &nodes[0];
        assert!(node.data.is_some());
        assert!(node.inputs.is_some());
        assert!(node.outputs.is_some());
        assert_eq!(node.containers().map(|c| c.connection_count()).sum::<usize>(), 0);
    }

    #[tokio::test]
    async fn test_create_node_duplicate_seq_conflicts() {
        let (store, module) = store_with_module().await;
        store.create_node(&new_node(&module, 1)).await.unwrap();
        let before = store.entity_count().await;

        let err = store.create_node(&new_node(&module, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.entity_count().await, before);
    }

    #[tokio::test]
    async fn test_create_node_requires_module() {
        let store = MockGraphStore::new();
        let err = store
            .create_node(&new_node(&ModuleId::new("missing"), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "Module", .. }));
    }

    #[tokio::test]
    async fn test_connection_pair_reuses_groups() {
        let (store, module) = store_with_module().await;
        let a = store.create_node(&new_node(&module, 1)).await.unwrap();
        let b = store.create_node(&new_node(&module, 2)).await.unwrap();
        let c = store.create_node(&new_node(&module, 3)).await.unwrap();

        store
            .create_connection_pair(&wire(&a, 1, &b, 1))
            .await
            .unwrap();
        store
            .create_connection_pair(&wire(&a, 1, &c, 2))
            .await
            .unwrap();

        let a_node = &store.find_nodes(&NodeFilter::by_id(a)).await.unwrap()[0];
        let out = a_node.connections_at(SlotLabel::output(1).unwrap());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].group, out[1].group);
        assert_eq!(out[0].peer_node, b);
        assert_eq!(out[1].peer_node, c);
    }

    #[tokio::test]
    async fn test_failed_batch_changes_nothing() {
        let (store, module) = store_with_module().await;
        let id = store.create_node(&new_node(&module, 1)).await.unwrap();
        let before = store.entity_count().await;

        let mut set = DeletionSet::new();
        set.nodes.insert(id);
        store.fail_next_write();
        assert!(store.delete_batch(&set).await.is_err());
        assert_eq!(store.entity_count().await, before);
        assert_eq!(store.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_detach_is_all_or_nothing() {
        let (store, module) = store_with_module().await;
        let a = store.create_node(&new_node(&module, 1)).await.unwrap();
        let b = store.create_node(&new_node(&module, 2)).await.unwrap();
        let pair = store
            .create_connection_pair(&wire(&a, 1, &b, 1))
            .await
            .unwrap();
        let a_node = &store.find_nodes(&NodeFilter::by_id(a)).await.unwrap()[0];
        let group = a_node.connections_at(SlotLabel::output(1).unwrap())[0]
            .group
            .clone();

        let err = store
            .detach_connections(&[
                Membership {
                    group: group.clone(),
                    connection: pair.output.clone(),
                },
                Membership {
                    group,
                    connection: ConnectionId::new("ghost"),
                },
            ])
            .await;
        assert!(err.is_err());
        assert_eq!(store.connections_to(&b).await, 1);
    }

    #[tokio::test]
    async fn test_unrestricted_filter_finds_nothing() {
        let (store, module) = store_with_module().await;
        store.create_node(&new_node(&module, 1)).await.unwrap();
        assert!(store
            .find_nodes(&NodeFilter::default())
            .await
            .unwrap()
            .is_empty());
    }
}

//! Cascading deletes
//!
//! Removing a node removes everything it owns: its Data record, both slot
//! containers, every connection group and every connection. Wires leaving the
//! deleted subgraph also lose their far half, so neighbours are not left pointing
//! at a node that no longer exists. All of it goes to the store as one
//! [`DeletionSet`], which the store applies in a single transaction.

use super::error::{FlowError, FlowResult};
use crate::neo4j::models::*;
use crate::neo4j::GraphStore;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Add `node` and everything it owns to `set`.
///
/// Extra containers and groups kept in [`Node::strays`] are collected too.
pub fn collect_node(node: &Node, set: &mut DeletionSet) {
    set.nodes.insert(node.id.clone());
    if let Some(data) = &node.data {
        set.data.insert(data.id.clone());
    }
    set.slots
        .extend(node.all_containers().map(|c| c.id.clone()));
    for (_, group) in node.all_groups() {
        set.groups.insert(group.id.clone());
        set.connections
            .extend(group.connections.iter().map(|c| c.id.clone()));
    }
}

pub struct CascadeDelete {
    store: Arc<dyn GraphStore>,
}

impl CascadeDelete {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Add the far half of every wire that leaves `roots` for a node outside `set`
    async fn collect_mirrors(&self, roots: &[Node], set: &mut DeletionSet) -> FlowResult<()> {
        // (end on a deleted node, end on a surviving peer)
        let mut dangling: Vec<(WireEnd, WireEnd)> = Vec::new();
        for node in roots {
            for (label, group) in node.all_groups() {
                for connection in &group.connections {
                    if set.nodes.contains(&connection.peer_node) {
                        continue;
                    }
                    dangling.push((
                        WireEnd {
                            node: node.id.clone(),
                            slot: label,
                        },
                        WireEnd {
                            node: connection.peer_node.clone(),
                            slot: connection.peer_slot,
                        },
                    ));
                }
            }
        }
        if dangling.is_empty() {
            return Ok(());
        }

        let peer_ids: BTreeSet<NodeId> = dangling.iter().map(|(_, peer)| peer.node.clone()).collect();
        let peers = self
            .store
            .find_nodes(&NodeFilter::by_ids(peer_ids.into_iter().collect()))
            .await?;

        let mut claimed: HashSet<ConnectionId> = HashSet::new();
        for (origin, peer) in &dangling {
            let Some(peer_node) = peers.iter().find(|p| p.id == peer.node) else {
                continue;
            };
            let mirror = peer_node
                .all_groups()
                .filter(|(label, _)| *label == peer.slot)
                .flat_map(|(_, group)| group.connections.iter())
                .find(|m| m.points_at(origin) && !claimed.contains(&m.id));
            match mirror {
                Some(m) => {
                    claimed.insert(m.id.clone());
                    set.connections.insert(m.id.clone());
                }
                None => tracing::warn!(
                    "No mirror for wire {}:{} -> {}:{}",
                    origin.node,
                    origin.slot,
                    peer.node,
                    peer.slot
                ),
            }
        }
        tracing::debug!(
            "Collected {} mirror connection(s) on {} peer node(s)",
            claimed.len(),
            peers.len()
        );
        Ok(())
    }

    async fn apply(&self, set: DeletionSet) -> FlowResult<usize> {
        let removed = self.store.delete_batch(&set).await?;
        if removed != set.len() {
            tracing::warn!(
                "Deletion batch removed {} of {} collected entities",
                removed,
                set.len()
            );
        }
        Ok(removed)
    }

    /// Delete an already expanded node and everything it owns
    pub async fn delete_node(&self, node: &Node) -> FlowResult<usize> {
        let mut set = DeletionSet::new();
        collect_node(node, &mut set);
        self.collect_mirrors(std::slice::from_ref(node), &mut set)
            .await?;
        let removed = self.apply(set).await?;
        tracing::info!("Deleted node {} ({} entities)", node.id, removed);
        Ok(removed)
    }

    /// Load the stored node first, then delete it
    pub async fn delete_node_by_id(&self, id: &NodeId) -> FlowResult<usize> {
        let node = self
            .store
            .find_nodes(&NodeFilter::by_id(id.clone()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::NotFound(format!("Node '{}' not found", id)))?;
        self.delete_node(&node).await
    }

    async fn collect_module(&self, id: &ModuleId) -> FlowResult<DeletionSet> {
        let exists = !self
            .store
            .find_modules(&ModuleFilter::by_id(id.clone()))
            .await?
            .is_empty();
        if !exists {
            return Err(FlowError::NotFound(format!("Module '{}' not found", id)));
        }

        let nodes = self
            .store
            .find_nodes(&NodeFilter::in_module(id.clone()))
            .await?;
        let mut set = DeletionSet::new();
        for node in &nodes {
            collect_node(node, &mut set);
        }
        self.collect_mirrors(&nodes, &mut set).await?;
        Ok(set)
    }

    /// Delete a module together with every node it owns, in one batch
    pub async fn delete_module(&self, id: &ModuleId) -> FlowResult<usize> {
        let mut set = self.collect_module(id).await?;
        set.modules.insert(id.clone());
        let removed = self.apply(set).await?;
        tracing::info!("Deleted module {} ({} entities)", id, removed);
        Ok(removed)
    }

    /// Delete every node of a module but keep the module itself
    pub async fn clear_module(&self, id: &ModuleId) -> FlowResult<usize> {
        let set = self.collect_module(id).await?;
        if set.is_empty() {
            return Ok(0);
        }
        let removed = self.apply(set).await?;
        tracing::info!("Cleared module {} ({} entities)", id, removed);
        Ok(removed)
    }
}

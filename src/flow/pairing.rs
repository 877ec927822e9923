//! Paired connections
//!
//! A wire between an output slot and an input slot is stored as two Connection
//! records, one in each slot's group, each naming the opposite end. The pair is
//! only ever written or removed as a unit.

use super::error::{FlowError, FlowResult};
use crate::neo4j::models::*;
use crate::neo4j::GraphStore;
use std::sync::Arc;

pub struct ConnectionPairing {
    store: Arc<dyn GraphStore>,
}

/// The two nodes a wire touches (the same node twice for a loop)
struct WireNodes {
    output: Node,
    input: Node,
}

fn check_directions(wire: &Wire) -> FlowResult<()> {
    if wire.output.slot.direction() != SlotDirection::Output {
        return Err(FlowError::field("output.slot", "must be an output slot"));
    }
    if wire.input.slot.direction() != SlotDirection::Input {
        return Err(FlowError::field("input.slot", "must be an input slot"));
    }
    Ok(())
}

fn membership(connection: &Connection) -> Membership {
    Membership {
        group: connection.group.clone(),
        connection: connection.id.clone(),
    }
}

impl ConnectionPairing {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    async fn load(&self, wire: &Wire) -> FlowResult<WireNodes> {
        let mut ids = vec![wire.output.node.clone()];
        if wire.input.node != wire.output.node {
            ids.push(wire.input.node.clone());
        }
        let nodes = self.store.find_nodes(&NodeFilter::by_ids(ids)).await?;

        let pick = |id: &NodeId| {
            nodes
                .iter()
                .find(|n| n.id == *id)
                .cloned()
                .ok_or_else(|| FlowError::NotFound(format!("Node '{}' not found", id)))
        };
        Ok(WireNodes {
            output: pick(&wire.output.node)?,
            input: pick(&wire.input.node)?,
        })
    }

    /// Write both halves of `wire`; rejects a wire that already exists
    pub async fn create_pair(&self, wire: &Wire) -> FlowResult<ConnectionPair> {
        check_directions(wire)?;
        let nodes = self.load(wire).await?;

        if nodes
            .output
            .connections_at(wire.output.slot)
            .iter()
            .any(|c| c.points_at(&wire.input))
        {
            return Err(FlowError::field(
                "connection",
                format!(
                    "{}:{} is already wired to {}:{}",
                    wire.output.node, wire.output.slot, wire.input.node, wire.input.slot
                ),
            ));
        }

        let pair = self.store.create_connection_pair(wire).await?;
        tracing::info!(
            "Connected {}:{} -> {}:{}",
            wire.output.node,
            wire.output.slot,
            wire.input.node,
            wire.input.slot
        );
        Ok(pair)
    }

    /// Remove both halves of `wire`, leaving other connections in the groups alone
    pub async fn delete_pair(&self, wire: &Wire) -> FlowResult<()> {
        check_directions(wire)?;
        let nodes = self.load(wire).await?;

        let forward = nodes
            .output
            .connections_at(wire.output.slot)
            .iter()
            .find(|c| c.points_at(&wire.input));
        let mirror = nodes
            .input
            .connections_at(wire.input.slot)
            .iter()
            .find(|c| c.points_at(&wire.output));

        let memberships: Vec<Membership> = forward
            .into_iter()
            .chain(mirror)
            .map(membership)
            .collect();

        match memberships.len() {
            0 => {
                return Err(FlowError::NotFound(format!(
                    "no connection from {}:{} to {}:{}",
                    wire.output.node, wire.output.slot, wire.input.node, wire.input.slot
                )))
            }
            1 => tracing::warn!(
                "Wire {}:{} -> {}:{} has only one stored half; removing it",
                wire.output.node,
                wire.output.slot,
                wire.input.node,
                wire.input.slot
            ),
            _ => {}
        }

        self.store.detach_connections(&memberships).await?;
        tracing::info!(
            "Disconnected {}:{} -> {}:{}",
            wire.output.node,
            wire.output.slot,
            wire.input.node,
            wire.input.slot
        );
        Ok(())
    }
}

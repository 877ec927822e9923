//! Node API handlers

use super::handlers::{AppError, FlowState};
use crate::neo4j::models::{DataFields, DataId, NewNode, Node, NodeId, Position};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    #[serde(default)]
    pub node: NewNode,
}

#[derive(Serialize)]
pub struct NodeCreatedResponse {
    pub created: bool,
    pub node: Node,
}

#[derive(Debug, Default, Deserialize)]
pub struct NodeDataUpdate {
    #[serde(default)]
    pub id: DataId,
    #[serde(flatten)]
    pub fields: DataFields,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDataRequest {
    #[serde(default)]
    pub node_data: NodeDataUpdate,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePositionRequest {
    pub pos_x: f64,
    pub pos_y: f64,
}

#[derive(Serialize)]
pub struct DataUpdatedResponse {
    pub updated: bool,
}

#[derive(Serialize)]
pub struct NodeUpdatedResponse {
    pub updated: bool,
    pub id: NodeId,
}

#[derive(Serialize)]
pub struct NodeDeletedResponse {
    pub deleted: bool,
    pub id: NodeId,
    pub removed: usize,
}

/// Create a node with its Data record and both slot containers
pub async fn create_node(
    State(state): State<FlowState>,
    Json(req): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<NodeCreatedResponse>), AppError> {
    let node = state.flow.create_node(&req.node).await?;
    Ok((
        StatusCode::CREATED,
        Json(NodeCreatedResponse {
            created: true,
            node,
        }),
    ))
}

pub async fn update_node_data(
    State(state): State<FlowState>,
    Json(req): Json<UpdateDataRequest>,
) -> Result<(StatusCode, Json<DataUpdatedResponse>), AppError> {
    let update = req.node_data;
    state
        .flow
        .update_node_data(&update.id, &update.fields)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataUpdatedResponse { updated: true }),
    ))
}

/// Move a node; no other field is touched
pub async fn update_node_position(
    State(state): State<FlowState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePositionRequest>,
) -> Result<(StatusCode, Json<NodeUpdatedResponse>), AppError> {
    let id = NodeId::new(id);
    state
        .flow
        .update_node_position(
            &id,
            Position {
                pos_x: req.pos_x,
                pos_y: req.pos_y,
            },
        )
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(NodeUpdatedResponse { updated: true, id }),
    ))
}

/// Delete a node and everything it owns, plus the mirror end of each of its wires.
///
/// Any request body is ignored; the stored node decides what goes.
pub async fn delete_node(
    State(state): State<FlowState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<NodeDeletedResponse>), AppError> {
    let id = NodeId::new(id);
    let removed = state.flow.delete_node(&id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(NodeDeletedResponse {
            deleted: true,
            id,
            removed,
        }),
    ))
}

//! Connection API handlers
//!
//! A wire is always written and removed as a pair: one connection in the output
//! slot's group and its mirror in the input slot's group.

use super::handlers::{AppError, FlowState};
use crate::flow::WireRequest;
use crate::neo4j::models::ConnectionId;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct ConnectionCreatedResponse {
    pub output_connection: ConnectionId,
    pub input_connection: ConnectionId,
}

#[derive(Serialize)]
pub struct ConnectionDeletedResponse {
    pub deleted: bool,
}

pub async fn create_connection(
    State(state): State<FlowState>,
    Json(req): Json<WireRequest>,
) -> Result<(StatusCode, Json<ConnectionCreatedResponse>), AppError> {
    let pair = state.flow.connect(&req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ConnectionCreatedResponse {
            output_connection: pair.output,
            input_connection: pair.input,
        }),
    ))
}

pub async fn delete_connection(
    State(state): State<FlowState>,
    Json(req): Json<WireRequest>,
) -> Result<(StatusCode, Json<ConnectionDeletedResponse>), AppError> {
    state.flow.disconnect(&req).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ConnectionDeletedResponse { deleted: true }),
    ))
}

//! Module API handlers

use super::handlers::{AppError, FlowState};
use crate::flow::ModuleSummary;
use crate::neo4j::models::{ModuleId, NewModule, Node};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ListModulesRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleRequest {
    #[serde(default)]
    pub module: NewModule,
}

#[derive(Serialize)]
pub struct ModuleCreatedResponse {
    pub id: ModuleId,
}

#[derive(Serialize)]
pub struct ModuleSearchResponse {
    pub success: bool,
    pub isset: bool,
}

#[derive(Serialize)]
pub struct ModuleClearedResponse {
    pub cleared: bool,
    pub id: ModuleId,
    pub removed: usize,
}

#[derive(Serialize)]
pub struct ModuleDeletedResponse {
    pub deleted: bool,
    pub id: ModuleId,
    pub removed: usize,
}

/// List the modules of a user, each with its nodes
pub async fn list_modules(
    State(state): State<FlowState>,
    Json(req): Json<ListModulesRequest>,
) -> Result<Json<Vec<ModuleSummary>>, AppError> {
    let modules = state
        .flow
        .list_modules(&req.username, req.token.as_deref())
        .await?;
    Ok(Json(modules))
}

pub async fn create_module(
    State(state): State<FlowState>,
    Json(req): Json<ModuleRequest>,
) -> Result<(StatusCode, Json<ModuleCreatedResponse>), AppError> {
    let id = state.flow.create_module(&req.module).await?;
    Ok((StatusCode::CREATED, Json(ModuleCreatedResponse { id })))
}

/// Whether the owner already has a module with this name
pub async fn search_module(
    State(state): State<FlowState>,
    Json(req): Json<ModuleRequest>,
) -> Result<Json<ModuleSearchResponse>, AppError> {
    let isset = state.flow.module_exists(&req.module).await?;
    Ok(Json(ModuleSearchResponse {
        success: true,
        isset,
    }))
}

/// Remove every node of a module, keeping the module
pub async fn clear_module(
    State(state): State<FlowState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ModuleClearedResponse>), AppError> {
    let id = ModuleId::new(id);
    let removed = state.flow.clear_module(&id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ModuleClearedResponse {
            cleared: true,
            id,
            removed,
        }),
    ))
}

pub async fn delete_module(
    State(state): State<FlowState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ModuleDeletedResponse>), AppError> {
    let id = ModuleId::new(id);
    let removed = state.flow.delete_module(&id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ModuleDeletedResponse {
            deleted: true,
            id,
            removed,
        }),
    ))
}

/// Nodes of a module; an unknown module yields an empty list
pub async fn list_module_nodes(
    State(state): State<FlowState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Node>>, AppError> {
    let nodes = state.flow.list_nodes(&ModuleId::new(id)).await?;
    Ok(Json(nodes))
}

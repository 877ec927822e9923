//! User sign-in
//!
//! Endpoints:
//! - `POST /user/login`: plaintext credential check, returns a JWT

use super::handlers::{AppError, FlowState};
use crate::flow::SignedIn;
use crate::neo4j::models::NewUser;
use axum::{extract::State, Json};

/// Request body for POST /user/login
pub type LoginRequest = NewUser;

pub async fn login(
    State(state): State<FlowState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SignedIn>, AppError> {
    let signed_in = state.flow.sign_in(&req).await?;
    Ok(Json(signed_in))
}

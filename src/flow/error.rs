//! Flow-level error taxonomy

use crate::neo4j::StoreError;
use serde::Serialize;
use thiserror::Error;

/// One rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    /// Input rejected before any store call
    #[error("validation failed: {}", describe(.0))]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),

    #[error("token error: {0}")]
    Token(String),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl FlowError {
    /// A validation failure on a single field
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            FlowError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<StoreError> for FlowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => FlowError::NotFound(err.to_string()),
            StoreError::Conflict(message) => FlowError::Conflict(message),
            other => FlowError::Store(other),
        }
    }
}

pub type FlowResult<T> = Result<T, FlowError>;

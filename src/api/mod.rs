//! HTTP API for the flow editor

pub mod connection_handlers;
pub mod handlers;
pub mod module_handlers;
pub mod node_handlers;
pub mod routes;
pub mod user_handlers;

pub use handlers::{FlowState, ServerState};
pub use routes::create_router;

//! Neo4j store for the flow graph

pub mod client;
pub mod error;
mod impl_graph_store;
pub mod models;
pub mod schema;
pub mod session;
pub mod traits;

pub use client::Neo4jClient;
pub use error::StoreError;
pub use models::*;
pub use session::{RetryPolicy, SessionPool, StoreSettings};
pub use traits::{GraphStore, StoreResult};

#[cfg(test)]
pub(crate) mod mock;

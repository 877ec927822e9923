//! Flow-editor operations on top of the graph store
//!
//! [`FlowManager`] is the entry point; [`ConnectionPairing`] and [`CascadeDelete`]
//! carry the multi-entity consistency rules.

pub mod cascade;
pub mod error;
pub mod manager;
pub mod pairing;
pub mod validation;

pub use cascade::CascadeDelete;
pub use error::{FieldError, FlowError, FlowResult};
pub use manager::{FlowManager, ModuleSummary, SignedIn};
pub use pairing::ConnectionPairing;
pub use validation::{WireEndRequest, WireRequest};

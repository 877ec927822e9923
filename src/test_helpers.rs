//! Test helper factories and mock state builders
//!
//! Provides convenience functions for creating test objects with sensible defaults,
//! and helpers for building a mock-backed FlowManager and router state.
#![allow(dead_code)]

use crate::api::{FlowState, ServerState};
use crate::auth::TokenSettings;
use crate::flow::FlowManager;
use crate::neo4j::mock::MockGraphStore;
use crate::neo4j::models::*;
use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::response::Response;
use std::sync::Arc;

/// JWT secret shared by every mock-backed manager
pub const TEST_JWT_SECRET: &str = "test-secret-key-minimum-32-chars!!";

// ============================================================================
// Mock state builders
// ============================================================================

pub fn test_token_settings() -> TokenSettings {
    TokenSettings {
        secret: TEST_JWT_SECRET.to_string(),
        expiry_secs: 3600,
    }
}

/// A FlowManager over `store`, plus a handle on the store for inspection
pub fn mock_manager(store: MockGraphStore) -> (FlowManager, Arc<MockGraphStore>) {
    let store = Arc::new(store);
    let manager = FlowManager::new(store.clone(), test_token_settings());
    (manager, store)
}

/// Router state over an in-memory store
pub fn mock_server_state(store: MockGraphStore) -> FlowState {
    let (manager, _) = mock_manager(store);
    Arc::new(ServerState {
        flow: Arc::new(manager),
    })
}

// ============================================================================
// HTTP helpers
// ============================================================================

/// Build a JSON request; a `null` body is sent empty
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    if body.is_null() {
        builder.body(Body::empty()).unwrap()
    } else {
        builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}

pub async fn read_json(resp: Response) -> serde_json::Value {
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// Test data factories
// ============================================================================

/// A fully expanded node with Data and both containers, no groups.
///
/// Sub-entity ids are derived from `id`.
pub fn test_node(module: &str, id: &str, seq: i64) -> Node {
    Node {
        id: NodeId::new(id),
        module_id: ModuleId::new(module),
        seq,
        name: format!("node-{}", seq),
        class: "test".to_string(),
        html: "<div></div>".to_string(),
        typenode: false,
        pos_x: 0.0,
        pos_y: 0.0,
        data: Some(Data {
            id: DataId::new(format!("{}-data", id)),
            name: String::new(),
            value: String::new(),
            operator: String::new(),
        }),
        inputs: Some(SlotContainer::empty(
            SlotsId::new(format!("{}-inputs", id)),
            SlotDirection::Input,
        )),
        outputs: Some(SlotContainer::empty(
            SlotsId::new(format!("{}-outputs", id)),
            SlotDirection::Output,
        )),
        strays: Strays::default(),
    }
}

/// Create-node payload with sensible defaults
pub fn new_node(module: &ModuleId, seq: i64) -> NewNode {
    NewNode {
        module_id: module.clone(),
        seq,
        name: format!("node-{}", seq),
        class: "test".to_string(),
        html: format!("<div>node {}</div>", seq),
        typenode: false,
        pos_x: 100.0,
        pos_y: 50.0 * seq as f64,
        data: NewData {
            name: "value".to_string(),
            value: "0".to_string(),
            operator: String::new(),
        },
    }
}

/// Wire from `output_<out>` of one node to `input_<inp>` of another
pub fn wire(output: &NodeId, out: u8, input: &NodeId, inp: u8) -> Wire {
    Wire {
        output: WireEnd {
            node: output.clone(),
            slot: SlotLabel::output(out).unwrap(),
        },
        input: WireEnd {
            node: input.clone(),
            slot: SlotLabel::input(inp).unwrap(),
        },
    }
}

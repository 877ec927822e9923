//! Input validation
//!
//! Every check runs before the first store call. Failures are collected per field
//! so a caller sees all of them at once.

use super::error::{FieldError, FlowError, FlowResult};
use crate::neo4j::models::*;
use serde::Deserialize;

const REQUIRED: &str = "is required";

/// Collector for field-level failures
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Vec<FieldError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Record `field` as missing when `value` is blank
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, REQUIRED);
        }
    }

    pub fn require_finite(&mut self, field: &str, value: f64) {
        if !value.is_finite() {
            self.add(field, "must be a finite number");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn result(self) -> FlowResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }

    fn into_error(self) -> FlowError {
        FlowError::Validation(self.errors)
    }
}

pub fn validate_new_user(user: &NewUser) -> FlowResult<()> {
    let mut errs = FieldErrors::new();
    errs.require("username", &user.username);
    errs.require("password", &user.password);
    errs.result()
}

pub fn validate_new_module(module: &NewModule) -> FlowResult<()> {
    let mut errs = FieldErrors::new();
    errs.require("name", &module.name);
    errs.require("owner", &module.owner);
    errs.result()
}

pub fn validate_new_node(node: &NewNode) -> FlowResult<()> {
    let mut errs = FieldErrors::new();
    errs.require("module_id", node.module_id.as_str());
    if node.seq < 1 {
        errs.add("seq", "must be at least 1");
    }
    errs.require("name", &node.name);
    errs.require_finite("pos_x", node.pos_x);
    errs.require_finite("pos_y", node.pos_y);
    errs.result()
}

pub fn validate_position(position: &Position) -> FlowResult<()> {
    let mut errs = FieldErrors::new();
    errs.require_finite("pos_x", position.pos_x);
    errs.require_finite("pos_y", position.pos_y);
    errs.result()
}

/// One wire end as submitted, before its slot label is parsed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireEndRequest {
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub slot: String,
}

/// A wire as submitted by a client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireRequest {
    #[serde(default)]
    pub output: WireEndRequest,
    #[serde(default)]
    pub input: WireEndRequest,
}

fn parse_end(
    errs: &mut FieldErrors,
    side: &str,
    end: &WireEndRequest,
    expected: SlotDirection,
) -> Option<WireEnd> {
    let node_field = format!("{}.node", side);
    let slot_field = format!("{}.slot", side);

    errs.require(&node_field, &end.node);
    if end.slot.trim().is_empty() {
        errs.add(slot_field, REQUIRED);
        return None;
    }
    let slot = match end.slot.parse::<SlotLabel>() {
        Ok(slot) => slot,
        Err(e) => {
            errs.add(slot_field, e.to_string());
            return None;
        }
    };
    if slot.direction() != expected {
        errs.add(slot_field, format!("must be an {} slot", expected));
        return None;
    }
    if end.node.trim().is_empty() {
        return None;
    }
    Some(WireEnd {
        node: NodeId::new(end.node.trim()),
        slot,
    })
}

/// Check both ends and build a typed wire.
///
/// The output end must name an output slot and the input end an input slot.
pub fn validate_wire(request: &WireRequest) -> FlowResult<Wire> {
    let mut errs = FieldErrors::new();
    let output = parse_end(&mut errs, "output", &request.output, SlotDirection::Output);
    let input = parse_end(&mut errs, "input", &request.input, SlotDirection::Input);
    match (output, input) {
        (Some(output), Some(input)) if errs.is_empty() => Ok(Wire { output, input }),
        _ => Err(errs.into_error()),
    }
}

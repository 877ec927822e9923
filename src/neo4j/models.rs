//! Neo4j graph models for the flow editor
//!
//! Ownership runs Module → Node → (Data, Inputs, Outputs) → ConnectionGroup → Connection.
//! Every identifier is assigned by the store and wrapped in a per-kind newtype so a
//! group id can never be handed to a node lookup by accident.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Number of input slots, and of output slots, on every node.
pub const SLOTS_PER_SIDE: usize = 5;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

entity_id!(
    /// Store-assigned user identifier
    UserId
);
entity_id!(
    /// Store-assigned module identifier
    ModuleId
);
entity_id!(
    /// Store-assigned node identifier
    NodeId
);
entity_id!(
    /// Store-assigned identifier of a node's Data record
    DataId
);
entity_id!(
    /// Store-assigned identifier of an Inputs or Outputs slot container
    SlotsId
);
entity_id!(
    /// Store-assigned connection group identifier
    GroupId
);
entity_id!(
    /// Store-assigned connection identifier
    ConnectionId
);

// ============================================================================
// Slots
// ============================================================================

/// Side of a node a slot lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotDirection {
    Input,
    Output,
}

impl SlotDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotDirection::Input => "input",
            SlotDirection::Output => "output",
        }
    }
}

impl fmt::Display for SlotDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotDirection {
    type Err = InvalidSlotLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(SlotDirection::Input),
            "output" => Ok(SlotDirection::Output),
            other => Err(InvalidSlotLabel(other.to_string())),
        }
    }
}

/// Rejected slot label text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid slot label '{0}': expected input_1..input_5 or output_1..output_5")]
pub struct InvalidSlotLabel(pub String);

/// Named port on a node, e.g. `output_1`.
///
/// Only the ten labels `input_1..=input_5` and `output_1..=output_5` can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotLabel {
    direction: SlotDirection,
    index: u8,
}

impl SlotLabel {
    /// Build a label; `index` is 1-based and must be within `1..=SLOTS_PER_SIDE`.
    pub fn new(direction: SlotDirection, index: u8) -> Option<Self> {
        if (1..=SLOTS_PER_SIDE as u8).contains(&index) {
            Some(Self { direction, index })
        } else {
            None
        }
    }

    pub fn input(index: u8) -> Option<Self> {
        Self::new(SlotDirection::Input, index)
    }

    pub fn output(index: u8) -> Option<Self> {
        Self::new(SlotDirection::Output, index)
    }

    pub fn direction(&self) -> SlotDirection {
        self.direction
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// All labels of one side, in slot order
    pub fn all(direction: SlotDirection) -> impl Iterator<Item = SlotLabel> {
        (1..=SLOTS_PER_SIDE as u8).map(move |index| SlotLabel { direction, index })
    }
}

impl fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.direction, self.index)
    }
}

impl FromStr for SlotLabel {
    type Err = InvalidSlotLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSlotLabel(s.to_string());
        let (direction, index) = s.split_once('_').ok_or_else(invalid)?;
        let direction: SlotDirection = direction.parse().map_err(|_| invalid())?;
        let index: u8 = index.parse().map_err(|_| invalid())?;
        SlotLabel::new(direction, index).ok_or_else(invalid)
    }
}

impl Serialize for SlotLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A registered user (credentials are compared in plaintext)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

/// A named collection of nodes owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub owner: String,
    pub name: String,
}

/// The single Data record owned by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub id: DataId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub operator: String,
}

/// One endpoint of a wire, stored in the group of the slot it leaves from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    /// Node at the other end of the wire
    pub peer_node: NodeId,
    /// Slot at the other end of the wire
    pub peer_slot: SlotLabel,
    /// Owning group
    pub group: GroupId,
}

impl Connection {
    pub fn points_at(&self, end: &WireEnd) -> bool {
        self.peer_node == end.node && self.peer_slot == end.slot
    }
}

/// The set of wire endpoints attached to one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionGroup {
    pub id: GroupId,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// A port on a node, optionally holding a connection group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub label: SlotLabel,
    pub group: Option<ConnectionGroup>,
}

/// The Inputs or Outputs container of a node: always exactly five slots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotContainer {
    pub id: SlotsId,
    pub direction: SlotDirection,
    pub slots: [Slot; SLOTS_PER_SIDE],
}

impl SlotContainer {
    /// A container whose five slots hold no group yet
    pub fn empty(id: SlotsId, direction: SlotDirection) -> Self {
        let slots = std::array::from_fn(|i| Slot {
            label: SlotLabel {
                direction,
                index: i as u8 + 1,
            },
            group: None,
        });
        Self {
            id,
            direction,
            slots,
        }
    }

    pub fn slot(&self, label: SlotLabel) -> Option<&Slot> {
        if label.direction != self.direction {
            return None;
        }
        self.slots.get(label.index as usize - 1)
    }

    pub fn slot_mut(&mut self, label: SlotLabel) -> Option<&mut Slot> {
        if label.direction != self.direction {
            return None;
        }
        self.slots.get_mut(label.index as usize - 1)
    }

    /// Groups of the non-empty slots, in slot order
    pub fn groups(&self) -> impl Iterator<Item = (SlotLabel, &ConnectionGroup)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.group.as_ref().map(|group| (slot.label, group)))
    }

    pub fn connection_count(&self) -> usize {
        self.groups().map(|(_, g)| g.connections.len()).sum()
    }
}

/// A unit of the flow graph, fully expanded with its owned sub-entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub module_id: ModuleId,
    /// Sequence number, unique within the module
    pub seq: i64,
    pub name: String,
    pub class: String,
    /// Markup rendered by the editor
    pub html: String,
    pub typenode: bool,
    pub pos_x: f64,
    pub pos_y: f64,
    pub data: Option<Data>,
    pub inputs: Option<SlotContainer>,
    pub outputs: Option<SlotContainer>,
    #[serde(default, skip_serializing_if = "Strays::is_empty")]
    pub strays: Strays,
}

/// A group found on a slot that already holds one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrayGroup {
    /// Container the group hangs off
    pub container: SlotsId,
    pub label: SlotLabel,
    pub group: ConnectionGroup,
}

/// Stored sub-entities beyond one container per side and one group per slot.
///
/// Concurrent writers can leave these behind. They are never shown as wiring,
/// but cascades still walk them so nothing outlives its node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Strays {
    #[serde(default)]
    pub containers: Vec<SlotContainer>,
    #[serde(default)]
    pub groups: Vec<StrayGroup>,
}

impl Strays {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && self.groups.is_empty()
    }
}

impl Node {
    pub fn container(&self, direction: SlotDirection) -> Option<&SlotContainer> {
        match direction {
            SlotDirection::Input => self.inputs.as_ref(),
            SlotDirection::Output => self.outputs.as_ref(),
        }
    }

    /// Inputs then outputs, skipping an absent container
    pub fn containers(&self) -> impl Iterator<Item = &SlotContainer> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    pub fn slot(&self, label: SlotLabel) -> Option<&Slot> {
        self.container(label.direction())?.slot(label)
    }

    /// Every stored container, extra ones included
    pub fn all_containers(&self) -> impl Iterator<Item = &SlotContainer> {
        self.containers().chain(self.strays.containers.iter())
    }

    /// Every stored group with the slot it hangs off, extra ones included
    pub fn all_groups(&self) -> impl Iterator<Item = (SlotLabel, &ConnectionGroup)> {
        self.all_containers()
            .flat_map(|c| c.groups())
            .chain(self.strays.groups.iter().map(|s| (s.label, &s.group)))
    }

    /// Connections attached to `label`; empty when the slot holds no group
    pub fn connections_at(&self, label: SlotLabel) -> &[Connection] {
        self.slot(label)
            .and_then(|slot| slot.group.as_ref())
            .map(|group| group.connections.as_slice())
            .unwrap_or(&[])
    }
}

// ============================================================================
// Write inputs
// ============================================================================

/// Credentials for a new user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Payload for module creation and name search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewModule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
}

/// Initial Data values of a new node
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewData {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub operator: String,
}

/// Payload for node creation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNode {
    #[serde(default)]
    pub module_id: ModuleId,
    #[serde(default)]
    pub seq: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub typenode: bool,
    #[serde(default)]
    pub pos_x: f64,
    #[serde(default)]
    pub pos_y: f64,
    #[serde(default)]
    pub data: NewData,
}

/// Editor coordinates of a node
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub pos_x: f64,
    pub pos_y: f64,
}

/// The editable fields of a Data record
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DataFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub operator: String,
}

/// One side of a wire: a node and one of its slots
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WireEnd {
    pub node: NodeId,
    pub slot: SlotLabel,
}

/// A logical wire from an output slot to an input slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub output: WireEnd,
    pub input: WireEnd,
}

/// The two connection records that make up one wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPair {
    /// Stored in the output slot's group
    pub output: ConnectionId,
    /// Stored in the input slot's group
    pub input: ConnectionId,
}

/// A connection together with the group that holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub group: GroupId,
    pub connection: ConnectionId,
}

// ============================================================================
// Lookups
// ============================================================================

/// Exact-match module predicate; unset fields do not restrict
#[derive(Debug, Clone, Default)]
pub struct ModuleFilter {
    pub id: Option<ModuleId>,
    pub name: Option<String>,
    pub owner: Option<String>,
}

impl ModuleFilter {
    pub fn by_id(id: ModuleId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    pub fn owned_by(owner: &str) -> Self {
        Self {
            owner: Some(owner.to_string()),
            ..Default::default()
        }
    }

    pub fn named(name: &str, owner: &str) -> Self {
        Self {
            id: None,
            name: Some(name.to_string()),
            owner: Some(owner.to_string()),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.owner.is_none()
    }

    pub fn matches(&self, module: &Module) -> bool {
        self.id.as_ref().is_none_or(|id| *id == module.id)
            && self.name.as_ref().is_none_or(|name| *name == module.name)
            && self.owner.as_ref().is_none_or(|owner| *owner == module.owner)
    }
}

/// Exact-match node predicate; unset fields do not restrict
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub ids: Vec<NodeId>,
    pub module_id: Option<ModuleId>,
    pub seq: Option<i64>,
}

impl NodeFilter {
    pub fn in_module(module_id: ModuleId) -> Self {
        Self {
            module_id: Some(module_id),
            ..Default::default()
        }
    }

    pub fn by_id(id: NodeId) -> Self {
        Self::by_ids(vec![id])
    }

    pub fn by_ids(ids: Vec<NodeId>) -> Self {
        Self {
            ids,
            ..Default::default()
        }
    }

    pub fn with_seq(mut self, seq: i64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.ids.is_empty() && self.module_id.is_none() && self.seq.is_none()
    }

    pub fn matches(&self, node: &Node) -> bool {
        (self.ids.is_empty() || self.ids.contains(&node.id))
            && self.module_id.as_ref().is_none_or(|m| *m == node.module_id)
            && self.seq.is_none_or(|seq| seq == node.seq)
    }
}

// ============================================================================
// Deletion
// ============================================================================

/// A single entity addressed by kind and id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    User(UserId),
    Module(ModuleId),
    Node(NodeId),
    Data(DataId),
    Slots(SlotsId),
    Group(GroupId),
    Connection(ConnectionId),
}

impl EntityRef {
    /// Neo4j label of the referenced entity
    pub fn label(&self) -> &'static str {
        match self {
            EntityRef::User(_) => "User",
            EntityRef::Module(_) => "Module",
            EntityRef::Node(_) => "Node",
            EntityRef::Data(_) => "Data",
            EntityRef::Slots(_) => "Slots",
            EntityRef::Group(_) => "ConnectionGroup",
            EntityRef::Connection(_) => "Connection",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EntityRef::User(id) => id.as_str(),
            EntityRef::Module(id) => id.as_str(),
            EntityRef::Node(id) => id.as_str(),
            EntityRef::Data(id) => id.as_str(),
            EntityRef::Slots(id) => id.as_str(),
            EntityRef::Group(id) => id.as_str(),
            EntityRef::Connection(id) => id.as_str(),
        }
    }
}

/// Every identifier removed by one cascade, grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionSet {
    pub modules: BTreeSet<ModuleId>,
    pub nodes: BTreeSet<NodeId>,
    pub data: BTreeSet<DataId>,
    pub slots: BTreeSet<SlotsId>,
    pub groups: BTreeSet<GroupId>,
    pub connections: BTreeSet<ConnectionId>,
}

impl DeletionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
            + self.nodes.len()
            + self.data.len()
            + self.slots.len()
            + self.groups.len()
            + self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Union `other` into `self`
    pub fn merge(&mut self, other: DeletionSet) {
        self.modules.extend(other.modules);
        self.nodes.extend(other.nodes);
        self.data.extend(other.data);
        self.slots.extend(other.slots);
        self.groups.extend(other.groups);
        self.connections.extend(other.connections);
    }

    /// `(label, ids)` for each non-empty kind, leaves first
    pub fn by_label(&self) -> Vec<(&'static str, Vec<String>)> {
        fn ids<T: fmt::Display>(set: &BTreeSet<T>) -> Vec<String> {
            set.iter().map(|id| id.to_string()).collect()
        }

        [
            ("Connection", ids(&self.connections)),
            ("ConnectionGroup", ids(&self.groups)),
            ("Slots", ids(&self.slots)),
            ("Data", ids(&self.data)),
            ("Node", ids(&self.nodes)),
            ("Module", ids(&self.modules)),
        ]
        .into_iter()
        .filter(|(_, ids)| !ids.is_empty())
        .collect()
    }
}

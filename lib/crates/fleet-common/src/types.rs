use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store_keys::{snapshot, validate_node_id};

/// Rejected node id, with the validation rule it broke
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid node id {id:?}: {reason}")]
pub struct InvalidNodeId {
    pub id: String,
    pub reason: &'static str,
}

/// Unique identity of a managed node.
///
/// Always satisfies [`validate_node_id`], so it is safe to splice into store keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidNodeId> {
        let id = id.into();
        match validate_node_id(&id) {
            Ok(()) => Ok(Self(id)),
            Err(reason) => Err(InvalidNodeId { id, reason }),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeId {
    type Error = InvalidNodeId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl FromStr for NodeId {
    type Err = InvalidNodeId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Node type id outside the known set
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("unknown node type {0}")]
pub struct UnknownNodeType(pub u8);

/// Hardware class a node declares at provisioning time.
///
/// Serialized as its numeric id (`0`, `1`, `2`) to match the agent protocol.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeType {
    /// Not yet provisioned
    #[default]
    Unspecified,
    X86,
    Arm,
}

impl NodeType {
    /// Whether an artifact variant can exist for this type.
    #[must_use]
    pub fn is_concrete(self) -> bool {
        !matches!(self, NodeType::Unspecified)
    }
}

impl TryFrom<u8> for NodeType {
    type Error = UnknownNodeType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeType::Unspecified),
            1 => Ok(NodeType::X86),
            2 => Ok(NodeType::Arm),
            other => Err(UnknownNodeType(other)),
        }
    }
}

impl From<NodeType> for u8 {
    fn from(value: NodeType) -> Self {
        match value {
            NodeType::Unspecified => 0,
            NodeType::X86 => 1,
            NodeType::Arm => 2,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeType::Unspecified => "unspecified",
            NodeType::X86 => "x86",
            NodeType::Arm => "arm",
        })
    }
}

/// One category of node state whose changes are tracked for the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChangeFlag {
    Config = 0,
    Version = 1,
    Reboot = 2,
    DeleteNode = 3,
    WorkloadList = 4,
    WorkloadConfig = 5,
    Routing = 6,
    Registries = 7,
    Proxy = 8,
    Diagnostics = 9,
    ImageSnapshot = 10,
}

impl ChangeFlag {
    pub const ALL: [ChangeFlag; 11] = [
        ChangeFlag::Config,
        ChangeFlag::Version,
        ChangeFlag::Reboot,
        ChangeFlag::DeleteNode,
        ChangeFlag::WorkloadList,
        ChangeFlag::WorkloadConfig,
        ChangeFlag::Routing,
        ChangeFlag::Registries,
        ChangeFlag::Proxy,
        ChangeFlag::Diagnostics,
        ChangeFlag::ImageSnapshot,
    ];

    #[must_use]
    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Name used in change-tracking records.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            ChangeFlag::Config => "config",
            ChangeFlag::Version => "version",
            ChangeFlag::Reboot => "reboot",
            ChangeFlag::DeleteNode => "deleteNode",
            ChangeFlag::WorkloadList => "workloadList",
            ChangeFlag::WorkloadConfig => "workloadConfig",
            ChangeFlag::Routing => "routing",
            ChangeFlag::Registries => "registries",
            ChangeFlag::Proxy => "proxy",
            ChangeFlag::Diagnostics => "diagnostics",
            ChangeFlag::ImageSnapshot => "imageSnapshot",
        }
    }

    /// Name used in the agent's change-drain response.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            ChangeFlag::WorkloadList => "microserviceList",
            ChangeFlag::WorkloadConfig => "microserviceConfig",
            ChangeFlag::Proxy => "tunnel",
            ChangeFlag::ImageSnapshot => "isImageSnapshot",
            other => other.field_name(),
        }
    }
}

/// Flag name that matches neither the record nor the wire vocabulary
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown change flag {0:?}")]
pub struct UnknownChangeFlag(pub String);

impl FromStr for ChangeFlag {
    type Err = UnknownChangeFlag;

    /// Accepts both record names and wire names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeFlag::ALL
            .into_iter()
            .find(|flag| flag.field_name() == s || flag.wire_name() == s)
            .ok_or_else(|| UnknownChangeFlag(s.to_string()))
    }
}

impl fmt::Display for ChangeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Set of [`ChangeFlag`]s packed into a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeSet(u16);

impl ChangeSet {
    const ALL_BITS: u16 = (1 << ChangeFlag::ALL.len()) - 1;

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn all() -> Self {
        Self(Self::ALL_BITS)
    }

    /// Unknown high bits are dropped.
    #[must_use]
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn contains(self, flag: ChangeFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn insert(&mut self, flag: ChangeFlag) {
        self.0 |= flag.bit();
    }

    #[must_use]
    pub const fn with(self, flag: ChangeFlag) -> Self {
        Self(self.0 | flag.bit())
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = ChangeFlag> {
        ChangeFlag::ALL
            .into_iter()
            .filter(move |flag| self.contains(*flag))
    }
}

impl From<ChangeFlag> for ChangeSet {
    fn from(flag: ChangeFlag) -> Self {
        Self(flag.bit())
    }
}

impl FromIterator<ChangeFlag> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = ChangeFlag>>(iter: I) -> Self {
        iter.into_iter()
            .fold(ChangeSet::empty(), ChangeSet::with)
    }
}

/// Image capture state of a workload.
///
/// On the wire this is a single string: empty, the pending-capture marker,
/// or the path of the published archive.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageSnapshot {
    #[default]
    None,
    PendingCapture,
    Captured(String),
}

impl ImageSnapshot {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, ImageSnapshot::PendingCapture)
    }

    #[must_use]
    pub fn as_wire(&self) -> &str {
        match self {
            ImageSnapshot::None => "",
            ImageSnapshot::PendingCapture => snapshot::PENDING_CAPTURE,
            ImageSnapshot::Captured(path) => path,
        }
    }
}

impl From<String> for ImageSnapshot {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => ImageSnapshot::None,
            snapshot::PENDING_CAPTURE => ImageSnapshot::PendingCapture,
            _ => ImageSnapshot::Captured(value),
        }
    }
}

impl From<ImageSnapshot> for String {
    fn from(value: ImageSnapshot) -> Self {
        value.as_wire().to_string()
    }
}

/// Pending agent software change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VersionCommandKind {
    Upgrade,
    Rollback,
}

/// How the agent obtains its coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GpsMode {
    #[default]
    Auto,
    Manual,
    Off,
}

//! Node model: endpoint, metadata, roles, and provenance of a peer.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::identity::NodeIdentity;

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// Where a peer can be reached. An empty host means "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

// ── Roles ─────────────────────────────────────────────────────────────────────

/// Bit mask of the roles a peer advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct NodeRoles(u32);

impl NodeRoles {
    pub const NONE: NodeRoles = NodeRoles(0x00);
    pub const PEER: NodeRoles = NodeRoles(0x01);
    pub const API: NodeRoles = NodeRoles(0x02);
    pub const VOTING: NodeRoles = NodeRoles(0x04);
    pub const IPV4: NodeRoles = NodeRoles(0x40);
    pub const IPV6: NodeRoles = NodeRoles(0x80);

    const NAMED: [(&'static str, NodeRoles); 5] = [
        ("peer", NodeRoles::PEER),
        ("api", NodeRoles::API),
        ("voting", NodeRoles::VOTING),
        ("ipv4", NodeRoles::IPV4),
        ("ipv6", NodeRoles::IPV6),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(&self, other: NodeRoles) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit is shared with `other`.
    pub const fn intersects(&self, other: NodeRoles) -> bool {
        self.0 & other.0 != 0
    }

    /// Look up a single role by its config name.
    pub fn from_name(name: &str) -> Option<NodeRoles> {
        Self::NAMED
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, role)| *role)
    }
}

impl BitOr for NodeRoles {
    type Output = NodeRoles;

    fn bitor(self, rhs: NodeRoles) -> NodeRoles {
        NodeRoles(self.0 | rhs.0)
    }
}

impl BitOrAssign for NodeRoles {
    fn bitor_assign(&mut self, rhs: NodeRoles) {
        self.0 |= rhs.0;
    }
}

impl TryFrom<Vec<String>> for NodeRoles {
    type Error = RoleError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names.iter().try_fold(NodeRoles::NONE, |roles, name| {
            NodeRoles::from_name(name)
                .map(|role| roles | role)
                .ok_or_else(|| RoleError::Unknown(name.clone()))
        })
    }
}

impl From<NodeRoles> for Vec<String> {
    fn from(roles: NodeRoles) -> Vec<String> {
        NodeRoles::NAMED
            .iter()
            .filter(|(_, role)| roles.contains(*role))
            .map(|(name, _)| name.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleError {
    #[error("unknown node role: {0}")]
    Unknown(String),
}

// ── Metadata ──────────────────────────────────────────────────────────────────

/// Self-reported peer information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    pub name: String,
    pub version: u32,
    pub roles: NodeRoles,
}

impl NodeMetadata {
    pub fn new(name: impl Into<String>, roles: NodeRoles) -> Self {
        Self {
            name: name.into(),
            version: 0,
            roles,
        }
    }
}

// ── Node ──────────────────────────────────────────────────────────────────────

/// A peer as known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub identity: NodeIdentity,
    pub endpoint: Endpoint,
    pub metadata: NodeMetadata,
}

impl Node {
    pub fn new(identity: NodeIdentity, endpoint: Endpoint, metadata: NodeMetadata) -> Self {
        Self {
            identity,
            endpoint,
            metadata,
        }
    }
}

// ── Source ────────────────────────────────────────────────────────────────────

/// How the registry learned about a node.
///
/// Variants are declared lowest priority first; the derived `Ord` is the
/// eviction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum NodeSource {
    /// Left over from a previous run, never confirmed.
    Stale = 0x00,
    /// Connected to us before announcing itself.
    DynamicIncoming = 0x01,
    /// Announced itself via peer exchange.
    Dynamic = 0x02,
    /// Configured by the operator.
    Static = 0x03,
    /// This node.
    Local = 0x04,
}

impl NodeSource {
    /// Pinned sources are never evicted under capacity pressure.
    pub fn is_pinned(&self) -> bool {
        matches!(self, NodeSource::Static | NodeSource::Local)
    }
}

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Identifies a network service that needs connection slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceIdentifier(pub u32);

impl fmt::Display for ServiceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Validation failure code that caused a ban.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BanReason(pub u32);

impl From<u32> for BanReason {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

impl fmt::Display for BanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

//! peerbook-core — identity, node model, clock, and configuration types.
//! All other Peerbook crates depend on this one.

pub mod config;
pub mod identity;
pub mod node;
pub mod time;

pub use identity::{EqualityStrategy, IdentityKey, NodeIdentity, PublicKey};
pub use node::{
    BanReason, Endpoint, Node, NodeMetadata, NodeRoles, NodeSource, RoleError, ServiceIdentifier,
};
pub use time::{fixed_time_supplier, system_time_supplier, TimeSupplier, Timestamp};

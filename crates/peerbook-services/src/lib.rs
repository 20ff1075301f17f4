//! peerbook-services — the node registry and the adapters that feed it.
//!
//! - `registry`         identity-keyed peer store with view/modifier access
//! - `connection_state` per-node, per-service connection aging
//! - `ban_list`         time-bounded bans, independent of records
//! - `local_network`    host-prefix classifier for inbound peers
//! - `subscriber`       discovery events → registry mutations
//! - `bootstrap`        population from configuration

pub mod ban_list;
pub mod bootstrap;
pub mod connection_state;
pub mod local_network;
pub mod registry;
pub mod subscriber;

pub use ban_list::{BanEntry, BanList, BanSettings};
pub use bootstrap::{apply_config, from_config, BootstrapError};
pub use connection_state::{ConnectionState, ConnectionStates};
pub use local_network::{LocalNetworks, LOOPBACK_HOST};
pub use registry::{
    NodeInfo, NodeRegistry, NodeRegistryModifier, NodeRegistryView, RegistryError,
    RegistrySettings,
};
pub use subscriber::{NodeSubscriber, RegistrySubscriber};

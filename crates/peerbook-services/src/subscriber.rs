//! Discovery events → registry mutations.
//!
//! The transport layer reports three things: a peer announced itself, a
//! peer connected to us, or a peer misbehaved. `RegistrySubscriber` turns
//! each into the matching registry change.

use peerbook_core::{
    BanReason, Endpoint, Node, NodeIdentity, NodeMetadata, NodeSource, ServiceIdentifier,
};

use crate::local_network::LocalNetworks;
use crate::registry::NodeRegistry;

/// Receiver of peer discovery events from the network layer.
pub trait NodeSubscriber: Send + Sync {
    /// A peer announced its own identity, endpoint, and metadata.
    fn notify_node(&self, node: &Node);

    /// A peer connected to us on `service_id`. Returns false if the
    /// connection should be dropped because the peer could not be recorded.
    fn notify_incoming_node(&self, identity: &NodeIdentity, service_id: ServiceIdentifier) -> bool;

    /// A peer sent data that failed validation.
    fn notify_ban(&self, identity: &NodeIdentity, reason: BanReason);
}

/// `NodeSubscriber` backed by a `NodeRegistry`.
#[derive(Debug, Clone)]
pub struct RegistrySubscriber {
    registry: NodeRegistry,
    local_networks: LocalNetworks,
}

impl RegistrySubscriber {
    pub fn new(registry: NodeRegistry, local_networks: LocalNetworks) -> Self {
        Self {
            registry,
            local_networks,
        }
    }
}

impl NodeSubscriber for RegistrySubscriber {
    fn notify_node(&self, node: &Node) {
        if !self.registry.modifier().add(node.clone(), NodeSource::Dynamic) {
            tracing::debug!(peer = %node.identity, "announced node not recorded");
        }
    }

    fn notify_incoming_node(&self, identity: &NodeIdentity, service_id: ServiceIdentifier) -> bool {
        let host = self.local_networks.resolve_host(&identity.host);
        let identity = NodeIdentity::new(identity.public_key, host);
        let node = Node::new(
            identity.clone(),
            Endpoint::new(host, 0),
            NodeMetadata::default(),
        );

        let mut modifier = self.registry.modifier();
        if !modifier.add(node, NodeSource::DynamicIncoming) {
            tracing::debug!(peer = %identity, service = %service_id, "incoming node not recorded");
            return false;
        }

        // an accepted connection is proof of connectivity on this service
        if let Some(state) = modifier.provision_connection_state(service_id, &identity) {
            state.increment_age();
        }
        true
    }

    fn notify_ban(&self, identity: &NodeIdentity, reason: BanReason) {
        self.registry.modifier().ban(identity, reason);
    }
}

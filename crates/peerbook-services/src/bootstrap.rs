//! Registry population from configuration.
//!
//! Service requirements are registered first so configured static peers
//! pick up their connection states on insertion.

use peerbook_core::config::{PeerbookConfig, StaticNodeConfig};
use peerbook_core::{
    Endpoint, Node, NodeIdentity, NodeMetadata, NodeSource, PublicKey, TimeSupplier,
};

use crate::local_network::LocalNetworks;
use crate::registry::{NodeRegistry, RegistryError, RegistrySettings};
use crate::subscriber::RegistrySubscriber;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("invalid public key for static node {host}: {key}")]
    InvalidPublicKey { host: String, key: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Register configured services and add every static node as `Static`.
/// Returns how many static nodes were accepted.
///
/// All keys are validated before the registry is touched.
pub fn apply_config(
    registry: &NodeRegistry,
    config: &PeerbookConfig,
) -> Result<usize, BootstrapError> {
    let nodes = config
        .static_nodes
        .iter()
        .map(static_node)
        .collect::<Result<Vec<_>, _>>()?;

    let mut modifier = registry.modifier();
    for service in &config.services {
        modifier.add_connection_states(service.id, service.roles);
    }

    let mut accepted = 0;
    for node in nodes {
        let identity = node.identity.clone();
        if modifier.add(node, NodeSource::Static) {
            accepted += 1;
        } else {
            tracing::warn!(peer = %identity, "static node did not fit in registry");
        }
    }

    tracing::info!(
        services = config.services.len(),
        static_nodes = accepted,
        "registry bootstrapped from config"
    );
    Ok(accepted)
}

/// Build a populated registry and its discovery subscriber from config.
pub fn from_config(
    config: &PeerbookConfig,
    time_supplier: TimeSupplier,
) -> Result<(NodeRegistry, RegistrySubscriber), BootstrapError> {
    let registry = NodeRegistry::new(RegistrySettings::from_config(config), time_supplier)?;
    apply_config(&registry, config)?;

    let local_networks = LocalNetworks::new(config.network.local_networks.as_slice());
    let subscriber = RegistrySubscriber::new(registry.clone(), local_networks);
    Ok((registry, subscriber))
}

fn static_node(config: &StaticNodeConfig) -> Result<Node, BootstrapError> {
    let public_key = parse_public_key(&config.public_key).ok_or_else(|| {
        BootstrapError::InvalidPublicKey {
            host: config.host.clone(),
            key: config.public_key.clone(),
        }
    })?;

    Ok(Node::new(
        NodeIdentity::new(public_key, config.host.clone()),
        Endpoint::new(config.host.clone(), config.port),
        NodeMetadata::new(config.name.clone(), config.roles),
    ))
}

fn parse_public_key(text: &str) -> Option<PublicKey> {
    let bytes = hex::decode(text).ok()?;
    bytes.try_into().ok()
}

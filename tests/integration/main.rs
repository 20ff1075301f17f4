//! Peerbook integration test harness.
//!
//! Tests drive the registry only through its public surface: the
//! `NodeSubscriber` events the transport layer fires, and the scoped
//! view/modifier accessors every other subsystem uses.
//!
//!   cargo test --test integration

use std::time::Duration;

use anyhow::{ensure, Context, Result};

use peerbook_core::{
    fixed_time_supplier, Endpoint, EqualityStrategy, Node, NodeIdentity, NodeMetadata, NodeRoles,
    NodeSource, Timestamp,
};
use peerbook_services::{
    BanSettings, LocalNetworks, NodeRegistry, NodeRegistryView, RegistrySettings,
    RegistrySubscriber,
};

mod subscriber;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Local network patterns used throughout; three of the five are malformed.
pub const LOCAL_NETWORKS: [&str; 5] = ["3", "1.2.3", "1.1.1.1.", "1000.2000.3000", "9.8.7"];

pub const REMOTE_HOST: &str = "11.22.33.44";
pub const LOCAL_HOST: &str = "9.8.7.1";

/// Registry with a 1 hour ban, 50 ban slots, and a clock pinned at zero.
pub fn create_registry(max_nodes: Option<usize>) -> NodeRegistry {
    let settings = RegistrySettings {
        max_nodes,
        equality_strategy: EqualityStrategy::KeyAndHost,
        bans: BanSettings {
            default_ban_duration: Duration::from_secs(60 * 60),
            max_banned_nodes: 50,
        },
    };
    NodeRegistry::new(settings, fixed_time_supplier(Timestamp(0)))
        .expect("test settings are valid")
}

pub fn create_subscriber(registry: &NodeRegistry) -> RegistrySubscriber {
    RegistrySubscriber::new(registry.clone(), LocalNetworks::new(&LOCAL_NETWORKS))
}

pub fn random_identity(host: &str) -> NodeIdentity {
    NodeIdentity::new(rand::random(), host)
}

/// Announced node: endpoint host is left empty, as peer exchange delivers it.
pub fn named_node(identity: &NodeIdentity, name: &str, roles: NodeRoles) -> Node {
    Node::new(
        identity.clone(),
        Endpoint::default(),
        NodeMetadata::new(name, roles),
    )
}

/// Fill the registry with static nodes, which are never evicted.
pub fn fill_with_static_nodes(registry: &NodeRegistry, count: usize) {
    let mut modifier = registry.modifier();
    for i in 0..count {
        let identity = random_identity(REMOTE_HOST);
        let node = named_node(&identity, &format!("alice{i}"), NodeRoles::PEER);
        modifier.add(node, NodeSource::Static);
    }
}

/// Check the registry holds exactly one node with the given shape.
pub fn assert_single_node(
    view: &NodeRegistryView<'_>,
    identity: &NodeIdentity,
    endpoint_host: &str,
    name: &str,
    source: NodeSource,
) -> Result<()> {
    ensure!(view.size() == 1, "expected a single node, found {}", view.size());

    let nodes = view.nodes();
    let (node, info) = nodes.last().context("registry yielded no nodes")?;

    ensure!(node.identity.public_key == identity.public_key, "public key mismatch");
    ensure!(
        node.identity.host == identity.host,
        "identity host: expected {}, got {}",
        identity.host,
        node.identity.host
    );
    ensure!(
        node.endpoint.host == endpoint_host,
        "endpoint host: expected {endpoint_host:?}, got {:?}",
        node.endpoint.host
    );
    ensure!(
        node.metadata.name == name,
        "name: expected {name:?}, got {:?}",
        node.metadata.name
    );
    ensure!(
        info.source() == source,
        "source: expected {source:?}, got {:?}",
        info.source()
    );
    Ok(())
}

use crate::*;

use peerbook_core::{BanReason, ServiceIdentifier};
use peerbook_services::{NodeSubscriber, LOOPBACK_HOST};

// ── notify_node ───────────────────────────────────────────────────────────────

fn assert_notify_node_adds_dynamic_node(identity_host: &str) -> Result<()> {
    let registry = create_registry(None);
    registry
        .modifier()
        .add_connection_states(ServiceIdentifier(1), NodeRoles::PEER);

    let identity = random_identity(identity_host);
    let node = named_node(&identity, "alice", NodeRoles::PEER);

    create_subscriber(&registry).notify_node(&node);

    // endpoint host comes from the announced node
    let view = registry.view();
    assert_single_node(&view, &identity, "", "alice", NodeSource::Dynamic)?;

    let info = view.get_node_info(&identity).context("node info missing")?;
    assert_eq!(info.num_connection_states(), 1);
    let state = info
        .get_connection_state(ServiceIdentifier(1))
        .context("auto registered connection state missing")?;
    assert_eq!(state.age(), 0);
    Ok(())
}

#[test]
fn test_notify_node_adds_dynamic_node_with_remote_network() -> Result<()> {
    assert_notify_node_adds_dynamic_node(REMOTE_HOST)
}

#[test]
fn test_notify_node_adds_dynamic_node_with_local_network() -> Result<()> {
    assert_notify_node_adds_dynamic_node(LOCAL_HOST)
}

// ── notify_incoming_node ──────────────────────────────────────────────────────

fn assert_notify_incoming_node_adds_dynamic_incoming_node(
    identity_host: &str,
    expected_host: &str,
) -> Result<()> {
    let registry = create_registry(None);
    registry
        .modifier()
        .add_connection_states(ServiceIdentifier(1), NodeRoles::PEER);

    let identity = random_identity(identity_host);

    let accepted =
        create_subscriber(&registry).notify_incoming_node(&identity, ServiceIdentifier(2));
    assert!(accepted);

    // endpoint host comes from the (adjusted) identity
    let view = registry.view();
    let adjusted = NodeIdentity::new(identity.public_key, expected_host);
    assert_single_node(&view, &adjusted, expected_host, "", NodeSource::DynamicIncoming)?;

    let info = view.get_node_info(&adjusted).context("node info missing")?;
    assert_eq!(info.num_connection_states(), 1);
    let state = info
        .get_connection_state(ServiceIdentifier(2))
        .context("incoming connection state missing")?;
    assert_eq!(state.age(), 1);
    Ok(())
}

#[test]
fn test_notify_incoming_node_adds_dynamic_incoming_node_with_remote_network() -> Result<()> {
    assert_notify_incoming_node_adds_dynamic_incoming_node(REMOTE_HOST, REMOTE_HOST)
}

#[test]
fn test_notify_incoming_node_adds_dynamic_incoming_node_with_local_network() -> Result<()> {
    assert_notify_incoming_node_adds_dynamic_incoming_node(LOCAL_HOST, LOOPBACK_HOST)
}

#[test]
fn test_notify_incoming_node_keeps_hosts_outside_malformed_patterns() -> Result<()> {
    // "1.1.1.1." and "1000.2000.3000" are malformed and must not match
    assert_notify_incoming_node_adds_dynamic_incoming_node("1.1.1.1", "1.1.1.1")
}

// ── notify_node / notify_incoming_node combinations ──────────────────────────

fn assert_combined_notifications(incoming_first: bool) -> Result<()> {
    let registry = create_registry(None);
    registry
        .modifier()
        .add_connection_states(ServiceIdentifier(1), NodeRoles::PEER);

    let identity = random_identity(REMOTE_HOST);
    let node = named_node(&identity, "alice", NodeRoles::PEER);
    let subscriber = create_subscriber(&registry);

    let accepted = if incoming_first {
        let accepted = subscriber.notify_incoming_node(&identity, ServiceIdentifier(2));
        subscriber.notify_node(&node);
        accepted
    } else {
        subscriber.notify_node(&node);
        subscriber.notify_incoming_node(&identity, ServiceIdentifier(2))
    };
    assert!(accepted);

    // the announcement outranks the incoming connection in either order
    let view = registry.view();
    assert_single_node(&view, &identity, "", "alice", NodeSource::Dynamic)?;

    let info = view.get_node_info(&identity).context("node info missing")?;
    assert_eq!(info.num_connection_states(), 2);
    assert_eq!(
        info.get_connection_state(ServiceIdentifier(1))
            .context("service 1 state missing")?
            .age(),
        0
    );
    assert_eq!(
        info.get_connection_state(ServiceIdentifier(2))
            .context("service 2 state missing")?
            .age(),
        1
    );
    Ok(())
}

#[test]
fn test_notify_node_can_be_followed_by_notify_incoming_node() -> Result<()> {
    assert_combined_notifications(false)
}

#[test]
fn test_notify_incoming_node_can_be_followed_by_notify_node() -> Result<()> {
    assert_combined_notifications(true)
}

#[test]
fn test_local_incoming_and_announcement_are_separate_identities() -> Result<()> {
    let registry = create_registry(None);
    let identity = random_identity(LOCAL_HOST);
    let subscriber = create_subscriber(&registry);

    subscriber.notify_node(&named_node(&identity, "alice", NodeRoles::PEER));
    assert!(subscriber.notify_incoming_node(&identity, ServiceIdentifier(2)));

    // under key-and-host equality the loopback identity is a different peer
    let view = registry.view();
    assert_eq!(view.size(), 2);
    assert!(view.contains(&identity));
    assert!(view.contains(&NodeIdentity::new(identity.public_key, LOOPBACK_HOST)));
    Ok(())
}

// ── full registry ─────────────────────────────────────────────────────────────

#[test]
fn test_notify_node_does_not_add_node_when_registry_is_full() {
    let registry = create_registry(Some(3));
    fill_with_static_nodes(&registry, 3);
    registry
        .modifier()
        .add_connection_states(ServiceIdentifier(1), NodeRoles::PEER);

    let identity = random_identity(REMOTE_HOST);
    let node = named_node(&identity, "alice", NodeRoles::PEER);
    create_subscriber(&registry).notify_node(&node);

    let view = registry.view();
    assert_eq!(view.size(), 3);
    assert!(!view.contains(&identity));
}

#[test]
fn test_notify_incoming_node_does_not_add_node_when_registry_is_full() {
    let registry = create_registry(Some(3));
    fill_with_static_nodes(&registry, 3);
    registry
        .modifier()
        .add_connection_states(ServiceIdentifier(1), NodeRoles::PEER);

    let identity = random_identity(REMOTE_HOST);
    let accepted =
        create_subscriber(&registry).notify_incoming_node(&identity, ServiceIdentifier(2));
    assert!(!accepted);

    let view = registry.view();
    assert_eq!(view.size(), 3);
    assert!(!view.contains(&identity));
}

// ── notify_ban ────────────────────────────────────────────────────────────────

#[test]
fn test_notify_ban_adds_node_to_ban_list() {
    let registry = create_registry(None);
    let identity = random_identity(REMOTE_HOST);
    assert!(!registry.view().is_banned(&identity));

    create_subscriber(&registry).notify_ban(&identity, BanReason(123));

    let view = registry.view();
    assert_eq!(view.size(), 0);
    assert!(view.is_banned(&identity));
}

#[test]
fn test_subscriber_is_usable_as_trait_object() {
    let registry = create_registry(None);
    let subscriber: Box<dyn NodeSubscriber> = Box::new(create_subscriber(&registry));

    let identity = random_identity(REMOTE_HOST);
    subscriber.notify_node(&named_node(&identity, "alice", NodeRoles::PEER));
    assert!(registry.view().contains(&identity));
}

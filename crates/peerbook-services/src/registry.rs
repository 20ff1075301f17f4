//! Node registry: identity-keyed store of every peer this node knows.
//!
//! Access goes through two scoped guards:
//! - `view()`     shared read access; any number may be held at once
//! - `modifier()` exclusive read-write access
//!
//! Both hold the registry lock for their lifetime, so a view never observes
//! a partially applied modification. Views are recursive: a thread holding
//! one can open another even while a modifier is queued. Asking for a
//! modifier while this thread holds a guard on the same registry can never
//! succeed; debug builds panic on it, release builds deadlock.
//!
//! Capacity is enforced by source priority: when full, a new node may evict
//! the lowest-priority record that ranks strictly below it. Pinned sources
//! (Static, Local) are never evicted.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use peerbook_core::config::PeerbookConfig;
use peerbook_core::{
    BanReason, EqualityStrategy, IdentityKey, Node, NodeIdentity, NodeRoles, NodeSource,
    ServiceIdentifier, TimeSupplier, Timestamp,
};

use crate::ban_list::{BanEntry, BanList, BanSettings};
use crate::connection_state::{ConnectionState, ConnectionStates};

// ── Settings ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Max records. `None` = unbounded.
    pub max_nodes: Option<usize>,
    pub equality_strategy: EqualityStrategy,
    pub bans: BanSettings,
}

impl RegistrySettings {
    pub fn from_config(config: &PeerbookConfig) -> Self {
        Self {
            max_nodes: config.registry.max_nodes,
            equality_strategy: config.registry.equality_strategy,
            bans: BanSettings::from(&config.bans),
        }
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.max_nodes == Some(0) {
            return Err(RegistryError::ZeroCapacity);
        }
        if self.bans.max_banned_nodes == 0 {
            return Err(RegistryError::ZeroBanCapacity);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("max_nodes must be greater than zero")]
    ZeroCapacity,
    #[error("max_banned_nodes must be greater than zero")]
    ZeroBanCapacity,
}

// ── Records ───────────────────────────────────────────────────────────────────

/// Registry-side bookkeeping for a node.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    source: NodeSource,
    connection_states: ConnectionStates,
}

impl NodeInfo {
    fn new(source: NodeSource) -> Self {
        Self {
            source,
            connection_states: ConnectionStates::new(),
        }
    }

    pub fn source(&self) -> NodeSource {
        self.source
    }

    pub fn num_connection_states(&self) -> usize {
        self.connection_states.len()
    }

    /// `None` if no state is registered for `service_id`.
    pub fn get_connection_state(&self, service_id: ServiceIdentifier) -> Option<&ConnectionState> {
        self.connection_states.get(service_id)
    }

    /// Services this node has connection state for.
    pub fn services(&self) -> Vec<ServiceIdentifier> {
        self.connection_states.iter().map(|s| s.service_id).collect()
    }
}

#[derive(Debug)]
struct NodeRecord {
    node: Node,
    info: NodeInfo,
    /// Insertion order; oldest wins eviction ties.
    sequence: u64,
}

/// A service that needs connection slots to nodes with any of `roles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ServiceRequirement {
    service_id: ServiceIdentifier,
    roles: NodeRoles,
}

impl ServiceRequirement {
    fn applies_to(&self, node: &Node) -> bool {
        self.roles.intersects(node.metadata.roles)
    }
}

fn materialize(requirements: &[ServiceRequirement], record: &mut NodeRecord) {
    for requirement in requirements.iter().filter(|r| r.applies_to(&record.node)) {
        record.info.connection_states.provision(requirement.service_id);
    }
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct RegistryState {
    max_nodes: Option<usize>,
    strategy: EqualityStrategy,
    records: HashMap<IdentityKey, NodeRecord>,
    next_sequence: u64,
    requirements: Vec<ServiceRequirement>,
    bans: BanList,
}

impl RegistryState {
    fn is_full(&self) -> bool {
        self.max_nodes.is_some_and(|max| self.records.len() >= max)
    }

    /// Remove the lowest-priority record ranking strictly below `source`.
    fn evict_below(&mut self, source: NodeSource) -> Option<NodeRecord> {
        let victim = self
            .records
            .iter()
            .filter(|(_, r)| !r.info.source.is_pinned() && r.info.source < source)
            .min_by_key(|(_, r)| (r.info.source, r.sequence))
            .map(|(key, _)| key.clone())?;
        self.records.remove(&victim)
    }
}

/// The node registry. Clones share the same underlying state.
#[derive(Clone)]
pub struct NodeRegistry {
    state: Arc<RwLock<RegistryState>>,
    time_supplier: TimeSupplier,
}

impl NodeRegistry {
    /// Fails if a capacity is configured as zero.
    pub fn new(
        settings: RegistrySettings,
        time_supplier: TimeSupplier,
    ) -> Result<Self, RegistryError> {
        settings.validate()?;
        let state = RegistryState {
            max_nodes: settings.max_nodes,
            strategy: settings.equality_strategy,
            records: HashMap::new(),
            next_sequence: 0,
            requirements: Vec::new(),
            bans: BanList::new(settings.bans, settings.equality_strategy),
        };
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            time_supplier,
        })
    }

    /// Shared read access. Blocks while a modifier is held, but never
    /// behind a queued one if this thread already holds a view.
    pub fn view(&self) -> NodeRegistryView<'_> {
        let held = HeldGuard::acquire(self.id(), Access::Read);
        NodeRegistryView {
            state: self.state.read_recursive(),
            now: (self.time_supplier)(),
            _held: held,
        }
    }

    /// Exclusive write access. Blocks while any view or modifier is held.
    pub fn modifier(&self) -> NodeRegistryModifier<'_> {
        let held = HeldGuard::acquire(self.id(), Access::Write);
        NodeRegistryModifier {
            state: self.state.write(),
            time_supplier: &self.time_supplier,
            _held: held,
        }
    }

    fn id(&self) -> usize {
        Arc::as_ptr(&self.state) as usize
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry").finish_non_exhaustive()
    }
}

// ── Same-thread guard tracking ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

thread_local! {
    /// Registries this thread currently holds a guard on.
    static HELD: RefCell<Vec<(usize, Access)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a registry as locked by the current thread until dropped.
/// Checked before locking, so a self-deadlock panics in debug builds.
struct HeldGuard {
    registry: usize,
    access: Access,
}

impl HeldGuard {
    fn acquire(registry: usize, access: Access) -> Self {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            let conflict = held.iter().any(|&(r, a)| {
                r == registry && (access == Access::Write || a == Access::Write)
            });
            debug_assert!(
                !conflict,
                "{access:?} access requested while this thread already holds a \
                 conflicting guard on the same registry"
            );
            held.push((registry, access));
        });
        Self { registry, access }
    }
}

impl Drop for HeldGuard {
    fn drop(&mut self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(pos) = held.iter().rposition(|&e| e == (self.registry, self.access)) {
                held.swap_remove(pos);
            }
        });
    }
}

// ── View ──────────────────────────────────────────────────────────────────────

/// Read-only access to the registry. Releases the lock on drop.
pub struct NodeRegistryView<'a> {
    state: RwLockReadGuard<'a, RegistryState>,
    now: Timestamp,
    _held: HeldGuard,
}

impl NodeRegistryView<'_> {
    pub fn size(&self) -> usize {
        self.state.records.len()
    }

    pub fn max_nodes(&self) -> Option<usize> {
        self.state.max_nodes
    }

    pub fn contains(&self, identity: &NodeIdentity) -> bool {
        self.record(identity).is_some()
    }

    pub fn get_node(&self, identity: &NodeIdentity) -> Option<&Node> {
        self.record(identity).map(|r| &r.node)
    }

    pub fn get_node_info(&self, identity: &NodeIdentity) -> Option<&NodeInfo> {
        self.record(identity).map(|r| &r.info)
    }

    /// True if `identity` has an unexpired ban, with or without a record.
    pub fn is_banned(&self, identity: &NodeIdentity) -> bool {
        self.state.bans.is_banned(identity, self.now)
    }

    pub fn ban_entry(&self, identity: &NodeIdentity) -> Option<&BanEntry> {
        self.state.bans.get(identity, self.now)
    }

    /// Number of unexpired bans.
    pub fn banned_nodes_size(&self) -> usize {
        self.state.bans.active_len(self.now)
    }

    /// Visit every record in insertion order.
    pub fn for_each(&self, mut visitor: impl FnMut(&Node, &NodeInfo)) {
        for record in self.ordered_records() {
            visitor(&record.node, &record.info);
        }
    }

    /// Every record in insertion order.
    pub fn nodes(&self) -> Vec<(&Node, &NodeInfo)> {
        self.ordered_records()
            .into_iter()
            .map(|r| (&r.node, &r.info))
            .collect()
    }

    fn ordered_records(&self) -> Vec<&NodeRecord> {
        let mut records: Vec<&NodeRecord> = self.state.records.values().collect();
        records.sort_by_key(|r| r.sequence);
        records
    }

    fn record(&self, identity: &NodeIdentity) -> Option<&NodeRecord> {
        self.state.records.get(&self.state.strategy.key_for(identity))
    }
}

// ── Modifier ──────────────────────────────────────────────────────────────────

/// Exclusive read-write access to the registry. Releases the lock on drop.
pub struct NodeRegistryModifier<'a> {
    state: RwLockWriteGuard<'a, RegistryState>,
    time_supplier: &'a TimeSupplier,
    _held: HeldGuard,
}

impl NodeRegistryModifier<'_> {
    /// Add or update a node. Returns false only when the registry is full
    /// and nothing ranks below `source`; in that case nothing changes.
    ///
    /// An existing record takes the new endpoint, metadata, and source only
    /// if `source` ranks at least as high as the stored one. Either way any
    /// newly applicable connection states are created.
    pub fn add(&mut self, node: Node, source: NodeSource) -> bool {
        let state = &mut *self.state;
        let key = state.strategy.key_for(&node.identity);

        if let Some(record) = state.records.get_mut(&key) {
            if source >= record.info.source {
                tracing::debug!(
                    peer = %record.node.identity,
                    from = ?record.info.source,
                    to = ?source,
                    "updating known node"
                );
                record.node.endpoint = node.endpoint;
                record.node.metadata = node.metadata;
                record.info.source = source;
            }
            materialize(&state.requirements, record);
            return true;
        }

        if state.is_full() {
            match state.evict_below(source) {
                Some(evicted) => tracing::info!(
                    peer = %evicted.node.identity,
                    source = ?evicted.info.source,
                    replacement = %node.identity,
                    "evicted node to make room"
                ),
                None => {
                    tracing::warn!(
                        peer = %node.identity,
                        source = ?source,
                        size = state.records.len(),
                        "registry full, node rejected"
                    );
                    return false;
                }
            }
        }

        tracing::debug!(peer = %node.identity, source = ?source, "node added");
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let mut record = NodeRecord {
            node,
            info: NodeInfo::new(source),
            sequence,
        };
        materialize(&state.requirements, &mut record);
        state.records.insert(key, record);
        true
    }

    /// Register a service requirement and create age-0 states for every
    /// existing node whose roles intersect `roles`.
    ///
    /// Registering a known service again widens its role mask.
    pub fn add_connection_states(&mut self, service_id: ServiceIdentifier, roles: NodeRoles) {
        let state = &mut *self.state;
        match state
            .requirements
            .iter_mut()
            .find(|r| r.service_id == service_id)
        {
            Some(requirement) => requirement.roles |= roles,
            None => state.requirements.push(ServiceRequirement { service_id, roles }),
        }

        for record in state.records.values_mut() {
            materialize(&state.requirements, record);
        }
        tracing::debug!(
            service = %service_id,
            roles = roles.bits(),
            "service requirement registered"
        );
    }

    /// Get the connection state for a known node, creating it at age 0 if
    /// absent. `None` if the node is unknown.
    pub fn provision_connection_state(
        &mut self,
        service_id: ServiceIdentifier,
        identity: &NodeIdentity,
    ) -> Option<&mut ConnectionState> {
        let key = self.state.strategy.key_for(identity);
        self.state
            .records
            .get_mut(&key)
            .map(|record| record.info.connection_states.provision(service_id))
    }

    /// Ban `identity` for the default duration. Never touches records.
    pub fn ban(&mut self, identity: &NodeIdentity, reason: BanReason) {
        let now = (self.time_supplier)();
        self.state.bans.ban(identity, reason, now);
        tracing::info!(peer = %identity, reason = %reason, "node banned");
    }

    /// Physically drop expired bans. Returns how many were removed.
    pub fn prune_banned_nodes(&mut self) -> usize {
        let now = (self.time_supplier)();
        self.state.bans.prune(now)
    }

    pub fn size(&self) -> usize {
        self.state.records.len()
    }

    pub fn contains(&self, identity: &NodeIdentity) -> bool {
        self.state
            .records
            .contains_key(&self.state.strategy.key_for(identity))
    }
}

//! Per-node connection state, one entry per network service.
//!
//! Entries are created at age 0 and only ever age forward. Nothing removes
//! an entry; the table lives and dies with its registry record.

use std::collections::BTreeMap;

use peerbook_core::ServiceIdentifier;

/// Connection bookkeeping for one (node, service) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub service_id: ServiceIdentifier,
    age: u64,
}

impl ConnectionState {
    pub fn new(service_id: ServiceIdentifier) -> Self {
        Self { service_id, age: 0 }
    }

    /// Count of confirmed interactions with this service.
    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn increment_age(&mut self) {
        self.age = self.age.saturating_add(1);
    }
}

/// Service → state table owned by a single registry record.
#[derive(Debug, Clone, Default)]
pub struct ConnectionStates {
    states: BTreeMap<ServiceIdentifier, ConnectionState>,
}

impl ConnectionStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// `None` means no state is registered for this service.
    pub fn get(&self, service_id: ServiceIdentifier) -> Option<&ConnectionState> {
        self.states.get(&service_id)
    }

    /// Get the state for a service, creating it at age 0 if absent.
    pub fn provision(&mut self, service_id: ServiceIdentifier) -> &mut ConnectionState {
        self.states
            .entry(service_id)
            .or_insert_with(|| ConnectionState::new(service_id))
    }

    /// States in ascending service order.
    pub fn iter(&self) -> impl Iterator<Item = &ConnectionState> {
        self.states.values()
    }
}

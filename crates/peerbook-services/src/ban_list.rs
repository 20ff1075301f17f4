//! Ban list: time-bounded exclusion of peer identities.
//!
//! Independent of registry membership: an identity can be banned without
//! ever having a record, and banning never removes one. Expired entries
//! read as absent immediately but are only physically dropped by `prune`
//! or when an insertion needs room.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use peerbook_core::config::{BanConfig, DEFAULT_BAN_DURATION_SECS, DEFAULT_MAX_BANNED_NODES};
use peerbook_core::{BanReason, EqualityStrategy, IdentityKey, NodeIdentity, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanSettings {
    pub default_ban_duration: Duration,
    pub max_banned_nodes: usize,
}

impl Default for BanSettings {
    fn default() -> Self {
        Self {
            default_ban_duration: Duration::from_secs(DEFAULT_BAN_DURATION_SECS),
            max_banned_nodes: DEFAULT_MAX_BANNED_NODES,
        }
    }
}

impl From<&BanConfig> for BanSettings {
    fn from(config: &BanConfig) -> Self {
        Self {
            default_ban_duration: Duration::from_secs(config.default_ban_duration_secs),
            max_banned_nodes: config.max_banned_nodes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    pub identity: NodeIdentity,
    pub expiry: Timestamp,
    pub reason: BanReason,
    /// Insertion order; the smallest is evicted first.
    sequence: u64,
}

impl BanEntry {
    pub fn is_active(&self, now: Timestamp) -> bool {
        self.expiry > now
    }
}

#[derive(Debug, Clone)]
pub struct BanList {
    settings: BanSettings,
    strategy: EqualityStrategy,
    entries: HashMap<IdentityKey, BanEntry>,
    /// Sequence → key, oldest first. Mirrors `entries` exactly.
    order: BTreeMap<u64, IdentityKey>,
    next_sequence: u64,
}

impl BanList {
    pub fn new(settings: BanSettings, strategy: EqualityStrategy) -> Self {
        Self {
            settings,
            strategy,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    /// Ban `identity` until `now + default_ban_duration`.
    ///
    /// Re-banning refreshes expiry and reason and moves the entry to the
    /// back of the eviction queue. When full, expired entries go first,
    /// then the oldest live one.
    pub fn ban(&mut self, identity: &NodeIdentity, reason: BanReason, now: Timestamp) {
        let key = self.strategy.key_for(identity);
        match self.entries.get(&key) {
            Some(existing) => {
                self.order.remove(&existing.sequence);
            }
            None if self.entries.len() >= self.settings.max_banned_nodes => self.make_room(now),
            None => {}
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.order.insert(sequence, key.clone());
        self.entries.insert(
            key,
            BanEntry {
                identity: identity.clone(),
                expiry: now.saturating_add(self.settings.default_ban_duration),
                reason,
                sequence,
            },
        );
    }

    pub fn is_banned(&self, identity: &NodeIdentity, now: Timestamp) -> bool {
        self.get(identity, now).is_some()
    }

    /// The live ban for `identity`, if any.
    pub fn get(&self, identity: &NodeIdentity, now: Timestamp) -> Option<&BanEntry> {
        self.entries
            .get(&self.strategy.key_for(identity))
            .filter(|entry| entry.is_active(now))
    }

    /// Number of unexpired entries.
    pub fn active_len(&self, now: Timestamp) -> usize {
        self.entries.values().filter(|e| e.is_active(now)).count()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        let order = &mut self.order;
        self.entries.retain(|_, e| {
            let active = e.is_active(now);
            if !active {
                order.remove(&e.sequence);
            }
            active
        });
        before - self.entries.len()
    }

    /// Every ban lasts `default_ban_duration`, so expiry follows sequence
    /// order and expired entries sit at the front of the queue.
    fn make_room(&mut self, now: Timestamp) {
        let mut purged = 0;
        while self.oldest().is_some_and(|e| !e.is_active(now)) {
            self.pop_oldest();
            purged += 1;
        }
        if purged > 0 {
            return;
        }

        if let Some(evicted) = self.pop_oldest() {
            tracing::debug!(
                peer = %evicted.identity,
                reason = %evicted.reason,
                "ban list full, dropped oldest ban"
            );
        }
    }

    fn oldest(&self) -> Option<&BanEntry> {
        let (_, key) = self.order.first_key_value()?;
        self.entries.get(key)
    }

    fn pop_oldest(&mut self) -> Option<BanEntry> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key)
    }
}

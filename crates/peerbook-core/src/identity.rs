//! Node identity: who a peer is, and how two identities compare.
//!
//! An identity is a public key plus the host the peer was seen at. Whether
//! two identities are "the same peer" depends on the equality strategy the
//! registry was built with, so lookups go through an `IdentityKey` that
//! projects only the fields the strategy cares about.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ed25519 public key of a peer.
pub type PublicKey = [u8; 32];

/// Public key and host of a peer.
///
/// Immutable once a registry record has been created for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub public_key: PublicKey,
    pub host: String,
}

impl NodeIdentity {
    pub fn new(public_key: PublicKey, host: impl Into<String>) -> Self {
        Self {
            public_key,
            host: host.into(),
        }
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = hex::encode(self.public_key);
        write!(f, "{}@{}", &key[..16], self.host)
    }
}

// ── Equality ──────────────────────────────────────────────────────────────────

/// Which identity fields participate in equality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityStrategy {
    /// Same public key = same peer, regardless of host.
    Key,
    /// Same host = same peer, regardless of key.
    Host,
    /// Both key and host must match.
    #[default]
    KeyAndHost,
}

impl EqualityStrategy {
    /// Project an identity onto the fields this strategy compares.
    pub fn key_for(&self, identity: &NodeIdentity) -> IdentityKey {
        match self {
            EqualityStrategy::Key => IdentityKey {
                public_key: Some(identity.public_key),
                host: None,
            },
            EqualityStrategy::Host => IdentityKey {
                public_key: None,
                host: Some(identity.host.clone()),
            },
            EqualityStrategy::KeyAndHost => IdentityKey {
                public_key: Some(identity.public_key),
                host: Some(identity.host.clone()),
            },
        }
    }

    /// True if both identities compare equal under this strategy.
    pub fn equal(&self, lhs: &NodeIdentity, rhs: &NodeIdentity) -> bool {
        self.key_for(lhs) == self.key_for(rhs)
    }
}

/// Hashable lookup key derived from an identity under an `EqualityStrategy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    public_key: Option<PublicKey>,
    host: Option<String>,
}

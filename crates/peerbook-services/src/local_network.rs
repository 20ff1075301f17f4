//! Local-network classification of peer hosts.
//!
//! Patterns are dotted IPv4 octet prefixes: "9.8.7" matches every host in
//! 9.8.7.0/24, "3" matches 3.0.0.0/8 but not 33.x.x.x. Hosts that are not
//! IPv4 addresses never match.

use std::net::Ipv4Addr;

/// Host recorded for peers that connect from the local network.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalNetworks {
    prefixes: Vec<Vec<u8>>,
}

impl LocalNetworks {
    /// Build from configured patterns. Malformed patterns are skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let prefixes = patterns
            .iter()
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                let prefix = parse_prefix(pattern);
                if prefix.is_none() {
                    tracing::warn!(pattern, "ignoring malformed local network pattern");
                }
                prefix
            })
            .collect();
        Self { prefixes }
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn is_local(&self, host: &str) -> bool {
        let Ok(addr) = host.parse::<Ipv4Addr>() else {
            return false;
        };
        let octets = addr.octets();
        self.prefixes
            .iter()
            .any(|prefix| octets.starts_with(prefix))
    }

    /// The host to record for a peer seen at `host`.
    pub fn resolve_host<'a>(&self, host: &'a str) -> &'a str {
        if self.is_local(host) {
            LOOPBACK_HOST
        } else {
            host
        }
    }
}

fn parse_prefix(pattern: &str) -> Option<Vec<u8>> {
    let octets = pattern
        .split('.')
        .map(|segment| {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            segment.parse::<u8>().ok()
        })
        .collect::<Option<Vec<u8>>>()?;

    (1..=4).contains(&octets.len()).then_some(octets)
}

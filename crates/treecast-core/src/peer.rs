//! Peer identity, the directory of known peers, and the visited set.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A node identity on the wire: `(host, port)`. Immutable once recorded;
/// equality is by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub host: String,
    pub port: u16,
}

impl Peer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Insertion-ordered set of known remote endpoints. Registration is
/// idempotent; there is no removal and no liveness tracking — an unreachable
/// peer is only discovered as such when a call against it fails.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: Vec<Peer>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `peer` if absent. Returns whether it was newly added.
    pub fn register(&mut self, peer: Peer) -> bool {
        if self.peers.contains(&peer) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    /// Register every peer in `peers` that is not `this_node`.
    pub fn merge<'a>(&mut self, peers: impl IntoIterator<Item = &'a Peer>, this_node: &Peer) {
        for peer in peers {
            if peer != this_node {
                self.register(peer.clone());
            }
        }
    }

    pub fn contains(&self, peer: &Peer) -> bool {
        self.peers.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    /// Clone of the directory contents, in insertion order.
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.clone()
    }
}

/// Peers already offered the current distribution by some node in the tree.
/// Grows monotonically; insertion order preserved, duplicates suppressed.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet {
    peers: Vec<Peer>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `peer` if absent. Returns whether it was newly added.
    pub fn insert(&mut self, peer: Peer) -> bool {
        if self.peers.contains(&peer) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    /// Fold a forwarded visited snapshot into this one.
    pub fn merge(&mut self, peers: impl IntoIterator<Item = Peer>) {
        for peer in peers {
            self.insert(peer);
        }
    }

    pub fn contains(&self, peer: &Peer) -> bool {
        self.peers.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Clone of the visited peers, in insertion order.
    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.clone()
    }
}

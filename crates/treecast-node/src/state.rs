//! Shared node state and the serving side of the distribution contract.
//!
//! One `Node` per process. Inbound contract calls and the propagation worker
//! share the same state; every mutation goes through the node's lock, and the
//! lock is never held across a remote call or a disk write.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use treecast_core::peer::{Peer, PeerDirectory, VisitedSet};
use treecast_net::contract::{Contract, RpcError};

use crate::store::FileStore;

/// Per-distribution and directory state guarded by the node lock.
#[derive(Debug, Default)]
struct State {
    directory: PeerDirectory,
    visited: VisitedSet,
    /// Name of the transfer being received; `None` when idle. The check-and-set
    /// in [`Node::try_prepare`] is keyed purely on name equality — two
    /// different in-flight names are both accepted, which can clobber the
    /// payload buffer. Known limitation carried over from the protocol.
    current_file: Option<String>,
    /// Bytes of the file currently held; `None` when idle. `Some` with an
    /// empty vec is a legitimate zero-byte transfer.
    payload: Option<Vec<u8>>,
}

/// Snapshot the propagation worker takes at the start of a fan-out pass.
#[derive(Debug)]
pub struct PassSnapshot {
    pub file_name: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub peers: Vec<Peer>,
}

/// A running node: identity, file store, lock-guarded state, and the counting
/// signal that wakes the propagation worker once per committed receive.
pub struct Node {
    this_node: Peer,
    store: FileStore,
    state: Mutex<State>,
    deploys: Semaphore,
}

impl Node {
    pub fn new(this_node: Peer, store: FileStore) -> Self {
        Self {
            this_node,
            store,
            state: Mutex::new(State::default()),
            deploys: Semaphore::new(0),
        }
    }

    pub fn this_node(&self) -> &Peer {
        &self.this_node
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("node state lock poisoned")
    }

    /// Directory contents, in insertion order.
    pub fn known_peers(&self) -> Vec<Peer> {
        self.state().directory.snapshot()
    }

    /// Peers offered so far, in insertion order.
    pub fn visited_peers(&self) -> Vec<Peer> {
        self.state().visited.snapshot()
    }

    /// Add a peer to the directory. True when newly added.
    pub fn register_peer(&self, peer: Peer) -> bool {
        let added = self.state().directory.register(peer.clone());
        if added {
            info!(%peer, "peer registered");
        }
        added
    }

    /// Transfer guard: reserve the slot for `file_name`. Rejects only when a
    /// transfer with the very same name is already in progress.
    pub fn try_prepare(&self, file_name: &str) -> bool {
        let mut state = self.state();
        if state.current_file.as_deref() == Some(file_name) {
            return false;
        }
        state.current_file = Some(file_name.to_string());
        true
    }

    /// Accept the bytes of the prepared transfer: merge the forwarded
    /// snapshots, persist to the store, and signal the worker.
    ///
    /// On a persist failure the busy state is deliberately left in place —
    /// the caller sees `false` and nothing is forwarded from here.
    pub fn accept(&self, data: &[u8], known_peers: &[Peer], visited: &[Peer]) -> bool {
        let file_name = {
            let mut state = self.state();
            let Some(file_name) = state.current_file.clone() else {
                warn!("commit without a prepared transfer; ignoring");
                return false;
            };
            state.directory.merge(known_peers, &self.this_node);
            state.visited.merge(visited.iter().cloned());
            state.visited.insert(self.this_node.clone());
            state.payload = Some(data.to_vec());
            file_name
        };

        // Disk work happens outside the lock.
        match self.store.save(&file_name, data) {
            Ok(path) => {
                let digest = hex::encode(Sha256::digest(data));
                info!(
                    file = %file_name,
                    path = %path.display(),
                    bytes = data.len(),
                    %digest,
                    "stored received file"
                );
                self.deploys.add_permits(1);
                true
            }
            Err(e) => {
                error!(file = %file_name, error = %e, "failed to persist received file");
                false
            }
        }
    }

    /// Park until the next committed receive. Returns `false` once the node
    /// is shutting down.
    pub async fn wait_for_deploy(&self) -> bool {
        match self.deploys.acquire().await {
            Ok(permit) => {
                permit.forget();
                true
            }
            Err(_) => false,
        }
    }

    /// One-shot shutdown: wakes the parked worker, which then exits.
    pub fn shutdown(&self) {
        self.deploys.close();
    }

    /// Snapshot taken by the worker when it wakes.
    pub fn begin_pass(&self) -> PassSnapshot {
        let state = self.state();
        PassSnapshot {
            file_name: state.current_file.clone(),
            payload: state.payload.clone(),
            peers: state.directory.snapshot(),
        }
    }

    pub fn is_visited(&self, peer: &Peer) -> bool {
        self.state().visited.contains(peer)
    }

    /// Record that `peer` accepted the offer, *before* forwarding to it, and
    /// return the snapshots to forward. The directory snapshot includes this
    /// node so the receiver learns its upstream; the visited snapshot keeps
    /// growing as the pass progresses.
    pub fn mark_visited(&self, peer: &Peer) -> (Vec<Peer>, Vec<Peer>) {
        let mut state = self.state();
        state.visited.insert(peer.clone());
        let mut known = state.directory.snapshot();
        if !known.contains(&self.this_node) {
            known.push(self.this_node.clone());
        }
        (known, state.visited.snapshot())
    }

    /// Clear per-distribution state; the node returns to idle. The visited
    /// set is intentionally not reset — see the protocol notes.
    pub fn finish_pass(&self) {
        let mut state = self.state();
        state.current_file = None;
        state.payload = None;
    }
}

#[async_trait]
impl Contract for Node {
    async fn register(&self, peer: &Peer) -> Result<bool, RpcError> {
        Ok(self.register_peer(peer.clone()))
    }

    async fn prepare_to_receive(&self, file_name: &str) -> Result<bool, RpcError> {
        Ok(self.try_prepare(file_name))
    }

    async fn commit_receive(
        &self,
        data: &[u8],
        known_peers: &[Peer],
        visited: &[Peer],
    ) -> Result<bool, RpcError> {
        Ok(self.accept(data, known_peers, visited))
    }
}

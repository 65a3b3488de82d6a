//! The three-operation distribution contract.
//!
//! Every node implements [`Contract`] twice over: the serving side answers
//! these calls against its own state, and [`crate::client::RpcClient`] is the
//! typed stub used when acting as a caller.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use treecast_core::peer::Peer;

use crate::codec::WireError;

/// A remote call failed at the transport level or was refused outright by
/// the remote end. A rejected handshake is *not* an error — that is the
/// `Ok(false)` branch.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("peer reported: {0}")]
    Remote(String),
}

/// The remote contract exposed by every node.
#[async_trait]
pub trait Contract: Send + Sync {
    /// Add `peer` to the directory. True when it was newly added.
    async fn register(&self, peer: &Peer) -> Result<bool, RpcError>;

    /// Reserve the transfer slot for `file_name`. True when accepted; false
    /// when a transfer with the same name is already in progress.
    async fn prepare_to_receive(&self, file_name: &str) -> Result<bool, RpcError>;

    /// Deliver the file bytes plus the sender's directory and visited
    /// snapshots. True when the bytes were persisted.
    async fn commit_receive(
        &self,
        data: &[u8],
        known_peers: &[Peer],
        visited: &[Peer],
    ) -> Result<bool, RpcError>;
}

#[async_trait]
impl<T> Contract for Arc<T>
where
    T: Contract + ?Sized,
{
    async fn register(&self, peer: &Peer) -> Result<bool, RpcError> {
        (**self).register(peer).await
    }

    async fn prepare_to_receive(&self, file_name: &str) -> Result<bool, RpcError> {
        (**self).prepare_to_receive(file_name).await
    }

    async fn commit_receive(
        &self,
        data: &[u8],
        known_peers: &[Peer],
        visited: &[Peer],
    ) -> Result<bool, RpcError> {
        (**self).commit_receive(data, known_peers, visited).await
    }
}

/// Produces a per-peer [`Contract`] handle. The propagation worker is generic
/// over this so tests can wire nodes together without sockets.
pub trait Dial: Send + Sync {
    type Conn: Contract;

    fn dial(&self, peer: &Peer) -> Self::Conn;
}

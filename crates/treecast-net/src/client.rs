//! Typed remote-call stub over the framed transport.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::trace;

use treecast_core::message::{self, Request, Response};
use treecast_core::peer::Peer;

use crate::codec::{self, WireError};
use crate::contract::{Contract, Dial, RpcError};

/// One remote node, addressed by `(host, port)`. Each call opens a fresh
/// connection and performs a single request/response exchange — at-most-once
/// delivery, no retry, no timeout.
#[derive(Debug, Clone)]
pub struct RpcClient {
    peer: Peer,
}

impl RpcClient {
    pub fn new(peer: Peer) -> Self {
        Self { peer }
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    async fn call(&self, request: &Request) -> Result<bool, RpcError> {
        trace!(peer = %self.peer, request = ?request, "remote call");
        let mut stream = TcpStream::connect((self.peer.host.as_str(), self.peer.port))
            .await
            .map_err(WireError::Io)?;
        codec::write_message(&mut stream, request).await?;
        let response: Response = codec::read_message(&mut stream).await?;
        match response {
            Response::Ack { accepted } => Ok(accepted),
            Response::Error { message } => Err(RpcError::Remote(message)),
        }
    }
}

#[async_trait]
impl Contract for RpcClient {
    async fn register(&self, peer: &Peer) -> Result<bool, RpcError> {
        self.call(&Request::Register {
            host: peer.host.clone(),
            port: peer.port,
        })
        .await
    }

    async fn prepare_to_receive(&self, file_name: &str) -> Result<bool, RpcError> {
        self.call(&Request::PrepareToReceive {
            file_name: file_name.to_string(),
        })
        .await
    }

    async fn commit_receive(
        &self,
        data: &[u8],
        known_peers: &[Peer],
        visited: &[Peer],
    ) -> Result<bool, RpcError> {
        self.call(&Request::CommitReceive {
            data: message::encode_payload(data),
            known_peers: known_peers.to_vec(),
            visited: visited.to_vec(),
        })
        .await
    }
}

/// Dials peers over TCP with [`RpcClient`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dial for TcpDialer {
    type Conn = RpcClient;

    fn dial(&self, peer: &Peer) -> RpcClient {
        RpcClient::new(peer.clone())
    }
}

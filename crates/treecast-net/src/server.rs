//! Serving loop: one framed request/response exchange per connection.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use treecast_core::message::{self, Request, Response};
use treecast_core::peer::Peer;

use crate::codec::{self, WireError};
use crate::contract::Contract;

/// Accept connections forever, serving each on its own task. Multiple peers
/// may call in concurrently; serialization of state happens behind the
/// contract implementation, not here.
pub async fn serve<C>(listener: TcpListener, contract: Arc<C>) -> std::io::Result<()>
where
    C: Contract + 'static,
{
    loop {
        let (stream, remote) = listener.accept().await?;
        let contract = Arc::clone(&contract);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &*contract).await {
                debug!(%remote, error = %e, "connection ended with error");
            }
        });
    }
}

async fn handle_connection<C: Contract>(
    mut stream: TcpStream,
    contract: &C,
) -> Result<(), WireError> {
    let body = codec::read_frame(&mut stream).await?;
    let response = match serde_json::from_slice::<Request>(&body) {
        Ok(request) => dispatch(contract, request).await,
        Err(e) => Response::Error {
            message: format!("malformed request: {e}"),
        },
    };
    codec::write_message(&mut stream, &response).await
}

/// Route one request to the contract. Boolean results become `ACK`; anything
/// the contract cannot serve becomes `ERROR`.
pub async fn dispatch<C: Contract>(contract: &C, request: Request) -> Response {
    let result = match request {
        Request::Register { host, port } => contract.register(&Peer::new(host, port)).await,
        Request::PrepareToReceive { file_name } => contract.prepare_to_receive(&file_name).await,
        Request::CommitReceive {
            data,
            known_peers,
            visited,
        } => match message::decode_payload(&data) {
            Ok(bytes) => contract.commit_receive(&bytes, &known_peers, &visited).await,
            Err(e) => {
                return Response::Error {
                    message: format!("invalid payload encoding: {e}"),
                }
            }
        },
    };
    match result {
        Ok(accepted) => Response::Ack { accepted },
        Err(e) => Response::Error {
            message: e.to_string(),
        },
    }
}

//! Wire messages for the distribution contract.
//!
//! Every remote call is a single request/response exchange. Payload bytes
//! travel base64-encoded inside the JSON body.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::peer::Peer;

/// Protocol limits and defaults.
pub mod constants {
    /// Hard cap on a single wire frame, length prefix excluded.
    pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024; // 64 MiB

    /// Default listen port for a node.
    pub const DEFAULT_PORT: u16 = 7432;
}

/// A remote call against a node's contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// Add the calling node to the peer directory.
    Register { host: String, port: u16 },
    /// Reserve the transfer slot for a named file.
    PrepareToReceive { file_name: String },
    /// Deliver the file bytes plus the sender's directory and visited
    /// snapshots.
    CommitReceive {
        /// Base64-encoded file bytes.
        data: String,
        known_peers: Vec<Peer>,
        visited: Vec<Peer>,
    },
}

/// The reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
    /// The call was served; `accepted` carries the operation's boolean result.
    Ack { accepted: bool },
    /// The call could not be served.
    Error { message: String },
}

/// Encode payload bytes for a `COMMIT_RECEIVE` body.
pub fn encode_payload(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Decode the payload field of a `COMMIT_RECEIVE` body.
pub fn decode_payload(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_tags_are_screaming_snake_case() {
        let json = serde_json::to_string(&Request::PrepareToReceive {
            file_name: "report.txt".into(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"PREPARE_TO_RECEIVE""#));
        assert!(json.contains(r#""file_name":"report.txt""#));
    }

    #[test]
    fn commit_round_trips() {
        let request = Request::CommitReceive {
            data: encode_payload(b"hello"),
            known_peers: vec![Peer::new("10.0.0.2", 7432)],
            visited: vec![],
        };
        let json = serde_json::to_vec(&request).unwrap();
        let back: Request = serde_json::from_slice(&json).unwrap();
        match back {
            Request::CommitReceive {
                data, known_peers, ..
            } => {
                assert_eq!(decode_payload(&data).unwrap(), b"hello");
                assert_eq!(known_peers.len(), 1);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_fails_to_parse() {
        let json = r#"{"type":"UNREGISTER","host":"x","port":1}"#;
        assert!(serde_json::from_str::<Request>(json).is_err());
    }

    #[test]
    fn payload_rejects_bad_base64() {
        assert!(decode_payload("not//valid!!").is_err());
    }

    #[test]
    fn empty_payload_round_trips() {
        assert_eq!(decode_payload(&encode_payload(b"")).unwrap(), b"");
    }
}

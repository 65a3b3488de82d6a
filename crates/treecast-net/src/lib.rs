//! Transport for the treecast contract: length-prefixed JSON frames over
//! TCP, a typed remote-call stub, and the serving loop.

pub mod client;
pub mod codec;
pub mod contract;
pub mod server;

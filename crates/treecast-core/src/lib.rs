//! Core types for the treecast distribution protocol: peer identities,
//! the directories built on them, and the wire messages of the contract.

pub mod message;
pub mod peer;

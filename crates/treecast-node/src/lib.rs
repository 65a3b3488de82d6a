//! The treecast node: shared state behind a lock, durable file store,
//! the propagation worker, and the operator console.

pub mod console;
pub mod state;
pub mod store;
pub mod worker;

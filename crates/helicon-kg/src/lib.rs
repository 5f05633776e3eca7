//! helicon-kg — Read-only knowledge graph access for the evidence ranking engine.

pub mod store;
pub mod memory;
pub mod timeout;

pub use store::GraphStore;
pub use memory::{GraphSnapshot, InMemoryGraphStore};
pub use timeout::TimeoutGraphStore;

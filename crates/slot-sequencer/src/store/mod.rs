//! Concrete [`StrategyStore`](crate::sequencing::StrategyStore) implementations.

mod memory;
mod sqlite;

pub use memory::MemoryStrategyStore;
pub use sqlite::SqliteStrategyStore;

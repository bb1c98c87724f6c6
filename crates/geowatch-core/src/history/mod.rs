// # History Store Implementations
//
// This module provides implementations of the HistoryStore trait for
// different persistence strategies.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryHistoryStore, MemoryHistoryStoreFactory};
pub use sqlite::{SqliteHistoryStore, SqliteHistoryStoreFactory};

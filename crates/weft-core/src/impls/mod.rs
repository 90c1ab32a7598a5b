//! Impls - JobStore implementations.
//!
//! - **InMemoryJobStore**: tests and single-process use without durability
//! - **JsonFileStore**: durable single-file store

mod state;

pub mod file_store;
pub mod memory_store;


pub use self::file_store::JsonFileStore;
pub use self::memory_store::InMemoryJobStore;

//! travel-store - Document store adapters
//!
//! This crate provides the [`DocumentStore`](travel_core::DocumentStore)
//! implementations: a Couchbase Capella adapter speaking the query and search
//! REST services, and an in-memory store for tests and offline use.

mod capella;
mod memory;

pub use capella::CapellaStore;
pub use memory::{MemoryStore, StoreOperation};

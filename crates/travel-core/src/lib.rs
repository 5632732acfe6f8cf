//! travel-core - Core types and traits for the travel chatbot
//!
//! This crate provides the foundational types, traits, configuration and
//! error handling used throughout travel-rag.

pub mod config;
pub mod error;
pub mod keyspace;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{Result, TravelError};
pub use keyspace::*;
pub use traits::*;
pub use types::*;

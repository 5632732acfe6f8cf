//! travel-query - Retrieval, answer formatting and data preparation
//!
//! This crate provides the dual-mode retriever that combines vector
//! similarity search with keyword search, the answer formatter, the chatbot
//! that ties them together, and the loader that embeds landmarks.
//!
//! # Features
//!
//! - Vector search first, keyword search as supplement or fallback
//! - Deduplication by document identity, vector results winning
//! - Per-pass failure isolation
//! - Batched landmark embedding with progress logging
//!
//! # Example
//!
//! ```rust,ignore
//! use travel_query::{DualModeRetriever, RetrieverConfig, TravelChatbot};
//! use std::sync::Arc;
//!
//! let retriever = DualModeRetriever::new(Arc::new(store), Arc::new(embedder), config)?;
//! let chatbot = TravelChatbot::new(retriever);
//! println!("{}", chatbot.answer_question("museums in Paris").await);
//! ```

mod chatbot;
mod format;
mod loader;
mod retriever;

pub use chatbot::{Answer, ChatInput, TravelChatbot, EXIT_WORDS};
pub use format::{format_answer, ANSWER_HEADER, NOT_FOUND_MESSAGE};
pub use loader::{embedding_text, LandmarkLoader, LoadReport, VectorRecord};
pub use retriever::{DualModeRetriever, RetrieverConfig, KEYWORD_FIELDS};

// Re-export for convenience
pub use travel_core::{CandidateDocument, Retriever};

//! travel-embed - ONNX embedding model wrapper
//!
//! This crate provides ONNX-based sentence embeddings (all-MiniLM-L6-v2 by
//! default) for the vector search pass and the landmark loader.
//!
//! # Features
//!
//! - ONNX Runtime integration for fast inference
//! - Mean pooling with attention mask
//! - L2 normalization
//! - Batch embedding support

mod onnx;

pub use onnx::{MockEmbedder, OnnxEmbedder};

// Re-export the Embedder trait for convenience
pub use travel_core::Embedder;

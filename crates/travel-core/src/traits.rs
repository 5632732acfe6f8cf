//! Core traits defining the interfaces between components.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::keyspace::Keyspace;
use crate::types::{
    CandidateDocument, QueryParams, Row, SearchHit, TextSearchRequest, VectorSearchRequest,
};

/// Document store capabilities used by the chatbot.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a query statement and return its rows in order.
    async fn execute_query(&self, statement: &str, params: &QueryParams) -> Result<Vec<Row>>;

    /// Nearest-neighbour search over a vector index.
    async fn vector_search(&self, request: &VectorSearchRequest) -> Result<Vec<SearchHit>>;

    /// Full-text search over a text index.
    async fn text_search(&self, request: &TextSearchRequest) -> Result<Vec<SearchHit>>;

    /// Insert or replace a document by key.
    async fn upsert(&self, keyspace: &Keyspace, key: &str, value: &Value) -> Result<()>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per text.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text. Empty or whitespace-only text yields `None`.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let mut vectors = self.embed_batch(&[text]).await?;
        Ok(vectors.pop())
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;
}

/// Given a question, produce candidate documents.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Retrieve candidates for a question. Failures yield fewer candidates,
    /// never an error.
    async fn retrieve(&self, question: &str) -> Vec<CandidateDocument>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embedder returning a constant vector and counting batch calls.
    struct ConstantEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for ConstantEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn test_embed_skips_blank_text() {
        let embedder = ConstantEmbedder {
            calls: AtomicUsize::new(0),
        };

        assert_eq!(embedder.embed(" \n\t").await.unwrap(), None);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);

        assert_eq!(embedder.embed("Colosseum").await.unwrap(), Some(vec![1.0, 0.0]));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }
}

//! Data preparation: embed every landmark into the vectors collection.

use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use travel_core::{
    split_keyed_row, vector_key, DocumentStore, Embedder, Keyspace, QueryParams, Result, Row,
    TravelConfig, TravelError,
};

/// Landmark fields joined into the text that gets embedded.
const EMBEDDING_FIELDS: &[&str] = &["name", "content", "country", "city", "type", "activity"];

const PROGRESS_INTERVAL: usize = 100;

/// Body of a `vector::<id>` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Key of the source landmark.
    pub doc_id: String,
    pub embedding: Vec<f32>,
    /// RFC 3339 UTC timestamp.
    pub created_at: String,
}

impl VectorRecord {
    pub fn new(doc_id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            doc_id: doc_id.into(),
            embedding,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Outcome of an embedding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Vector records written.
    pub embedded: usize,
    /// Landmarks that could not be embedded or written.
    pub failed: usize,
}

/// Writes a vector record for every landmark in the source collection.
pub struct LandmarkLoader<S, E> {
    store: Arc<S>,
    embedder: Arc<E>,
    source: Keyspace,
    vectors: Keyspace,
    batch_size: usize,
}

impl<S, E> LandmarkLoader<S, E>
where
    S: DocumentStore,
    E: Embedder,
{
    pub fn new(
        store: Arc<S>,
        embedder: Arc<E>,
        source: Keyspace,
        vectors: Keyspace,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            source,
            vectors,
            batch_size: batch_size.max(1),
        }
    }

    /// Create a loader for the keyspaces and batch size in `config`.
    pub fn from_config(store: Arc<S>, embedder: Arc<E>, config: &TravelConfig) -> Result<Self> {
        let bucket = &config.capella.bucket;
        Ok(Self::new(
            store,
            embedder,
            config.retrieval.source_keyspace(bucket)?,
            config.retrieval.vectors_keyspace(bucket)?,
            config.embedding.batch_size,
        ))
    }

    /// Create the vectors collection unless it exists.
    pub async fn ensure_vectors_collection(&self) -> Result<()> {
        self.store
            .execute_query(
                &self.vectors.create_collection_statement(),
                &QueryParams::new(),
            )
            .await?;
        info!("Vectors collection ready: {}", self.vectors);
        Ok(())
    }

    /// Number of records in the vectors collection.
    pub async fn count_existing_embeddings(&self) -> Result<u64> {
        let rows = self
            .store
            .execute_query(&self.vectors.count_statement(), &QueryParams::new())
            .await?;

        rows.first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| TravelError::malformed("count query returned no count"))
    }

    /// Embed every landmark and upsert its vector record.
    ///
    /// Failing records are logged and counted; only failing to list the
    /// landmarks is an error.
    pub async fn embed_landmarks(&self) -> Result<LoadReport> {
        let start = Instant::now();
        let rows = self
            .store
            .execute_query(&self.source.select_all_statement(), &QueryParams::new())
            .await?;

        info!("Embedding {} landmarks from {}", rows.len(), self.source);

        let mut report = LoadReport::default();
        let mut landmarks = Vec::with_capacity(rows.len());
        for row in rows {
            match split_keyed_row(row) {
                Some((id, Value::Object(doc))) => landmarks.push((id, doc)),
                Some((id, _)) => {
                    warn!("Skipping landmark {} without an object body", id);
                    report.failed += 1;
                }
                None => {
                    warn!("Skipping landmark row without a document key");
                    report.failed += 1;
                }
            }
        }

        for batch in landmarks.chunks(self.batch_size) {
            self.embed_batch(batch, &mut report).await;
        }

        info!(
            "Embedded {} landmarks ({} failed) in {}ms",
            report.embedded,
            report.failed,
            start.elapsed().as_millis()
        );
        Ok(report)
    }

    /// Ensure the collection exists and embed the landmarks, unless vectors
    /// already exist and `regenerate` is off. Returns `None` when skipped.
    pub async fn prepare(&self, regenerate: bool) -> Result<Option<LoadReport>> {
        self.ensure_vectors_collection().await?;

        let existing = self.count_existing_embeddings().await?;
        if existing > 0 && !regenerate {
            info!("Found {} existing embeddings, skipping", existing);
            return Ok(None);
        }

        self.embed_landmarks().await.map(Some)
    }

    async fn embed_batch(&self, batch: &[(String, Row)], report: &mut LoadReport) {
        let ids: Vec<&str> = batch.iter().map(|(id, _)| id.as_str()).collect();
        let texts: Vec<String> = batch.iter().map(|(_, doc)| embedding_text(doc)).collect();

        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = match self.embedder.embed_batch(&text_refs).await {
            Ok(embeddings) if embeddings.len() == ids.len() => embeddings,
            Ok(embeddings) => {
                warn!(
                    "Embedder returned {} vectors for {} landmarks",
                    embeddings.len(),
                    ids.len()
                );
                report.failed += ids.len();
                return;
            }
            Err(e) => {
                warn!("Failed to embed batch of {}: {}", ids.len(), e);
                report.failed += ids.len();
                return;
            }
        };

        for (id, embedding) in ids.into_iter().zip(embeddings) {
            match self.store_record(id, embedding).await {
                Ok(()) => {
                    report.embedded += 1;
                    if report.embedded % PROGRESS_INTERVAL == 0 {
                        info!("Added {} embeddings...", report.embedded);
                    }
                }
                Err(e) => {
                    warn!("Error storing embedding for {}: {}", id, e);
                    report.failed += 1;
                }
            }
        }
    }

    async fn store_record(&self, id: &str, embedding: Vec<f32>) -> Result<()> {
        let record = VectorRecord::new(id, embedding);
        let value = serde_json::to_value(&record)?;
        let key = vector_key(id);
        debug!("Upserting {}", key);
        self.store.upsert(&self.vectors, &key, &value).await
    }
}

/// `name content country city type activity`, missing fields as empty.
pub fn embedding_text(doc: &Row) -> String {
    EMBEDDING_FIELDS
        .iter()
        .map(|field| match doc.get(*field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

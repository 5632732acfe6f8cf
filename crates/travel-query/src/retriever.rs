//! Dual-mode retrieval: vector search first, keyword search as supplement or
//! fallback, merged by document identity.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use travel_core::{
    source_id_from_vector_key, split_keyed_row, CandidateDocument, DocumentStore, Embedder,
    Keyspace, MatchClause, MergedResultSet, Provenance, QueryParams, Result, Retriever,
    SearchHit, TextSearchRequest, TravelConfig, TravelError, VectorSearchRequest,
};

/// Fields matched by the keyword pass, combined with OR semantics.
pub const KEYWORD_FIELDS: &[&str] = &[
    "name", "content", "city", "country", "state", "type", "category", "activity", "title",
];

/// Fields requested from the text index with each keyword hit.
const STORED_FIELDS: &[&str] = &[
    "name", "content", "city", "country", "state", "type", "category", "activity", "title",
];

/// Configuration for the retriever, fixed at construction.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Number of candidates requested from each pass.
    pub num_candidates: usize,

    /// Run the keyword pass even when the vector pass is full.
    pub keyword_search: bool,

    /// Vector search index name.
    pub vector_index: String,

    /// Full-text search index name.
    pub text_index: String,

    /// Keyspace of the landmark documents.
    pub source: Keyspace,

    /// Keyspace of the vector records.
    pub vectors: Keyspace,

    /// Indexed vector field.
    pub vector_field: String,
}

impl RetrieverConfig {
    /// Build from the loaded configuration, qualifying keyspaces with its bucket.
    pub fn from_config(config: &TravelConfig) -> Result<Self> {
        let bucket = &config.capella.bucket;
        let retrieval = &config.retrieval;
        Ok(Self {
            num_candidates: retrieval.num_candidates,
            keyword_search: retrieval.keyword_search,
            vector_index: retrieval.vector_index.clone(),
            text_index: retrieval.text_index.clone(),
            source: retrieval.source_keyspace(bucket)?,
            vectors: retrieval.vectors_keyspace(bucket)?,
            vector_field: retrieval.vector_field.clone(),
        })
    }
}

/// Retriever combining vector similarity search with keyword search.
///
/// Vector results come first; keyword results are appended when their
/// identity is new. A failing pass contributes nothing and never fails the
/// retrieval.
pub struct DualModeRetriever<S, E> {
    /// Document store.
    store: Arc<S>,

    /// Embedding model.
    embedder: Arc<E>,

    config: RetrieverConfig,
}

impl<S, E> DualModeRetriever<S, E>
where
    S: DocumentStore,
    E: Embedder,
{
    /// Create a new retriever.
    pub fn new(store: Arc<S>, embedder: Arc<E>, config: RetrieverConfig) -> Result<Self> {
        if config.num_candidates == 0 {
            return Err(TravelError::invalid_argument(
                "num_candidates must be at least 1",
            ));
        }
        Ok(Self {
            store,
            embedder,
            config,
        })
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Whether the keyword pass runs after a vector pass with `vector_count` results.
    pub fn needs_keyword_pass(&self, vector_count: usize) -> bool {
        vector_count == 0 || vector_count < self.config.num_candidates || self.config.keyword_search
    }

    async fn ensure_connection(&self) {
        if let Err(e) = self.store.ping().await {
            warn!("Store ping failed, continuing: {}", e);
        }
    }

    /// Embed the question and fetch the source documents behind the nearest
    /// vector records, in hit order.
    async fn vector_pass(&self, question: &str) -> Result<Vec<CandidateDocument>> {
        let vector = self
            .embedder
            .embed(question)
            .await?
            .ok_or_else(|| TravelError::embedding("no vector produced for question"))?;

        let request = VectorSearchRequest {
            scope: Some(self.config.vectors.index_scope()),
            index: self.config.vector_index.clone(),
            field: self.config.vector_field.clone(),
            vector,
            k: self.config.num_candidates,
            limit: self.config.num_candidates,
            fields: vec!["doc_id".to_string()],
        };
        let hits = self.store.vector_search(&request).await?;
        debug!("Vector search returned {} hits", hits.len());

        let mut scored: Vec<(String, f32)> = Vec::with_capacity(hits.len());
        for hit in &hits {
            match resolve_source_id(hit) {
                Some(id) if !scored.iter().any(|(seen, _)| *seen == id) => {
                    scored.push((id, hit.score))
                }
                Some(_) => {}
                None => warn!("Skipping vector hit with no source id: {:?}", hit.id),
            }
        }

        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = scored.iter().map(|(id, _)| id.as_str()).collect();
        let mut sources = self.fetch_by_keys(&ids).await?;

        let mut documents = Vec::with_capacity(scored.len());
        for (id, score) in scored {
            match take_document(&mut sources, &id) {
                Some(body) => documents.push(CandidateDocument::from_document(
                    id,
                    body,
                    Provenance::Vector,
                    score,
                )),
                None => warn!("Source document {:?} not found for vector hit", id),
            }
        }

        Ok(documents)
    }

    /// Disjunctive match over the landmark fields.
    async fn keyword_pass(&self, question: &str) -> Result<Vec<CandidateDocument>> {
        let request = TextSearchRequest {
            scope: Some(self.config.source.index_scope()),
            index: self.config.text_index.clone(),
            clauses: KEYWORD_FIELDS
                .iter()
                .map(|field| MatchClause::new(*field, question))
                .collect(),
            limit: self.config.num_candidates,
            fields: STORED_FIELDS.iter().map(|f| f.to_string()).collect(),
        };
        let hits = self.store.text_search(&request).await?;
        debug!("Keyword search returned {} hits", hits.len());

        // Hits from an index that stores no fields are filled from the source.
        let bare: Vec<&str> = hits
            .iter()
            .filter(|hit| hit.fields.is_empty())
            .map(|hit| hit.id.as_str())
            .collect();
        let mut sources = if bare.is_empty() {
            Vec::new()
        } else {
            match self.fetch_by_keys(&bare).await {
                Ok(sources) => sources,
                Err(e) => {
                    warn!("Could not fetch keyword hit documents: {}", e);
                    Vec::new()
                }
            }
        };

        Ok(hits
            .into_iter()
            .map(|hit| {
                if hit.fields.is_empty() {
                    if let Some(body) = take_document(&mut sources, &hit.id) {
                        return CandidateDocument::from_document(
                            hit.id,
                            body,
                            Provenance::Keyword,
                            hit.score,
                        );
                    }
                }
                CandidateDocument::from_hit(hit, Provenance::Keyword)
            })
            .collect())
    }

    /// Source documents for `ids` as `(key, body)` pairs.
    async fn fetch_by_keys(&self, ids: &[&str]) -> Result<Vec<(String, Value)>> {
        let params = QueryParams::new().named("ids", Value::from(ids.to_vec()));
        let rows = self
            .store
            .execute_query(&self.config.source.select_by_keys_statement(), &params)
            .await?;

        let mut sources = Vec::with_capacity(rows.len());
        for row in rows {
            match split_keyed_row(row) {
                Some(source) => sources.push(source),
                None => warn!("Skipping source row without a document key"),
            }
        }
        Ok(sources)
    }
}

/// Source identity behind a vector hit: the key suffix, else a stored `doc_id`.
fn resolve_source_id(hit: &SearchHit) -> Option<String> {
    source_id_from_vector_key(&hit.id)
        .map(str::to_string)
        .or_else(|| {
            hit.fields
                .get("doc_id")
                .and_then(Value::as_str)
                .filter(|id| !id.trim().is_empty())
                .map(str::to_string)
        })
}

/// Remove and return the body of the document keyed `id`.
fn take_document(sources: &mut Vec<(String, Value)>, id: &str) -> Option<Value> {
    let index = sources.iter().position(|(key, _)| key == id)?;
    Some(sources.remove(index).1)
}

#[async_trait]
impl<S, E> Retriever for DualModeRetriever<S, E>
where
    S: DocumentStore,
    E: Embedder,
{
    async fn retrieve(&self, question: &str) -> Vec<CandidateDocument> {
        let question = question.trim();
        if question.is_empty() {
            return Vec::new();
        }

        let start = Instant::now();
        info!("Retrieving for: {:?}", question);

        self.ensure_connection().await;

        let mut merged = MergedResultSet::new();

        let vector_results = match self.vector_pass(question).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Vector search failed: {}", e);
                Vec::new()
            }
        };
        let vector_count = vector_results.len();
        for document in vector_results {
            merged.insert(document);
        }

        if self.needs_keyword_pass(vector_count) {
            match self.keyword_pass(question).await {
                Ok(documents) => {
                    let found = documents.len();
                    let mut added = 0;
                    for document in documents {
                        if merged.insert(document) {
                            added += 1;
                        }
                    }
                    debug!("Keyword search added {} of {} documents", added, found);
                }
                Err(e) => warn!("Keyword search failed: {}", e),
            }
        } else {
            debug!("Skipping keyword search, vector search returned {}", vector_count);
        }

        info!(
            "Retrieved {} documents in {}ms",
            merged.len(),
            start.elapsed().as_millis()
        );

        merged.into_documents()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use travel_core::{vector_key, DocumentContent};
    use travel_embed::MockEmbedder;
    use travel_store::{MemoryStore, StoreOperation};

    const VECTOR_INDEX: &str = "landmark-vector-index";
    const TEXT_INDEX: &str = "landmark-text-index";

    fn config(num_candidates: usize, keyword_search: bool) -> RetrieverConfig {
        RetrieverConfig {
            num_candidates,
            keyword_search,
            vector_index: VECTOR_INDEX.to_string(),
            text_index: TEXT_INDEX.to_string(),
            source: Keyspace::new("travel-sample", "inventory", "landmark"),
            vectors: Keyspace::new("travel-sample", "inventory", "vectors"),
            vector_field: "embedding".to_string(),
        }
    }

    /// Store seeded with landmarks and a vector record for each.
    async fn seeded_store(embedder: &MockEmbedder) -> Arc<MemoryStore> {
        let cfg = config(3, true);
        let store = MemoryStore::new();
        store
            .create_vector_index(VECTOR_INDEX, &cfg.vectors, "embedding")
            .unwrap();
        store.create_text_index(TEXT_INDEX, &cfg.source).unwrap();

        // Landmark documents carry a numeric `id` of their own.
        let landmarks = [
            ("landmark_1", json!({"id": 1, "name": "Eiffel Tower", "city": "Paris", "country": "France", "type": "landmark"})),
            ("landmark_2", json!({"id": 2, "name": "Louvre Museum", "city": "Paris", "country": "France", "activity": "see"})),
            ("landmark_3", json!({"id": 3, "name": "Tower Bridge", "city": "London", "country": "United Kingdom"})),
            ("landmark_4", json!({"id": 4, "name": "Golden Gate Bridge", "city": "San Francisco", "country": "United States"})),
        ];

        for (id, doc) in landmarks {
            store.insert(&cfg.source, id, doc.clone()).unwrap();
            let text = format!(
                "{} {}",
                doc["name"].as_str().unwrap(),
                doc["city"].as_str().unwrap()
            );
            let embedding = embedder.embed(&text).await.unwrap().unwrap();
            store
                .insert(
                    &cfg.vectors,
                    &vector_key(id),
                    json!({"doc_id": id, "embedding": embedding}),
                )
                .unwrap();
        }

        Arc::new(store)
    }

    fn ids(documents: &[CandidateDocument]) -> Vec<&str> {
        documents.iter().map(|d| d.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_vector_then_keyword_without_duplicates() {
        let embedder = MockEmbedder::new();
        let store = seeded_store(&embedder).await;
        let retriever =
            DualModeRetriever::new(store.clone(), Arc::new(embedder), config(3, true)).unwrap();

        let documents = retriever.retrieve("Eiffel Tower Paris").await;

        assert_eq!(documents[0].id, "landmark_1");
        assert_eq!(documents[0].provenance, Provenance::Vector);
        assert_eq!(documents[0].name(), Some("Eiffel Tower"));

        let mut unique = ids(&documents);
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), documents.len());

        assert_eq!(store.calls(StoreOperation::VectorSearch), 1);
        assert_eq!(store.calls(StoreOperation::TextSearch), 1);
    }

    #[tokio::test]
    async fn test_keyword_pass_skipped_when_vector_pass_is_full() {
        let embedder = MockEmbedder::new();
        let store = seeded_store(&embedder).await;
        let retriever =
            DualModeRetriever::new(store.clone(), Arc::new(embedder), config(3, false)).unwrap();

        let documents = retriever.retrieve("bridge").await;

        assert_eq!(documents.len(), 3);
        assert!(documents.iter().all(|d| d.provenance == Provenance::Vector));
        assert_eq!(store.calls(StoreOperation::TextSearch), 0);
    }

    #[tokio::test]
    async fn test_keyword_pass_runs_when_vector_pass_is_short() {
        let embedder = MockEmbedder::new();
        let store = seeded_store(&embedder).await;
        let retriever =
            DualModeRetriever::new(store.clone(), Arc::new(embedder), config(10, false)).unwrap();

        retriever.retrieve("bridge").await;

        assert_eq!(store.calls(StoreOperation::TextSearch), 1);
    }

    #[tokio::test]
    async fn test_vector_failure_falls_back_to_keyword() {
        let embedder = MockEmbedder::new();
        let store = seeded_store(&embedder).await;
        store.fail(StoreOperation::VectorSearch).unwrap();
        let retriever =
            DualModeRetriever::new(store.clone(), Arc::new(embedder), config(3, false)).unwrap();

        let documents = retriever.retrieve("Golden Gate").await;

        assert_eq!(ids(&documents), vec!["landmark_4"]);
        assert_eq!(documents[0].provenance, Provenance::Keyword);
    }

    #[tokio::test]
    async fn test_embedding_failure_falls_back_to_keyword() {
        let store = seeded_store(&MockEmbedder::new()).await;
        let retriever = DualModeRetriever::new(
            store.clone(),
            Arc::new(MockEmbedder::failing()),
            config(3, false),
        )
        .unwrap();

        let documents = retriever.retrieve("Louvre").await;

        assert_eq!(ids(&documents), vec!["landmark_2"]);
        assert_eq!(store.calls(StoreOperation::VectorSearch), 0);
    }

    #[tokio::test]
    async fn test_vector_version_wins_on_shared_identity() {
        let embedder = MockEmbedder::new();
        let store = seeded_store(&embedder).await;
        // Keyword hits only carry `name`, so the two copies differ.
        let cfg = config(1, true);
        store
            .create_text_index_storing(TEXT_INDEX, &cfg.source, &["name"])
            .unwrap();
        let retriever = DualModeRetriever::new(store.clone(), Arc::new(embedder), cfg).unwrap();

        let documents = retriever.retrieve("Eiffel Tower").await;

        assert_eq!(store.calls(StoreOperation::TextSearch), 1);
        assert_eq!(ids(&documents)[0], "landmark_1");
        let eiffel: Vec<_> = documents.iter().filter(|d| d.id == "landmark_1").collect();
        assert_eq!(eiffel.len(), 1);
        assert_eq!(eiffel[0].provenance, Provenance::Vector);
        let fields = eiffel[0].content.fields().unwrap();
        assert_eq!(fields.city.as_deref(), Some("Paris"));
        assert_eq!(fields.country.as_deref(), Some("France"));
    }

    #[tokio::test]
    async fn test_vector_hit_resolves_document_with_numeric_id_field() {
        let embedder = MockEmbedder::new();
        let cfg = config(1, false);
        let store = MemoryStore::new();
        store
            .create_vector_index(VECTOR_INDEX, &cfg.vectors, "embedding")
            .unwrap();
        store.create_text_index(TEXT_INDEX, &cfg.source).unwrap();
        store
            .insert(
                &cfg.source,
                "landmark_10019",
                json!({"id": 10019, "name": "Jeronimos Monastery", "city": "Lisbon", "country": "Portugal"}),
            )
            .unwrap();
        let embedding = embedder.embed("Jeronimos Monastery Lisbon").await.unwrap().unwrap();
        store
            .insert(
                &cfg.vectors,
                &vector_key("landmark_10019"),
                json!({"doc_id": "landmark_10019", "embedding": embedding}),
            )
            .unwrap();

        let store = Arc::new(store);
        let retriever = DualModeRetriever::new(store.clone(), Arc::new(embedder), cfg).unwrap();
        let documents = retriever.retrieve("Jeronimos Monastery").await;

        assert_eq!(ids(&documents), vec!["landmark_10019"]);
        assert_eq!(documents[0].provenance, Provenance::Vector);
        assert_eq!(documents[0].name(), Some("Jeronimos Monastery"));
        assert_eq!(store.calls(StoreOperation::TextSearch), 0);
    }

    #[tokio::test]
    async fn test_empty_question_does_nothing() {
        let embedder = MockEmbedder::new();
        let store = seeded_store(&embedder).await;
        let retriever =
            DualModeRetriever::new(store.clone(), Arc::new(embedder), config(3, true)).unwrap();

        assert!(retriever.retrieve("").await.is_empty());
        assert!(retriever.retrieve("   ").await.is_empty());
        assert_eq!(store.calls(StoreOperation::VectorSearch), 0);
        assert_eq!(store.calls(StoreOperation::TextSearch), 0);
    }

    #[tokio::test]
    async fn test_both_passes_failing_yields_empty() {
        let embedder = MockEmbedder::new();
        let store = seeded_store(&embedder).await;
        store.fail(StoreOperation::VectorSearch).unwrap();
        store.fail(StoreOperation::TextSearch).unwrap();
        let retriever =
            DualModeRetriever::new(store.clone(), Arc::new(embedder), config(3, true)).unwrap();

        assert!(retriever.retrieve("Eiffel Tower").await.is_empty());
    }

    #[tokio::test]
    async fn test_source_fetch_failure_is_a_vector_failure() {
        let embedder = MockEmbedder::new();
        let store = seeded_store(&embedder).await;
        store.fail(StoreOperation::Query).unwrap();
        let retriever =
            DualModeRetriever::new(store.clone(), Arc::new(embedder), config(3, false)).unwrap();

        let documents = retriever.retrieve("Tower Bridge").await;

        assert!(!documents.is_empty());
        assert!(documents.iter().all(|d| d.provenance == Provenance::Keyword));
    }

    #[tokio::test]
    async fn test_unresolvable_vector_hits_are_skipped() {
        let embedder = MockEmbedder::new();
        let cfg = config(3, false);
        let store = MemoryStore::new();
        store
            .create_vector_index(VECTOR_INDEX, &cfg.vectors, "embedding")
            .unwrap();
        store.create_text_index(TEXT_INDEX, &cfg.source).unwrap();
        store
            .insert(&cfg.source, "landmark_7", json!({"name": "Big Ben"}))
            .unwrap();

        let embedding = embedder.embed("Big Ben").await.unwrap().unwrap();
        // Bare key with a doc_id field, and a record that resolves to nothing.
        store
            .insert(
                &cfg.vectors,
                "big-ben",
                json!({"doc_id": "landmark_7", "embedding": embedding.clone()}),
            )
            .unwrap();
        store
            .insert(&cfg.vectors, "orphan", json!({"embedding": embedding}))
            .unwrap();

        let retriever = DualModeRetriever::new(Arc::new(store), Arc::new(embedder), cfg).unwrap();
        let documents = retriever.retrieve("Big Ben").await;

        assert_eq!(ids(&documents), vec!["landmark_7"]);
        assert_eq!(documents[0].provenance, Provenance::Vector);
    }

    #[tokio::test]
    async fn test_keyword_hit_without_stored_fields_is_filled_from_source() {
        let cfg = config(3, true);
        let store = MemoryStore::new();
        store
            .create_text_index_storing(TEXT_INDEX, &cfg.source, &[])
            .unwrap();
        store
            .insert(
                &cfg.source,
                "landmark_9",
                json!({"name": "Sagrada Familia", "city": "Barcelona"}),
            )
            .unwrap();

        let retriever = DualModeRetriever::new(
            Arc::new(store),
            Arc::new(MockEmbedder::new()),
            cfg,
        )
        .unwrap();

        // No vector index: the vector pass fails, the keyword pass still runs.
        let documents = retriever.retrieve("Sagrada Familia").await;
        assert_eq!(ids(&documents), vec!["landmark_9"]);
        match &documents[0].content {
            DocumentContent::Fields(fields) => {
                assert_eq!(fields.city.as_deref(), Some("Barcelona"))
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[test]
    fn test_needs_keyword_pass() {
        let retriever = DualModeRetriever::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockEmbedder::new()),
            config(3, false),
        )
        .unwrap();

        assert!(retriever.needs_keyword_pass(0));
        assert!(retriever.needs_keyword_pass(2));
        assert!(!retriever.needs_keyword_pass(3));
    }

    #[test]
    fn test_zero_candidates_rejected() {
        let result = DualModeRetriever::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MockEmbedder::new()),
            config(0, true),
        );
        assert!(result.is_err());
    }
}

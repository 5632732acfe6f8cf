//! In-process document store.
//!
//! Holds documents per keyspace and answers the statements built by
//! [`Keyspace`], brute-force cosine vector search and term-match text search.
//! Every call is counted and any operation can be made to fail, which lets
//! tests observe how callers react to the store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use travel_core::{
    DocumentStore, Keyspace, QueryParams, Result, Row, SearchHit, TextSearchRequest, TravelError,
    VectorSearchRequest,
};

/// A store operation, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Query,
    VectorSearch,
    TextSearch,
    Upsert,
}

#[derive(Debug, Default)]
struct State {
    /// Keyspace path -> documents in insertion order.
    collections: HashMap<String, Vec<(String, Value)>>,

    /// Vector index name -> (keyspace path, vector field).
    vector_indexes: HashMap<String, (String, String)>,

    /// Text index name -> (keyspace path, stored fields; `None` stores all).
    text_indexes: HashMap<String, (String, Option<Vec<String>>)>,

    failing: HashSet<StoreOperation>,
}

#[derive(Debug, Default)]
struct CallCounts {
    query: AtomicUsize,
    vector_search: AtomicUsize,
    text_search: AtomicUsize,
    upsert: AtomicUsize,
}

/// In-memory store implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    calls: CallCounts,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| TravelError::internal(format!("store lock poisoned: {}", e)))
    }

    /// Insert or replace a document.
    pub fn insert(&self, keyspace: &Keyspace, key: &str, value: Value) -> Result<()> {
        let mut state = self.state()?;
        let docs = state.collections.entry(keyspace.to_string()).or_default();
        match docs.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => docs.push((key.to_string(), value)),
        }
        Ok(())
    }

    /// Look up a document by key.
    pub fn get(&self, keyspace: &Keyspace, key: &str) -> Result<Option<Value>> {
        let state = self.state()?;
        Ok(state
            .collections
            .get(&keyspace.to_string())
            .and_then(|docs| docs.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.clone()))
    }

    /// Number of documents in a keyspace.
    pub fn len(&self, keyspace: &Keyspace) -> Result<usize> {
        let state = self.state()?;
        Ok(state
            .collections
            .get(&keyspace.to_string())
            .map_or(0, Vec::len))
    }

    /// Define a vector index over `field` of the documents in `keyspace`.
    pub fn create_vector_index(&self, name: &str, keyspace: &Keyspace, field: &str) -> Result<()> {
        self.state()?
            .vector_indexes
            .insert(name.to_string(), (keyspace.to_string(), field.to_string()));
        Ok(())
    }

    /// Define a text index over the documents in `keyspace` that stores every field.
    pub fn create_text_index(&self, name: &str, keyspace: &Keyspace) -> Result<()> {
        self.state()?
            .text_indexes
            .insert(name.to_string(), (keyspace.to_string(), None));
        Ok(())
    }

    /// Define a text index that only returns `stored` fields with its hits.
    pub fn create_text_index_storing(
        &self,
        name: &str,
        keyspace: &Keyspace,
        stored: &[&str],
    ) -> Result<()> {
        let stored = stored.iter().map(|f| f.to_string()).collect();
        self.state()?
            .text_indexes
            .insert(name.to_string(), (keyspace.to_string(), Some(stored)));
        Ok(())
    }

    /// Make an operation fail with a connection error until [`Self::recover`].
    pub fn fail(&self, operation: StoreOperation) -> Result<()> {
        self.state()?.failing.insert(operation);
        Ok(())
    }

    /// Stop failing an operation.
    pub fn recover(&self, operation: StoreOperation) -> Result<()> {
        self.state()?.failing.remove(&operation);
        Ok(())
    }

    /// Number of calls made for an operation, failed ones included.
    pub fn calls(&self, operation: StoreOperation) -> usize {
        self.counter(operation).load(Ordering::SeqCst)
    }

    fn counter(&self, operation: StoreOperation) -> &AtomicUsize {
        match operation {
            StoreOperation::Query => &self.calls.query,
            StoreOperation::VectorSearch => &self.calls.vector_search,
            StoreOperation::TextSearch => &self.calls.text_search,
            StoreOperation::Upsert => &self.calls.upsert,
        }
    }

    /// Count the call and fail it if the operation is marked failing.
    fn begin(&self, operation: StoreOperation) -> Result<MutexGuard<'_, State>> {
        self.counter(operation).fetch_add(1, Ordering::SeqCst);
        let state = self.state()?;
        if state.failing.contains(&operation) {
            return Err(TravelError::connection(format!(
                "{:?} unavailable",
                operation
            )));
        }
        Ok(state)
    }

    fn rows_for(
        state: &State,
        keyspace: &str,
        projection: &[Projection],
        keys: Option<&[Value]>,
    ) -> Vec<Row> {
        let docs = match state.collections.get(keyspace) {
            Some(docs) => docs,
            None => return Vec::new(),
        };

        let to_row = |key: &str, value: &Value| project(projection, key, value);

        match keys {
            // USE KEYS returns documents in key order, skipping missing keys.
            Some(keys) => keys
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|key| docs.iter().find(|(k, _)| k == key))
                .map(|(k, v)| to_row(k, v))
                .collect(),
            None => docs.iter().map(|(k, v)| to_row(k, v)).collect(),
        }
    }
}

/// One item of a select list over the keyspace alias.
#[derive(Debug, Clone, PartialEq)]
enum Projection {
    /// `META(l).id AS name`
    Key(String),
    /// `l AS name`
    Document(String),
    /// `l.*`
    Expand,
    /// `l.field` or `l.field AS name`
    Field { field: String, name: String },
}

/// Parse the select list of a `SELECT ... FROM <keyspace> AS <alias>` statement.
fn parse_projection(statement: &str) -> Result<Vec<Projection>> {
    let from = statement
        .find(" FROM ")
        .ok_or_else(|| TravelError::query("expected FROM in statement"))?;
    let list = statement[..from]
        .strip_prefix("SELECT")
        .ok_or_else(|| TravelError::query("expected SELECT"))?;

    let mut after_from = statement[from + " FROM ".len()..].split_whitespace().skip(1);
    let alias = match (after_from.next(), after_from.next()) {
        (Some(as_kw), Some(alias)) if as_kw.eq_ignore_ascii_case("AS") => alias,
        _ => return Err(TravelError::query("select needs a keyspace alias")),
    };
    let meta_id = format!("META({}).id", alias);
    let field_prefix = format!("{}.", alias);

    list.split(',')
        .map(|item| {
            let item = item.trim();
            let (expr, name) = match item.split_once(" AS ") {
                Some((expr, name)) => (expr.trim(), Some(name.trim())),
                None => (item, None),
            };

            match (expr, name) {
                (e, Some(name)) if e == meta_id => Ok(Projection::Key(name.to_string())),
                (e, Some(name)) if e == alias => Ok(Projection::Document(name.to_string())),
                (e, None) if e.strip_prefix(&field_prefix) == Some("*") => Ok(Projection::Expand),
                (e, name) => match e.strip_prefix(&field_prefix) {
                    Some(field) if !field.is_empty() => Ok(Projection::Field {
                        field: field.to_string(),
                        name: name.unwrap_or(field).to_string(),
                    }),
                    _ => Err(TravelError::query(format!(
                        "unsupported projection '{}'",
                        item
                    ))),
                },
            }
        })
        .collect()
}

/// Build one result row. Items apply in order, so a later column replaces an
/// earlier one of the same name, as `l.*` replaces a projected `id`.
fn project(projection: &[Projection], key: &str, value: &Value) -> Row {
    let mut row = Map::new();
    for item in projection {
        match item {
            Projection::Key(name) => {
                row.insert(name.clone(), json!(key));
            }
            Projection::Document(name) => {
                row.insert(name.clone(), value.clone());
            }
            Projection::Expand => {
                if let Some(map) = value.as_object() {
                    row.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
            Projection::Field { field, name } => {
                if let Some(v) = value.get(field) {
                    row.insert(name.clone(), v.clone());
                }
            }
        }
    }
    row
}

/// The keyspace token following `marker` in a statement, unquoted.
fn keyspace_after(statement: &str, marker: &str) -> Result<String> {
    let start = statement
        .find(marker)
        .map(|i| i + marker.len())
        .ok_or_else(|| TravelError::query(format!("expected '{}' in statement", marker.trim())))?;

    let token = statement[start..]
        .split_whitespace()
        .next()
        .ok_or_else(|| TravelError::query("missing keyspace"))?;

    Keyspace::parse(token, "")
        .map(|ks| ks.to_string())
        .map_err(|e| TravelError::query(e.to_string()))
}

fn lowercase_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(values) => values
            .iter()
            .map(field_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Stored fields for a hit; `*` selects every field.
fn stored_fields(value: &Value, requested: &[String], skip: Option<&str>) -> Map<String, Value> {
    let Some(map) = value.as_object() else {
        return Map::new();
    };

    if requested.iter().any(|f| f == "*") {
        map.iter()
            .filter(|(k, _)| Some(k.as_str()) != skip)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    } else {
        requested
            .iter()
            .filter_map(|f| map.get(f).map(|v| (f.clone(), v.clone())))
            .collect()
    }
}

fn sort_by_score(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn execute_query(&self, statement: &str, params: &QueryParams) -> Result<Vec<Row>> {
        let mut state = self.begin(StoreOperation::Query)?;
        let trimmed = statement.trim();
        debug!("Memory store statement: {}", trimmed);

        if trimmed.starts_with("CREATE COLLECTION") {
            let keyspace = keyspace_after(trimmed, "COLLECTION ")?;
            state.collections.entry(keyspace).or_default();
            return Ok(Vec::new());
        }

        if trimmed.starts_with("UPSERT INTO") {
            let keyspace = keyspace_after(trimmed, "INTO ")?;
            let key = params
                .get("key")
                .and_then(Value::as_str)
                .ok_or_else(|| TravelError::query("UPSERT needs a $key string"))?
                .to_string();
            let value = params
                .get("value")
                .cloned()
                .ok_or_else(|| TravelError::query("UPSERT needs a $value"))?;

            let docs = state.collections.entry(keyspace).or_default();
            match docs.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => docs.push((key, value)),
            }
            return Ok(Vec::new());
        }

        if trimmed.starts_with("SELECT COUNT(*)") {
            let keyspace = keyspace_after(trimmed, " FROM ")?;
            let count = state.collections.get(&keyspace).map_or(0, Vec::len);
            let mut row = Map::new();
            row.insert("count".to_string(), json!(count));
            return Ok(vec![row]);
        }

        if trimmed.starts_with("SELECT") {
            let keyspace = keyspace_after(trimmed, " FROM ")?;
            let projection = parse_projection(trimmed)?;
            if trimmed.contains("USE KEYS") {
                let keys = params
                    .get("ids")
                    .or_else(|| params.positional.first())
                    .and_then(Value::as_array)
                    .ok_or_else(|| TravelError::query("USE KEYS needs an array of keys"))?;
                return Ok(Self::rows_for(&state, &keyspace, &projection, Some(keys)));
            }
            return Ok(Self::rows_for(&state, &keyspace, &projection, None));
        }

        Err(TravelError::query(format!(
            "unsupported statement: {}",
            trimmed
        )))
    }

    async fn vector_search(&self, request: &VectorSearchRequest) -> Result<Vec<SearchHit>> {
        let state = self.begin(StoreOperation::VectorSearch)?;

        let (keyspace, field) = state
            .vector_indexes
            .get(&request.index)
            .ok_or_else(|| TravelError::search(&request.index, "index not found"))?;
        if *field != request.field {
            return Err(TravelError::search(
                &request.index,
                format!("field '{}' is not indexed", request.field),
            ));
        }

        let mut hits = Vec::new();
        for (key, value) in state.collections.get(keyspace).into_iter().flatten() {
            let Some(stored) = value.get(field).and_then(Value::as_array) else {
                continue;
            };
            let stored: Vec<f32> = stored
                .iter()
                .filter_map(Value::as_f64)
                .map(|x| x as f32)
                .collect();

            if stored.len() != request.vector.len() {
                return Err(TravelError::search(
                    &request.index,
                    format!(
                        "vector dimension {} does not match index dimension {}",
                        request.vector.len(),
                        stored.len()
                    ),
                ));
            }

            hits.push(SearchHit {
                id: key.clone(),
                score: cosine_similarity(&request.vector, &stored),
                fields: stored_fields(value, &request.fields, Some(field)),
            });
        }

        sort_by_score(&mut hits);
        hits.truncate(request.k.min(request.limit));
        Ok(hits)
    }

    async fn text_search(&self, request: &TextSearchRequest) -> Result<Vec<SearchHit>> {
        let state = self.begin(StoreOperation::TextSearch)?;

        let (keyspace, stored) = state
            .text_indexes
            .get(&request.index)
            .ok_or_else(|| TravelError::search(&request.index, "index not found"))?;

        let mut hits = Vec::new();
        for (key, value) in state.collections.get(keyspace).into_iter().flatten() {
            let mut score = 0.0f32;
            for clause in &request.clauses {
                let Some(field_value) = value.get(&clause.field) else {
                    continue;
                };
                let field_terms: HashSet<String> =
                    lowercase_terms(&field_text(field_value)).into_iter().collect();
                let matched = lowercase_terms(&clause.text)
                    .iter()
                    .filter(|t| field_terms.contains(*t))
                    .count();
                score += matched as f32 * clause.boost.unwrap_or(1.0);
            }

            if score > 0.0 {
                let mut fields = stored_fields(value, &request.fields, None);
                if let Some(stored) = stored {
                    fields.retain(|name, _| stored.contains(name));
                }
                hits.push(SearchHit {
                    id: key.clone(),
                    score,
                    fields,
                });
            }
        }

        sort_by_score(&mut hits);
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn upsert(&self, keyspace: &Keyspace, key: &str, value: &Value) -> Result<()> {
        let mut state = self.begin(StoreOperation::Upsert)?;
        let docs = state.collections.entry(keyspace.to_string()).or_default();
        match docs.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.clone(),
            None => docs.push((key.to_string(), value.clone())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use travel_core::MatchClause;

    fn landmarks() -> Keyspace {
        Keyspace::new("travel-sample", "inventory", "landmark")
    }

    fn vectors() -> Keyspace {
        Keyspace::new("travel-sample", "inventory", "vectors")
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(
                &landmarks(),
                "landmark_1",
                json!({"name": "Eiffel Tower", "city": "Paris", "country": "France"}),
            )
            .unwrap();
        store
            .insert(
                &landmarks(),
                "landmark_2",
                json!({"name": "Tower Bridge", "city": "London", "country": "United Kingdom"}),
            )
            .unwrap();
        store
            .insert(
                &landmarks(),
                "landmark_3",
                json!({"name": "Louvre", "city": "Paris", "content": "Art museum"}),
            )
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_select_by_keys_keeps_key_order() {
        let store = seeded();
        let params = QueryParams::new().named("ids", json!(["landmark_3", "missing", "landmark_1"]));

        let rows = store
            .execute_query(&landmarks().select_by_keys_statement(), &params)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["__key"], "landmark_3");
        assert_eq!(rows[1]["doc"]["name"], "Eiffel Tower");
        assert_eq!(store.calls(StoreOperation::Query), 1);
    }

    #[tokio::test]
    async fn test_expanded_document_id_replaces_projected_key() {
        let store = MemoryStore::new();
        store
            .insert(
                &landmarks(),
                "landmark_10019",
                json!({"id": 10019, "name": "Jeronimos Monastery"}),
            )
            .unwrap();
        let params = QueryParams::new().named("ids", json!(["landmark_10019"]));

        let statement = format!(
            "SELECT META(l).id AS id, l.* FROM {} AS l USE KEYS $ids",
            landmarks().qualified()
        );
        let rows = store.execute_query(&statement, &params).await.unwrap();
        assert_eq!(rows[0]["id"], 10019);

        let rows = store
            .execute_query(&landmarks().select_by_keys_statement(), &params)
            .await
            .unwrap();
        assert_eq!(rows[0]["__key"], "landmark_10019");
        assert_eq!(rows[0]["doc"]["id"], 10019);
    }

    #[tokio::test]
    async fn test_projected_fields() {
        let store = seeded();
        let statement = format!(
            "SELECT META(l).id AS key, l.name, l.city AS town FROM {} AS l",
            landmarks().qualified()
        );

        let rows = store
            .execute_query(&statement, &QueryParams::new())
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["key"], "landmark_3");
        assert_eq!(rows[2]["name"], "Louvre");
        assert_eq!(rows[2]["town"], "Paris");
        assert!(rows[2].get("content").is_none());
    }

    #[tokio::test]
    async fn test_count_create_and_upsert_statements() {
        let store = seeded();

        store
            .execute_query(&vectors().create_collection_statement(), &QueryParams::new())
            .await
            .unwrap();
        let params = QueryParams::new()
            .named("key", json!("vector::landmark_1"))
            .named("value", json!({"doc_id": "landmark_1"}));
        store
            .execute_query(&vectors().upsert_statement(), &params)
            .await
            .unwrap();

        let rows = store
            .execute_query(&vectors().count_statement(), &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(rows[0]["count"], 1);

        let all = store
            .execute_query(&landmarks().select_all_statement(), &QueryParams::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_unsupported_statement() {
        let store = seeded();
        let err = store
            .execute_query("DELETE FROM x", &QueryParams::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "QUERY_ERROR");

        let statement = format!("SELECT UPPER(l.name) FROM {} AS l", landmarks().qualified());
        let err = store
            .execute_query(&statement, &QueryParams::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "QUERY_ERROR");
    }

    #[tokio::test]
    async fn test_vector_search_ranks_by_cosine() {
        let store = MemoryStore::new();
        store
            .create_vector_index("vec-idx", &vectors(), "embedding")
            .unwrap();
        store
            .upsert(&vectors(), "vector::a", &json!({"embedding": [1.0, 0.0]}))
            .await
            .unwrap();
        store
            .upsert(&vectors(), "vector::b", &json!({"embedding": [0.6, 0.8]}))
            .await
            .unwrap();
        store
            .upsert(&vectors(), "vector::c", &json!({"embedding": [0.0, 1.0]}))
            .await
            .unwrap();

        let request = VectorSearchRequest {
            scope: None,
            index: "vec-idx".to_string(),
            field: "embedding".to_string(),
            vector: vec![1.0, 0.1],
            k: 2,
            limit: 10,
            fields: vec![],
        };
        let hits = store.vector_search(&request).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "vector::a");
        assert_eq!(hits[1].id, "vector::b");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_vector_search_dimension_mismatch_fails() {
        let store = MemoryStore::new();
        store
            .create_vector_index("vec-idx", &vectors(), "embedding")
            .unwrap();
        store
            .insert(&vectors(), "vector::a", json!({"embedding": [1.0, 0.0, 0.0]}))
            .unwrap();

        let request = VectorSearchRequest {
            scope: None,
            index: "vec-idx".to_string(),
            field: "embedding".to_string(),
            vector: vec![1.0, 0.0],
            k: 3,
            limit: 3,
            fields: vec![],
        };
        let err = store.vector_search(&request).await.unwrap_err();
        assert!(err.to_string().contains("dimension"));
    }

    #[tokio::test]
    async fn test_text_search_or_semantics() {
        let store = seeded();
        store.create_text_index("text-idx", &landmarks()).unwrap();

        let request = TextSearchRequest {
            scope: None,
            index: "text-idx".to_string(),
            clauses: vec![
                MatchClause::new("name", "tower paris"),
                MatchClause::new("city", "tower paris"),
            ],
            limit: 10,
            fields: vec!["name".to_string()],
        };
        let hits = store.text_search(&request).await.unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        // Eiffel Tower matches in both fields and ranks first.
        assert_eq!(ids[0], "landmark_1");
        assert_eq!(ids.len(), 3);
        assert_eq!(hits[0].fields.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_index_fails() {
        let store = seeded();
        let request = TextSearchRequest {
            scope: None,
            index: "nope".to_string(),
            clauses: vec![MatchClause::new("name", "tower")],
            limit: 3,
            fields: vec![],
        };
        let err = store.text_search(&request).await.unwrap_err();
        assert_eq!(err.error_code(), "SEARCH_ERROR");
    }

    #[tokio::test]
    async fn test_failure_injection_counts_calls() {
        let store = seeded();
        store.create_text_index("text-idx", &landmarks()).unwrap();
        store.fail(StoreOperation::TextSearch).unwrap();

        let request = TextSearchRequest {
            scope: None,
            index: "text-idx".to_string(),
            clauses: vec![MatchClause::new("name", "tower")],
            limit: 3,
            fields: vec![],
        };
        let err = store.text_search(&request).await.unwrap_err();
        assert!(err.is_connectivity());

        store.recover(StoreOperation::TextSearch).unwrap();
        assert_eq!(store.text_search(&request).await.unwrap().len(), 2);
        assert_eq!(store.calls(StoreOperation::TextSearch), 2);
    }

    #[tokio::test]
    async fn test_text_index_storing_no_fields() {
        let store = seeded();
        store
            .create_text_index_storing("bare-idx", &landmarks(), &[])
            .unwrap();

        let request = TextSearchRequest {
            scope: None,
            index: "bare-idx".to_string(),
            clauses: vec![MatchClause::new("name", "louvre")],
            limit: 3,
            fields: vec!["name".to_string(), "city".to_string()],
        };
        let hits = store.text_search(&request).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].fields.is_empty());
    }
}

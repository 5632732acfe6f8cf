//! Couchbase Capella store over the query and search REST services.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use travel_core::{
    CapellaConfig, DocumentStore, IndexScope, Keyspace, QueryParams, Result, Row, SearchHit,
    TextSearchRequest, TravelError, VectorSearchRequest,
};

/// Capella-backed store implementation.
///
/// Statements go to the query service, text and vector searches to the
/// search service. Both use basic auth with the configured credentials.
pub struct CapellaStore {
    /// HTTP client carrying the connect and request timeouts.
    client: reqwest::Client,

    /// Query service base URL.
    query_url: String,

    /// Search service base URL.
    search_url: String,

    username: String,
    password: String,

    /// Server-side statement timeout sent with each query.
    query_timeout: Duration,
}

impl CapellaStore {
    /// Create a store without contacting the cluster.
    pub fn new(config: &CapellaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| TravelError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            query_url: config.query_url(),
            search_url: config.search_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            query_timeout: config.request_timeout(),
        })
    }

    /// Create a store and wait until the query service answers a ping.
    pub async fn connect(config: &CapellaConfig) -> Result<Self> {
        let store = Self::new(config)?;
        info!("Connecting to Capella at {}", store.query_url);
        store.ping().await?;
        info!("Connected to Capella");
        Ok(store)
    }

    /// Query service base URL.
    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    /// Search service base URL.
    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    fn search_endpoint(&self, scope: Option<&IndexScope>, index: &str) -> String {
        match scope {
            Some(scope) => format!(
                "{}/api/bucket/{}/scope/{}/index/{}/query",
                self.search_url, scope.bucket, scope.scope, index
            ),
            None => format!("{}/api/index/{}/query", self.search_url, index),
        }
    }

    /// POST a JSON body and return the status with the parsed response.
    ///
    /// A body that is not JSON is an error; on a failed status the raw text
    /// is kept in the message.
    async fn post_json(&self, url: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        match serde_json::from_str(&text) {
            Ok(value) => Ok((status, value)),
            Err(e) if status.is_success() => Err(TravelError::malformed(format!(
                "{} returned invalid JSON: {}",
                url, e
            ))),
            Err(_) => Err(TravelError::query(format!(
                "{} returned {}: {}",
                url,
                status,
                snippet(&text)
            ))),
        }
    }

    async fn search(&self, index: &str, url: String, body: Value) -> Result<Vec<SearchHit>> {
        let (status, response) = self.post_json(&url, &body).await.map_err(|e| match e {
            TravelError::Query { message } => TravelError::search(index, message),
            other => other,
        })?;

        parse_search_response(index, status.is_success(), response)
    }
}

#[async_trait]
impl DocumentStore for CapellaStore {
    async fn execute_query(&self, statement: &str, params: &QueryParams) -> Result<Vec<Row>> {
        debug!("Executing statement: {}", statement);

        let url = format!("{}/query/service", self.query_url);
        let body = query_body(statement, params, self.query_timeout);
        let (status, response) = self.post_json(&url, &body).await?;

        let rows = parse_query_response(status.is_success(), response)?;
        debug!("Statement returned {} rows", rows.len());
        Ok(rows)
    }

    async fn vector_search(&self, request: &VectorSearchRequest) -> Result<Vec<SearchHit>> {
        let url = self.search_endpoint(request.scope.as_ref(), &request.index);
        debug!(
            "Vector search on {} (k={}, dim={})",
            request.index,
            request.k,
            request.vector.len()
        );
        self.search(&request.index, url, vector_search_body(request))
            .await
    }

    async fn text_search(&self, request: &TextSearchRequest) -> Result<Vec<SearchHit>> {
        if request.clauses.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.search_endpoint(request.scope.as_ref(), &request.index);
        debug!(
            "Text search on {} ({} clauses, limit={})",
            request.index,
            request.clauses.len(),
            request.limit
        );
        self.search(&request.index, url, text_search_body(request))
            .await
    }

    async fn upsert(&self, keyspace: &Keyspace, key: &str, value: &Value) -> Result<()> {
        let params = QueryParams::new()
            .named("key", json!(key))
            .named("value", value.clone());
        self.execute_query(&keyspace.upsert_statement(), &params)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/admin/ping", self.query_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TravelError::connection(format!(
                "ping returned {}",
                response.status()
            )))
        }
    }
}

/// Classify a transport failure.
fn transport_error(e: reqwest::Error) -> TravelError {
    if e.is_timeout() {
        TravelError::connection(format!("request timed out: {}", e))
    } else if e.is_decode() {
        TravelError::malformed(e.to_string())
    } else {
        TravelError::connection(e.to_string())
    }
}

fn snippet(text: &str) -> String {
    const MAX: usize = 200;
    match text.char_indices().nth(MAX) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// Build a query service request body.
pub(crate) fn query_body(statement: &str, params: &QueryParams, timeout: Duration) -> Value {
    let mut body = Map::new();
    body.insert("statement".to_string(), json!(statement));
    body.insert(
        "timeout".to_string(),
        json!(format!("{}s", timeout.as_secs())),
    );

    if !params.positional.is_empty() {
        body.insert("args".to_string(), Value::Array(params.positional.clone()));
    }
    for (name, value) in &params.named {
        body.insert(format!("${}", name), value.clone());
    }

    Value::Object(body)
}

/// Parse a query service response into rows.
pub(crate) fn parse_query_response(success: bool, body: Value) -> Result<Vec<Row>> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or(if success { "success" } else { "errors" })
        .to_string();

    let errors: Vec<String> = body
        .get("errors")
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .map(|e| {
                    let code = e.get("code").map(Value::to_string).unwrap_or_default();
                    let msg = e.get("msg").and_then(Value::as_str).unwrap_or("unknown error");
                    if code.is_empty() {
                        msg.to_string()
                    } else {
                        format!("[{}] {}", code, msg)
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    if status == "timeout" {
        return Err(TravelError::connection("query timed out on the server"));
    }
    if !success || status != "success" || !errors.is_empty() {
        let message = if errors.is_empty() {
            format!("query finished with status '{}'", status)
        } else {
            errors.join("; ")
        };
        return Err(TravelError::query(message));
    }

    let results = match body.get("results") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(results)) => results,
        Some(other) => {
            return Err(TravelError::malformed(format!(
                "query results is not an array: {}",
                other
            )))
        }
    };

    Ok(results
        .iter()
        .map(|value| match value {
            Value::Object(row) => row.clone(),
            // Unnamed projections (SELECT RAW ...) come back bare.
            other => {
                let mut row = Map::new();
                row.insert("$1".to_string(), other.clone());
                row
            }
        })
        .collect())
}

/// Build a disjunction of match clauses.
pub(crate) fn text_search_body(request: &TextSearchRequest) -> Value {
    let disjuncts: Vec<Value> = request
        .clauses
        .iter()
        .map(|clause| {
            let mut query = json!({
                "match": clause.text,
                "field": clause.field,
            });
            if let Some(boost) = clause.boost {
                query["boost"] = json!(boost);
            }
            query
        })
        .collect();

    json!({
        "query": { "disjuncts": disjuncts },
        "size": request.limit,
        "fields": request.fields,
    })
}

/// Build a pure kNN request; `match_none` keeps text scoring out of it.
pub(crate) fn vector_search_body(request: &VectorSearchRequest) -> Value {
    json!({
        "query": { "match_none": {} },
        "knn": [{
            "field": request.field,
            "vector": request.vector,
            "k": request.k,
        }],
        "size": request.limit,
        "fields": request.fields,
    })
}

/// Parse a search service response into hits.
pub(crate) fn parse_search_response(
    index: &str,
    success: bool,
    body: Value,
) -> Result<Vec<SearchHit>> {
    if !success || body.get("status").and_then(Value::as_str) == Some("fail") {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| snippet(&body.to_string()));
        return Err(TravelError::search(index, message));
    }

    let hits = match body.get("hits") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(hits)) => hits.clone(),
        Some(other) => {
            return Err(TravelError::malformed(format!(
                "search hits is not an array: {}",
                other
            )))
        }
    };

    let failed = body
        .get("status")
        .and_then(|s| s.get("failed"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if failed > 0 {
        let errors = body
            .get("status")
            .and_then(|s| s.get("errors"))
            .map(Value::to_string)
            .unwrap_or_default();
        if hits.is_empty() {
            return Err(TravelError::search(
                index,
                format!("{} partitions failed: {}", failed, errors),
            ));
        }
        warn!(
            "Search on {} returned partial results ({} partitions failed)",
            index, failed
        );
    }

    let mut parsed = Vec::with_capacity(hits.len());
    for hit in hits {
        let Some(id) = hit.get("id").and_then(Value::as_str) else {
            warn!("Skipping search hit without an id on {}", index);
            continue;
        };

        let score = hit.get("score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
        let fields = hit
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        parsed.push(SearchHit {
            id: id.to_string(),
            score,
            fields,
        });
    }

    Ok(parsed)
}

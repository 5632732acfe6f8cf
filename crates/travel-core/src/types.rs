//! Core domain types for the travel chatbot.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::keyspace::IndexScope;

/// A single row returned by the query service.
pub type Row = Map<String, Value>;

/// Which search pass produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Vector,
    Keyword,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Vector => "vector search",
            Self::Keyword => "keyword search",
        };
        write!(f, "{}", s)
    }
}

/// The named fields of a landmark document. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFields {
    pub name: Option<String>,
    pub content: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    pub activity: Option<String>,
    pub title: Option<String>,
}

impl LandmarkFields {
    /// Extract landmark fields from a JSON object.
    ///
    /// Missing, null, and blank values become `None`. `category` falls back
    /// to the `type` field used by the travel-sample dataset.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            name: text_field(map, "name"),
            content: text_field(map, "content"),
            country: text_field(map, "country"),
            city: text_field(map, "city"),
            category: text_field(map, "category").or_else(|| text_field(map, "type")),
            activity: text_field(map, "activity"),
            title: text_field(map, "title"),
        }
    }

    /// Check whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.content.is_none()
            && self.country.is_none()
            && self.city.is_none()
            && self.category.is_none()
            && self.activity.is_none()
            && self.title.is_none()
    }

    /// `city, country` with absent parts dropped, or `None` if both are absent.
    pub fn location(&self) -> Option<String> {
        let parts: Vec<&str> = [self.city.as_deref(), self.country.as_deref()]
            .into_iter()
            .flatten()
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Read a field as display text.
fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match map.get(key)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        // Search engines return multi-valued stored fields as arrays.
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null | Value::Object(_) => return None,
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The body of a retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DocumentContent {
    /// Structured landmark fields.
    Fields(LandmarkFields),

    /// Content that could not be read as fields, kept verbatim.
    Raw(String),
}

impl DocumentContent {
    /// Interpret an arbitrary JSON value as document content.
    ///
    /// Objects become fields. Strings holding a JSON object are parsed.
    /// Everything else is kept as raw text.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Fields(LandmarkFields::from_map(&map)),
            Value::String(text) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(map) => Self::Fields(LandmarkFields::from_map(&map)),
                Err(_) => Self::Raw(text),
            },
            other => Self::Raw(other.to_string()),
        }
    }

    /// Get the structured fields, if any.
    pub fn fields(&self) -> Option<&LandmarkFields> {
        match self {
            Self::Fields(fields) => Some(fields),
            Self::Raw(_) => None,
        }
    }
}

/// A retrieved record plus how it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDocument {
    /// Document key, unique within the store.
    pub id: String,

    /// Document body.
    pub content: DocumentContent,

    /// Search pass that produced this candidate.
    pub provenance: Provenance,

    /// Engine score. Only comparable with candidates of the same provenance.
    pub score: f32,
}

impl CandidateDocument {
    /// Create a candidate with structured fields.
    pub fn new(
        id: impl Into<String>,
        fields: LandmarkFields,
        provenance: Provenance,
        score: f32,
    ) -> Self {
        Self {
            id: id.into(),
            content: DocumentContent::Fields(fields),
            provenance,
            score,
        }
    }

    /// Build a candidate from a whole document body.
    pub fn from_document(
        id: impl Into<String>,
        body: Value,
        provenance: Provenance,
        score: f32,
    ) -> Self {
        Self {
            id: id.into(),
            content: DocumentContent::from_value(body),
            provenance,
            score,
        }
    }

    /// Build a candidate from a search hit's stored fields.
    pub fn from_hit(hit: SearchHit, provenance: Provenance) -> Self {
        Self {
            id: hit.id,
            content: DocumentContent::Fields(LandmarkFields::from_map(&hit.fields)),
            provenance,
            score: hit.score,
        }
    }

    /// Get the landmark name, if the content is structured and has one.
    pub fn name(&self) -> Option<&str> {
        self.content.fields().and_then(|f| f.name.as_deref())
    }
}

/// Deduplicated union of candidates, keyed by identity, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct MergedResultSet {
    documents: Vec<CandidateDocument>,
    seen: HashSet<String>,
}

impl MergedResultSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate unless its identity is already present.
    ///
    /// Returns `false` and leaves the existing entry untouched on a duplicate.
    pub fn insert(&mut self, document: CandidateDocument) -> bool {
        if !self.seen.insert(document.id.clone()) {
            return false;
        }
        self.documents.push(document);
        true
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Consume the set, yielding candidates in insertion order.
    pub fn into_documents(self) -> Vec<CandidateDocument> {
        self.documents
    }
}

/// Positional and named parameters for a query statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    /// Bound to `$1`, `$2`, ...
    pub positional: Vec<Value>,

    /// Bound to `$name`.
    pub named: BTreeMap<String, Value>,
}

impl QueryParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a positional parameter.
    pub fn arg(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    /// Add a named parameter (without the leading `$`).
    pub fn named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    /// Look up a named parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// One hit from the search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Key of the matched document.
    pub id: String,

    /// Engine relevance or similarity score.
    pub score: f32,

    /// Stored field values, empty if the index stores none.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// A match clause over one field.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchClause {
    pub field: String,
    pub text: String,
    pub boost: Option<f32>,
}

impl MatchClause {
    pub fn new(field: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            text: text.into(),
            boost: None,
        }
    }

    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }
}

/// A full-text search request. Clauses are combined with OR semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSearchRequest {
    /// Bucket and scope of a scoped index, `None` for a cluster-level index.
    pub scope: Option<IndexScope>,

    /// Index name.
    pub index: String,

    /// Disjunction of match clauses.
    pub clauses: Vec<MatchClause>,

    /// Maximum number of hits.
    pub limit: usize,

    /// Stored fields to return with each hit.
    pub fields: Vec<String>,
}

/// A vector similarity search request.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchRequest {
    /// Bucket and scope of a scoped index, `None` for a cluster-level index.
    pub scope: Option<IndexScope>,

    /// Index name.
    pub index: String,

    /// Indexed vector field.
    pub field: String,

    /// Query vector.
    pub vector: Vec<f32>,

    /// Number of nearest neighbours to consider.
    pub k: usize,

    /// Maximum number of hits.
    pub limit: usize,

    /// Stored fields to return with each hit.
    pub fields: Vec<String>,
}

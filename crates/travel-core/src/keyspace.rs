//! Keyspace addressing and the query statements built from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TravelError};
use crate::types::Row;

/// Column holding the document key in rows of the select statements.
///
/// Landmark documents carry their own `id` field, so the key cannot be
/// projected as `id` next to the document's fields.
pub const KEY_COLUMN: &str = "__key";

/// Column holding the whole document in rows of the select statements.
pub const DOCUMENT_COLUMN: &str = "doc";

/// Split a row of the select statements into document key and body.
///
/// Returns `None` when the key column is missing or not a string.
pub fn split_keyed_row(mut row: Row) -> Option<(String, Value)> {
    let key = match row.remove(KEY_COLUMN)? {
        Value::String(key) => key,
        _ => return None,
    };
    let body = row.remove(DOCUMENT_COLUMN).unwrap_or(Value::Null);
    Some((key, body))
}

/// Key prefix of the vector records stored beside each source document.
pub const VECTOR_KEY_PREFIX: &str = "vector::";

/// Key of the vector record for a source document.
pub fn vector_key(source_id: &str) -> String {
    format!("{}{}", VECTOR_KEY_PREFIX, source_id)
}

/// Source document key behind a vector record key, if it has the prefix.
pub fn source_id_from_vector_key(key: &str) -> Option<&str> {
    key.strip_prefix(VECTOR_KEY_PREFIX)
        .filter(|id| !id.is_empty())
}

/// Bucket and scope that own a scoped search index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexScope {
    pub bucket: String,
    pub scope: String,
}

/// A fully qualified `bucket.scope.collection` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyspace {
    pub bucket: String,
    pub scope: String,
    pub collection: String,
}

impl Keyspace {
    /// Create a keyspace from its parts.
    pub fn new(
        bucket: impl Into<String>,
        scope: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            scope: scope.into(),
            collection: collection.into(),
        }
    }

    /// Parse `scope.collection` (qualified with `default_bucket`) or
    /// `bucket.scope.collection`. Backtick quoting is accepted and removed.
    pub fn parse(name: &str, default_bucket: &str) -> Result<Self> {
        let parts: Vec<&str> = name
            .trim()
            .split('.')
            .map(|part| part.trim().trim_matches('`'))
            .collect();

        if parts.iter().any(|part| part.is_empty() || part.contains('`')) {
            return Err(TravelError::invalid_argument(format!(
                "invalid keyspace '{}'",
                name
            )));
        }

        match parts.as_slice() {
            [scope, collection] => {
                if default_bucket.trim().is_empty() {
                    return Err(TravelError::invalid_argument(format!(
                        "keyspace '{}' needs a bucket",
                        name
                    )));
                }
                Ok(Self::new(default_bucket.trim(), *scope, *collection))
            }
            [bucket, scope, collection] => Ok(Self::new(*bucket, *scope, *collection)),
            _ => Err(TravelError::invalid_argument(format!(
                "keyspace '{}' must be scope.collection or bucket.scope.collection",
                name
            ))),
        }
    }

    /// The keyspace path with every part backtick-quoted.
    pub fn qualified(&self) -> String {
        format!("`{}`.`{}`.`{}`", self.bucket, self.scope, self.collection)
    }

    /// Bucket and scope, for addressing scoped search indexes.
    pub fn index_scope(&self) -> IndexScope {
        IndexScope {
            bucket: self.bucket.clone(),
            scope: self.scope.clone(),
        }
    }

    /// Fetch documents by key into [`KEY_COLUMN`] and [`DOCUMENT_COLUMN`].
    /// Binds `$ids` (array of keys).
    pub fn select_by_keys_statement(&self) -> String {
        format!(
            "SELECT META(l).id AS {}, l AS {} FROM {} AS l USE KEYS $ids",
            KEY_COLUMN,
            DOCUMENT_COLUMN,
            self.qualified()
        )
    }

    /// Fetch every document in the collection, shaped like
    /// [`Self::select_by_keys_statement`].
    pub fn select_all_statement(&self) -> String {
        format!(
            "SELECT META(l).id AS {}, l AS {} FROM {} AS l",
            KEY_COLUMN,
            DOCUMENT_COLUMN,
            self.qualified()
        )
    }

    /// Count the documents in the collection into a `count` column.
    pub fn count_statement(&self) -> String {
        format!("SELECT COUNT(*) AS count FROM {}", self.qualified())
    }

    /// Create the collection unless it already exists.
    pub fn create_collection_statement(&self) -> String {
        format!("CREATE COLLECTION {} IF NOT EXISTS", self.qualified())
    }

    /// Upsert one document. Binds `$key` and `$value`.
    pub fn upsert_statement(&self) -> String {
        format!(
            "UPSERT INTO {} (KEY, VALUE) VALUES ($key, $value)",
            self.qualified()
        )
    }
}

impl std::fmt::Display for Keyspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.bucket, self.scope, self.collection)
    }
}

//! Configuration types for the travel chatbot.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, TravelError};
use crate::keyspace::Keyspace;

/// Environment variable holding the Capella endpoint host.
pub const ENV_ENDPOINT: &str = "DEV_CAPELLA_ENDPOINT";

/// Environment variable holding the Capella user name.
pub const ENV_USERNAME: &str = "DEV_CAPELLA_ADMIN_USER";

/// Environment variable holding the Capella password.
pub const ENV_PASSWORD: &str = "DEV_CAPELLA_ADMIN_PASSWORD";

/// Environment variable overriding the bucket name.
pub const ENV_BUCKET: &str = "TRAVEL_RAG_BUCKET";

/// Environment variable overriding the embedding model directory.
pub const ENV_MODEL_PATH: &str = "TRAVEL_RAG_MODEL_PATH";

/// Main configuration for the travel chatbot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TravelConfig {
    /// Document store connection.
    #[serde(default)]
    pub capella: CapellaConfig,

    /// Embedding model.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval behaviour.
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Couchbase Capella connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct CapellaConfig {
    /// Cluster host name, without a scheme.
    #[serde(default)]
    pub endpoint: String,

    /// User name for basic auth.
    #[serde(default)]
    pub username: String,

    /// Password for basic auth.
    #[serde(default)]
    pub password: String,

    /// Bucket holding the travel data.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Base timeout in seconds; connect and request timeouts derive from it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Use the TLS service ports.
    #[serde(default = "default_true")]
    pub tls: bool,

    /// Verify server certificates.
    #[serde(default = "default_true")]
    pub tls_verify: bool,

    /// Query service base URL, overriding the one derived from `endpoint`.
    #[serde(default)]
    pub query_url: Option<String>,

    /// Search service base URL, overriding the one derived from `endpoint`.
    #[serde(default)]
    pub search_url: Option<String>,
}

impl Default for CapellaConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: String::new(),
            password: String::new(),
            bucket: default_bucket(),
            timeout_secs: default_timeout_secs(),
            tls: true,
            tls_verify: true,
            query_url: None,
            search_url: None,
        }
    }
}

impl std::fmt::Debug for CapellaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapellaConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.masked_password())
            .field("bucket", &self.bucket)
            .field("timeout_secs", &self.timeout_secs)
            .field("tls", &self.tls)
            .field("tls_verify", &self.tls_verify)
            .field("query_url", &self.query_url)
            .field("search_url", &self.search_url)
            .finish()
    }
}

impl CapellaConfig {
    /// The password with every character replaced by `*`.
    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }

    /// Host part of the endpoint, with any scheme or trailing slash removed.
    pub fn host(&self) -> &str {
        let endpoint = self.endpoint.trim();
        let host = endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(endpoint);
        host.trim_end_matches('/')
    }

    /// Base URL of the query service.
    pub fn query_url(&self) -> String {
        match &self.query_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => self.service_url(8093, 18093),
        }
    }

    /// Base URL of the search service.
    pub fn search_url(&self) -> String {
        match &self.search_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => self.service_url(8094, 18094),
        }
    }

    fn service_url(&self, plain_port: u16, tls_port: u16) -> String {
        if self.tls {
            format!("https://{}:{}", self.host(), tls_port)
        } else {
            format!("http://{}:{}", self.host(), plain_port)
        }
    }

    /// Timeout for establishing a connection.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs + 5)
    }

    /// Timeout for a whole query or search request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs + 10)
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Directory holding the ONNX model and tokenizer.
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Model file name inside `model_path`.
    #[serde(default = "default_model_file")]
    pub model_file: String,

    /// Tokenizer file name inside `model_path`.
    #[serde(default = "default_tokenizer_file")]
    pub tokenizer_file: String,

    /// Embedding dimension; must match the vector index.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Maximum tokens per input; longer inputs are truncated.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Batch size for embedding during data preparation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of threads for CPU inference.
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            model_file: default_model_file(),
            tokenizer_file: default_tokenizer_file(),
            dimension: default_dimension(),
            max_tokens: default_max_tokens(),
            batch_size: default_batch_size(),
            num_threads: default_num_threads(),
        }
    }
}

impl EmbeddingConfig {
    /// Full path of the ONNX model file.
    pub fn model_file_path(&self) -> PathBuf {
        self.model_path.join(&self.model_file)
    }

    /// Full path of the tokenizer file.
    pub fn tokenizer_file_path(&self) -> PathBuf {
        self.model_path.join(&self.tokenizer_file)
    }
}

/// Retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of candidates requested from each search pass.
    #[serde(default = "default_num_candidates")]
    pub num_candidates: usize,

    /// Always run keyword search as a supplement, not only as a fallback.
    #[serde(default = "default_true")]
    pub keyword_search: bool,

    /// Source collection, `scope.collection` or `bucket.scope.collection`.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Collection holding the vector records.
    #[serde(default = "default_vector_collection")]
    pub vector_collection: String,

    /// Vector search index name.
    #[serde(default = "default_vector_index")]
    pub vector_index: String,

    /// Full-text search index name.
    #[serde(default = "default_text_index")]
    pub text_index: String,

    /// Indexed vector field in the vector records.
    #[serde(default = "default_vector_field")]
    pub vector_field: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            num_candidates: default_num_candidates(),
            keyword_search: true,
            collection: default_collection(),
            vector_collection: default_vector_collection(),
            vector_index: default_vector_index(),
            text_index: default_text_index(),
            vector_field: default_vector_field(),
        }
    }
}

impl RetrievalConfig {
    /// Keyspace of the source landmark documents.
    pub fn source_keyspace(&self, bucket: &str) -> Result<Keyspace> {
        Keyspace::parse(&self.collection, bucket)
    }

    /// Keyspace of the vector records.
    pub fn vectors_keyspace(&self, bucket: &str) -> Result<Keyspace> {
        Keyspace::parse(&self.vector_collection, bucket)
    }
}

// Default value functions

fn default_true() -> bool {
    true
}

fn default_bucket() -> String {
    "travel-sample".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_model_file() -> String {
    "model.onnx".to_string()
}

fn default_tokenizer_file() -> String {
    "tokenizer.json".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_max_tokens() -> usize {
    256
}

fn default_batch_size() -> usize {
    32
}

fn default_num_threads() -> usize {
    4
}

fn default_num_candidates() -> usize {
    3
}

fn default_collection() -> String {
    "inventory.landmark".to_string()
}

fn default_vector_collection() -> String {
    "inventory.vectors".to_string()
}

fn default_vector_index() -> String {
    "landmark-vector-index".to_string()
}

fn default_text_index() -> String {
    "landmark-text-index".to_string()
}

fn default_vector_field() -> String {
    "embedding".to_string()
}

fn default_model_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("travel-rag")
        .join("models")
        .join("all-MiniLM-L6-v2")
}

impl TravelConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| TravelError::config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("travel-rag").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("travel-rag.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        // Return defaults
        Ok(Self::default())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an environment lookup. Empty values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.capella.endpoint = endpoint;
        }
        if let Some(username) = get(ENV_USERNAME) {
            self.capella.username = username;
        }
        if let Some(password) = get(ENV_PASSWORD) {
            self.capella.password = password;
        }
        if let Some(bucket) = get(ENV_BUCKET) {
            self.capella.bucket = bucket;
        }
        if let Some(model_path) = get(ENV_MODEL_PATH) {
            self.embedding.model_path = PathBuf::from(model_path);
        }
    }

    /// Check that every required startup parameter is present and usable.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.capella.endpoint.trim().is_empty() {
            missing.push(ENV_ENDPOINT);
        }
        if self.capella.username.trim().is_empty() {
            missing.push(ENV_USERNAME);
        }
        if self.capella.password.is_empty() {
            missing.push(ENV_PASSWORD);
        }
        if !missing.is_empty() {
            return Err(TravelError::config(format!(
                "Missing required settings: {}",
                missing.join(", ")
            )));
        }

        if self.capella.bucket.trim().is_empty() {
            return Err(TravelError::config("Bucket name must not be empty"));
        }
        if self.retrieval.num_candidates == 0 {
            return Err(TravelError::config("num_candidates must be at least 1"));
        }
        if self.embedding.batch_size == 0 {
            return Err(TravelError::config("batch_size must be at least 1"));
        }

        let bucket = &self.capella.bucket;
        self.retrieval
            .source_keyspace(bucket)
            .and_then(|_| self.retrieval.vectors_keyspace(bucket))
            .map_err(|e| TravelError::config(e.to_string()))?;

        Ok(())
    }
}

//! ONNX-based embedding model implementation.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::ArrayViewD;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use travel_core::{Embedder, EmbeddingConfig, Result, TravelError};

/// all-MiniLM-L6-v2 configuration.
const EMBEDDING_DIM: usize = 384;
const MAX_TOKENS: usize = 256;
const NUM_THREADS: usize = 4;

/// ONNX-based embedder for sentence-transformer models.
pub struct OnnxEmbedder {
    /// ONNX inference session (wrapped in Mutex for interior mutability).
    session: Mutex<Session>,

    /// Tokenizer for the model.
    tokenizer: Arc<Tokenizer>,

    /// Embedding dimension.
    dimension: usize,

    /// Maximum token count; longer inputs are truncated.
    max_tokens: usize,

    /// BERT exports take `token_type_ids`, some other models reject it.
    token_type_ids: AtomicBool,
}

impl OnnxEmbedder {
    /// Create a new embedder from model and tokenizer paths.
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `tokenizer_path` - Path to the tokenizer.json file
    pub fn new(model_path: impl AsRef<Path>, tokenizer_path: impl AsRef<Path>) -> Result<Self> {
        Self::build(
            model_path.as_ref(),
            tokenizer_path.as_ref(),
            EMBEDDING_DIM,
            MAX_TOKENS,
            NUM_THREADS,
        )
    }

    /// Create an embedder from the `[embedding]` configuration section.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let model_path = config.model_file_path();
        let tokenizer_path = config.tokenizer_file_path();

        if !model_path.exists() {
            return Err(TravelError::embedding(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(TravelError::embedding(format!(
                "Tokenizer file not found: {}",
                tokenizer_path.display()
            )));
        }

        Self::build(
            &model_path,
            &tokenizer_path,
            config.dimension,
            config.max_tokens,
            config.num_threads.max(1),
        )
    }

    fn build(
        model_path: &Path,
        tokenizer_path: &Path,
        dimension: usize,
        max_tokens: usize,
        num_threads: usize,
    ) -> Result<Self> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()
            .map_err(|e| TravelError::embedding(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| TravelError::embedding(format!("Failed to set optimization level: {}", e)))?
            .with_intra_threads(num_threads)
            .map_err(|e| TravelError::embedding(format!("Failed to set thread count: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| TravelError::embedding(format!("Failed to load model: {}", e)))?;

        info!("Loading tokenizer from {:?}", tokenizer_path);

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| TravelError::embedding(format!("Failed to load tokenizer: {}", e)))?;

        info!(
            "Embedder initialized: dim={}, max_tokens={}",
            dimension, max_tokens
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer: Arc::new(tokenizer),
            dimension,
            max_tokens,
            token_type_ids: AtomicBool::new(true),
        })
    }

    /// Tokenize, run the model and pool a batch of texts.
    fn encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| TravelError::embedding(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_tokens);

        let batch_size = encodings.len();

        debug!(
            "Embedding batch: size={}, max_len={}",
            batch_size, max_len
        );

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            let len = ids.len().min(max_len);

            for j in 0..len {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                type_ids[i * max_len + j] = types.get(j).copied().unwrap_or(0) as i64;
            }
        }

        let shape = vec![batch_size, max_len];
        let mut session = self
            .session
            .lock()
            .map_err(|e| TravelError::embedding(format!("Failed to lock session: {}", e)))?;

        let embeddings = if self.token_type_ids.load(Ordering::Relaxed) {
            let inputs = ModelInputs {
                shape: &shape,
                input_ids: &input_ids,
                attention_mask: &attention_mask,
                type_ids: Some(type_ids.as_slice()),
            };
            match infer(&mut session, &inputs, &encodings) {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    warn!("Inference with token_type_ids failed, retrying without: {}", e);
                    self.token_type_ids.store(false, Ordering::Relaxed);
                    infer(
                        &mut session,
                        &ModelInputs {
                            type_ids: None,
                            ..inputs
                        },
                        &encodings,
                    )?
                }
            }
        } else {
            let inputs = ModelInputs {
                shape: &shape,
                input_ids: &input_ids,
                attention_mask: &attention_mask,
                type_ids: None,
            };
            infer(&mut session, &inputs, &encodings)?
        };

        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(TravelError::embedding(format!(
                "Model produced {} dimensions, expected {}",
                bad.len(),
                self.dimension
            )));
        }

        Ok(embeddings)
    }
}

/// Padded, row-major model inputs for one batch.
#[derive(Clone, Copy)]
struct ModelInputs<'a> {
    shape: &'a [usize],
    input_ids: &'a [i64],
    attention_mask: &'a [i64],
    type_ids: Option<&'a [i64]>,
}

/// Run the model on one batch and pool its output into one vector per text.
fn infer(
    session: &mut Session,
    inputs: &ModelInputs<'_>,
    encodings: &[tokenizers::Encoding],
) -> Result<Vec<Vec<f32>>> {
    let tensor = |data: &[i64], what: &str| {
        Tensor::from_array((inputs.shape.to_vec(), data.to_vec()))
            .map_err(|e| TravelError::embedding(format!("Failed to create {} tensor: {}", what, e)))
    };

    let ids = tensor(inputs.input_ids, "input")?;
    let mask = tensor(inputs.attention_mask, "mask")?;

    let outputs = match inputs.type_ids {
        Some(types) => {
            let types = tensor(types, "type")?;
            session.run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
                "token_type_ids" => types
            ])
        }
        None => session.run(ort::inputs![
            "input_ids" => ids,
            "attention_mask" => mask
        ]),
    }
    .map_err(|e| TravelError::embedding(format!("Inference failed: {}", e)))?;

    // Models name their outputs differently; take the first.
    let (_, output) = outputs
        .iter()
        .next()
        .ok_or_else(|| TravelError::embedding("No output tensor found"))?;

    let view = output
        .try_extract_array::<f32>()
        .map_err(|e| TravelError::embedding(format!("Failed to extract tensor: {}", e)))?;

    let shape_dims: Vec<usize> = view.shape().to_vec();
    debug!("Output shape: {:?}", shape_dims);

    let batch_size = inputs.shape[0];
    let max_len = inputs.shape[1];

    match shape_dims.len() {
        // (batch_size, seq_len, hidden_dim)
        3 => Ok(mean_pool(&view, encodings, max_len)),
        // (batch_size, hidden_dim), already pooled
        2 => Ok((0..batch_size)
            .map(|i| l2_normalize((0..shape_dims[1]).map(|j| view[[i, j]]).collect()))
            .collect()),
        _ => Err(TravelError::embedding(format!(
            "Unexpected output shape: {:?}",
            shape_dims
        ))),
    }
}

/// Mean pooling over the sequence dimension, counting only attended tokens.
fn mean_pool(
    tensor: &ArrayViewD<'_, f32>,
    encodings: &[tokenizers::Encoding],
    max_len: usize,
) -> Vec<Vec<f32>> {
    let shape = tensor.shape();
    let seq_len = shape[1].min(max_len);
    let hidden_dim = shape[2];

    encodings
        .iter()
        .enumerate()
        .map(|(i, encoding)| {
            let mask = encoding.get_attention_mask();
            let mut sum = vec![0.0f32; hidden_dim];
            let mut count = 0usize;

            for j in 0..seq_len.min(mask.len()) {
                if mask[j] == 1 {
                    count += 1;
                    for (k, s) in sum.iter_mut().enumerate() {
                        *s += tensor[[i, j, k]];
                    }
                }
            }

            if count == 0 {
                return sum;
            }
            l2_normalize(sum.into_iter().map(|s| s / count as f32).collect())
        })
        .collect()
}

/// L2 normalize a vector.
fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        // Session is not Send; inference runs inline.
        self.encode(texts)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// A mock embedder for testing that doesn't require actual models.
///
/// Each lowercase word is hashed into one of `dimension` buckets, so texts
/// sharing words have similar vectors.
pub struct MockEmbedder {
    dimension: usize,
    failing: bool,
}

impl MockEmbedder {
    /// Create a new mock embedder with default settings.
    pub fn new() -> Self {
        Self::with_config(EMBEDDING_DIM)
    }

    /// Create a mock embedder with a custom dimension.
    pub fn with_config(dimension: usize) -> Self {
        Self {
            dimension,
            failing: false,
        }
    }

    /// Create a mock embedder whose every call fails.
    pub fn failing() -> Self {
        Self {
            dimension: EMBEDDING_DIM,
            failing: true,
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return embedding;
        }

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |acc, b| {
                    (acc ^ b as u64).wrapping_mul(0x100000001b3)
                });
            embedding[(hash % self.dimension as u64) as usize] += 1.0;
        }

        l2_normalize(embedding)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if self.failing {
            return Err(TravelError::embedding("mock embedder configured to fail"));
        }
        Ok(texts.iter().map(|text| self.vector(text)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

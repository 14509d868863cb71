//! Candle-based embedding implementation.
//!
//! Runs a sentence-transformers BERT export (all-MiniLM-L6-v2 shape:
//! 384-dimensional output, 256-token window) with mean pooling.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tracing::{debug, info};

use crate::error::EmbeddingError;
use crate::model::{l2_normalize, mean_pool, Embedding, EmbeddingModel, ModelInfo};
use crate::paths::ModelPaths;
use crate::runtime;
use crate::tokenizer::WordPieceTokenizer;
use crate::vocab::Vocab;

/// Embedding dimension for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Fixed sequence length every input is padded or truncated to
pub const MAX_SEQ_LENGTH: usize = 256;

/// Texts per forward pass
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Candle-based BERT embedder.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: WordPieceTokenizer,
    device: &'static Device,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load from a model directory holding config.json, tokenizer.json and
    /// model.safetensors.
    pub fn load(model_dir: &Path) -> Result<Self, EmbeddingError> {
        let paths = ModelPaths::in_dir(model_dir);
        paths.ensure_present()?;
        Self::load_from_paths(&paths)
    }

    /// Load from explicit file paths
    pub fn load_from_paths(paths: &ModelPaths) -> Result<Self, EmbeddingError> {
        info!(path = ?paths.weights, "Loading embedding model...");

        let device = runtime::device();

        let config_str = std::fs::read_to_string(&paths.config)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;

        let tokenizer = WordPieceTokenizer::new(Vocab::from_file(&paths.tokenizer)?);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[paths.weights.clone()], DType::F32, device)?
        };
        let model = BertModel::load(vb, &config)?;

        let name = paths
            .config
            .parent()
            .and_then(|dir| dir.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "all-MiniLM-L6-v2".to_string());

        info!(
            dim = EMBEDDING_DIM,
            max_seq = MAX_SEQ_LENGTH,
            vocab = tokenizer.vocab().len(),
            "Model loaded successfully"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            info: ModelInfo {
                name,
                dimension: EMBEDDING_DIM,
                max_sequence_length: MAX_SEQ_LENGTH,
            },
        })
    }

    fn forward_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let batch = self.tokenizer.encode_batch(texts, MAX_SEQ_LENGTH);
        let shape = (batch.batch_size, batch.seq_len);

        let input_ids = Tensor::from_vec(batch.input_ids, shape, self.device)?;
        let attention_mask = Tensor::from_vec(batch.attention_mask.clone(), shape, self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let dims = output.dims3()?;
        let expected = (batch.batch_size, MAX_SEQ_LENGTH, EMBEDDING_DIM);
        if dims != expected {
            return Err(EmbeddingError::Shape {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", dims),
            });
        }

        let hidden: Vec<f32> = output.flatten_all()?.to_vec1()?;
        let pooled = mean_pool(
            &hidden,
            &batch.attention_mask,
            batch.batch_size,
            MAX_SEQ_LENGTH,
            EMBEDDING_DIM,
        );

        Ok(pooled
            .into_iter()
            .map(|mut values| {
                l2_normalize(&mut values);
                Embedding::from_normalized(values)
            })
            .collect())
    }
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.forward_batch(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidInput("empty model output".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = texts.len(), "Embedding batch");

        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(DEFAULT_BATCH_SIZE) {
            embeddings.extend(self.forward_batch(chunk)?);
        }

        debug!(
            count = embeddings.len(),
            dim = EMBEDDING_DIM,
            "Batch complete"
        );

        Ok(embeddings)
    }
}

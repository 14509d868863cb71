//! # mydocs-embeddings
//!
//! Local embedding generation for mydocs using Candle.
//!
//! ## Features
//! - Hand-written WordPiece tokenizer over a `tokenizer.json` vocabulary
//! - all-MiniLM-L6-v2 style BERT encoder (384 dimensions)
//! - Masked mean pooling and L2 normalization
//! - Process-wide compute device shared by every model
//!
//! The tokenizer is also used by the cross-encoder in `mydocs-rerank`.

pub mod candle;
pub mod error;
pub mod model;
pub mod paths;
pub mod runtime;
pub mod tokenizer;
pub mod vocab;

pub use crate::candle::{CandleEmbedder, EMBEDDING_DIM, MAX_SEQ_LENGTH};
pub use error::EmbeddingError;
pub use model::{l2_normalize, mean_pool, Embedding, EmbeddingModel, ModelInfo};
pub use paths::{resolve_model_dir, resolve_reranker_dir, ModelPaths, MODEL_FILES};
pub use tokenizer::{EncodedBatch, WordPieceTokenizer, CLS_ID, PAD_ID, SEP_ID, UNK_ID};
pub use vocab::Vocab;

//! # mydocs-rerank
//!
//! Second-stage scoring for mydocs search.
//!
//! A cross-encoder reads the query and a candidate passage together and
//! emits one relevance logit. Scores are only meaningful within one query's
//! candidate set.

pub mod cross_encoder;
pub mod error;
pub mod model;
pub mod pairs;

pub use cross_encoder::{CrossEncoder, RERANK_BATCH_SIZE};
pub use error::RerankError;
pub use model::{sort_by_score, Reranker};
pub use pairs::{encode_pair, query_budget, EncodedPair, MAX_PAIR_LENGTH, MIN_PASSAGE_TOKENS};

//! Candle-based cross-encoder.
//!
//! Loads a BERT sequence-classification export (ms-marco-MiniLM shape): the
//! encoder, the tanh pooler over `[CLS]`, and a single-logit classifier.

use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tracing::{debug, info};

use mydocs_embeddings::{runtime, ModelPaths, Vocab, WordPieceTokenizer};
use mydocs_types::{ScoredResult, SearchResult};

use crate::error::RerankError;
use crate::model::{sort_by_score, Reranker};
use crate::pairs::{encode_pair, query_budget, MAX_PAIR_LENGTH};

/// Pairs per forward pass
pub const RERANK_BATCH_SIZE: usize = 16;

/// The config fields the classification head needs.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    #[serde(default = "default_type_vocab_size")]
    type_vocab_size: usize,
}

fn default_type_vocab_size() -> usize {
    2
}

/// BERT cross-encoder with a one-logit classification head.
pub struct CrossEncoder {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: WordPieceTokenizer,
    device: &'static Device,
    /// Whether the model distinguishes query and passage segments
    segmented: bool,
    max_len: usize,
}

impl CrossEncoder {
    /// Load from a model directory holding config.json, tokenizer.json and
    /// model.safetensors.
    pub fn load(model_dir: &Path) -> Result<Self, RerankError> {
        let paths = ModelPaths::in_dir(model_dir);
        paths.ensure_present()?;

        info!(path = ?model_dir, "Loading reranker model...");
        let device = runtime::device();

        let config_str = std::fs::read_to_string(&paths.config)?;
        let config: BertConfig =
            serde_json::from_str(&config_str).map_err(|e| RerankError::Config(e.to_string()))?;
        let head: HeadConfig =
            serde_json::from_str(&config_str).map_err(|e| RerankError::Config(e.to_string()))?;

        let tokenizer = WordPieceTokenizer::new(Vocab::from_file(&paths.tokenizer)?);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[paths.weights.clone()], DType::F32, device)?
        };
        let bert = BertModel::load(vb.clone(), &config)?;
        let hidden = head.hidden_size;
        let pooler = linear(hidden, hidden, vb.pp("bert.pooler.dense"))
            .or_else(|_| linear(hidden, hidden, vb.pp("pooler.dense")))?;
        let classifier = linear(hidden, 1, vb.pp("classifier"))?;

        info!(
            hidden,
            segments = head.type_vocab_size,
            max_len = MAX_PAIR_LENGTH,
            "Reranker loaded successfully"
        );

        Ok(Self {
            bert,
            pooler,
            classifier,
            tokenizer,
            device,
            segmented: head.type_vocab_size > 1,
            max_len: MAX_PAIR_LENGTH,
        })
    }

    /// One logit per passage, in input order.
    fn score_batch(&self, query_ids: &[u32], passages: &[&str]) -> Result<Vec<f32>, RerankError> {
        let n = passages.len();
        let passage_budget = self.max_len.saturating_sub(query_ids.len() + 3);

        let mut ids = Vec::with_capacity(n * self.max_len);
        let mut mask = Vec::with_capacity(n * self.max_len);
        let mut type_ids = Vec::with_capacity(n * self.max_len);
        for passage in passages {
            let passage_ids = self.tokenizer.encode_limited(passage, passage_budget);
            let pair = encode_pair(query_ids, &passage_ids, self.max_len);
            ids.extend(pair.ids);
            mask.extend(pair.mask);
            if self.segmented {
                type_ids.extend(pair.type_ids);
            } else {
                type_ids.extend(std::iter::repeat(0).take(self.max_len));
            }
        }

        let shape = (n, self.max_len);
        let ids = Tensor::from_vec(ids, shape, self.device)?;
        let mask = Tensor::from_vec(mask, shape, self.device)?;
        let type_ids = Tensor::from_vec(type_ids, shape, self.device)?;

        let hidden = self.bert.forward(&ids, &type_ids, Some(&mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;

        let dims = logits.dims2()?;
        if dims != (n, 1) {
            return Err(RerankError::Shape {
                expected: format!("{:?}", (n, 1)),
                actual: format!("{:?}", dims),
            });
        }

        Ok(logits.squeeze(1)?.to_vec1()?)
    }
}

impl Reranker for CrossEncoder {
    fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
    ) -> Result<Vec<ScoredResult>, RerankError> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();
        let query_ids = self
            .tokenizer
            .encode_limited(query, query_budget(self.max_len));

        let mut scores = Vec::with_capacity(candidates.len());
        for chunk in candidates.chunks(RERANK_BATCH_SIZE) {
            let passages: Vec<&str> = chunk.iter().map(|c| c.content.as_str()).collect();
            scores.extend(self.score_batch(&query_ids, &passages)?);
        }

        let mut scored: Vec<ScoredResult> = candidates
            .into_iter()
            .zip(scores)
            .map(|(result, score)| ScoredResult { result, score })
            .collect();
        sort_by_score(&mut scored);

        debug!(
            count = scored.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Reranked candidates"
        );

        Ok(scored)
    }
}

//! Embedding model trait and types.
//!
//! Defines the interface for turning text into unit-length vectors, and the
//! pooling helpers shared by implementations.

use crate::error::EmbeddingError;

/// Vector embedding - a normalized float array.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// The embedding vector (unit length, or all zeros)
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding, normalizing to unit length.
    /// A zero vector stays zero.
    pub fn new(mut values: Vec<f32>) -> Self {
        l2_normalize(&mut values);
        Self { values }
    }

    /// Wrap an already-normalized vector.
    pub fn from_normalized(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]; 0 for mismatched dimensions.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length in tokens
    pub max_sequence_length: usize,
}

/// Trait for embedding models.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
pub trait EmbeddingModel: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Generate embedding for a single text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Generate embeddings for multiple texts, in input order.
    /// Default implementation calls embed() for each text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Generate embeddings for multiple owned strings.
    fn embed_texts(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.embed_batch(&refs)
    }
}

/// Scale `values` to unit L2 norm in place. Zero vectors are left alone.
pub fn l2_normalize(values: &mut [f32]) {
    let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in values.iter_mut() {
            *x /= norm;
        }
    }
}

/// Masked mean over the sequence axis.
///
/// `hidden` is a row-major `[batch, seq_len, dim]` buffer and `mask` a
/// `[batch, seq_len]` buffer of 0/1. Rows with no unmasked position pool to
/// zeros.
pub fn mean_pool(
    hidden: &[f32],
    mask: &[u32],
    batch: usize,
    seq_len: usize,
    dim: usize,
) -> Vec<Vec<f32>> {
    debug_assert_eq!(hidden.len(), batch * seq_len * dim);
    debug_assert_eq!(mask.len(), batch * seq_len);

    (0..batch)
        .map(|b| {
            let mut pooled = vec![0.0f32; dim];
            let mut count = 0u32;
            for t in 0..seq_len {
                if mask[b * seq_len + t] == 0 {
                    continue;
                }
                count += 1;
                let row = &hidden[(b * seq_len + t) * dim..(b * seq_len + t + 1) * dim];
                for (acc, x) in pooled.iter_mut().zip(row) {
                    *acc += x;
                }
            }
            if count > 0 {
                let n = count as f32;
                for x in pooled.iter_mut() {
                    *x /= n;
                }
            }
            pooled
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(values: &[f32]) -> f32 {
        values.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_embedding_normalization() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        // 3-4-5 triangle: normalized should be [0.6, 0.8]
        assert!((emb.values[0] - 0.6).abs() < 0.001);
        assert!((emb.values[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let mut v: Vec<f32> = (1..=384).map(|i| (i as f32).sin() * 7.5).collect();
        l2_normalize(&mut v);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let mut v = vec![0.0f32; 8];
        l2_normalize(&mut v);
        assert!(v.iter().all(|&x| x == 0.0));
        assert!(Embedding::new(vec![0.0; 4]).values.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_mean_pool_ignores_masked_positions() {
        // batch 2, seq 3, dim 2
        let hidden = vec![
            1.0, 2.0, 3.0, 4.0, 100.0, 100.0, //
            5.0, 5.0, 9.0, 9.0, 9.0, 9.0,
        ];
        let mask = vec![1, 1, 0, 1, 0, 0];
        let pooled = mean_pool(&hidden, &mask, 2, 3, 2);
        assert_eq!(pooled, vec![vec![2.0, 3.0], vec![5.0, 5.0]]);
    }

    #[test]
    fn test_mean_pool_empty_mask_is_zero() {
        let pooled = mean_pool(&[1.0, 2.0, 3.0, 4.0], &[0, 0], 1, 2, 2);
        assert_eq!(pooled, vec![vec![0.0, 0.0]]);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let emb1 = Embedding::new(vec![1.0, 0.0, 0.0]);
        let emb2 = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((emb1.cosine_similarity(&emb2) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let emb1 = Embedding::new(vec![1.0, 0.0]);
        let emb2 = Embedding::new(vec![-1.0, 0.0]);
        assert!((emb1.cosine_similarity(&emb2) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch() {
        let emb1 = Embedding::new(vec![1.0, 0.0]);
        let emb2 = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(emb1.cosine_similarity(&emb2), 0.0);
    }
}

//! Query/passage pair layout.
//!
//! `[CLS] query [SEP] passage [SEP] [PAD]..` with the query truncated first
//! so the passage always keeps at least [`MIN_PASSAGE_TOKENS`] slots (half
//! the pair for very short windows).

use mydocs_embeddings::{CLS_ID, PAD_ID, SEP_ID};

/// Pair sequence length of the reference cross-encoder
pub const MAX_PAIR_LENGTH: usize = 512;

/// Slots reserved for the passage no matter how long the query is
pub const MIN_PASSAGE_TOKENS: usize = 64;

/// One encoded pair, each vector `max_len` long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPair {
    pub ids: Vec<u32>,
    pub mask: Vec<u32>,
    /// 0 for `[CLS] query [SEP]`, 1 for `passage [SEP]`
    pub type_ids: Vec<u32>,
}

/// Query subwords allowed in a pair of `max_len`.
pub fn query_budget(max_len: usize) -> usize {
    let reserved = MIN_PASSAGE_TOKENS.min(max_len / 2);
    max_len.saturating_sub(reserved + 2)
}

/// Lay out one pair. Either input may be longer than fits; both are cut.
pub fn encode_pair(query_ids: &[u32], passage_ids: &[u32], max_len: usize) -> EncodedPair {
    let mut ids = vec![PAD_ID; max_len];
    let mut mask = vec![0; max_len];
    let mut type_ids = vec![0; max_len];
    if max_len < 3 {
        return EncodedPair { ids, mask, type_ids };
    }

    let mut pos = 0;
    let mut push = |pos: &mut usize, id: u32, segment: u32| {
        ids[*pos] = id;
        mask[*pos] = 1;
        type_ids[*pos] = segment;
        *pos += 1;
    };

    push(&mut pos, CLS_ID, 0);
    for &id in query_ids.iter().take(query_budget(max_len)) {
        push(&mut pos, id, 0);
    }
    push(&mut pos, SEP_ID, 0);

    for &id in passage_ids {
        if pos >= max_len - 1 {
            break;
        }
        push(&mut pos, id, 1);
    }
    push(&mut pos, SEP_ID, 1);

    EncodedPair { ids, mask, type_ids }
}

//! WordPiece tokenization.
//!
//! Text is lowercased, split into coarse words (whitespace separates,
//! punctuation/symbols/CJK characters stand alone, control characters are
//! dropped) and every word is broken into the longest vocabulary pieces,
//! continuation pieces carrying a `##` prefix.
//!
//! Sequences are laid out as `[CLS] pieces.. [SEP] [PAD]..` with a parallel
//! attention mask. The tokenizer holds no mutable state and is shared freely
//! across threads.

use std::sync::LazyLock;

use regex::Regex;

use crate::vocab::Vocab;

/// Padding id
pub const PAD_ID: u32 = 0;
/// Unknown-piece id
pub const UNK_ID: u32 = 100;
/// Sequence start id
pub const CLS_ID: u32 = 101;
/// Separator id
pub const SEP_ID: u32 = 102;

/// Words longer than this (in characters) map straight to `[UNK]`.
/// Greedy longest-match is quadratic in word length.
pub const MAX_WORD_CHARS: usize = 100;

/// Marker for non-initial pieces of a word.
const CONTINUATION_PREFIX: &str = "##";

/// Non-ASCII characters that form a token on their own: punctuation,
/// symbols, Han, Hiragana/Katakana and Hangul syllables.
static STANDALONE_CHAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{P}\p{S}\p{Han}\x{3040}-\x{30FF}\x{AC00}-\x{D7AF}]$")
        .expect("standalone character class is a valid regex")
});

/// A batch of fixed-length sequences, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub batch_size: usize,
    pub seq_len: usize,
}

impl EncodedBatch {
    /// Ids of one sequence.
    pub fn ids(&self, row: usize) -> &[u32] {
        &self.input_ids[row * self.seq_len..(row + 1) * self.seq_len]
    }

    /// Attention mask of one sequence.
    pub fn mask(&self, row: usize) -> &[u32] {
        &self.attention_mask[row * self.seq_len..(row + 1) * self.seq_len]
    }

    /// Number of non-padding positions in one sequence.
    pub fn used_len(&self, row: usize) -> usize {
        self.mask(row).iter().filter(|&&m| m == 1).count()
    }
}

/// Greedy longest-match-first WordPiece tokenizer.
#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    vocab: Vocab,
}

impl WordPieceTokenizer {
    pub fn new(vocab: Vocab) -> Self {
        Self { vocab }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Subword ids for `text`, without special tokens.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.encode_limited(text, usize::MAX)
    }

    /// Subword ids for `text`, stopping once `limit` ids are produced.
    pub fn encode_limited(&self, text: &str, limit: usize) -> Vec<u32> {
        let lowered = text.to_lowercase();
        let mut ids = Vec::new();
        for word in pre_tokenize(&lowered) {
            if ids.len() >= limit {
                break;
            }
            self.word_piece_into(&word, &mut ids);
        }
        ids.truncate(limit);
        ids
    }

    /// Encode a batch into `[CLS] pieces [SEP]` sequences padded to `seq_len`.
    ///
    /// `seq_len` must be at least 2 so both specials fit.
    pub fn encode_batch(&self, texts: &[&str], seq_len: usize) -> EncodedBatch {
        debug_assert!(seq_len >= 2, "sequence must fit [CLS] and [SEP]");

        let batch_size = texts.len();
        let mut input_ids = vec![PAD_ID; batch_size * seq_len];
        let mut attention_mask = vec![0; batch_size * seq_len];

        for (row, text) in texts.iter().enumerate() {
            let offset = row * seq_len;
            let pieces = self.encode_limited(text, seq_len.saturating_sub(2));

            input_ids[offset] = CLS_ID;
            attention_mask[offset] = 1;
            let mut pos = 1;

            for id in pieces {
                input_ids[offset + pos] = id;
                attention_mask[offset + pos] = 1;
                pos += 1;
            }

            if pos < seq_len {
                input_ids[offset + pos] = SEP_ID;
                attention_mask[offset + pos] = 1;
            }
        }

        EncodedBatch {
            input_ids,
            attention_mask,
            batch_size,
            seq_len,
        }
    }

    fn word_piece_into(&self, word: &str, out: &mut Vec<u32>) {
        if let Some(id) = self.vocab.get(word) {
            out.push(id);
            return;
        }

        let chars: Vec<char> = word.chars().collect();
        if chars.len() > MAX_WORD_CHARS {
            out.push(UNK_ID);
            return;
        }

        let mut piece = String::with_capacity(word.len() + CONTINUATION_PREFIX.len());
        let mut start = 0;
        while start < chars.len() {
            let mut end = chars.len();
            let mut matched = None;

            while end > start {
                piece.clear();
                if start > 0 {
                    piece.push_str(CONTINUATION_PREFIX);
                }
                piece.extend(&chars[start..end]);

                if let Some(id) = self.vocab.get(&piece) {
                    matched = Some(id);
                    break;
                }
                end -= 1;
            }

            match matched {
                Some(id) => {
                    out.push(id);
                    start = end;
                }
                None => {
                    out.push(UNK_ID);
                    start += 1;
                }
            }
        }
    }
}

/// Split lowercased text into coarse words.
pub fn pre_tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_control() {
            continue;
        } else if is_standalone(c) {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            words.push(c.to_string());
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn is_standalone(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation();
    }
    let mut buf = [0u8; 4];
    STANDALONE_CHAR.is_match(c.encode_utf8(&mut buf))
}

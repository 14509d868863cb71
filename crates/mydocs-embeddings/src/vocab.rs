//! WordPiece vocabulary loading.
//!
//! Reads the `model.vocab` table of a HuggingFace `tokenizer.json`.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::EmbeddingError;

#[derive(Deserialize)]
struct TokenizerFile {
    model: TokenizerModel,
}

#[derive(Deserialize)]
struct TokenizerModel {
    #[serde(default)]
    vocab: HashMap<String, u32>,
}

/// Surface form to token id map.
#[derive(Debug, Clone, Default)]
pub struct Vocab {
    tokens: HashMap<String, u32>,
}

impl Vocab {
    /// Build from an in-memory token table.
    pub fn new(tokens: HashMap<String, u32>) -> Self {
        Self { tokens }
    }

    /// Load from a `tokenizer.json` file.
    pub fn from_file(path: &Path) -> Result<Self, EmbeddingError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            EmbeddingError::Vocab(format!("failed to read {}: {}", path.display(), e))
        })?;
        let vocab = Self::from_json(&data)?;
        debug!(path = ?path, size = vocab.len(), "Loaded vocabulary");
        Ok(vocab)
    }

    /// Parse the `{"model": {"vocab": {...}}}` shape.
    pub fn from_json(data: &str) -> Result<Self, EmbeddingError> {
        let file: TokenizerFile = serde_json::from_str(data)
            .map_err(|e| EmbeddingError::Vocab(format!("invalid tokenizer.json: {}", e)))?;

        if file.model.vocab.is_empty() {
            return Err(EmbeddingError::Vocab(
                "vocabulary is empty; expected a model.vocab table".to_string(),
            ));
        }

        Ok(Self::new(file.model.vocab))
    }

    pub fn get(&self, token: &str) -> Option<u32> {
        self.tokens.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for Vocab {
    fn from_iter<T: IntoIterator<Item = (S, u32)>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_json() {
        let vocab =
            Vocab::from_json(r###"{"model": {"type": "WordPiece", "vocab": {"hello": 10, "##s": 11}}}"###)
                .unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.get("hello"), Some(10));
        assert_eq!(vocab.get("##s"), Some(11));
        assert_eq!(vocab.get("world"), None);
    }

    #[test]
    fn test_empty_vocab_rejected() {
        let result = Vocab::from_json(r#"{"model": {"vocab": {}}}"#);
        assert!(matches!(result, Err(EmbeddingError::Vocab(_))));

        let result = Vocab::from_json(r#"{"model": {}}"#);
        assert!(matches!(result, Err(EmbeddingError::Vocab(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(Vocab::from_json("not json").is_err());
        assert!(Vocab::from_json(r#"{"vocab": {"a": 1}}"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"model": {{"vocab": {{"[CLS]": 101}}}}}}"#).unwrap();
        let vocab = Vocab::from_file(file.path()).unwrap();
        assert_eq!(vocab.get("[CLS]"), Some(101));
    }

    #[test]
    fn test_missing_file() {
        let result = Vocab::from_file(Path::new("/nonexistent/tokenizer.json"));
        assert!(matches!(result, Err(EmbeddingError::Vocab(_))));
    }
}

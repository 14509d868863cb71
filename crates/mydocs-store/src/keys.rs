//! Key and value encoding for the store's column families.
//!
//! Ids are big-endian so RocksDB's bytewise ordering matches numeric order.
//! Passage keys are `{document_id}{passage_id}`, so one document's passages
//! sit contiguously behind an 8-byte prefix.

use crate::error::StoreError;

/// Store metadata keys
pub const META_GENERATION: &[u8] = b"generation";
pub const META_NEXT_DOCUMENT_ID: &[u8] = b"next_document_id";
pub const META_NEXT_PASSAGE_ID: &[u8] = b"next_passage_id";
pub const META_DIMENSION: &[u8] = b"dimension";

/// Encode an id or counter.
pub fn id_key(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decode an id or counter.
pub fn decode_id(bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Key(format!("expected 8-byte id, got {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

/// Key of one passage under its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassageKey {
    pub document_id: u64,
    pub passage_id: u64,
}

impl PassageKey {
    pub fn new(document_id: u64, passage_id: u64) -> Self {
        Self {
            document_id,
            passage_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&self.document_id.to_be_bytes());
        key[8..].copy_from_slice(&self.passage_id.to_be_bytes());
        key
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StoreError> {
        if bytes.len() != 16 {
            return Err(StoreError::Key(format!(
                "expected 16-byte passage key, got {} bytes",
                bytes.len()
            )));
        }
        Ok(Self {
            document_id: decode_id(&bytes[..8])?,
            passage_id: decode_id(&bytes[8..])?,
        })
    }

    /// Prefix shared by every passage of a document
    pub fn document_prefix(document_id: u64) -> [u8; 8] {
        id_key(document_id)
    }
}

/// Encode a vector as little-endian f32s.
pub fn encode_vector(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a little-endian f32 array.
pub fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, StoreError> {
    if bytes.len() % 4 != 0 {
        return Err(StoreError::Serialization(format!(
            "vector length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

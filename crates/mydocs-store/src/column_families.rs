//! Column family definitions for RocksDB.
//!
//! - documents: document id -> Document JSON
//! - document_paths: file path -> document id (uniqueness index)
//! - passages: document id ++ passage id -> passage JSON (prefix scan per document)
//! - passage_owner: passage id -> document id (join from ANN hits)
//! - passage_vectors: passage id -> little-endian f32 array; absent for NULL
//! - store_meta: id sequences, generation counter, dimension

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for documents
pub const CF_DOCUMENTS: &str = "documents";

/// Column family name for the path uniqueness index
pub const CF_DOCUMENT_PATHS: &str = "document_paths";

/// Column family name for passages
pub const CF_PASSAGES: &str = "passages";

/// Column family name for passage -> document back-references
pub const CF_PASSAGE_OWNER: &str = "passage_owner";

/// Column family name for passage vectors
pub const CF_PASSAGE_VECTORS: &str = "passage_vectors";

/// Column family name for store metadata
pub const CF_STORE_META: &str = "store_meta";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_DOCUMENTS,
    CF_DOCUMENT_PATHS,
    CF_PASSAGES,
    CF_PASSAGE_OWNER,
    CF_PASSAGE_VECTORS,
    CF_STORE_META,
];

/// Create column family options for passage text (compressed)
fn passages_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_DOCUMENTS, Options::default()),
        ColumnFamilyDescriptor::new(CF_DOCUMENT_PATHS, Options::default()),
        ColumnFamilyDescriptor::new(CF_PASSAGES, passages_options()),
        ColumnFamilyDescriptor::new(CF_PASSAGE_OWNER, Options::default()),
        ColumnFamilyDescriptor::new(CF_PASSAGE_VECTORS, Options::default()),
        ColumnFamilyDescriptor::new(CF_STORE_META, Options::default()),
    ]
}

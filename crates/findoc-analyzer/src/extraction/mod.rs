//! Content extraction from source documents

mod extractor;

pub use extractor::{
    md5_hex, normalize_page, strip_document_payload, ContentExtractor, ExtractedContent,
    ExtractionFailure, CHECKSUM_PREFIX, DEFAULT_MAX_CHARS, DOCUMENT_END, DOCUMENT_START,
};

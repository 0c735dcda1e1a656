//! Source document reader with normalization and checksumming

use md5::{Digest, Md5};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::Error;

/// Marker opening the extracted text block
pub const DOCUMENT_START: &str = "FINANCIAL_DOCUMENT_CONTENT_START";
/// Marker closing the extracted text block
pub const DOCUMENT_END: &str = "FINANCIAL_DOCUMENT_CONTENT_END";
/// Prefix of the checksum line
pub const CHECKSUM_PREFIX: &str = "DOCUMENT_CHECKSUM:";

/// Default cap on extracted characters
pub const DEFAULT_MAX_CHARS: usize = 10_000;

fn excess_newlines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid newline regex"))
}

fn non_ascii_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\x00-\x7F]+").expect("valid non-ascii regex"))
}

fn document_payload() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)FINANCIAL_DOCUMENT_CONTENT_START.*?FINANCIAL_DOCUMENT_CONTENT_END\s*(DOCUMENT_CHECKSUM:[0-9a-f]{32})?",
        )
        .expect("valid payload regex")
    })
}

/// Why a document could not be turned into content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// Caller passed an empty path
    MissingPath,
    /// Path does not exist
    NotFound(PathBuf),
    /// Every page yielded no text
    EmptyContent,
    /// Underlying parse failure
    ExtractionError(String),
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionFailure::MissingPath => write!(f, "ERROR: file_path missing"),
            ExtractionFailure::NotFound(path) => {
                write!(f, "ERROR: File not found: {}", path.display())
            }
            ExtractionFailure::EmptyContent => write!(f, "ERROR: No readable content"),
            ExtractionFailure::ExtractionError(msg) => write!(f, "ERROR reading document: {}", msg),
        }
    }
}

impl ExtractionFailure {
    /// Convert to the crate error taxonomy for callers that must fail hard
    pub fn into_error(self, path: &Path) -> Error {
        match self {
            ExtractionFailure::MissingPath => Error::InputNotFound(String::new()),
            ExtractionFailure::NotFound(p) => Error::InputNotFound(p.display().to_string()),
            ExtractionFailure::EmptyContent => Error::EmptyExtraction(path.display().to_string()),
            ExtractionFailure::ExtractionError(msg) => Error::internal(msg),
        }
    }
}

/// Normalized, truncated document text with its checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Normalized text, at most `max_chars` characters
    pub text: String,
    /// MD5 (lower-case hex) of `text`
    pub checksum: String,
    /// Pages that contributed text
    pub pages: usize,
    /// Whether the normalized text was cut at the limit
    pub truncated: bool,
}

impl ExtractedContent {
    /// Render the payload handed to stages
    pub fn render(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}{}",
            DOCUMENT_START, self.text, DOCUMENT_END, CHECKSUM_PREFIX, self.checksum
        )
    }

    /// Recover text and checksum from a rendered payload
    pub fn parse_payload(payload: &str) -> Option<Self> {
        let start = payload.find(DOCUMENT_START)? + DOCUMENT_START.len();
        let end = payload.find(DOCUMENT_END)?;
        if end < start {
            return None;
        }
        let text = payload[start..end].trim().to_string();
        let checksum = payload[end..]
            .find(CHECKSUM_PREFIX)
            .map(|i| &payload[end + i + CHECKSUM_PREFIX.len()..])
            .map(|rest| rest.trim().chars().take(32).collect::<String>())?;

        Some(Self {
            pages: text.lines().count().max(1),
            truncated: false,
            text,
            checksum,
        })
    }

    /// Whether the checksum still matches the text
    pub fn verify(&self) -> bool {
        md5_hex(&self.text) == self.checksum
    }
}

/// Reads source documents into normalized, checksummed text
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    max_chars: usize,
}

impl Default for ContentExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHARS)
    }
}

impl ContentExtractor {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Extract content, failures as data
    pub fn extract(&self, path: &Path) -> std::result::Result<ExtractedContent, ExtractionFailure> {
        if path.as_os_str().is_empty() {
            return Err(ExtractionFailure::MissingPath);
        }
        if !path.exists() {
            return Err(ExtractionFailure::NotFound(path.to_path_buf()));
        }

        let pages = load_pages(path)?;
        let parts: Vec<String> = pages
            .iter()
            .map(|page| normalize_page(page))
            .filter(|page| !page.is_empty())
            .collect();

        if parts.is_empty() {
            return Err(ExtractionFailure::EmptyContent);
        }

        let full_text = parts.join("\n");
        let total_chars = full_text.chars().count();
        let text: String = full_text.chars().take(self.max_chars).collect();
        let checksum = md5_hex(&text);

        tracing::debug!(
            "Extracted {} chars from {} pages of {} (checksum {})",
            text.len(),
            parts.len(),
            path.display(),
            checksum
        );

        Ok(ExtractedContent {
            text,
            checksum,
            pages: parts.len(),
            truncated: total_chars > self.max_chars,
        })
    }

    /// Tool boundary: payload on success, descriptive message on failure
    pub fn read(&self, file_path: &str) -> String {
        match self.extract(Path::new(file_path.trim())) {
            Ok(content) => content.render(),
            Err(failure) => {
                tracing::warn!("Extraction failed for '{}': {}", file_path, failure);
                failure.to_string()
            }
        }
    }
}

/// Normalize one page of raw text
pub fn normalize_page(raw: &str) -> String {
    let text = raw.replace('\0', "");
    let text = excess_newlines().replace_all(&text, "\n\n");
    let text = non_ascii_runs().replace_all(&text, " ");
    text.trim().to_string()
}

/// MD5 of text as lower-case hex
pub fn md5_hex(text: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Remove any rendered document payload from a string
pub fn strip_document_payload(text: &str) -> String {
    if !text.contains(DOCUMENT_START) {
        return text.to_string();
    }
    document_payload()
        .replace_all(text, "[document content omitted]")
        .into_owned()
}

/// Split a file into raw page texts
fn load_pages(path: &Path) -> std::result::Result<Vec<String>, ExtractionFailure> {
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExtractionFailure::NotFound(path.to_path_buf()),
        _ => ExtractionFailure::ExtractionError(e.to_string()),
    })?;

    if data.starts_with(b"%PDF") {
        return load_pdf_pages(&data);
    }

    let is_pdf_name = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if is_pdf_name {
        return Err(ExtractionFailure::ExtractionError(
            "file has a .pdf name but no PDF header".to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&data)
        .split('\x0c')
        .map(str::to_string)
        .collect())
}

#[cfg(feature = "pdf")]
fn load_pdf_pages(data: &[u8]) -> std::result::Result<Vec<String>, ExtractionFailure> {
    match lopdf::Document::load_mem(data) {
        Ok(doc) => {
            let mut pages = Vec::new();
            for page_number in doc.get_pages().keys() {
                match doc.extract_text(&[*page_number]) {
                    Ok(text) => pages.push(text),
                    Err(e) => {
                        tracing::debug!("Could not extract page {}: {}", page_number, e);
                        pages.push(String::new());
                    }
                }
            }

            if pages.iter().all(|p| p.trim().is_empty()) {
                // lopdf misses text in some font encodings
                if let Ok(text) = pdf_extract::extract_text_from_mem(data) {
                    return Ok(text.split('\x0c').map(str::to_string).collect());
                }
            }
            Ok(pages)
        }
        Err(load_err) => {
            tracing::warn!("lopdf failed to load document: {}, trying pdf-extract", load_err);
            pdf_extract::extract_text_from_mem(data)
                .map(|text| text.split('\x0c').map(str::to_string).collect())
                .map_err(|e| ExtractionFailure::ExtractionError(format!("{} ({})", e, load_err)))
        }
    }
}

#[cfg(not(feature = "pdf"))]
fn load_pdf_pages(_data: &[u8]) -> std::result::Result<Vec<String>, ExtractionFailure> {
    Err(ExtractionFailure::ExtractionError(
        "PDF support is disabled in this build".to_string(),
    ))
}

//! Document reader tool

use async_trait::async_trait;

use super::{Tool, ToolKind, UsageLimiter};
use crate::extraction::ContentExtractor;

/// Reads a source document into the checksummed payload
pub struct DocumentReaderTool {
    extractor: ContentExtractor,
    usage: UsageLimiter,
}

impl DocumentReaderTool {
    pub fn new(extractor: ContentExtractor, max_usage: u32) -> Self {
        Self {
            extractor,
            usage: UsageLimiter::new(max_usage),
        }
    }
}

#[async_trait]
impl Tool for DocumentReaderTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ReadDocument
    }

    fn description(&self) -> &'static str {
        "Reads a financial PDF document and returns its normalized text with a \
         checksum. Input: the file path."
    }

    fn usage(&self) -> &UsageLimiter {
        &self.usage
    }

    async fn run(&self, input: &str) -> String {
        let extractor = self.extractor.clone();
        let path = input.to_string();

        // PDF parsing is CPU-bound
        match tokio::task::spawn_blocking(move || extractor.read(&path)).await {
            Ok(output) => output,
            Err(e) => format!("Error: document reader task failed: {}", e),
        }
    }
}

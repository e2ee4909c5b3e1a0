// Text extraction module
// Turns uploaded file bytes into per-page plain text


use std::fmt;

use itertools::Itertools;
use lopdf::Document;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),
    #[error("Document has no pages")]
    NoPages,
}

/// Text of a single page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}

/// Extracted text of a whole document, pages in order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentText {
    /// Pages that produced any text
    pub pages: Vec<PageText>,
    /// Total number of pages in the source, including blank ones
    pub page_count: usize,
}

impl DocumentText {
    /// Single-page document, for callers that already have plain text
    #[inline]
    pub fn from_plain(text: impl Into<String>) -> Self {
        let text = normalize_whitespace(&text.into());
        let pages = if text.is_empty() {
            Vec::new()
        } else {
            vec![PageText {
                page_number: 1,
                text,
            }]
        };
        Self {
            pages,
            page_count: 1,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|page| page.text.trim().is_empty())
    }

    #[inline]
    pub fn word_count(&self) -> usize {
        self.pages
            .iter()
            .map(|page| crate::embeddings::count_words(&page.text))
            .sum()
    }
}

/// Extracts text from a file format. Implementations are blocking.
pub trait TextExtractor: Send + Sync + fmt::Debug {
    fn extract(&self, bytes: &[u8]) -> Result<DocumentText, ExtractionError>;
}

/// `lopdf` based PDF text extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    #[inline]
    fn extract(&self, bytes: &[u8]) -> Result<DocumentText, ExtractionError> {
        let doc = Document::load_mem(bytes).map_err(|e| ExtractionError::Parse(e.to_string()))?;

        // Keys are 1-based page numbers in page order
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(ExtractionError::NoPages);
        }

        let mut pages = Vec::with_capacity(page_numbers.len());
        for page_number in &page_numbers {
            let raw = match doc.extract_text(&[*page_number]) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Could not extract text from page {}: {}", page_number, e);
                    continue;
                }
            };

            let text = normalize_whitespace(&raw);
            if !text.is_empty() {
                pages.push(PageText {
                    page_number: *page_number,
                    text,
                });
            }
        }

        debug!(
            "Extracted text from {} of {} pages",
            pages.len(),
            page_numbers.len()
        );

        Ok(DocumentText {
            pages,
            page_count: page_numbers.len(),
        })
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

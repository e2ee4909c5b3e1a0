
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Configuration for content chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in words
    pub chunk_size: usize,
    /// Words shared by adjacent windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 256,
            overlap: 32,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkingError {
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    ZeroChunkSize(usize),
    #[error("Overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::ZeroChunkSize(self.chunk_size));
        }
        if self.overlap >= self.chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Distance in words between the starts of two adjacent windows
    #[inline]
    pub const fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Fixed-size word window chunker.
///
/// The configuration is validated on construction, so a `Chunker` can never
/// be asked to produce windows with a non-positive stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    config: ChunkingConfig,
}

/// One window of text borrowed from the chunker input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextWindow<'a> {
    /// Position of this window in the sequence
    pub index: usize,
    /// Original text from the first word to the last word of the window
    pub text: &'a str,
    /// Number of words in the window
    pub word_count: usize,
}

impl Chunker {
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self, ChunkingError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split `text` into overlapping windows.
    ///
    /// The returned iterator is lazy and can be cloned to restart from the
    /// current position. Whitespace-only input produces no windows.
    #[inline]
    pub fn windows<'a>(&self, text: &'a str) -> Windows<'a> {
        let words = word_spans(text);
        debug!(
            "Chunking {} words (chunk_size {}, overlap {})",
            words.len(),
            self.config.chunk_size,
            self.config.overlap
        );
        Windows {
            text,
            words,
            config: self.config,
            next_start: 0,
            index: 0,
            finished: false,
        }
    }
}

/// Iterator over the windows of one input text
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    text: &'a str,
    words: Vec<(usize, usize)>,
    config: ChunkingConfig,
    next_start: usize,
    index: usize,
    finished: bool,
}

impl<'a> Iterator for Windows<'a> {
    type Item = TextWindow<'a>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.next_start >= self.words.len() {
            return None;
        }

        let start = self.next_start;
        let end = (start + self.config.chunk_size).min(self.words.len());
        let byte_start = self.words[start].0;
        let byte_end = self.words[end - 1].1;

        let window = TextWindow {
            index: self.index,
            text: self.text.get(byte_start..byte_end).unwrap_or_default(),
            word_count: end - start,
        };

        self.index += 1;
        if end == self.words.len() {
            self.finished = true;
        } else {
            self.next_start = start + self.config.stride();
        }

        Some(window)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished || self.next_start >= self.words.len() {
            return (0, Some(0));
        }
        let remaining_words = self.words.len() - self.next_start;
        let remaining = if remaining_words <= self.config.chunk_size {
            1
        } else {
            1 + (remaining_words - self.config.chunk_size).div_ceil(self.config.stride())
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}

/// Byte ranges of the whitespace-delimited words in `text`
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut current: Option<usize> = None;

    for (offset, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(start) = current.take() {
                spans.push((start, offset));
            }
        } else if current.is_none() {
            current = Some(offset);
        }
    }

    if let Some(start) = current {
        spans.push((start, text.len()));
    }

    spans
}

/// Number of whitespace-delimited words, the unit the chunker counts in
#[inline]
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

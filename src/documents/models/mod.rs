#[cfg(test)]
mod tests;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A document uploaded during the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Session temp file holding the uploaded bytes
    pub file_path: PathBuf,
    pub file_size: u64,
    pub mime_type: String,
    pub pages: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub indexed: bool,
    pub chunk_count: Option<usize>,
}

impl Document {
    /// Case-insensitive match against filename, title and description
    #[inline]
    pub fn matches(&self, search: &str) -> bool {
        let needle = search.to_lowercase();
        let contains = |value: &str| value.to_lowercase().contains(&needle);

        contains(&self.filename)
            || self.title.as_deref().is_some_and(contains)
            || self.description.as_deref().is_some_and(contains)
    }

    #[inline]
    pub fn apply(&mut self, update: DocumentUpdate) {
        if let Some(title) = update.title {
            self.title = Some(title);
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        self.updated_at = Utc::now();
    }
}

/// Optional metadata supplied with an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DocumentMetadata {
    /// Split a comma separated tag list, dropping blanks
    #[inline]
    pub fn parse_tags(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Metadata changes. `None` fields are left as they are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Raw upload as received from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// One page of a document listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentList {
    pub documents: Vec<Document>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DocumentStats {
    pub total_documents: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub average_size_mb: f64,
}

impl DocumentStats {
    #[inline]
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let (count, total) = documents
            .into_iter()
            .fold((0_usize, 0_u64), |(count, total), doc| {
                (count + 1, total + doc.file_size)
            });

        let total_size_mb = total as f64 / BYTES_PER_MB;
        let average_size_mb = if count == 0 {
            0.0
        } else {
            total_size_mb / count as f64
        };

        Self {
            total_documents: count,
            total_size_bytes: total,
            total_size_mb,
            average_size_mb,
        }
    }
}

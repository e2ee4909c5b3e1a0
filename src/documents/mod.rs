// Documents module
// Session document table, upload validation and temp file handling

pub mod models;


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::extraction::{DocumentText, ExtractionError, TextExtractor};
use crate::indexer::{IndexManager, IndexerError};

pub use models::{
    Document, DocumentList, DocumentMetadata, DocumentStats, DocumentUpdate, Upload,
};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("File too large: {size} bytes (maximum {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("File type not allowed: {0:?}")]
    UnsupportedExtension(String),

    #[error("Content type not allowed: {0}")]
    UnsupportedContentType(String),

    #[error("Could not read text from {filename}: {source}")]
    Extraction {
        filename: String,
        #[source]
        source: ExtractionError,
    },

    #[error(transparent)]
    Indexing(#[from] IndexerError),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background worker failed: {0}")]
    Worker(String),

    #[error("Session was reset while {0} was being indexed")]
    Reset(String),
}

impl UploadError {
    /// Whether the client sent something unacceptable, as opposed to a processing failure
    #[inline]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyFile
                | Self::TooLarge { .. }
                | Self::UnsupportedExtension(_)
                | Self::UnsupportedContentType(_)
        )
    }
}

/// Documents uploaded during this session.
///
/// Nothing survives a restart: files live in a temp directory and are
/// removed on delete, reset and shutdown.
pub struct DocumentService {
    manager: Arc<IndexManager>,
    extractor: Arc<dyn TextExtractor>,
    upload: UploadConfig,
    // Creation order
    documents: RwLock<Vec<Document>>,
    // Bumped by every reset, only while holding the `documents` write lock
    generation: AtomicU64,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("extractor", &self.extractor)
            .field("upload", &self.upload)
            .finish_non_exhaustive()
    }
}

impl DocumentService {
    #[inline]
    pub fn new(
        manager: Arc<IndexManager>,
        extractor: Arc<dyn TextExtractor>,
        upload: UploadConfig,
    ) -> Self {
        Self {
            manager,
            extractor,
            upload,
            documents: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    /// Validate, store, extract and index an upload.
    ///
    /// Validation runs before any extraction or embedding. If any later step
    /// fails the temp file is removed and nothing is recorded.
    #[inline]
    pub async fn upload(
        &self,
        upload: Upload,
        metadata: DocumentMetadata,
    ) -> Result<Document, UploadError> {
        let extension = self.validate(&upload)?;
        let generation = self.generation.load(Ordering::SeqCst);

        let id = Uuid::new_v4();
        let temp_dir = self.upload.temp_dir();
        fs::create_dir_all(&temp_dir).await?;
        let file_path = temp_dir.join(format!("{}{}", id, extension));
        fs::write(&file_path, &upload.bytes).await?;

        let file_size = upload.bytes.len() as u64;
        let mime_type = upload
            .content_type
            .clone()
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        let filename = upload.filename.clone();

        let (page_count, chunk_count) = match self.index(id, upload).await {
            Ok(counts) => counts,
            Err(e) => {
                error!("Failed to upload document {}: {}", filename, e);
                remove_temp_file(&file_path).await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let document = Document {
            id,
            filename,
            title: metadata.title,
            description: metadata.description,
            tags: metadata.tags,
            file_path,
            file_size,
            mime_type,
            pages: Some(page_count),
            created_at: now,
            updated_at: now,
            indexed: true,
            chunk_count: Some(chunk_count),
        };

        let mut documents = self.documents.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            drop(documents);
            warn!("Discarding {}: session was reset during indexing", document.filename);
            self.discard(id, &document.file_path).await;
            return Err(UploadError::Reset(document.filename));
        }
        documents.push(document.clone());
        drop(documents);
        info!(
            "Document uploaded successfully: {} ({} chunks)",
            document.filename, chunk_count
        );
        Ok(document)
    }

    #[inline]
    pub async fn get(&self, id: Uuid) -> Option<Document> {
        self.documents
            .read()
            .await
            .iter()
            .find(|doc| doc.id == id)
            .cloned()
    }

    /// Page through documents in creation order, optionally filtered
    #[inline]
    pub async fn list(&self, skip: usize, limit: usize, search: Option<&str>) -> DocumentList {
        let limit = limit.max(1);
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let documents = self.documents.read().await;
        let matching: Vec<&Document> = documents
            .iter()
            .filter(|doc| search.is_none_or(|s| doc.matches(s)))
            .collect();

        DocumentList {
            total: matching.len(),
            documents: matching
                .into_iter()
                .skip(skip)
                .take(limit)
                .cloned()
                .collect(),
            page: skip / limit + 1,
            per_page: limit,
        }
    }

    #[inline]
    pub async fn update(&self, id: Uuid, update: DocumentUpdate) -> Option<Document> {
        let mut documents = self.documents.write().await;
        let document = documents.iter_mut().find(|doc| doc.id == id)?;
        document.apply(update);
        debug!("Updated metadata for document {}", id);
        Some(document.clone())
    }

    /// Remove a document from the index, the table and disk.
    ///
    /// Returns `Ok(false)` when the id is unknown. If the index rebuild fails
    /// the document is kept.
    #[inline]
    pub async fn delete(&self, id: Uuid) -> Result<bool, IndexerError> {
        let Some(document) = self.get(id).await else {
            return Ok(false);
        };

        match self.manager.remove_document(id).await {
            Ok(_) | Err(IndexerError::UnknownDocument(_)) => {}
            Err(e) => {
                error!("Failed to delete document {}: {}", id, e);
                return Err(e);
            }
        }

        self.documents.write().await.retain(|doc| doc.id != id);
        remove_temp_file(&document.file_path).await;

        info!("Document deleted: {}", document.filename);
        Ok(true)
    }

    /// Stored bytes of a document, for downloads
    #[inline]
    pub async fn read_file(&self, id: Uuid) -> std::io::Result<Option<(Document, Vec<u8>)>> {
        let Some(document) = self.get(id).await else {
            return Ok(None);
        };
        let bytes = fs::read(&document.file_path).await?;
        Ok(Some((document, bytes)))
    }

    #[inline]
    pub async fn stats(&self) -> DocumentStats {
        DocumentStats::from_documents(self.documents.read().await.iter())
    }

    #[inline]
    pub async fn count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Forget every document, delete their files and reset the index
    #[inline]
    pub async fn reset(&self) -> usize {
        // Held across the manager reset so no upload commits in between
        let mut documents = self.documents.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let removed: Vec<Document> = std::mem::take(&mut *documents);
        for document in &removed {
            remove_temp_file(&document.file_path).await;
        }
        self.manager.reset().await;
        drop(documents);

        info!("Reset completed: {} documents removed", removed.len());
        removed.len()
    }

    /// Delete the temp files of all documents, on shutdown
    #[inline]
    pub async fn cleanup_temp_files(&self) {
        let paths: Vec<PathBuf> = self
            .documents
            .read()
            .await
            .iter()
            .map(|doc| doc.file_path.clone())
            .collect();
        for path in &paths {
            remove_temp_file(path).await;
        }
        info!("Temporary files cleanup completed");
    }

    /// Check an upload and return its lowercased extension, dot included
    fn validate(&self, upload: &Upload) -> Result<String, UploadError> {
        if upload.bytes.is_empty() {
            return Err(UploadError::EmptyFile);
        }

        let size = upload.bytes.len() as u64;
        if size > self.upload.max_upload_size {
            return Err(UploadError::TooLarge {
                size,
                max: self.upload.max_upload_size,
            });
        }

        let extension = Path::new(&upload.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_lowercase()))
            .unwrap_or_default();
        let allowed = self
            .upload
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension));
        if !allowed {
            return Err(UploadError::UnsupportedExtension(extension));
        }

        if let Some(content_type) = &upload.content_type {
            if !content_type.starts_with(PDF_CONTENT_TYPE) {
                return Err(UploadError::UnsupportedContentType(content_type.clone()));
            }
        }

        Ok(extension)
    }

    /// Extract and index, returning page and chunk counts
    async fn index(&self, id: Uuid, upload: Upload) -> Result<(usize, usize), UploadError> {
        let extractor = Arc::clone(&self.extractor);
        let bytes = upload.bytes;
        let extracted: Result<DocumentText, ExtractionError> =
            tokio::task::spawn_blocking(move || extractor.extract(&bytes))
                .await
                .map_err(|e| UploadError::Worker(e.to_string()))?;
        let text = extracted.map_err(|source| UploadError::Extraction {
            filename: upload.filename.clone(),
            source,
        })?;

        debug!(
            "Extracted {} words from {} pages of {}",
            text.word_count(),
            text.page_count,
            upload.filename
        );

        self.manager.initialize().await?;
        let chunks = self
            .manager
            .add_document(id, &upload.filename, &text)
            .await?;

        Ok((text.page_count, chunks))
    }

    /// Undo an upload that lost a race with reset
    async fn discard(&self, id: Uuid, file_path: &Path) {
        match self.manager.remove_document(id).await {
            Ok(_) | Err(IndexerError::UnknownDocument(_)) => {}
            Err(e) => warn!("Failed to drop chunks of discarded document {}: {}", id, e),
        }
        remove_temp_file(file_path).await;
    }
}

async fn remove_temp_file(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed temp file: {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
    }
}

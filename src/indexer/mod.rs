// Indexer module
// Owns the session corpus, the published index and the embedder lifecycle


use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::embeddings::chunking::{Chunker, ChunkingError};
use crate::embeddings::{Embedder, EmbedderLoader, EmbeddingError};
use crate::extraction::DocumentText;
use crate::index::{Chunk, IndexError, ScoredChunk, SharedIndex, SimilarityIndex};

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Index manager is not initialized")]
    NotInitialized,

    #[error("Embedding model could not be loaded: {0}")]
    Initialization(#[source] EmbeddingError),

    #[error("Document {0} produced no text to index")]
    EmptyContent(Uuid),

    #[error("Document {0} is not indexed")]
    UnknownDocument(Uuid),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Chunking(#[from] ChunkingError),

    #[error("Background worker failed: {0}")]
    Worker(String),
}

/// Lifecycle of the embedding model behind the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerState {
    Uninitialized,
    Initializing,
    Ready,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Result of a retrieval query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Nothing has been indexed, so there is nothing to search
    NoDocuments,
    /// Hits at or above the threshold, best first. May be empty.
    Results(Vec<ScoredChunk>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ManagerStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub index_size_bytes: usize,
}

impl ManagerStats {
    #[inline]
    pub fn index_size_mb(&self) -> f64 {
        self.index_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: ManagerState,
    embedder: Option<Arc<dyn Embedder>>,
}

/// In-memory retrieval index for one session.
///
/// Every corpus mutation re-embeds the whole corpus and publishes a freshly
/// built index. Mutations are serialized by the corpus lock; queries search
/// whatever snapshot is published and never wait on a rebuild.
///
/// Lock order is corpus, then init.
pub struct IndexManager {
    chunker: Chunker,
    loader: Arc<dyn EmbedderLoader>,
    corpus: Mutex<Vec<Arc<Chunk>>>,
    index: SharedIndex,
    lifecycle: RwLock<Lifecycle>,
    init_lock: Mutex<()>,
}

impl fmt::Debug for IndexManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexManager")
            .field("chunker", &self.chunker)
            .finish_non_exhaustive()
    }
}

impl IndexManager {
    #[inline]
    pub fn new(chunker: Chunker, loader: Arc<dyn EmbedderLoader>) -> Self {
        Self {
            chunker,
            loader,
            corpus: Mutex::new(Vec::new()),
            index: SharedIndex::new(),
            lifecycle: RwLock::new(Lifecycle {
                state: ManagerState::Uninitialized,
                embedder: None,
            }),
            init_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub async fn state(&self) -> ManagerState {
        self.lifecycle.read().await.state
    }

    #[inline]
    pub async fn is_ready(&self) -> bool {
        self.state().await == ManagerState::Ready
    }

    /// Whether the published index holds any chunks
    #[inline]
    pub async fn has_documents(&self) -> bool {
        !self.index.snapshot().await.is_empty()
    }

    /// Load the embedding model if it is not loaded yet.
    ///
    /// Concurrent callers share one load. A failed load leaves the manager
    /// uninitialized so a later call can try again.
    #[inline]
    pub async fn initialize(&self) -> Result<(), IndexerError> {
        if self.embedder().await.is_some() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        if self.embedder().await.is_some() {
            return Ok(());
        }

        self.lifecycle.write().await.state = ManagerState::Initializing;
        info!("Loading embedding model");

        match self.loader.load().await {
            Ok(embedder) => {
                info!(
                    "Embedding model {} ready ({} dimensions)",
                    embedder.model_id(),
                    embedder.dimension()
                );
                let mut lifecycle = self.lifecycle.write().await;
                lifecycle.embedder = Some(embedder);
                lifecycle.state = ManagerState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("Failed to load embedding model: {}", e);
                self.lifecycle.write().await.state = ManagerState::Uninitialized;
                Err(IndexerError::Initialization(e))
            }
        }
    }

    /// Index the text of a document and return how many chunks it produced.
    ///
    /// Chunks from an earlier call with the same `document_id` are replaced.
    /// On failure neither the corpus nor the published index change.
    #[inline]
    pub async fn add_document(
        &self,
        document_id: Uuid,
        source_name: &str,
        text: &DocumentText,
    ) -> Result<usize, IndexerError> {
        if !self.is_ready().await {
            return Err(IndexerError::NotInitialized);
        }

        let new_chunks = self.chunk_document(document_id, source_name, text);
        if new_chunks.is_empty() {
            warn!("Document {} ({}) has no text to index", document_id, source_name);
            return Err(IndexerError::EmptyContent(document_id));
        }
        let added = new_chunks.len();

        let mut corpus = self.corpus.lock().await;
        // A reset may have run while waiting for the lock
        let embedder = self.embedder().await.ok_or(IndexerError::NotInitialized)?;

        let candidate: Vec<Arc<Chunk>> = corpus
            .iter()
            .filter(|chunk| chunk.document_id != document_id)
            .cloned()
            .chain(new_chunks)
            .collect();

        debug!(
            "Rebuilding index with {} chunks after adding {}",
            candidate.len(),
            source_name
        );
        let index = rebuild(embedder, candidate.clone()).await?;
        self.index.publish(index).await;
        *corpus = candidate;

        info!("Indexed {} as {} chunks", source_name, added);
        Ok(added)
    }

    /// Drop a document from the index and return how many chunks it had
    #[inline]
    pub async fn remove_document(&self, document_id: Uuid) -> Result<usize, IndexerError> {
        let mut corpus = self.corpus.lock().await;

        let (removed, remaining): (Vec<Arc<Chunk>>, Vec<Arc<Chunk>>) = corpus
            .iter()
            .cloned()
            .partition(|chunk| chunk.document_id == document_id);
        if removed.is_empty() {
            return Err(IndexerError::UnknownDocument(document_id));
        }

        if remaining.is_empty() {
            self.index.clear().await;
        } else {
            let embedder = self.embedder().await.ok_or(IndexerError::NotInitialized)?;
            let index = rebuild(embedder, remaining.clone()).await?;
            self.index.publish(index).await;
        }
        *corpus = remaining;

        info!(
            "Removed document {} ({} chunks) from the index",
            document_id,
            removed.len()
        );
        Ok(removed.len())
    }

    /// Search the published index.
    ///
    /// Results scoring below `similarity_threshold` are dropped. An empty
    /// index is reported as [`QueryOutcome::NoDocuments`] rather than an error.
    #[inline]
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<QueryOutcome, IndexerError> {
        let snapshot = self.index.snapshot().await;
        if snapshot.is_empty() {
            return Ok(QueryOutcome::NoDocuments);
        }

        let embedder = self.embedder().await.ok_or(IndexerError::NotInitialized)?;
        let query = text.to_string();

        let hits = tokio::task::spawn_blocking(move || -> Result<_, IndexerError> {
            let vector = embedder.embed(&query)?;
            Ok(snapshot.top_k(&vector, top_k)?)
        })
        .await
        .map_err(|e| IndexerError::Worker(e.to_string()))??;

        let total = hits.len();
        let hits: Vec<ScoredChunk> = hits
            .into_iter()
            .filter(|hit| hit.score >= similarity_threshold)
            .collect();
        debug!(
            "Query matched {} of {} candidates at threshold {}",
            hits.len(),
            total,
            similarity_threshold
        );

        Ok(QueryOutcome::Results(hits))
    }

    #[inline]
    pub async fn stats(&self) -> ManagerStats {
        let stats = self.index.snapshot().await.stats();
        ManagerStats {
            total_documents: stats.documents,
            total_chunks: stats.entries,
            index_size_bytes: stats.approximate_bytes,
        }
    }

    /// Forget every document and unload the embedding model.
    ///
    /// Waits for any rebuild or model load in progress.
    #[inline]
    pub async fn reset(&self) {
        let mut corpus = self.corpus.lock().await;
        let _guard = self.init_lock.lock().await;

        corpus.clear();
        self.index.clear().await;

        let mut lifecycle = self.lifecycle.write().await;
        lifecycle.embedder = None;
        lifecycle.state = ManagerState::Uninitialized;

        info!("Index manager reset");
    }

    async fn embedder(&self) -> Option<Arc<dyn Embedder>> {
        self.lifecycle.read().await.embedder.clone()
    }

    fn chunk_document(
        &self,
        document_id: Uuid,
        source_name: &str,
        text: &DocumentText,
    ) -> Vec<Arc<Chunk>> {
        let mut chunks = Vec::new();
        for page in &text.pages {
            for window in self.chunker.windows(&page.text) {
                chunks.push(Arc::new(Chunk {
                    document_id,
                    source_name: source_name.to_string(),
                    chunk_index: chunks.len(),
                    page_number: Some(page.page_number),
                    text: window.text.to_string(),
                    word_count: window.word_count,
                }));
            }
        }
        chunks
    }
}

/// Embed every chunk and build a new index on the blocking pool
async fn rebuild(
    embedder: Arc<dyn Embedder>,
    chunks: Vec<Arc<Chunk>>,
) -> Result<Arc<SimilarityIndex>, IndexerError> {
    tokio::task::spawn_blocking(move || -> Result<_, IndexerError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            }
            .into());
        }
        Ok(Arc::new(SimilarityIndex::build(chunks.into_iter().zip(vectors))?))
    })
    .await
    .map_err(|e| IndexerError::Worker(e.to_string()))?
}

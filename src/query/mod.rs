// Query module
// Request validation and answer assembly on top of the index manager


use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::RetrievalConfig;
use crate::index::ScoredChunk;
use crate::indexer::{IndexManager, IndexerError, QueryOutcome};

pub const MAX_QUERY_CHARS: usize = 1000;
pub const MAX_TOP_K: usize = 20;

const NO_DOCUMENTS_ANSWER: &str =
    "No documents have been indexed yet. Please upload some documents first.";
const NO_MATCHES_ANSWER: &str =
    "I could not find relevant information in the uploaded documents to answer your question.";
const ANSWER_HEADER: &str = "Based on the uploaded documents, here is what I found:";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query cannot be empty")]
    EmptyQuery,

    #[error("Query is too long: {0} characters (maximum 1000)")]
    QueryTooLong(usize),

    #[error("Invalid top_k: {0} (must be between 1 and 20)")]
    InvalidTopK(usize),

    #[error("Invalid similarity threshold: {0} (must be between 0.0 and 1.0)")]
    InvalidThreshold(f32),

    #[error("Retrieval service unavailable: {0}")]
    Unavailable(#[source] IndexerError),
}

impl QueryError {
    #[inline]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::Unavailable(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub top_k: usize,
    pub similarity_threshold: f32,
}

impl QueryRequest {
    /// Request using the configured retrieval defaults
    #[inline]
    pub fn new(query: impl Into<String>, defaults: &RetrievalConfig) -> Self {
        Self {
            query: query.into(),
            top_k: defaults.top_k,
            similarity_threshold: defaults.similarity_threshold,
        }
    }

    #[inline]
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let length = self.query.chars().count();
        if length > MAX_QUERY_CHARS {
            return Err(QueryError::QueryTooLong(length));
        }
        if !(1..=MAX_TOP_K).contains(&self.top_k) {
            return Err(QueryError::InvalidTopK(self.top_k));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(QueryError::InvalidThreshold(self.similarity_threshold));
        }
        Ok(())
    }
}

/// A retrieved chunk as reported to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub document_id: Uuid,
    pub document_title: String,
    pub chunk_text: String,
    pub similarity_score: f32,
    pub page_number: Option<u32>,
    pub chunk_index: usize,
}

impl From<&ScoredChunk> for SourceDocument {
    #[inline]
    fn from(hit: &ScoredChunk) -> Self {
        Self {
            document_id: hit.chunk.document_id,
            document_title: hit.chunk.source_name.clone(),
            chunk_text: hit.chunk.text.clone(),
            similarity_score: hit.score,
            page_number: hit.chunk.page_number,
            chunk_index: hit.chunk.chunk_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    /// Share of the requested `top_k` that was filled, not a calibrated probability
    pub confidence: f32,
    pub sources: Vec<SourceDocument>,
    /// Seconds
    pub processing_time: f64,
    /// Always 0, no language model is involved
    pub tokens_used: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct IndexSummary {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub index_size_mb: f64,
}

/// Answers questions from the session index
#[derive(Debug, Clone)]
pub struct QueryService {
    manager: Arc<IndexManager>,
}

impl QueryService {
    #[inline]
    pub const fn new(manager: Arc<IndexManager>) -> Self {
        Self { manager }
    }

    /// Validate and run a query.
    ///
    /// Only invalid requests and a model that cannot be loaded are errors.
    /// Any other retrieval failure is reported inside the response.
    #[inline]
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse, QueryError> {
        request.validate()?;
        let started = Instant::now();

        // An empty session needs no model to answer
        if self.manager.has_documents().await {
            self.manager
                .initialize()
                .await
                .map_err(QueryError::Unavailable)?;
        }

        let outcome = self
            .manager
            .query(&request.query, request.top_k, request.similarity_threshold)
            .await;

        let (answer, sources) = match outcome {
            Ok(QueryOutcome::NoDocuments) => (NO_DOCUMENTS_ANSWER.to_string(), Vec::new()),
            Ok(QueryOutcome::Results(hits)) => {
                let sources: Vec<SourceDocument> = hits.iter().map(SourceDocument::from).collect();
                (compose_answer(&sources), sources)
            }
            Err(IndexerError::Initialization(e)) => {
                return Err(QueryError::Unavailable(IndexerError::Initialization(e)));
            }
            Err(e) => {
                error!("Query failed: {}", e);
                (
                    format!("An error occurred while processing your query: {}", e),
                    Vec::new(),
                )
            }
        };

        let confidence = confidence(sources.len(), request.top_k);
        info!(
            "Answered query with {} sources in {:?}",
            sources.len(),
            started.elapsed()
        );

        Ok(QueryResponse {
            query: request.query,
            answer,
            confidence,
            sources,
            processing_time: started.elapsed().as_secs_f64(),
            tokens_used: 0,
        })
    }

    #[inline]
    pub async fn index_summary(&self) -> IndexSummary {
        let stats = self.manager.stats().await;
        IndexSummary {
            total_documents: stats.total_documents,
            total_chunks: stats.total_chunks,
            index_size_mb: stats.index_size_mb(),
        }
    }
}

/// Ratio of returned sources to the requested count, capped at 1
#[inline]
pub fn confidence(sources: usize, top_k: usize) -> f32 {
    if sources == 0 || top_k == 0 {
        return 0.0;
    }
    (sources as f32 / top_k as f32).min(1.0)
}

/// Concatenate the retrieved chunks into a readable answer
#[inline]
pub fn compose_answer(sources: &[SourceDocument]) -> String {
    if sources.is_empty() {
        return NO_MATCHES_ANSWER.to_string();
    }

    let blocks = sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let page = source
                .page_number
                .map_or_else(|| "N/A".to_string(), |p| p.to_string());
            format!("**Source {} (page {}):**\n{}", i + 1, page, source.chunk_text)
        })
        .join("\n\n");

    format!("{}\n\n{}", ANSWER_HEADER, blocks)
}

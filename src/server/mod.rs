// HTTP server module
// axum router over one shared application context

pub mod errors;
pub mod handlers;


use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::documents::DocumentService;
use crate::embeddings::{ConfiguredLoader, EmbedderLoader};
use crate::embeddings::chunking::Chunker;
use crate::extraction::{PdfExtractor, TextExtractor};
use crate::indexer::{IndexManager, IndexerError};
use crate::query::QueryService;

pub use errors::ApiError;

pub const APP_NAME: &str = "Local RAG";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Everything a request handler can reach. Built once per process.
#[derive(Debug)]
pub struct AppContext {
    pub config: Config,
    pub manager: Arc<IndexManager>,
    pub documents: DocumentService,
    pub queries: QueryService,
    pub started_at: DateTime<Utc>,
}

impl AppContext {
    #[inline]
    pub fn new(
        config: Config,
        loader: Arc<dyn EmbedderLoader>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Self, IndexerError> {
        let chunker = Chunker::new(config.chunking)?;
        let manager = Arc::new(IndexManager::new(chunker, loader));
        let documents =
            DocumentService::new(Arc::clone(&manager), extractor, config.upload.clone());
        let queries = QueryService::new(Arc::clone(&manager));

        Ok(Self {
            config,
            manager,
            documents,
            queries,
            started_at: Utc::now(),
        })
    }

    /// Context with the configured embedding backend and PDF extraction
    #[inline]
    pub fn from_config(config: Config) -> Result<Self, IndexerError> {
        let loader = Arc::new(ConfiguredLoader::new(config.embedding.clone()));
        Self::new(config, loader, Arc::new(PdfExtractor))
    }
}

#[inline]
pub fn router(ctx: Arc<AppContext>) -> Router {
    use handlers::{documents, health, query};

    let body_limit = usize::try_from(ctx.config.upload.max_upload_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/health/detailed", get(health::detailed))
        .route("/health/status", get(health::status))
        .route("/documents", post(documents::upload).get(documents::list))
        .route("/documents/reset", post(documents::reset))
        .route("/documents/stats/summary", get(documents::stats))
        .route(
            "/documents/:id",
            get(documents::get)
                .put(documents::update)
                .delete(documents::delete),
        )
        .route("/documents/:id/download", get(documents::download))
        .route("/query", post(query::query))
        .route("/query/stats/index", get(query::index_stats));

    Router::new()
        .route("/health", get(health::root))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(ctx)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve until Ctrl-C, then remove the session's temp files
#[inline]
pub async fn serve(ctx: Arc<AppContext>) -> Result<()> {
    let address = ctx.config.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("{} v{} listening on http://{}", APP_NAME, VERSION, address);

    axum::serve(listener, router(Arc::clone(&ctx)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down");
    ctx.documents.cleanup_temp_files().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use serde_json::json;

use crate::server::{APP_NAME, AppContext, VERSION};

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": VERSION,
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION,
        "name": APP_NAME,
    }))
}

pub async fn detailed(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let index = ctx.manager.stats().await;
    let documents = ctx.documents.stats().await;
    let state = ctx.manager.state().await;

    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION,
        "name": APP_NAME,
        "uptime_seconds": (Utc::now() - ctx.started_at).num_seconds(),
        "services": {
            "rag": {
                "status": state,
                "indexed_documents": index.total_documents,
                "total_chunks": index.total_chunks,
            },
            "documents": {
                "status": "healthy",
                "total_documents": documents.total_documents,
                "total_size_mb": documents.total_size_mb,
            },
        },
    }))
}

pub async fn status(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(json!({
        "rag_status": ctx.manager.state().await,
        "documents_count": ctx.documents.count().await,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

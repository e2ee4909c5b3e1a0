use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::documents::{DocumentMetadata, DocumentUpdate, Upload};
use crate::server::{AppContext, ApiError};

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

/// `multipart/form-data` with a `file` part and optional `title`,
/// `description` and comma separated `tags`
pub async fn upload(
    State(ctx): State<Arc<AppContext>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;
    let mut metadata = DocumentMetadata::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("unknown").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                upload = Some(Upload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "title" | "description" | "tags" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "title" => metadata.title = Some(value),
                    "description" => metadata.description = Some(value),
                    _ => metadata.tags = DocumentMetadata::parse_tags(&value),
                }
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let upload = upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    let document = ctx.documents.upload(upload, metadata).await?;

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn list(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let list = ctx
        .documents
        .list(params.skip.unwrap_or(0), limit, params.search.as_deref())
        .await;
    Json(list)
}

pub async fn reset(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let deleted = ctx.documents.reset().await;
    Json(json!({ "status": "ok", "deleted": deleted }))
}

pub async fn stats(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(ctx.documents.stats().await)
}

pub async fn get(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let document = ctx.documents.get(id).await.ok_or_else(|| not_found(id))?;
    Ok(Json(document))
}

pub async fn update(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
    Json(update): Json<DocumentUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let document = ctx
        .documents
        .update(id, update)
        .await
        .ok_or_else(|| not_found(id))?;
    Ok(Json(document))
}

pub async fn delete(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if ctx.documents.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}

pub async fn download(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let (document, bytes) = ctx
        .documents
        .read_file(id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| not_found(id))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        document.filename.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, document.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Document {} not found", id))
}

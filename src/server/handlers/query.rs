use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequest, Request, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Form, Json};
use serde::Deserialize;

use crate::config::RetrievalConfig;
use crate::query::QueryRequest;
use crate::server::{AppContext, ApiError};

/// Query fields as sent by clients. Missing knobs fall back to configuration.
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub query: String,
    pub top_k: Option<usize>,
    pub similarity_threshold: Option<f32>,
}

impl QueryParams {
    #[inline]
    pub fn into_request(self, defaults: &RetrievalConfig) -> QueryRequest {
        QueryRequest {
            query: self.query,
            top_k: self.top_k.unwrap_or(defaults.top_k),
            similarity_threshold: self
                .similarity_threshold
                .unwrap_or(defaults.similarity_threshold),
        }
    }
}

/// Accepts either a JSON body or an urlencoded form
#[derive(Debug)]
pub struct QueryInput(pub QueryParams);

#[async_trait]
impl<S> FromRequest<S> for QueryInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(params) = Json::<QueryParams>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(Self(params))
        } else {
            let Form(params) = Form::<QueryParams>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            Ok(Self(params))
        }
    }
}

pub async fn query(
    State(ctx): State<Arc<AppContext>>,
    QueryInput(params): QueryInput,
) -> Result<impl IntoResponse, ApiError> {
    let request = params.into_request(&ctx.config.retrieval);
    let response = ctx.queries.query(request).await?;
    Ok(Json(response))
}

pub async fn index_stats(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(ctx.queries.index_summary().await)
}

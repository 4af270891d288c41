use std::str::FromStr;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use common::storage::types::document::Category;
use document_store::{IngestOutcome, NewDocument};
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError, middleware_api_auth::AuthContext};

#[derive(Debug, Deserialize)]
pub struct IngestParams {
    pub title: String,
    pub content: String,
    pub category: String,
}

pub async fn ingest_document(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<IngestParams>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .rate_limiter
        .admit(&auth.tenant_id, "ingest")
        .await?
        .require_allowed()?;

    info!(
        tenant_id = %auth.tenant_id,
        user_id = %auth.user_id,
        title_bytes = input.title.len(),
        content_bytes = input.content.len(),
        "Received ingestion request"
    );

    let category = Category::from_str(&input.category)?;
    let outcome = state
        .documents
        .ingest(NewDocument {
            tenant_id: auth.tenant_id,
            title: input.title,
            content: input.content,
            category,
            created_by: auth.user_id,
        })
        .await?;

    let status = match &outcome {
        IngestOutcome::Created { .. } => StatusCode::CREATED,
        IngestOutcome::Duplicate { .. } => StatusCode::OK,
    };

    Ok((status, Json(outcome)))
}

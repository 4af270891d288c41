use std::str::FromStr;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use common::storage::types::{
    document::Category,
    document_version::ChangeType,
};
use document_store::DocumentUpdate;
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError, middleware_api_auth::AuthContext};

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub change_summary: Option<String>,
    pub change_type: Option<String>,
}

pub async fn update_document(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(document_id): Path<String>,
    Json(input): Json<UpdateParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = input
        .category
        .as_deref()
        .map(Category::from_str)
        .transpose()?;
    let change_type = input
        .change_type
        .as_deref()
        .map(ChangeType::from_str)
        .transpose()?
        .unwrap_or_default();

    let outcome = state
        .documents
        .update(
            &document_id,
            &auth.tenant_id,
            DocumentUpdate {
                title: input.title,
                content: input.content,
                category,
                change_summary: input.change_summary,
                change_type,
            },
            &auth.user_id,
        )
        .await?;

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct RollbackParams {
    pub target_version: i64,
}

pub async fn rollback_document(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(document_id): Path<String>,
    Json(input): Json<RollbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .documents
        .rollback(
            &document_id,
            &auth.tenant_id,
            input.target_version,
            &auth.user_id,
        )
        .await?;

    Ok(Json(outcome))
}

pub async fn list_versions(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let versions = state
        .documents
        .list_versions(&document_id, &auth.tenant_id)
        .await?;

    Ok(Json(versions))
}

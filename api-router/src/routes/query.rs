use std::str::FromStr;

use axum::{extract::State, response::IntoResponse, Extension, Json};
use common::storage::types::document::Category;
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError, middleware_api_auth::AuthContext};

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub question: String,
    pub session_id: Option<String>,
    pub category: Option<String>,
}

pub async fn query_documents(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Json(input): Json<QueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .rate_limiter
        .admit(&auth.tenant_id, "query")
        .await?
        .require_allowed()?;

    let category = input
        .category
        .as_deref()
        .map(Category::from_str)
        .transpose()?;

    let response = state
        .answers
        .answer(
            &auth.tenant_id,
            &auth.user_id,
            &input.question,
            input.session_id,
            category,
        )
        .await?;

    Ok(Json(response))
}

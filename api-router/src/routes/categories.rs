use axum::{response::IntoResponse, Json};
use common::storage::types::document::Category;
use serde_json::json;

/// The closed set of document categories accepted by ingestion.
pub async fn get_categories() -> impl IntoResponse {
    Json(json!({ "categories": Category::variants() }))
}

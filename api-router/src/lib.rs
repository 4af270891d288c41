use api_state::ApiState;
use axum::{
    extract::FromRef,
    middleware::from_fn,
    routing::{get, patch, post},
    Router,
};
use middleware_api_auth::api_auth;
use routes::{
    categories::get_categories,
    documents::{list_versions, rollback_document, update_document},
    ingest::ingest_document,
    liveness::live,
    query::query_documents,
    readiness::ready,
};
use tower_http::trace::TraceLayer;

pub mod api_state;
pub mod error;
pub mod middleware_api_auth;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(_app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd probes)
    let public = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    // Protected API endpoints; the upstream gateway supplies the
    // authenticated tenant and user.
    let protected = Router::new()
        .route("/ingest", post(ingest_document))
        .route("/documents/{id}", patch(update_document))
        .route("/documents/{id}/rollback", post(rollback_document))
        .route("/documents/{id}/versions", get(list_versions))
        .route("/query", post(query_documents))
        .route("/categories", get(get_categories))
        .route_layer(from_fn(api_auth));

    public.merge(protected).layer(TraceLayer::new_for_http())
}

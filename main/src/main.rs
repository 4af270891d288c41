use std::sync::Arc;

use answer_pipeline::{generation::GenerationProvider, AnswerPipeline};
use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::{
    storage::db::SurrealDbClient,
    utils::{
        config::get_config,
        embedding::{Embedder, EmbeddingProvider},
    },
};
use document_store::DocumentStore;
use rate_limiter::{RateLimitConfig, RateLimiter};
use retrieval_pipeline::{reranking::RerankerPool, RetrievalOptions};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Create embedding provider based on config
    let embedding_provider = Arc::new(
        EmbeddingProvider::from_config(&config, Some(Arc::clone(&openai_client))).await?,
    );
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    // Ensure tables and indexes match the provider's dimensions
    db.ensure_initialized(embedding_provider.dimension()).await?;

    let embedder: Arc<dyn Embedder> = embedding_provider;
    let reranker_pool = RerankerPool::maybe_from_config(&config)?;
    let generation = Arc::new(GenerationProvider::from_config(
        &config,
        Some(Arc::clone(&openai_client)),
    )?);
    info!(
        generation_backend = generation.backend_label(),
        reranking_enabled = reranker_pool.is_some(),
        "Answer providers initialized"
    );

    let documents = Arc::new(DocumentStore::new(Arc::clone(&db), Arc::clone(&embedder)));
    let rate_limiter = Arc::new(RateLimiter::new(
        Arc::clone(&db),
        RateLimitConfig::from_app_config(&config),
    ));
    let answers = Arc::new(AnswerPipeline::new(
        Arc::clone(&db),
        embedder,
        reranker_pool,
        generation,
        RetrievalOptions::from_config(&config),
    ));

    // Opportunistic cleanup; current-window counting never depends on it.
    let purge_limiter = Arc::clone(&rate_limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = purge_limiter.purge_stale().await {
                tracing::warn!("Failed to purge stale rate limit windows: {e}");
            }
        }
    });

    let api_state = ApiState::new(db, config.clone(), documents, rate_limiter, answers);

    // Create Axum router
    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(AppState { api_state });

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}

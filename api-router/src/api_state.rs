use std::sync::Arc;

use answer_pipeline::AnswerPipeline;
use common::{storage::db::SurrealDbClient, utils::config::AppConfig};
use document_store::DocumentStore;
use rate_limiter::RateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub documents: Arc<DocumentStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub answers: Arc<AnswerPipeline>,
}

impl ApiState {
    pub fn new(
        db: Arc<SurrealDbClient>,
        config: AppConfig,
        documents: Arc<DocumentStore>,
        rate_limiter: Arc<RateLimiter>,
        answers: Arc<AnswerPipeline>,
    ) -> Self {
        Self {
            db,
            config,
            documents,
            rate_limiter,
            answers,
        }
    }
}

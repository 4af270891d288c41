pub mod generation;
pub mod prompt;

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            conversation::Conversation,
            document::Category,
            message::{Message, MessageRole, SourceRef},
        },
    },
    utils::embedding::Embedder,
};
use generation::GenerationProvider;
use retrieval_pipeline::{
    reranking::RerankerPool, retrieve, RetrievalOptions, RetrievedDocument,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::prompt::DEFAULT_ANSWER_SYSTEM_PROMPT;

/// Fixed reply when retrieval produced nothing to ground an answer in.
pub const NO_RELEVANT_INFORMATION: &str =
    "I could not find any relevant information in your documents to answer this question.";

const CONVERSATION_TITLE_MAX_CHARS: usize = 80;

/// One answered turn, ready to cross the API boundary.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
    pub session_id: String,
}

/// Orchestrates retrieve -> synthesize -> log for one tenant question.
pub struct AnswerPipeline {
    db: Arc<SurrealDbClient>,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<RerankerPool>>,
    generation: Arc<GenerationProvider>,
    retrieval: RetrievalOptions,
}

impl AnswerPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<RerankerPool>>,
        generation: Arc<GenerationProvider>,
        retrieval: RetrievalOptions,
    ) -> Self {
        Self {
            db,
            embedder,
            reranker,
            generation,
            retrieval,
        }
    }

    /// Answer a question from the tenant's own documents.
    ///
    /// Without candidates the fixed no-information reply is returned at
    /// confidence zero; content is never invented. Both turns of the
    /// exchange are appended to the conversation log.
    #[instrument(skip_all, fields(%tenant_id, %user_id))]
    pub async fn answer(
        &self,
        tenant_id: &str,
        user_id: &str,
        query_text: &str,
        session_id: Option<String>,
        category: Option<Category>,
    ) -> Result<AnswerResponse, AppError> {
        if query_text.trim().is_empty() {
            return Err(AppError::Validation("query text is required".to_string()));
        }

        // Resolve the session before paying for any model call, so a bad
        // session id fails fast.
        let conversation = match session_id {
            Some(id) => Conversation::get_scoped(&id, tenant_id, &self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?,
            None => {
                let conversation = Conversation::new(
                    tenant_id.to_string(),
                    user_id.to_string(),
                    conversation_title(query_text),
                );
                self.db
                    .store_item(conversation)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError("failed to create conversation".to_string())
                    })?
            }
        };

        let lease = match &self.reranker {
            Some(pool) => Some(pool.checkout().await),
            None => None,
        };

        let candidates = retrieve(
            &self.db,
            &self.embedder,
            lease,
            tenant_id,
            query_text,
            self.retrieval.clone().with_category(category),
        )
        .await?;

        let (answer, confidence) = if candidates.is_empty() {
            info!("No candidates survived retrieval; returning the no-information reply");
            (NO_RELEVANT_INFORMATION.to_string(), 0.0)
        } else {
            let generated = self
                .generation
                .synthesize(query_text, &candidates, DEFAULT_ANSWER_SYSTEM_PROMPT)
                .await?;
            let confidence =
                blend_confidence(retrieval_confidence(&candidates), generated.self_confidence);
            (generated.answer, confidence)
        };

        let sources: Vec<SourceRef> = candidates
            .iter()
            .map(|entry| SourceRef {
                document_id: entry.document.id.clone(),
                title: entry.document.title.clone(),
                category: entry.document.category,
                score: entry.score,
            })
            .collect();

        self.log_turn(&conversation.id, user_id, query_text, &answer, &sources)
            .await?;

        Ok(AnswerResponse {
            answer,
            sources,
            confidence,
            session_id: conversation.id,
        })
    }

    async fn log_turn(
        &self,
        conversation_id: &str,
        user_id: &str,
        query_text: &str,
        answer: &str,
        sources: &[SourceRef],
    ) -> Result<(), AppError> {
        let user_turn = Message::new(
            conversation_id.to_string(),
            MessageRole::User,
            query_text.to_string(),
            None,
            Some(user_id.to_string()),
        );
        self.db.store_item(user_turn).await?;

        let assistant_turn = Message::new(
            conversation_id.to_string(),
            MessageRole::Assistant,
            answer.to_string(),
            Some(sources.to_vec()),
            None,
        );
        self.db.store_item(assistant_turn).await?;

        Ok(())
    }
}

/// Confidence carried by the retrieval scores alone: mostly the best
/// candidate, tempered by how the rest of the set scored.
fn retrieval_confidence(candidates: &[RetrievedDocument]) -> f32 {
    if candidates.is_empty() {
        return 0.0;
    }

    let top = candidates.iter().map(|c| c.score).fold(0.0f32, f32::max);
    let mean = candidates.iter().map(|c| c.score).sum::<f32>() / candidates.len() as f32;

    (0.7 * top + 0.3 * mean).clamp(0.0, 1.0)
}

fn blend_confidence(retrieval: f32, self_reported: Option<f32>) -> f32 {
    match self_reported {
        Some(own) => ((retrieval + own.clamp(0.0, 1.0)) / 2.0).clamp(0.0, 1.0),
        None => retrieval,
    }
}

fn conversation_title(query_text: &str) -> String {
    let trimmed = query_text.trim();
    if trimmed.chars().count() <= CONVERSATION_TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    trimmed
        .chars()
        .take(CONVERSATION_TITLE_MAX_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use common::{
        storage::types::document::Document,
        utils::embedding::EmbeddingProvider,
    };
    use uuid::Uuid;

    use super::*;

    fn candidate(id: &str, score: f32) -> RetrievedDocument {
        let mut document = Document::new(
            "tenant_a".to_string(),
            "Title".to_string(),
            "Content.".to_string(),
            Category::Other,
            "fp".to_string(),
            None,
            "user_1".to_string(),
        );
        document.id = id.to_string();
        RetrievedDocument {
            document,
            similarity: score,
            rerank_score: Some(score),
            score,
        }
    }

    async fn setup_pipeline() -> AnswerPipeline {
        let namespace = "test_ns";
        let database = &Uuid::new_v4().to_string();
        let db = Arc::new(
            SurrealDbClient::memory(namespace, database)
                .await
                .expect("Failed to start in-memory surrealdb"),
        );
        db.ensure_initialized(16)
            .await
            .expect("Failed to initialize schema");

        AnswerPipeline::new(
            db,
            Arc::new(EmbeddingProvider::new_hashed(16)),
            Some(RerankerPool::new_lexical(1).expect("pool init failed")),
            Arc::new(GenerationProvider::new_extractive(2)),
            RetrievalOptions::default(),
        )
    }

    #[test]
    fn test_retrieval_confidence_blends_top_and_mean() {
        let candidates = vec![candidate("a", 1.0), candidate("b", 0.5)];
        let confidence = retrieval_confidence(&candidates);
        // 0.7 * 1.0 + 0.3 * 0.75
        assert!((confidence - 0.925).abs() < 1e-6);

        assert!((retrieval_confidence(&[]) - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_blend_confidence_averages_self_report() {
        assert!((blend_confidence(0.8, Some(0.4)) - 0.6).abs() < 1e-6);
        assert!((blend_confidence(0.8, None) - 0.8).abs() < 1e-6);
        assert!((blend_confidence(0.8, Some(7.0)) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_conversation_title_truncates_long_questions() {
        let short = conversation_title("when does my insurance expire?");
        assert_eq!(short, "when does my insurance expire?");

        let long = conversation_title(&"x".repeat(200));
        assert_eq!(long.chars().count(), 80);
    }

    #[tokio::test]
    async fn test_answer_with_no_documents_reports_no_information() {
        let pipeline = setup_pipeline().await;

        let response = pipeline
            .answer("tenant_a", "user_1", "when does my insurance expire?", None, None)
            .await
            .expect("answer failed");

        assert_eq!(response.answer, NO_RELEVANT_INFORMATION);
        assert!((response.confidence - 0.0).abs() < f32::EPSILON);
        assert!(response.sources.is_empty());

        // The turn is still logged under the fresh session.
        let (_, messages) = Conversation::get_complete_conversation(
            &response.session_id,
            "tenant_a",
            &pipeline.db,
        )
        .await
        .expect("conversation missing");
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_answer_rejects_empty_query() {
        let pipeline = setup_pipeline().await;

        assert!(matches!(
            pipeline.answer("tenant_a", "user_1", "   ", None, None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_answer_rejects_foreign_session() {
        let pipeline = setup_pipeline().await;

        let foreign = Conversation::new(
            "tenant_b".to_string(),
            "user_9".to_string(),
            "Someone else's chat".to_string(),
        );
        let foreign_id = foreign.id.clone();
        pipeline
            .db
            .store_item(foreign)
            .await
            .expect("Failed to store conversation");

        let result = pipeline
            .answer(
                "tenant_a",
                "user_1",
                "what is in this conversation?",
                Some(foreign_id),
                None,
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}

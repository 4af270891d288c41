pub mod reranking;
pub mod scoring;

use std::sync::Arc;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::document::{Category, Document},
    },
    utils::{
        config::AppConfig,
        embedding::{Embedder, EmbeddingMode},
    },
};
use reranking::RerankerLease;
use tracing::instrument;

use crate::scoring::{cosine_similarity, sort_by_score_desc};

/// Tuning for one retrieval run.
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Candidates taken from the vector index before reranking.
    pub top_k_search: usize,
    /// Candidates kept after reranking.
    pub top_k_final: usize,
    pub category: Option<Category>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k_search: 10,
            top_k_final: 3,
            category: None,
        }
    }
}

impl RetrievalOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k_search: config.retrieval_top_k_search.max(1),
            top_k_final: config.retrieval_top_k_final.max(1),
            category: None,
        }
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }
}

/// Final candidate representation returned to callers.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub document: Document,
    /// 1 - cosine distance against the query embedding.
    pub similarity: f32,
    pub rerank_score: Option<f32>,
    /// Score the final ordering used: rerank score when a reranker ran,
    /// vector similarity otherwise.
    pub score: f32,
}

/// Embed the query, search the tenant's indexed documents, rerank, and
/// keep the best few. An empty result is a normal outcome.
#[instrument(skip_all, fields(%tenant_id))]
pub async fn retrieve(
    db: &SurrealDbClient,
    embedder: &Arc<dyn Embedder>,
    reranker: Option<RerankerLease>,
    tenant_id: &str,
    query_text: &str,
    options: RetrievalOptions,
) -> Result<Vec<RetrievedDocument>, AppError> {
    if tenant_id.trim().is_empty() {
        return Err(AppError::Validation("tenant id is required".to_string()));
    }
    if query_text.trim().is_empty() {
        return Err(AppError::Validation("query text is required".to_string()));
    }

    let query_embedding = embedder.embed(query_text, EmbeddingMode::Query).await?;

    let documents = Document::vector_search(
        tenant_id,
        query_embedding.clone(),
        options.top_k_search.max(1),
        options.category,
        db,
    )
    .await?;

    let mut candidates: Vec<RetrievedDocument> = documents
        .into_iter()
        .map(|document| {
            let similarity = document
                .embedding
                .as_deref()
                .map(|embedding| cosine_similarity(&query_embedding, embedding))
                .unwrap_or(0.0);
            RetrievedDocument {
                document,
                similarity,
                rerank_score: None,
                score: similarity,
            }
        })
        .collect();
    sort_by_score_desc(&mut candidates, |c| c.score, |c| c.document.id.clone());

    if candidates.is_empty() {
        return Ok(candidates);
    }

    if let Some(lease) = reranker {
        let texts: Vec<String> = candidates
            .iter()
            .map(|c| format!("{}\n{}", c.document.title, c.document.content))
            .collect();
        let scores = lease.rerank(query_text, texts).await?;
        for entry in scores {
            if let Some(candidate) = candidates.get_mut(entry.index) {
                candidate.rerank_score = Some(entry.score);
                candidate.score = entry.score;
            }
        }
        sort_by_score_desc(&mut candidates, |c| c.score, |c| c.document.id.clone());
    }

    candidates.truncate(options.top_k_final.max(1));

    Ok(candidates)
}

use std::{str::FromStr, sync::Arc};

use anyhow::anyhow;
use async_openai::Client;
use common::{error::AppError, utils::config::AppConfig};
use retrieval_pipeline::{reranking::lexical_overlap, RetrievedDocument};
use tracing::debug;

use crate::prompt::{create_chat_request, create_user_message, documents_to_context, process_llm_response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationBackend {
    OpenAI,
    Extractive,
}

impl FromStr for GenerationBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "extractive" => Ok(Self::Extractive),
            other => Err(anyhow!(
                "unknown generation backend '{other}'. Expected 'openai' or 'extractive'."
            )),
        }
    }
}

/// Synthesized answer plus the model's own support estimate, when the
/// backend reports one.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub self_confidence: Option<f32>,
}

#[derive(Clone)]
pub struct GenerationProvider {
    inner: GenerationInner,
}

#[derive(Clone)]
enum GenerationInner {
    OpenAI {
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
    },
    /// Deterministic sentence extraction; serves tests and keyless
    /// deployments.
    Extractive {
        max_sentences: usize,
    },
}

impl GenerationProvider {
    pub fn new_openai(
        client: Arc<Client<async_openai::config::OpenAIConfig>>,
        model: String,
    ) -> Self {
        Self {
            inner: GenerationInner::OpenAI { client, model },
        }
    }

    pub fn new_extractive(max_sentences: usize) -> Self {
        Self {
            inner: GenerationInner::Extractive {
                max_sentences: max_sentences.max(1),
            },
        }
    }

    pub fn from_config(
        config: &AppConfig,
        openai_client: Option<Arc<Client<async_openai::config::OpenAIConfig>>>,
    ) -> Result<Self, AppError> {
        match GenerationBackend::from_str(&config.generation_backend).map_err(AppError::Anyhow)? {
            GenerationBackend::Extractive => Ok(Self::new_extractive(2)),
            GenerationBackend::OpenAI => {
                let client = openai_client.ok_or_else(|| {
                    AppError::Validation(
                        "openai generation backend requires an API client".to_string(),
                    )
                })?;
                Ok(Self::new_openai(client, config.generation_model.clone()))
            }
        }
    }

    pub fn backend_label(&self) -> &'static str {
        match self.inner {
            GenerationInner::OpenAI { .. } => "openai",
            GenerationInner::Extractive { .. } => "extractive",
        }
    }

    /// Synthesize an answer grounded in the supplied candidates. The
    /// caller guarantees `documents` is non-empty.
    pub async fn synthesize(
        &self,
        query: &str,
        documents: &[RetrievedDocument],
        system_prompt: &str,
    ) -> Result<GeneratedAnswer, AppError> {
        match &self.inner {
            GenerationInner::Extractive { max_sentences } => {
                Ok(extractive_answer(query, documents, *max_sentences))
            }
            GenerationInner::OpenAI { client, model } => {
                let context = documents_to_context(documents);
                let user_message = create_user_message(&context, query);
                let request = create_chat_request(user_message, model, system_prompt)?;

                let response = client.chat().create(request).await?;
                let parsed = process_llm_response(response)?;

                debug!(
                    model,
                    self_confidence = ?parsed.confidence,
                    "Generation backend returned an answer"
                );

                Ok(GeneratedAnswer {
                    answer: parsed.answer,
                    self_confidence: parsed.confidence.map(|c| c.clamp(0.0, 1.0)),
                })
            }
        }
    }
}

/// Pick the sentences that overlap the question best, in candidate
/// order, and join them into a short grounded answer.
fn extractive_answer(
    query: &str,
    documents: &[RetrievedDocument],
    max_sentences: usize,
) -> GeneratedAnswer {
    let mut scored: Vec<(f32, usize, usize, String)> = Vec::new();

    for (doc_index, entry) in documents.iter().enumerate() {
        for (sentence_index, sentence) in split_sentences(&entry.document.content)
            .into_iter()
            .enumerate()
        {
            let overlap = lexical_overlap(query, &sentence);
            if overlap > 0.0 {
                scored.push((overlap, doc_index, sentence_index, sentence));
            }
        }
    }

    if scored.is_empty() {
        // Nothing overlaps the question; fall back to the opening of the
        // best-ranked document.
        let fallback = documents
            .first()
            .and_then(|entry| split_sentences(&entry.document.content).into_iter().next())
            .unwrap_or_default();
        return GeneratedAnswer {
            answer: fallback,
            self_confidence: None,
        };
    }

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    scored.truncate(max_sentences);
    // Re-emit in reading order so the answer stays coherent.
    scored.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.2.cmp(&b.2)));

    GeneratedAnswer {
        answer: scored
            .into_iter()
            .map(|(_, _, _, sentence)| sentence)
            .collect::<Vec<_>>()
            .join(" "),
        self_confidence: None,
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use common::storage::types::document::{Category, Document};

    use super::*;

    fn retrieved(title: &str, content: &str, score: f32) -> RetrievedDocument {
        RetrievedDocument {
            document: Document::new(
                "tenant_a".to_string(),
                title.to_string(),
                content.to_string(),
                Category::Insurance,
                "fp".to_string(),
                None,
                "user_1".to_string(),
            ),
            similarity: score,
            rerank_score: Some(score),
            score,
        }
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!(
            GenerationBackend::from_str("openai").expect("parse failed"),
            GenerationBackend::OpenAI
        );
        assert_eq!(
            GenerationBackend::from_str("Extractive").expect("parse failed"),
            GenerationBackend::Extractive
        );
        assert!(GenerationBackend::from_str("markov").is_err());
    }

    #[test]
    fn test_split_sentences_keeps_punctuation() {
        let sentences = split_sentences(
            "Auto insurance policy. Expiration Date: December 31, 2024. Premium is paid monthly.",
        );
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences.get(1).map(String::as_str), Some("Expiration Date: December 31, 2024."));
    }

    #[tokio::test]
    async fn test_extractive_answer_surfaces_the_relevant_sentence() {
        let provider = GenerationProvider::new_extractive(2);
        let documents = vec![retrieved(
            "Auto Insurance Policy FAM-2024-001",
            "Auto insurance policy for the family cars. Expiration Date: December 31, 2024. \
             Premium is paid monthly.",
            0.9,
        )];

        let generated = provider
            .synthesize("when does my auto insurance expire?", &documents, "")
            .await
            .expect("synthesis failed");

        assert!(generated.answer.contains("December 31, 2024"));
        assert!(generated.self_confidence.is_none());
    }

    #[tokio::test]
    async fn test_extractive_answer_falls_back_to_top_document() {
        let provider = GenerationProvider::new_extractive(2);
        let documents = vec![retrieved(
            "Vaccination record",
            "Measles vaccination completed in 2019.",
            0.4,
        )];

        let generated = provider
            .synthesize("zzz qqq", &documents, "")
            .await
            .expect("synthesis failed");

        assert_eq!(generated.answer, "Measles vaccination completed in 2019.");
    }
}

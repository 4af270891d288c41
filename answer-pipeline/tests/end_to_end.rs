use std::sync::Arc;

use answer_pipeline::{
    generation::GenerationProvider, AnswerPipeline, NO_RELEVANT_INFORMATION,
};
use common::{
    storage::{db::SurrealDbClient, types::document::Category},
    utils::embedding::{Embedder, EmbeddingProvider},
};
use document_store::{DocumentStore, DocumentUpdate, IngestOutcome, NewDocument, UpdateOutcome};
use retrieval_pipeline::{reranking::RerankerPool, RetrievalOptions};
use uuid::Uuid;

const DIM: usize = 32;

struct Harness {
    store: DocumentStore,
    pipeline: AnswerPipeline,
}

async fn setup() -> Harness {
    let namespace = "test_ns";
    let database = &Uuid::new_v4().to_string();
    let db = Arc::new(
        SurrealDbClient::memory(namespace, database)
            .await
            .expect("Failed to start in-memory surrealdb"),
    );
    db.ensure_initialized(DIM)
        .await
        .expect("Failed to initialize schema");

    let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingProvider::new_hashed(DIM));
    let store = DocumentStore::new(Arc::clone(&db), Arc::clone(&embedder));
    let pipeline = AnswerPipeline::new(
        db,
        embedder,
        Some(RerankerPool::new_lexical(1).expect("pool init failed")),
        Arc::new(GenerationProvider::new_extractive(2)),
        RetrievalOptions::default(),
    );

    Harness { store, pipeline }
}

fn insurance_policy(tenant_id: &str) -> NewDocument {
    NewDocument {
        tenant_id: tenant_id.to_string(),
        title: "Auto Insurance Policy FAM-2024-001".to_string(),
        content: "Auto insurance policy covering the family cars. \
                  Expiration Date: December 31, 2024. Premium is paid monthly."
            .to_string(),
        category: Category::Insurance,
        created_by: "user_1".to_string(),
    }
}

#[tokio::test]
async fn ingested_policy_answers_expiration_question_with_citation() {
    let harness = setup().await;

    let document = match harness
        .store
        .ingest(insurance_policy("tenant_a"))
        .await
        .expect("ingest failed")
    {
        IngestOutcome::Created { document } => document,
        IngestOutcome::Duplicate { .. } => panic!("Expected a created document"),
    };

    let response = harness
        .pipeline
        .answer(
            "tenant_a",
            "user_1",
            "when does my auto insurance expire?",
            None,
            None,
        )
        .await
        .expect("answer failed");

    assert!(
        response.answer.contains("December 31, 2024"),
        "answer should reference the expiration date, got: {}",
        response.answer
    );
    assert!(response.confidence > 0.0);
    assert!(
        response
            .sources
            .iter()
            .any(|source| source.document_id == document.id),
        "the policy document should be cited"
    );
    assert!(!response.session_id.is_empty());
}

#[tokio::test]
async fn tenant_with_no_documents_gets_explicit_no_information_answer() {
    let harness = setup().await;

    let response = harness
        .pipeline
        .answer(
            "tenant_empty",
            "user_1",
            "when does my auto insurance expire?",
            None,
            None,
        )
        .await
        .expect("answer failed");

    assert_eq!(response.answer, NO_RELEVANT_INFORMATION);
    assert!((response.confidence - 0.0).abs() < f32::EPSILON);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn other_tenants_documents_are_invisible_to_queries() {
    let harness = setup().await;

    harness
        .store
        .ingest(insurance_policy("tenant_b"))
        .await
        .expect("ingest failed");

    let response = harness
        .pipeline
        .answer(
            "tenant_a",
            "user_1",
            "when does my auto insurance expire?",
            None,
            None,
        )
        .await
        .expect("answer failed");

    assert_eq!(response.answer, NO_RELEVANT_INFORMATION);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn update_with_identical_content_reports_unchanged() {
    let harness = setup().await;

    let document = match harness
        .store
        .ingest(insurance_policy("tenant_a"))
        .await
        .expect("ingest failed")
    {
        IngestOutcome::Created { document } => document,
        IngestOutcome::Duplicate { .. } => panic!("Expected a created document"),
    };

    let outcome = harness
        .store
        .update(
            &document.id,
            "tenant_a",
            DocumentUpdate {
                content: Some(document.content.clone()),
                ..DocumentUpdate::default()
            },
            "user_1",
        )
        .await
        .expect("update failed");

    assert_eq!(outcome, UpdateOutcome::Unchanged { current_version: 1 });

    let live = harness
        .store
        .get(&document.id, "tenant_a")
        .await
        .expect("get failed");
    assert_eq!(live.version_count, 1);
}

#[tokio::test]
async fn follow_up_question_reuses_the_session() {
    let harness = setup().await;

    harness
        .store
        .ingest(insurance_policy("tenant_a"))
        .await
        .expect("ingest failed");

    let first = harness
        .pipeline
        .answer(
            "tenant_a",
            "user_1",
            "when does my auto insurance expire?",
            None,
            None,
        )
        .await
        .expect("answer failed");

    let second = harness
        .pipeline
        .answer(
            "tenant_a",
            "user_1",
            "how is the premium paid?",
            Some(first.session_id.clone()),
            None,
        )
        .await
        .expect("answer failed");

    assert_eq!(first.session_id, second.session_id);
}

use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        ResponseFormat, ResponseFormatJsonSchema,
    },
};
use common::error::AppError;
use retrieval_pipeline::RetrievedDocument;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_ANSWER_SYSTEM_PROMPT: &str = "\
You answer questions strictly from the document excerpts supplied in the \
user message. Every claim in your answer must be supported by one of the \
excerpts; when the excerpts do not contain the answer, say so instead of \
guessing. List the ids of the documents you relied on in `references`, and \
report in `confidence` (0 to 1) how well the excerpts support your answer.";

#[derive(Debug, Deserialize)]
pub struct Reference {
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct LLMResponseFormat {
    pub answer: String,
    pub confidence: Option<f32>,
    #[allow(dead_code)]
    pub references: Vec<Reference>,
}

/// Convert retrieval results to JSON context for the generation call.
pub fn documents_to_context(documents: &[RetrievedDocument]) -> Value {
    fn round_score(value: f32) -> f64 {
        (f64::from(value) * 1000.0).round() / 1000.0
    }

    serde_json::json!(documents
        .iter()
        .map(|entry| {
            serde_json::json!({
                "id": entry.document.id,
                "title": entry.document.title,
                "category": entry.document.category.to_string(),
                "content": entry.document.content,
                "score": round_score(entry.score),
            })
        })
        .collect::<Vec<_>>())
}

pub fn create_user_message(context_json: &Value, query: &str) -> String {
    format!(
        r"
        Context Information:
        ==================
        {context_json}

        User Question:
        ==================
        {query}
        "
    )
}

pub fn create_chat_request(
    user_message: String,
    model: &str,
    system_prompt: &str,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let response_format = ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: Some("Grounded question answering".into()),
            name: "grounded_answer_with_citations".into(),
            schema: Some(get_answer_response_schema()),
            strict: Some(true),
        },
    };

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessage::from(system_prompt.to_string()).into(),
            ChatCompletionRequestUserMessage::from(user_message).into(),
        ])
        .response_format(response_format)
        .build()
}

fn get_answer_response_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "answer": {
                "type": "string",
                "description": "The grounded answer to the user question"
            },
            "confidence": {
                "type": "number",
                "description": "Self-assessed support for the answer, 0 to 1"
            },
            "references": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "reference": {
                            "type": "string",
                            "description": "Id of a document the answer relied on"
                        }
                    },
                    "required": ["reference"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["answer", "confidence", "references"],
        "additionalProperties": false
    })
}

pub fn process_llm_response(
    response: CreateChatCompletionResponse,
) -> Result<LLMResponseFormat, AppError> {
    response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_ref())
        .ok_or(AppError::LLMParsing(
            "No content found in LLM response".into(),
        ))
        .and_then(|content| {
            serde_json::from_str::<LLMResponseFormat>(content).map_err(|e| {
                AppError::LLMParsing(format!("Failed to parse LLM response into an answer: {e}"))
            })
        })
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
    fn test_documents_to_context_carries_citation_fields() {
        let entries = vec![retrieved(
            "Auto Insurance Policy",
            "Expiration Date: December 31, 2024.",
            0.8765,
        )];

        let context = documents_to_context(&entries);

        let first = context.get(0).expect("missing context entry");
        assert_eq!(
            first.get("title").and_then(Value::as_str),
            Some("Auto Insurance Policy")
        );
        assert_eq!(
            first.get("category").and_then(Value::as_str),
            Some("Insurance")
        );
        // Scores are rounded to three decimals for prompt stability.
        assert_eq!(first.get("score").and_then(Value::as_f64), Some(0.877));
    }

    #[test]
    fn test_create_user_message_contains_context_and_question() {
        let context = documents_to_context(&[retrieved("Title", "Content", 0.5)]);
        let message = create_user_message(&context, "when does my insurance expire?");

        assert!(message.contains("Content"));
        assert!(message.contains("when does my insurance expire?"));
    }

    #[test]
    fn test_parse_llm_payload_shape() {
        let payload = r#"{
            "answer": "Your policy expires on December 31, 2024.",
            "confidence": 0.9,
            "references": [{"reference": "doc_1"}]
        }"#;

        let parsed: LLMResponseFormat =
            serde_json::from_str(payload).expect("payload should parse");
        assert_eq!(parsed.confidence, Some(0.9));
        assert_eq!(parsed.references.len(), 1);
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::GeminiConfig;

/// Seam between the orchestrator and the hosted model service. Lets tests
/// substitute a scripted client for the real HTTP one.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        system_instruction: &str,
        contents: Vec<Content>,
    ) -> Result<ModelReply>;
}

/// One role-tagged entry in the ordered message sequence sent upstream.
#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

/// Answer text plus whatever grounding fragments the model attached.
/// `text` is `None` when the upstream answer was missing or blank.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: Option<String>,
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingChunk {
    pub web: Option<ChunkSite>,
    pub retrieved_context: Option<ChunkSite>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkSite {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[derive(Deserialize, Default)]
struct GenerateResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(
        &self,
        system_instruction: &str,
        contents: Vec<Content>,
    ) -> Result<ModelReply> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerateReq<'a> {
            contents: &'a [Content],
            system_instruction: Instruction<'a>,
            tools: [Tool; 1],
        }

        #[derive(Serialize)]
        struct Instruction<'a> {
            parts: [InstructionPart<'a>; 1],
        }

        #[derive(Serialize)]
        struct InstructionPart<'a> {
            text: &'a str,
        }

        #[derive(Serialize)]
        struct Tool {
            google_search: GoogleSearch,
        }

        #[derive(Serialize)]
        struct GoogleSearch {}

        let api_key = self
            .config
            .api_key
            .as_deref()
            .context("gemini api key not configured")?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&GenerateReq {
                contents: &contents,
                system_instruction: Instruction {
                    parts: [InstructionPart {
                        text: system_instruction,
                    }],
                },
                tools: [Tool {
                    google_search: GoogleSearch {},
                }],
            })
            .send()
            .await
            .context("failed to call gemini generateContent endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "gemini generateContent returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<GenerateResp>()
            .await
            .context("failed to decode gemini generateContent response")?;

        Ok(reply_from_response(response))
    }
}

fn reply_from_response(response: GenerateResp) -> ModelReply {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return ModelReply::default();
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());

    let grounding_chunks = candidate
        .grounding_metadata
        .map(|metadata| metadata.grounding_chunks)
        .unwrap_or_default();

    ModelReply {
        text,
        grounding_chunks,
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    // API errors arrive as {"error": {"message": "...", ...}}.
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(message) = json
            .get("error")
            .and_then(|err| err.get("message"))
            .and_then(|msg| msg.as_str())
        {
            return message.to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: serde_json::Value) -> ModelReply {
        let response: GenerateResp = serde_json::from_value(raw).expect("valid response json");
        reply_from_response(response)
    }

    #[test]
    fn decodes_answer_text_and_grounding_chunks() {
        let reply = decode(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "A Eucaristia é "}, {"text": "fonte e ápice."}]},
                "groundingMetadata": {
                    "groundingChunks": [
                        {"web": {"uri": "https://www.vatican.va/a", "title": "Vaticano"}},
                        {"retrievedContext": {"uri": "https://example.org/b"}}
                    ]
                }
            }]
        }));

        assert_eq!(reply.text.as_deref(), Some("A Eucaristia é fonte e ápice."));
        assert_eq!(reply.grounding_chunks.len(), 2);
    }

    #[test]
    fn blank_answer_maps_to_none() {
        let reply = decode(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "   "}]}}]
        }));
        assert!(reply.text.is_none());
        assert!(reply.grounding_chunks.is_empty());
    }

    #[test]
    fn missing_candidates_yield_empty_reply() {
        let reply = decode(serde_json::json!({}));
        assert!(reply.text.is_none());
        assert!(reply.grounding_chunks.is_empty());
    }

    #[test]
    fn err_body_prefers_api_message() {
        let body = r#"{"error": {"code": 429, "message": "quota exceeded"}}"#;
        assert_eq!(normalize_err_body(body), "quota exceeded");
        assert_eq!(normalize_err_body("  "), "<empty body>");
        assert_eq!(normalize_err_body("plain failure"), "plain failure");
    }
}

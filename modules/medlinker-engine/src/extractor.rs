//! The extraction boundary: a pluggable collaborator that turns a prompt
//! into JSON with the `{"extracted_capabilities": …, "citations": […]}`
//! shape. The grounding verifier decides what survives.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use medlinker_common::RawDocument;

/// One method, so any backend can sit behind it: a hosted LLM, a local
/// model, or the deterministic heuristic extractor.
#[async_trait]
pub trait CapabilityExtractor: Send + Sync {
    /// May block on network I/O; may fail on transport or parsing errors.
    async fn extract(&self, prompt: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

const EXTRACTION_RULES: &str = r#"You are a document parsing system specialized in healthcare facility data extraction.

CRITICAL RULES:
1. Return ONLY valid JSON. NO markdown, NO code blocks, NO explanations, NO extra text.
2. Extract ONLY facts explicitly stated in SOURCE TEXT. Do NOT infer, guess, or hallucinate.
3. Every citation snippet MUST be verbatim text copied from SOURCE TEXT (max 500 chars).
4. If information is missing, use: null for strings, [] for lists, "UNKNOWN" for enums.
5. All enum values must match exactly: referral_capacity in ["NONE","BASIC","ADVANCED","UNKNOWN"], emergency_capability in ["YES","NO","UNKNOWN"].

REQUIRED JSON SCHEMA:
{
  "extracted_capabilities": {
    "services": ["string"],
    "equipment": ["string"],
    "staffing": ["string"],
    "hours": "string or null",
    "referral_capacity": "NONE|BASIC|ADVANCED|UNKNOWN",
    "emergency_capability": "YES|NO|UNKNOWN"
  },
  "citations": [
    {
      "source_id": "string",
      "source_url": "string or null",
      "snippet": "verbatim text from SOURCE TEXT (1-500 chars)",
      "field": "services|equipment|staffing|hours|referral_capacity|emergency_capability",
      "start_char": "integer or null",
      "end_char": "integer or null"
    }
  ]
}

CITATION REQUIREMENTS:
- Every extracted fact MUST have at least one supporting citation.
- If you extract capabilities but provide no citations, the output is REJECTED."#;

/// Strict extraction prompt for one facility document.
pub fn build_extraction_prompt(doc: &RawDocument) -> String {
    format!(
        "{EXTRACTION_RULES}\n\n\
         SOURCE METADATA:\n\
         Facility ID: {}\n\
         Facility Name: {}\n\
         Location: {}, {}\n\
         Source ID: {}\n\
         Source URL: {}\n\n\
         SOURCE TEXT:\n{}\n\n\
         Return ONLY the JSON object.",
        doc.facility_id,
        doc.facility_name,
        doc.region,
        doc.country,
        doc.source_id,
        doc.source_url.as_deref().unwrap_or("null"),
        doc.source_text,
    )
}

/// Repair prompt for the single retry: the error description plus the
/// source text again, so snippets can be re-grounded.
pub fn build_retry_prompt(error_details: &str, doc: &RawDocument) -> String {
    format!(
        "Your previous output was INVALID and REJECTED.\n\n\
         ERRORS DETECTED:\n{error_details}\n\n\
         {EXTRACTION_RULES}\n\n\
         Source ID: {}\n\
         Source URL: {}\n\n\
         SOURCE TEXT:\n{}\n\n\
         Return ONLY the JSON object.",
        doc.source_id,
        doc.source_url.as_deref().unwrap_or("null"),
        doc.source_text,
    )
}

// ---------------------------------------------------------------------------
// LLM-backed adapter (OpenAI-compatible chat completions)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Extractor backed by an OpenAI-compatible chat endpoint.
pub struct LlmExtractor {
    base_url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl LlmExtractor {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CapabilityExtractor for LlmExtractor {
    async fn extract(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        debug!(model = %self.model, "LLM extraction request");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Extractor API error ({}): {}", status, error_text));
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("Extractor returned no choices"))
    }
}

use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
///
/// The pipeline is fully operable offline: when no extractor endpoint is
/// configured, the deterministic heuristic extractor is used.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of an OpenAI-compatible chat completions endpoint.
    pub extractor_api_url: Option<String>,
    pub extractor_api_key: Option<String>,
    pub extractor_model: String,

    /// Where the jsonl trace sink appends runs.
    pub trace_path: PathBuf,

    /// Top-k for facility/region retrieval during answering.
    pub retrieval_k: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            extractor_api_url: env::var("MEDLINKER_EXTRACTOR_URL").ok(),
            extractor_api_key: env::var("MEDLINKER_EXTRACTOR_API_KEY").ok(),
            extractor_model: env::var("MEDLINKER_EXTRACTOR_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            trace_path: env::var("MEDLINKER_TRACE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("outputs/traces.jsonl")),
            retrieval_k: env::var("MEDLINKER_RETRIEVAL_K")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
        }
    }

    /// True when an LLM-backed extractor can be constructed.
    pub fn has_llm_extractor(&self) -> bool {
        self.extractor_api_url.is_some() && self.extractor_api_key.is_some()
    }
}

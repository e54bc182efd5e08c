//! Test doubles for the engine's collaborator seams.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::extractor::CapabilityExtractor;
use crate::qa::Retriever;

/// Extractor that replays a queue of canned responses, one per call.
/// Errors once the queue runs dry.
pub struct ScriptedExtractor {
    responses: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CapabilityExtractor for ScriptedExtractor {
    async fn extract(&self, prompt: &str) -> Result<String> {
        self.calls.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted extractor exhausted"))
    }
}

/// Extractor that always fails at the transport level.
pub struct FailingExtractor;

#[async_trait]
impl CapabilityExtractor for FailingExtractor {
    async fn extract(&self, _prompt: &str) -> Result<String> {
        Err(anyhow!("connection refused"))
    }
}

/// Retriever returning a fixed selection regardless of the question.
pub struct ScriptedRetriever {
    pub facility_ids: Vec<String>,
    pub region_keys: Vec<(String, String)>,
}

impl Retriever for ScriptedRetriever {
    fn retrieve(
        &self,
        _question: &str,
        _k_facilities: usize,
        _k_regions: usize,
    ) -> Result<(Vec<String>, Vec<(String, String)>)> {
        Ok((self.facility_ids.clone(), self.region_keys.clone()))
    }
}

/// Retriever that always errors, to exercise the lexical fallback.
pub struct ErroringRetriever;

impl Retriever for ErroringRetriever {
    fn retrieve(
        &self,
        _question: &str,
        _k_facilities: usize,
        _k_regions: usize,
    ) -> Result<(Vec<String>, Vec<(String, String)>)> {
        Err(anyhow!("index unavailable"))
    }
}

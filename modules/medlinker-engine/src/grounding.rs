//! Grounding verification: the single choke point between a pluggable
//! extractor and the rest of the pipeline. No fact gets in without a
//! verbatim citation from the source text.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use medlinker_common::{
    is_extraction_field, CapabilitySet, Citation, MedLinkerError, RawDocument, SpanKind, Trace,
};

use crate::extractor::{build_extraction_prompt, build_retry_prompt, CapabilityExtractor};
use crate::heuristic::HeuristicExtractor;

/// Required wire shape of extractor output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionResponse {
    pub extracted_capabilities: CapabilitySet,
    pub citations: Vec<Citation>,
}

/// Keep only citations whose snippet is an exact case-sensitive substring
/// of the source text; silently drop the rest.
pub fn verify_citation_snippets(citations: Vec<Citation>, source_text: &str) -> Vec<Citation> {
    citations
        .into_iter()
        .filter(|c| source_text.contains(&c.snippet))
        .collect()
}

/// Strict validation of raw extractor output.
///
/// Fails with `Schema` on malformed JSON or missing keys, `Validation` on
/// an out-of-vocabulary citation field or field-level invariant breach,
/// and `Grounding` when every citation is hallucinated or when claims
/// arrive without surviving evidence.
pub fn validate_extraction_output(
    raw_json: &str,
    source_text: &str,
    source_id: &str,
) -> Result<(CapabilitySet, Vec<Citation>), MedLinkerError> {
    let value: serde_json::Value = serde_json::from_str(raw_json)
        .map_err(|e| MedLinkerError::Schema(format!("invalid JSON: {e}")))?;

    if value.get("extracted_capabilities").is_none() {
        return Err(MedLinkerError::Schema(
            "response missing 'extracted_capabilities' key".to_string(),
        ));
    }
    if value.get("citations").is_none() {
        return Err(MedLinkerError::Schema(
            "response missing 'citations' key".to_string(),
        ));
    }

    let response: ExtractionResponse = serde_json::from_value(value)
        .map_err(|e| MedLinkerError::Schema(format!("invalid extraction schema: {e}")))?;

    let capabilities = response.extracted_capabilities.normalized();
    let citations = response.citations;

    for citation in &citations {
        if !is_extraction_field(&citation.field) {
            return Err(MedLinkerError::Validation(format!(
                "invalid citation field: {}",
                citation.field
            )));
        }
        citation.validate()?;
    }

    let supplied = citations.len();
    let verified = verify_citation_snippets(citations, source_text);

    if supplied > 0 && verified.is_empty() {
        return Err(MedLinkerError::Grounding(format!(
            "all {supplied} citations contained hallucinated snippets not found in source text"
        )));
    }
    if supplied > verified.len() {
        warn!(
            source_id,
            dropped = supplied - verified.len(),
            "Dropped hallucinated citation snippets"
        );
    }

    if capabilities.has_claims() && verified.is_empty() {
        return Err(MedLinkerError::Grounding(
            "extracted capabilities but provided no valid citations".to_string(),
        ));
    }

    Ok((capabilities, verified))
}

/// Outcome metadata for tracing the extraction boundary.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionOutcome {
    pub attempts: u32,
    pub fallback_used: bool,
}

/// Extraction boundary protocol: one grounded attempt, one repair retry,
/// then the offline heuristic extractor. The heuristic path constructs
/// citations from match offsets and bypasses strict validation, so this
/// never fails and extraction errors are never surfaced to the caller.
pub async fn extract_capabilities(
    extractor: &dyn CapabilityExtractor,
    doc: &RawDocument,
    trace: &mut Trace,
) -> (CapabilitySet, Vec<Citation>, ExtractionOutcome) {
    let mut attempts = 0u32;
    let mut fallback_used = false;

    let result = grounded_attempts(extractor, doc, &mut attempts).await;

    let (capabilities, citations) = match result {
        Ok(ok) => ok,
        Err(e) => {
            warn!(
                facility_id = %doc.facility_id,
                error = %e,
                "Grounded extraction failed twice, falling back to heuristic extractor"
            );
            fallback_used = true;
            HeuristicExtractor::extract_offline(&doc.source_text, &doc.source_id)
        }
    };

    trace.log(
        SpanKind::Extract {
            facility_id: doc.facility_id.clone(),
            source_id: doc.source_id.clone(),
            services: capabilities.services.len() as u32,
            equipment: capabilities.equipment.len() as u32,
            staffing: capabilities.staffing.len() as u32,
            attempts,
            fallback_used,
        },
        citations.len() as u32,
    );

    (
        capabilities,
        citations,
        ExtractionOutcome {
            attempts,
            fallback_used,
        },
    )
}

/// First attempt plus exactly one repair retry. Transport errors and
/// validation failures both count as a failed attempt.
async fn grounded_attempts(
    extractor: &dyn CapabilityExtractor,
    doc: &RawDocument,
    attempts: &mut u32,
) -> Result<(CapabilitySet, Vec<Citation>), MedLinkerError> {
    *attempts = 1;
    let first_error = match attempt(extractor, &build_extraction_prompt(doc), doc).await {
        Ok(ok) => return Ok(ok),
        Err(e) => e,
    };

    debug!(facility_id = %doc.facility_id, error = %first_error, "Extraction attempt rejected, retrying once");

    *attempts = 2;
    attempt(
        extractor,
        &build_retry_prompt(&first_error.to_string(), doc),
        doc,
    )
    .await
}

async fn attempt(
    extractor: &dyn CapabilityExtractor,
    prompt: &str,
    doc: &RawDocument,
) -> Result<(CapabilitySet, Vec<Citation>), MedLinkerError> {
    let raw = extractor
        .extract(prompt)
        .await
        .map_err(|e| MedLinkerError::Schema(format!("extractor call failed: {e}")))?;
    validate_extraction_output(&raw, &doc.source_text, &doc.source_id)
}

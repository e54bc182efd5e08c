//! Grounded question answering over verification and aggregation output.
//!
//! Answers are rendered from the structured outputs only, never from raw
//! source text, and a guardrail refuses any factual-sounding answer that
//! ends up without citations.

mod render;
mod retrieval;

use std::sync::LazyLock;

use regex::Regex;

use medlinker_common::{
    truncate_chars, FacilityAnalysis, GroundedAnswer, MedLinkerError, RegionSummary, SpanKind,
    Trace, TraceSink,
};

pub use retrieval::{
    build_facility_search_text, build_region_search_text, keyword_match_score, retrieve_context,
    Retriever,
};

pub const REFUSAL_ANSWER: &str =
    "I cannot support this claim with citations from the current dataset outputs.";

pub const DEFAULT_RETRIEVAL_K: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionIntent {
    DesertRanking,
    AllFacilities,
    Verified,
    Desert,
    Suspicious,
    Incomplete,
    Capability,
    General,
}

impl QuestionIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionIntent::DesertRanking => "desert_ranking",
            QuestionIntent::AllFacilities => "all_facilities",
            QuestionIntent::Verified => "verified",
            QuestionIntent::Desert => "desert",
            QuestionIntent::Suspicious => "suspicious",
            QuestionIntent::Incomplete => "incomplete",
            QuestionIntent::Capability => "capability",
            QuestionIntent::General => "general",
        }
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

/// First-match keyword classification of the question.
pub fn detect_question_intent(question: &str) -> QuestionIntent {
    let q = question.to_lowercase();

    if contains_any(&q, &["top", "highest", "worst", "rank", "most"])
        && contains_any(&q, &["desert", "score"])
    {
        QuestionIntent::DesertRanking
    } else if q.contains("all facilities") {
        QuestionIntent::AllFacilities
    } else if q.contains("verified") {
        QuestionIntent::Verified
    } else if contains_any(&q, &["lack", "missing", "desert", "gap", "shortage"]) {
        QuestionIntent::Desert
    } else if contains_any(&q, &["suspicious", "inconsistent", "contradiction"]) {
        QuestionIntent::Suspicious
    } else if contains_any(&q, &["incomplete", "partial"]) {
        QuestionIntent::Incomplete
    } else if contains_any(&q, &["where", "which", "find", "has", "available", "offer"]) {
        QuestionIntent::Capability
    } else {
        QuestionIntent::General
    }
}

static CLAIM_COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\d+\s+(region|facilit|score)").expect("claim pattern"));
static CLAIM_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(region|country):\s*\w+").expect("label pattern"));

/// Heuristic test for answers that assert dataset facts and therefore
/// must carry citations.
fn needs_citations(answer: &str) -> bool {
    let lower = answer.to_lowercase();
    CLAIM_COUNT_RE.is_match(answer)
        || (lower.contains("desert") && lower.contains("score"))
        || CLAIM_LABEL_RE.is_match(answer)
}

/// Answer a planner question from verified facility analyses and region
/// summaries. Retrieval narrows context, intent picks a template, and
/// the citation guardrail runs last.
pub fn answer_question(
    question: &str,
    facilities: &[FacilityAnalysis],
    regions: &[RegionSummary],
    retriever: Option<&dyn Retriever>,
    sink: &dyn TraceSink,
) -> Result<GroundedAnswer, MedLinkerError> {
    answer_question_with_k(question, facilities, regions, retriever, sink, DEFAULT_RETRIEVAL_K)
}

/// Like [`answer_question`] with an explicit retrieval top-k.
pub fn answer_question_with_k(
    question: &str,
    facilities: &[FacilityAnalysis],
    regions: &[RegionSummary],
    retriever: Option<&dyn Retriever>,
    sink: &dyn TraceSink,
    k: usize,
) -> Result<GroundedAnswer, MedLinkerError> {
    let mut trace = Trace::new(medlinker_common::generate_trace_id());

    let (selected_facilities, selected_regions) =
        retrieve_context(question, facilities, regions, retriever, k);

    let intent = detect_question_intent(question);
    let (mut answer, mut citations) =
        render::render_answer(intent, question, &selected_facilities, &selected_regions);

    if citations.is_empty() && needs_citations(&answer) {
        answer = REFUSAL_ANSWER.to_string();
        citations = Vec::new();
    }

    trace.log(
        SpanKind::Answer {
            question: truncate_chars(question, 100),
            intent: intent.as_str().to_string(),
            facilities_retrieved: selected_facilities.len() as u32,
            regions_retrieved: selected_regions.len() as u32,
            answer_chars: answer.chars().count() as u32,
            citations: citations.len() as u32,
        },
        citations.len() as u32,
    );
    let trace_id = trace.trace_id().to_string();
    trace.finish(sink)?;

    Ok(GroundedAnswer {
        answer,
        citations,
        trace_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_detection_order() {
        assert_eq!(
            detect_question_intent("Top 3 regions by desert score"),
            QuestionIntent::DesertRanking
        );
        assert_eq!(
            detect_question_intent("List all facilities"),
            QuestionIntent::AllFacilities
        );
        assert_eq!(
            detect_question_intent("Show verified records"),
            QuestionIntent::Verified
        );
        assert_eq!(
            detect_question_intent("Which regions lack c-section coverage?"),
            QuestionIntent::Desert
        );
        assert_eq!(
            detect_question_intent("Any suspicious claims?"),
            QuestionIntent::Suspicious
        );
        assert_eq!(
            detect_question_intent("Records with incomplete data"),
            QuestionIntent::Incomplete
        );
        assert_eq!(
            detect_question_intent("Where can patients get ultrasound?"),
            QuestionIntent::Capability
        );
        assert_eq!(
            detect_question_intent("Tell me about the dataset"),
            QuestionIntent::General
        );
    }

    #[test]
    fn ranking_beats_desert_keyword() {
        assert_eq!(
            detect_question_intent("Which region has the highest desert score?"),
            QuestionIntent::DesertRanking
        );
    }

    #[test]
    fn guardrail_flags_numeric_regional_claims() {
        assert!(needs_citations("Found 3 regions with gaps"));
        assert!(needs_citations("The desert score is elevated"));
        assert!(needs_citations("Region: Volta has problems"));
        assert!(!needs_citations("No data available."));
    }
}

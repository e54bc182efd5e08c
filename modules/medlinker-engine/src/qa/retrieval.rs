//! Context retrieval for grounded answering.
//!
//! A pluggable [`Retriever`] can narrow the candidate set (a vector
//! index, an external search service). When none is configured, or the
//! configured one errors, retrieval silently falls back to the built-in
//! lexical scorer; this path never raises.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::warn;

use medlinker_common::{normalize_and_map, FacilityAnalysis, RegionSummary};

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("word pattern"));

/// External retrieval seam. Returns facility ids and (country, region)
/// keys; unknown ids are dropped by the caller.
pub trait Retriever: Send + Sync {
    fn retrieve(
        &self,
        question: &str,
        k_facilities: usize,
        k_regions: usize,
    ) -> Result<(Vec<String>, Vec<(String, String)>)>;
}

/// Count of question keywords (3+ chars, case-insensitive) found in
/// `text`.
pub fn keyword_match_score(query: &str, text: &str) -> usize {
    let text_lower = text.to_lowercase();
    let query_lower = query.to_lowercase();
    WORD_RE
        .find_iter(&query_lower)
        .filter(|m| m.as_str().len() >= 3)
        .filter(|m| text_lower.contains(m.as_str()))
        .count()
}

/// Searchable blob for one facility: identity, status, canonical
/// capability terms, reasons.
pub fn build_facility_search_text(facility: &FacilityAnalysis) -> String {
    let caps = &facility.capabilities;
    let canonical: Vec<String> = caps
        .services
        .iter()
        .chain(caps.equipment.iter())
        .chain(caps.staffing.iter())
        .map(|term| normalize_and_map(term))
        .collect();
    let mut parts = vec![
        facility.facility_name.clone(),
        facility.facility_id.clone(),
        facility.status.to_string(),
        canonical.join(" "),
    ];
    parts.push(facility.reasons.join(" "));
    parts.join(" ")
}

/// Searchable blob for one region summary.
pub fn build_region_search_text(region: &RegionSummary) -> String {
    let coverage_keys: Vec<&str> = region
        .coverage
        .values()
        .flat_map(|counts| counts.keys())
        .map(String::as_str)
        .collect();
    [
        region.country.clone(),
        region.region.clone(),
        format!("desert_score_{}", region.desert_score),
        region.missing_critical.join(" "),
        coverage_keys.join(" "),
    ]
    .join(" ")
}

fn lexical_top_k<'a, T>(
    question: &str,
    items: &'a [T],
    blob: impl Fn(&T) -> String,
    k: usize,
) -> Vec<&'a T> {
    let mut scored: Vec<(usize, &T)> = items
        .iter()
        .map(|item| (keyword_match_score(question, &blob(item)), item))
        .collect();
    // Stable sort keeps input order among equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(k).map(|(_, item)| item).collect()
}

/// Select up to `k` facilities and regions relevant to the question.
pub fn retrieve_context<'a>(
    question: &str,
    facilities: &'a [FacilityAnalysis],
    regions: &'a [RegionSummary],
    retriever: Option<&dyn Retriever>,
    k: usize,
) -> (Vec<&'a FacilityAnalysis>, Vec<&'a RegionSummary>) {
    if let Some(retriever) = retriever {
        match retriever.retrieve(question, k, k) {
            Ok((facility_ids, region_keys)) => {
                let selected_facilities: Vec<&FacilityAnalysis> = facility_ids
                    .iter()
                    .filter_map(|id| facilities.iter().find(|f| &f.facility_id == id))
                    .take(k)
                    .collect();
                let selected_regions: Vec<&RegionSummary> = region_keys
                    .iter()
                    .filter_map(|(country, region)| {
                        regions
                            .iter()
                            .find(|r| &r.country == country && &r.region == region)
                    })
                    .take(k)
                    .collect();
                return (selected_facilities, selected_regions);
            }
            Err(e) => {
                warn!(error = %e, "Retriever failed, falling back to lexical retrieval");
            }
        }
    }

    (
        lexical_top_k(question, facilities, build_facility_search_text, k),
        lexical_top_k(question, regions, build_region_search_text, k),
    )
}

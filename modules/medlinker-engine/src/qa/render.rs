//! Deterministic answer rendering per question intent.
//!
//! Every factual claim in a rendered answer is backed either by a
//! facility's own citations or by a synthesized `region_summary`
//! citation whose snippet restates the summary fields it came from.

use std::sync::LazyLock;

use regex::Regex;

use medlinker_common::{
    truncate_chars, Citation, FacilityAnalysis, RegionSummary, VerificationStatus,
    FIELD_REGION_SUMMARY, MAX_SNIPPET_CHARS,
};

use super::QuestionIntent;

const REGIONS_SOURCE_ID: &str = "regions_aggregate";

static TOP_N_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"top\s+(\d+)").expect("top-n"));
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("word pattern"));

const CAPABILITY_STOPWORDS: &[&str] = &["where", "which", "find", "have", "with", "that"];

fn severity(desert_score: u32) -> &'static str {
    if desert_score >= 50 {
        "high"
    } else if desert_score >= 30 {
        "moderate"
    } else {
        "low"
    }
}

/// Citation restating the summary fields an answer line was built from.
fn region_citation(region: &RegionSummary, missing_limit: usize) -> Citation {
    let mut snippet = format!(
        "Region: {}-{}; desert_score: {}",
        region.country, region.region, region.desert_score
    );
    if missing_limit > 0 {
        let shown: Vec<&str> = region
            .missing_critical
            .iter()
            .take(missing_limit)
            .map(String::as_str)
            .collect();
        snippet.push_str(&format!("; missing_critical: {}", shown.join(", ")));
    }
    Citation::new(
        REGIONS_SOURCE_ID,
        &truncate_chars(&snippet, MAX_SNIPPET_CHARS),
        FIELD_REGION_SUMMARY,
    )
}

fn render_desert_ranking(
    question: &str,
    regions: &[&RegionSummary],
) -> (String, Vec<Citation>) {
    let limit = TOP_N_RE
        .captures(&question.to_lowercase())
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .unwrap_or(5);

    let mut sorted: Vec<&RegionSummary> = regions.to_vec();
    sorted.sort_by(|a, b| b.desert_score.cmp(&a.desert_score));
    sorted.truncate(limit);

    if sorted.is_empty() {
        return ("No regional data available.".to_string(), Vec::new());
    }

    let mut answer = format!("Top {} regions by desert score:\n\n", sorted.len());
    let mut citations = Vec::new();
    for (i, region) in sorted.iter().enumerate() {
        answer.push_str(&format!(
            "{}. {}-{}: Desert score {} ({})\n",
            i + 1,
            region.country,
            region.region,
            region.desert_score,
            severity(region.desert_score)
        ));
        if !region.missing_critical.is_empty() {
            let shown: Vec<&str> = region
                .missing_critical
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            answer.push_str(&format!("   Missing: {}\n", shown.join(", ")));
        }
        citations.push(region_citation(region, 5));
    }
    (answer, citations)
}

fn render_desert(regions: &[&RegionSummary]) -> (String, Vec<Citation>) {
    let high: Vec<&&RegionSummary> = regions.iter().filter(|r| r.desert_score >= 50).collect();

    if !high.is_empty() {
        let mut answer = format!("Found {} high-desert regions (score >=50):\n\n", high.len());
        let mut citations = Vec::new();
        for (i, region) in high.iter().take(5).enumerate() {
            let shown: Vec<&str> = region
                .missing_critical
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            answer.push_str(&format!(
                "{}. {}-{}: Desert score {}\n   Missing: {}\n",
                i + 1,
                region.country,
                region.region,
                region.desert_score,
                shown.join(", ")
            ));
            citations.push(region_citation(region, 5));
        }
        return (answer, citations);
    }

    let moderate: Vec<&&RegionSummary> = regions
        .iter()
        .filter(|r| r.desert_score >= 30)
        .collect();
    if !moderate.is_empty() {
        let answer = format!(
            "No high-desert regions found (score >=50). However, {} regions have moderate \
             desert scores (30-49).",
            moderate.len()
        );
        let citations = moderate
            .iter()
            .take(3)
            .map(|r| region_citation(r, 3))
            .collect();
        return (answer, citations);
    }

    let answer = "No high-desert or moderate-desert regions found in the available data.".to_string();
    let citations = regions.first().map(|r| region_citation(r, 0)).into_iter().collect();
    (answer, citations)
}

fn render_status_filter(
    facilities: &[&FacilityAnalysis],
    status: VerificationStatus,
    label: &str,
) -> (String, Vec<Citation>) {
    let matching: Vec<&&FacilityAnalysis> =
        facilities.iter().filter(|f| f.status == status).collect();

    if matching.is_empty() {
        let answer = format!("No {label} facilities found in the available data.");
        let citations = facilities
            .first()
            .and_then(|f| f.citations.first().cloned())
            .into_iter()
            .collect();
        return (answer, citations);
    }

    let mut answer = format!("Found {} {label} facilities:\n\n", matching.len());
    let mut citations = Vec::new();
    for (i, facility) in matching.iter().take(5).enumerate() {
        let detail = facility
            .reasons
            .first()
            .map(String::as_str)
            .unwrap_or("No reason provided");
        if status == VerificationStatus::Verified {
            answer.push_str(&format!(
                "{}. {} ({})\n",
                i + 1,
                facility.facility_id,
                facility.facility_name
            ));
        } else {
            answer.push_str(&format!("{}. {}: {}\n", i + 1, facility.facility_id, detail));
        }
        citations.extend(facility.citations.iter().take(2).cloned());
    }
    (answer, citations)
}

fn render_all_facilities(facilities: &[&FacilityAnalysis]) -> (String, Vec<Citation>) {
    if facilities.is_empty() {
        return ("No facilities found in the available data.".to_string(), Vec::new());
    }
    let mut answer = format!("{} facilities in the current dataset:\n\n", facilities.len());
    let mut citations = Vec::new();
    for (i, facility) in facilities.iter().enumerate() {
        answer.push_str(&format!(
            "{}. {} ({}): {}\n",
            i + 1,
            facility.facility_id,
            facility.facility_name,
            facility.status
        ));
        citations.extend(facility.citations.iter().take(1).cloned());
    }
    (answer, citations)
}

fn render_capability(
    question: &str,
    facilities: &[&FacilityAnalysis],
) -> (String, Vec<Citation>) {
    let question_lower = question.to_lowercase();
    let keywords: Vec<&str> = WORD_RE
        .find_iter(&question_lower)
        .map(|m| m.as_str())
        .filter(|w| w.len() >= 4 && !CAPABILITY_STOPWORDS.contains(w))
        .collect();

    let matching: Vec<&&FacilityAnalysis> = facilities
        .iter()
        .filter(|f| {
            let caps = &f.capabilities;
            let blob = caps
                .services
                .iter()
                .chain(caps.equipment.iter())
                .chain(caps.staffing.iter())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            keywords.iter().any(|kw| blob.contains(kw))
        })
        .collect();

    if matching.is_empty() {
        let answer =
            "No facilities found with the requested capabilities in the available data.".to_string();
        let citations = facilities
            .first()
            .and_then(|f| f.citations.first().cloned())
            .into_iter()
            .collect();
        return (answer, citations);
    }

    let mut answer = format!(
        "Found {} facilities with matching capabilities:\n\n",
        matching.len()
    );
    let mut citations = Vec::new();
    for (i, facility) in matching.iter().take(5).enumerate() {
        let caps = &facility.capabilities;
        let services: Vec<&str> = caps.services.iter().take(3).map(String::as_str).collect();
        let equipment: Vec<&str> = caps.equipment.iter().take(3).map(String::as_str).collect();
        answer.push_str(&format!(
            "{}. {}\n   Services: {}\n   Equipment: {}\n",
            i + 1,
            facility.facility_id,
            services.join(", "),
            equipment.join(", ")
        ));
        citations.extend(facility.citations.iter().take(2).cloned());
    }
    (answer, citations)
}

fn render_general(
    facilities: &[&FacilityAnalysis],
    regions: &[&RegionSummary],
) -> (String, Vec<Citation>) {
    let mut answer = format!(
        "Based on the available data:\n\n- {} facilities analyzed\n- {} regions covered\n\n",
        facilities.len(),
        regions.len()
    );
    let mut citations: Vec<Citation> = Vec::new();

    if !regions.is_empty() {
        let mean = regions.iter().map(|r| r.desert_score as f64).sum::<f64>() / regions.len() as f64;
        answer.push_str(&format!("Average desert score: {mean:.1}\n"));
        citations.extend(regions.iter().take(3).map(|r| region_citation(r, 0)));
    }

    if citations.is_empty() {
        citations.extend(
            facilities
                .iter()
                .take(3)
                .filter_map(|f| f.citations.first().cloned()),
        );
    }
    (answer, citations)
}

/// Render the templated answer for a detected intent.
pub(super) fn render_answer(
    intent: QuestionIntent,
    question: &str,
    facilities: &[&FacilityAnalysis],
    regions: &[&RegionSummary],
) -> (String, Vec<Citation>) {
    match intent {
        QuestionIntent::DesertRanking => render_desert_ranking(question, regions),
        QuestionIntent::AllFacilities => render_all_facilities(facilities),
        QuestionIntent::Verified => {
            render_status_filter(facilities, VerificationStatus::Verified, "verified")
        }
        QuestionIntent::Desert => render_desert(regions),
        QuestionIntent::Suspicious => {
            render_status_filter(facilities, VerificationStatus::Suspicious, "suspicious")
        }
        QuestionIntent::Incomplete => {
            render_status_filter(facilities, VerificationStatus::Incomplete, "incomplete")
        }
        QuestionIntent::Capability => render_capability(question, facilities),
        QuestionIntent::General => render_general(facilities, regions),
    }
}

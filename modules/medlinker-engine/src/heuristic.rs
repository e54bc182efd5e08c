//! Deterministic offline extractor.
//!
//! Citations are constructed directly from regex match offsets, so they
//! are inherently grounded and bypass strict validation. This is the
//! guaranteed-success fallback behind the extraction retry protocol, and
//! the default backend when no LLM endpoint is configured.

use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;

use medlinker_common::{
    CapabilitySet, Citation, EmergencyCapability, ReferralCapacity,
};

use crate::extractor::CapabilityExtractor;
use crate::grounding::ExtractionResponse;
use crate::text::{find_keyword, find_keyword_word, window_snippet};

const SERVICES_KEYWORDS: &[&str] = &[
    "c-section",
    "cesarean",
    "surgery",
    "surgical",
    "surgeries",
    "ultrasound",
    "x-ray",
    "immunization",
    "vaccination",
    "laboratory",
    "lab services",
    "pharmacy",
    "dialysis",
    "emergency",
    "maternity",
    "pediatric",
    "outpatient",
    "inpatient",
    "consultation",
    "wound care",
    "family planning",
];

const EQUIPMENT_KEYWORDS: &[&str] = &[
    "ultrasound",
    "x-ray",
    "ecg",
    "ekg",
    "ventilator",
    "oxygen",
    "ct scanner",
    "ct scan",
    "mri",
    "operating theater",
    "theatre",
    "anesthesia machine",
    "monitoring equipment",
    "examination tools",
    "vaccine refrigerator",
];

const STAFFING_KEYWORDS: &[&str] = &[
    "ob/gyn",
    "obstetrician",
    "gynecologist",
    "midwife",
    "midwives",
    "anesthetist",
    "anesthesiologist",
    "surgeon",
    "radiologist",
    "nurse",
    "nurses",
    "doctor",
    "doctors",
    "physician",
    "specialist",
    "pediatrician",
    "laboratory technician",
    "lab technician",
    "radiographer",
];

static HOURS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"24/7",
        r"24\s*hours",
        r"mon(?:day)?[-\s]*fri(?:day)?[:\s]+\d+(?:am|pm)?[-\s]*\d+(?:am|pm)?",
        r"\d+(?:am|pm)[-\s]*\d+(?:am|pm)",
        r"weekdays?\s+\d+(?:am|pm)?[-\s]*\d+(?:am|pm)?",
        r"emergency[:\s]+24/7",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).expect("hours pattern"))
    .collect()
});

const REFERRAL_ADVANCED_KEYWORDS: &[&str] =
    &["tertiary", "referral center", "accept referrals", "complex cases"];
const REFERRAL_BASIC_KEYWORDS: &[&str] = &["refer", "referral", "transfer"];

const EMERGENCY_KEYWORDS: &[&str] = &["emergency", "er ", "accident & emergency", "a&e", "24/7"];

const LIST_WINDOW: usize = 50;
const HOURS_WINDOW: usize = 30;

/// Display form of a matched keyword ("lab services" → "Lab Services",
/// "c-section" → "C-Section").
fn title_case(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    let mut at_word_start = true;
    for ch in keyword.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.push(ch);
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    out
}

pub struct HeuristicExtractor;

impl HeuristicExtractor {
    /// Typed extraction path used by the fallback protocol. Cannot fail.
    pub fn extract_offline(source_text: &str, source_id: &str) -> (CapabilitySet, Vec<Citation>) {
        let (services, mut citations) =
            Self::extract_list_field(source_text, SERVICES_KEYWORDS, "services", source_id);
        let (equipment, equipment_citations) =
            Self::extract_list_field(source_text, EQUIPMENT_KEYWORDS, "equipment", source_id);
        let (staffing, staffing_citations) =
            Self::extract_list_field(source_text, STAFFING_KEYWORDS, "staffing", source_id);
        citations.extend(equipment_citations);
        citations.extend(staffing_citations);

        let hours = Self::extract_hours(source_text, source_id, &mut citations);
        let referral_capacity = Self::extract_referral(source_text, source_id, &mut citations);
        let emergency_capability = Self::extract_emergency(source_text, source_id, &mut citations);

        let capabilities = CapabilitySet {
            services,
            equipment,
            staffing,
            hours,
            referral_capacity,
            emergency_capability,
        }
        .normalized();

        (capabilities, citations)
    }

    fn extract_list_field(
        text: &str,
        keywords: &[&str],
        field: &str,
        source_id: &str,
    ) -> (Vec<String>, Vec<Citation>) {
        let mut items = Vec::new();
        let mut citations = Vec::new();
        for keyword in keywords {
            if let Some((start, end)) = find_keyword_word(text, keyword) {
                let item = title_case(keyword);
                if items.contains(&item) {
                    continue;
                }
                items.push(item);
                let mut citation = Citation::new(
                    source_id,
                    &window_snippet(text, start, end, LIST_WINDOW),
                    field,
                );
                citation.start_char = Some(start);
                citation.end_char = Some(end);
                citations.push(citation);
            }
        }
        (items, citations)
    }

    fn extract_hours(
        text: &str,
        source_id: &str,
        citations: &mut Vec<Citation>,
    ) -> Option<String> {
        for pattern in HOURS_PATTERNS.iter() {
            if let Some(m) = pattern.find(text) {
                let mut citation = Citation::new(
                    source_id,
                    &window_snippet(text, m.start(), m.end(), HOURS_WINDOW),
                    "hours",
                );
                citation.start_char = Some(m.start());
                citation.end_char = Some(m.end());
                citations.push(citation);
                return Some(m.as_str().to_string());
            }
        }
        None
    }

    fn extract_referral(
        text: &str,
        source_id: &str,
        citations: &mut Vec<Citation>,
    ) -> ReferralCapacity {
        for (keywords, capacity) in [
            (REFERRAL_ADVANCED_KEYWORDS, ReferralCapacity::Advanced),
            (REFERRAL_BASIC_KEYWORDS, ReferralCapacity::Basic),
        ] {
            for keyword in keywords {
                if let Some((start, end)) = find_keyword(text, keyword) {
                    let mut citation = Citation::new(
                        source_id,
                        &window_snippet(text, start, end, LIST_WINDOW),
                        "referral_capacity",
                    );
                    citation.start_char = Some(start);
                    citation.end_char = Some(end);
                    citations.push(citation);
                    return capacity;
                }
            }
        }
        ReferralCapacity::Unknown
    }

    fn extract_emergency(
        text: &str,
        source_id: &str,
        citations: &mut Vec<Citation>,
    ) -> EmergencyCapability {
        for keyword in EMERGENCY_KEYWORDS {
            if let Some((start, end)) = find_keyword(text, keyword) {
                let mut citation = Citation::new(
                    source_id,
                    &window_snippet(text, start, end, LIST_WINDOW),
                    "emergency_capability",
                );
                citation.start_char = Some(start);
                citation.end_char = Some(end);
                citations.push(citation);
                return EmergencyCapability::Yes;
            }
        }
        EmergencyCapability::Unknown
    }
}

/// The heuristic extractor can also stand in behind the pluggable
/// extractor interface; it treats the whole prompt as source text and
/// serializes its typed output to the wire shape.
#[async_trait]
impl CapabilityExtractor for HeuristicExtractor {
    async fn extract(&self, prompt: &str) -> Result<String> {
        let (capabilities, citations) = Self::extract_offline(prompt, "heuristic");
        let response = ExtractionResponse {
            extracted_capabilities: capabilities,
            citations,
        };
        Ok(serde_json::to_string(&response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "St. Mary Clinic offers surgery, ultrasound and laboratory services. \
        Staffed by two doctors and a midwife. Open Mon-Fri: 8am-5pm. \
        We refer complex cases to the tertiary hospital.";

    #[test]
    fn extracts_services_equipment_staffing() {
        let (caps, _) = HeuristicExtractor::extract_offline(SAMPLE, "src-1");
        assert!(caps.services.contains(&"Surgery".to_string()));
        assert!(caps.services.contains(&"Ultrasound".to_string()));
        assert!(caps.staffing.contains(&"Doctors".to_string()));
        assert!(caps.staffing.contains(&"Midwife".to_string()));
    }

    #[test]
    fn extracts_hours_and_referral() {
        let (caps, _) = HeuristicExtractor::extract_offline(SAMPLE, "src-1");
        assert!(caps.hours.is_some());
        assert_eq!(caps.referral_capacity, ReferralCapacity::Advanced);
    }

    #[test]
    fn all_citations_are_grounded_substrings() {
        let (_, citations) = HeuristicExtractor::extract_offline(SAMPLE, "src-1");
        assert!(!citations.is_empty());
        for citation in &citations {
            assert!(
                SAMPLE.contains(&citation.snippet),
                "snippet not in source: {}",
                citation.snippet
            );
            assert!(citation.validate().is_ok());
            let (start, end) = (citation.start_char.unwrap(), citation.end_char.unwrap());
            assert!(start < end);
        }
    }

    #[test]
    fn empty_text_yields_no_claims() {
        let (caps, citations) = HeuristicExtractor::extract_offline("", "src-1");
        assert!(!caps.has_claims());
        assert!(citations.is_empty());
    }

    #[test]
    fn title_case_handles_hyphens_and_slashes() {
        assert_eq!(title_case("c-section"), "C-Section");
        assert_eq!(title_case("ob/gyn"), "Ob/Gyn");
        assert_eq!(title_case("lab services"), "Lab Services");
    }
}

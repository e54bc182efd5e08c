//! Rule verification: deterministic consistency checks over an extracted
//! capability set, plus the confidence ladder.
//!
//! Rules only ever downgrade: a facility starts VERIFIED and earns
//! INCOMPLETE or SUSPICIOUS through specific, citable findings. Every
//! finding carries a reason string and, where the source text supports
//! one, a flag citation.

use medlinker_common::{
    CapabilitySet, Citation, Confidence, EmergencyCapability, FacilityAnalysis, MedLinkerError,
    RawDocument, ReferralCapacity, SpanKind, Trace, TraceSink, VerificationStatus,
    FIELD_FLAG_INCOMPLETE, FIELD_FLAG_SUSPICIOUS,
};

use crate::extractor::CapabilityExtractor;
use crate::grounding::extract_capabilities;
use crate::text::{find_keyword, window_snippet};

const INCOMPLETE_WINDOW: usize = 100;
const SUSPICIOUS_WINDOW: usize = 50;

const HOURS_HINT_KEYWORDS: &[&str] = &["hours", "open", "operating", "available", "schedule"];
const STAFFING_HINT_KEYWORDS: &[&str] = &["staff", "doctor", "nurse", "physician", "personnel"];
const REFERRAL_HINT_KEYWORDS: &[&str] = &["referral", "refer", "transfer", "tertiary"];
const EMERGENCY_HINT_KEYWORDS: &[&str] = &["emergency", "ER", "accident", "24/7"];

const SURGICAL_KEYWORDS: &[&str] = &[
    "surgery",
    "surgical",
    "cesarean",
    "c-section",
    "caesarean",
    "operating theatre",
    "operative",
];

const NEGATIVE_ANESTHESIA_PATTERNS: &[&str] = &[
    "no anesthesiologist",
    "no anaesthesiologist",
    "no anesthetist",
    "no anaesthetist",
    "without anesthesiologist",
    "without anaesthesiologist",
    "lacking anesthesiologist",
    "lacking anaesthesiologist",
];

const ADVANCED_EQUIPMENT_KEYWORDS: &[&str] = &["ct", "mri", "ventilator"];

/// Context snippet around the first keyword hit, or None when the text
/// mentions none of them.
pub fn find_evidence_snippet(
    source_text: &str,
    keywords: &[&str],
    window: usize,
) -> Option<String> {
    for keyword in keywords {
        if let Some((start, end)) = find_keyword(source_text, keyword) {
            return Some(window_snippet(source_text, start, end, window));
        }
    }
    None
}

fn flag_citation_from(source_id: &str, reused: &Citation, field: &str) -> Citation {
    let mut citation = Citation::new(source_id, &reused.snippet, field);
    citation.source_url = reused.source_url.clone();
    citation
}

/// Rules that mark a record INCOMPLETE: blank hours, empty staffing,
/// unknown referral capacity. Each finding tries to reuse the matching
/// extraction citation before searching the source text itself.
pub fn check_incomplete_rules(
    capabilities: &CapabilitySet,
    source_text: &str,
    source_id: &str,
    extracted_citations: &[Citation],
) -> (Vec<String>, Vec<Citation>) {
    let mut reasons = Vec::new();
    let mut citations = Vec::new();

    let hours_blank = capabilities
        .hours
        .as_deref()
        .map(|h| h.trim().is_empty())
        .unwrap_or(true);
    if hours_blank {
        reasons.push("Hours not specified; availability is unclear.".to_string());
        if let Some(existing) = extracted_citations.iter().find(|c| c.field == "hours") {
            citations.push(flag_citation_from(source_id, existing, FIELD_FLAG_INCOMPLETE));
        } else if let Some(snippet) = find_evidence_snippet(source_text, HOURS_HINT_KEYWORDS, INCOMPLETE_WINDOW) {
            citations.push(Citation::new(source_id, &snippet, FIELD_FLAG_INCOMPLETE));
        }
    }

    if capabilities.staffing.is_empty() {
        reasons.push(
            "Staffing information is missing; capability claims cannot be fully trusted."
                .to_string(),
        );
        if let Some(snippet) = find_evidence_snippet(source_text, STAFFING_HINT_KEYWORDS, INCOMPLETE_WINDOW) {
            citations.push(Citation::new(source_id, &snippet, FIELD_FLAG_INCOMPLETE));
        }
    }

    if capabilities.referral_capacity == ReferralCapacity::Unknown {
        reasons.push("Referral capacity is not stated; transfer readiness is unclear.".to_string());
        if let Some(existing) = extracted_citations
            .iter()
            .find(|c| c.field == "referral_capacity")
        {
            citations.push(flag_citation_from(source_id, existing, FIELD_FLAG_INCOMPLETE));
        } else if let Some(snippet) = find_evidence_snippet(source_text, REFERRAL_HINT_KEYWORDS, INCOMPLETE_WINDOW) {
            citations.push(Citation::new(source_id, &snippet, FIELD_FLAG_INCOMPLETE));
        }
    }

    (reasons, citations)
}

fn any_entry_mentions(entries: &[String], keywords: &[&str]) -> bool {
    entries.iter().any(|entry| {
        let lower = entry.to_lowercase();
        keywords.iter().any(|kw| lower.contains(kw))
    })
}

/// Rules that mark a record SUSPICIOUS: surgical claims without anesthesia
/// staffing, emergency capability without hours, advanced equipment with
/// no staffing at all.
pub fn check_suspicious_rules(
    capabilities: &CapabilitySet,
    source_text: &str,
    source_id: &str,
    extracted_citations: &[Citation],
) -> (Vec<String>, Vec<Citation>) {
    let mut reasons = Vec::new();
    let mut citations = Vec::new();
    let source_lower = source_text.to_lowercase();

    if any_entry_mentions(&capabilities.services, SURGICAL_KEYWORDS) {
        let has_anesthesia = capabilities.staffing.iter().any(|staff| {
            let lower = staff.to_lowercase();
            lower.contains("anesthe") || lower.contains("anaesthe")
        });
        let has_negative_mention = NEGATIVE_ANESTHESIA_PATTERNS
            .iter()
            .any(|p| source_lower.contains(p));

        if !has_anesthesia || has_negative_mention {
            reasons.push(
                "Surgical services are claimed but anesthesia staffing is not mentioned; \
                 claim may be incomplete or inconsistent."
                    .to_string(),
            );
            let reused = extracted_citations.iter().find(|c| {
                c.field == "services"
                    && SURGICAL_KEYWORDS
                        .iter()
                        .any(|kw| c.snippet.to_lowercase().contains(kw))
            });
            if let Some(existing) = reused {
                citations.push(flag_citation_from(source_id, existing, FIELD_FLAG_SUSPICIOUS));
            } else if let Some(snippet) = find_evidence_snippet(source_text, SURGICAL_KEYWORDS, SUSPICIOUS_WINDOW) {
                citations.push(Citation::new(source_id, &snippet, FIELD_FLAG_SUSPICIOUS));
            }
        }
    }

    if capabilities.emergency_capability == EmergencyCapability::Yes {
        let hours_blank = capabilities
            .hours
            .as_deref()
            .map(|h| h.trim().is_empty())
            .unwrap_or(true);
        if hours_blank {
            reasons.push(
                "Emergency capability is claimed but operating hours are not specified; \
                 claim may be inconsistent."
                    .to_string(),
            );
            if let Some(existing) = extracted_citations
                .iter()
                .find(|c| c.field == "emergency_capability")
            {
                citations.push(flag_citation_from(source_id, existing, FIELD_FLAG_SUSPICIOUS));
            } else if let Some(snippet) = find_evidence_snippet(source_text, EMERGENCY_HINT_KEYWORDS, SUSPICIOUS_WINDOW)
            {
                citations.push(Citation::new(source_id, &snippet, FIELD_FLAG_SUSPICIOUS));
            }
        }
    }

    if any_entry_mentions(&capabilities.equipment, ADVANCED_EQUIPMENT_KEYWORDS)
        && capabilities.staffing.is_empty()
    {
        reasons.push(
            "Advanced equipment is listed but staffing is not provided; claim may be incomplete."
                .to_string(),
        );
        let reused = extracted_citations.iter().find(|c| {
            c.field == "equipment"
                && ADVANCED_EQUIPMENT_KEYWORDS
                    .iter()
                    .any(|kw| c.snippet.to_lowercase().contains(kw))
        });
        if let Some(existing) = reused {
            citations.push(flag_citation_from(source_id, existing, FIELD_FLAG_SUSPICIOUS));
        } else if let Some(snippet) = find_evidence_snippet(source_text, ADVANCED_EQUIPMENT_KEYWORDS, SUSPICIOUS_WINDOW)
        {
            citations.push(Citation::new(source_id, &snippet, FIELD_FLAG_SUSPICIOUS));
        }
    }

    (reasons, citations)
}

/// Confidence ladder: start HIGH, drop to MEDIUM for INCOMPLETE and LOW
/// for SUSPICIOUS, then drop one further rung when evidence is thin
/// (fewer than two citations).
pub fn calculate_confidence(status: VerificationStatus, citation_count: usize) -> Confidence {
    let mut confidence = match status {
        VerificationStatus::Verified => Confidence::High,
        VerificationStatus::Incomplete => Confidence::Medium,
        VerificationStatus::Suspicious => Confidence::Low,
    };

    if citation_count < 2 {
        confidence = match confidence {
            Confidence::High => Confidence::Medium,
            Confidence::Medium => Confidence::Low,
            Confidence::Low => Confidence::Low,
        };
    }

    confidence
}

/// Full verification pass over one facility document: extraction through
/// the grounding boundary, then both rule families, status resolution,
/// confidence, and a flushed trace.
pub async fn verify_facility(
    doc: &RawDocument,
    extractor: &dyn CapabilityExtractor,
    sink: &dyn TraceSink,
) -> Result<FacilityAnalysis, MedLinkerError> {
    let mut trace = Trace::new(medlinker_common::generate_trace_id());

    let (capabilities, extracted_citations, _outcome) =
        extract_capabilities(extractor, doc, &mut trace).await;

    let (incomplete_reasons, incomplete_citations) = check_incomplete_rules(
        &capabilities,
        &doc.source_text,
        &doc.source_id,
        &extracted_citations,
    );
    let (suspicious_reasons, suspicious_citations) = check_suspicious_rules(
        &capabilities,
        &doc.source_text,
        &doc.source_id,
        &extracted_citations,
    );

    let (status, reasons) = if !suspicious_reasons.is_empty() {
        let mut reasons = suspicious_reasons;
        reasons.extend(incomplete_reasons);
        (VerificationStatus::Suspicious, reasons)
    } else if !incomplete_reasons.is_empty() {
        (VerificationStatus::Incomplete, incomplete_reasons)
    } else {
        (VerificationStatus::Verified, Vec::new())
    };

    let mut citations = extracted_citations;
    citations.extend(incomplete_citations);
    citations.extend(suspicious_citations);

    let confidence = calculate_confidence(status, citations.len());

    trace.log(
        SpanKind::Verify {
            facility_id: doc.facility_id.clone(),
            status,
            reasons: reasons.len() as u32,
            confidence,
        },
        citations.len() as u32,
    );
    let trace_id = trace.trace_id().to_string();
    trace.finish(sink)?;

    Ok(FacilityAnalysis {
        facility_id: doc.facility_id.clone(),
        facility_name: doc.facility_name.clone(),
        country: Some(doc.country.clone()),
        region: Some(doc.region.clone()),
        capabilities,
        status,
        reasons,
        confidence,
        citations,
        trace_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> CapabilitySet {
        CapabilitySet {
            services: vec!["Maternity".to_string()],
            staffing: vec!["Nurse".to_string()],
            hours: Some("24/7".to_string()),
            referral_capacity: ReferralCapacity::Basic,
            ..Default::default()
        }
    }

    #[test]
    fn complete_record_raises_no_incomplete_flags() {
        let (reasons, citations) = check_incomplete_rules(&caps(), "open 24/7", "src", &[]);
        assert!(reasons.is_empty());
        assert!(citations.is_empty());
    }

    #[test]
    fn blank_hours_is_incomplete() {
        let mut c = caps();
        c.hours = Some("   ".to_string());
        let (reasons, _) = check_incomplete_rules(&c, "", "src", &[]);
        assert_eq!(
            reasons,
            vec!["Hours not specified; availability is unclear.".to_string()]
        );
    }

    #[test]
    fn missing_staffing_and_referral_stack_reasons() {
        let c = CapabilitySet {
            hours: Some("8am-5pm".to_string()),
            ..Default::default()
        };
        let (reasons, _) = check_incomplete_rules(&c, "", "src", &[]);
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].contains("Staffing information"));
        assert!(reasons[1].contains("Referral capacity"));
    }

    #[test]
    fn incomplete_evidence_snippet_is_grounded() {
        let c = CapabilitySet {
            hours: Some("24/7".to_string()),
            referral_capacity: ReferralCapacity::Basic,
            ..Default::default()
        };
        let text = "The clinic has three doctors on rotation but no fixed roster.";
        let (reasons, citations) = check_incomplete_rules(&c, text, "src", &[]);
        assert_eq!(reasons.len(), 1);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].field, FIELD_FLAG_INCOMPLETE);
        assert!(text.contains(&citations[0].snippet));
    }

    #[test]
    fn surgery_without_anesthesia_is_suspicious() {
        let c = CapabilitySet {
            services: vec!["Surgery".to_string()],
            staffing: vec!["Nurse".to_string()],
            hours: Some("24/7".to_string()),
            referral_capacity: ReferralCapacity::Basic,
            ..Default::default()
        };
        let (reasons, citations) =
            check_suspicious_rules(&c, "We perform surgery daily.", "src", &[]);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("anesthesia staffing is not mentioned"));
        assert_eq!(citations[0].field, FIELD_FLAG_SUSPICIOUS);
    }

    #[test]
    fn surgery_with_anesthetist_passes() {
        let c = CapabilitySet {
            services: vec!["Surgery".to_string()],
            staffing: vec!["Anesthetist".to_string()],
            hours: Some("24/7".to_string()),
            referral_capacity: ReferralCapacity::Basic,
            ..Default::default()
        };
        let (reasons, _) = check_suspicious_rules(&c, "surgery with anesthetist", "src", &[]);
        assert!(reasons.is_empty());
    }

    #[test]
    fn negative_anesthesia_mention_overrides_staffing() {
        let c = CapabilitySet {
            services: vec!["C-Section".to_string()],
            staffing: vec!["Anesthetist".to_string()],
            ..Default::default()
        };
        let text = "C-section offered but currently no anesthetist on site.";
        let (reasons, _) = check_suspicious_rules(&c, text, "src", &[]);
        assert_eq!(reasons.len(), 1);
    }

    #[test]
    fn emergency_without_hours_is_suspicious() {
        let c = CapabilitySet {
            emergency_capability: EmergencyCapability::Yes,
            staffing: vec!["Doctor".to_string()],
            ..Default::default()
        };
        let (reasons, _) = check_suspicious_rules(&c, "emergency services available", "src", &[]);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("operating hours are not specified"));
    }

    #[test]
    fn advanced_equipment_without_staffing_is_suspicious() {
        let c = CapabilitySet {
            equipment: vec!["CT Scanner".to_string()],
            ..Default::default()
        };
        let (reasons, _) = check_suspicious_rules(&c, "CT scanner installed", "src", &[]);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("Advanced equipment"));
    }

    #[test]
    fn rule_citations_reuse_extraction_snippets() {
        let c = CapabilitySet {
            services: vec!["Surgery".to_string()],
            ..Default::default()
        };
        let extracted = vec![Citation::new("src", "offers surgery daily", "services")];
        let (_, citations) = check_suspicious_rules(&c, "unrelated text", "src", &extracted);
        assert_eq!(citations[0].snippet, "offers surgery daily");
        assert_eq!(citations[0].field, FIELD_FLAG_SUSPICIOUS);
    }

    #[test]
    fn confidence_ladder() {
        assert_eq!(
            calculate_confidence(VerificationStatus::Verified, 3),
            Confidence::High
        );
        assert_eq!(
            calculate_confidence(VerificationStatus::Incomplete, 3),
            Confidence::Medium
        );
        assert_eq!(
            calculate_confidence(VerificationStatus::Suspicious, 3),
            Confidence::Low
        );
        assert_eq!(
            calculate_confidence(VerificationStatus::Verified, 1),
            Confidence::Medium
        );
        assert_eq!(
            calculate_confidence(VerificationStatus::Incomplete, 0),
            Confidence::Low
        );
        assert_eq!(
            calculate_confidence(VerificationStatus::Suspicious, 1),
            Confidence::Low
        );
    }
}

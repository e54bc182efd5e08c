//! Regional aggregation and medical desert scoring.
//!
//! Summaries are recomputed wholesale from the current facility set on
//! every call. Coverage counts facilities, not mentions: each facility
//! contributes a canonical term at most once, so synonym lists never
//! inflate a region's coverage.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use medlinker_common::{
    normalize_and_map, CapabilityCategory, FacilityAnalysis, MedLinkerError, RegionSummary,
    SpanKind, Trace, TraceSink, VerificationStatus,
};

pub const CRITICAL_SERVICES: &[&str] =
    &["c-section", "emergency", "ultrasound", "x-ray", "laboratory"];
pub const CRITICAL_EQUIPMENT: &[&str] = &["ultrasound", "x-ray"];
pub const CRITICAL_STAFFING: &[&str] = &["midwife", "doctor"];

const WEIGHT_SERVICE: u32 = 20;
const WEIGHT_EQUIPMENT: u32 = 15;
const WEIGHT_STAFFING: u32 = 10;
pub const MAX_DESERT_SCORE: u32 = 100;

const MAX_SUPPORTING_FACILITIES: usize = 5;

type Coverage = BTreeMap<CapabilityCategory, BTreeMap<String, u32>>;

/// Group facilities by (country, region) in first-encounter order.
/// Missing location fields group under "UNKNOWN".
fn group_by_region(
    facilities: &[FacilityAnalysis],
) -> Vec<((String, String), Vec<&FacilityAnalysis>)> {
    let mut groups: Vec<((String, String), Vec<&FacilityAnalysis>)> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for facility in facilities {
        let key = (
            facility
                .country
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string()),
            facility
                .region
                .clone()
                .unwrap_or_else(|| "UNKNOWN".to_string()),
        );
        match index.get(&key) {
            Some(&i) => groups[i].1.push(facility),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, vec![facility]));
            }
        }
    }
    groups
}

/// Coverage counts per canonical term, one count per facility that
/// mentions the term in any surface form.
fn compute_coverage(facilities: &[&FacilityAnalysis]) -> Coverage {
    let mut coverage: Coverage = BTreeMap::new();
    for category in [
        CapabilityCategory::Services,
        CapabilityCategory::Equipment,
        CapabilityCategory::Staffing,
    ] {
        coverage.insert(category, BTreeMap::new());
    }

    for facility in facilities {
        let caps = &facility.capabilities;
        for (category, entries) in [
            (CapabilityCategory::Services, &caps.services),
            (CapabilityCategory::Equipment, &caps.equipment),
            (CapabilityCategory::Staffing, &caps.staffing),
        ] {
            let canonical: BTreeSet<String> =
                entries.iter().map(|e| normalize_and_map(e)).collect();
            let counts = coverage.entry(category).or_default();
            for term in canonical {
                *counts.entry(term).or_insert(0) += 1;
            }
        }
    }
    coverage
}

/// Critical capabilities nothing in the region provides, as prefixed
/// entries ("service:c-section").
fn compute_missing_critical(coverage: &Coverage) -> Vec<String> {
    let mut missing = Vec::new();
    for (category, critical) in [
        (CapabilityCategory::Services, CRITICAL_SERVICES),
        (CapabilityCategory::Equipment, CRITICAL_EQUIPMENT),
        (CapabilityCategory::Staffing, CRITICAL_STAFFING),
    ] {
        let counts = coverage.get(&category);
        for term in critical {
            let covered = counts
                .and_then(|c| c.get(*term))
                .copied()
                .unwrap_or(0);
            if covered == 0 {
                missing.push(format!("{}:{}", category.missing_prefix(), term));
            }
        }
    }
    missing
}

/// Weighted sum of missing critical items, capped at 100.
fn compute_desert_score(missing_critical: &[String]) -> u32 {
    let mut score = 0u32;
    for item in missing_critical {
        if item.starts_with("service:") {
            score += WEIGHT_SERVICE;
        } else if item.starts_with("equipment:") {
            score += WEIGHT_EQUIPMENT;
        } else if item.starts_with("staffing:") {
            score += WEIGHT_STAFFING;
        }
    }
    score.min(MAX_DESERT_SCORE)
}

/// Up to five facility ids backing the summary, verified facilities
/// first, input order preserved within each group.
fn get_supporting_facilities(facilities: &[&FacilityAnalysis]) -> Vec<String> {
    let verified = facilities
        .iter()
        .filter(|f| f.status == VerificationStatus::Verified);
    let rest = facilities
        .iter()
        .filter(|f| f.status != VerificationStatus::Verified);
    verified
        .chain(rest)
        .take(MAX_SUPPORTING_FACILITIES)
        .map(|f| f.facility_id.clone())
        .collect()
}

fn compute_region_summary(
    country: String,
    region: String,
    facilities: &[&FacilityAnalysis],
    trace: &mut Trace,
) -> RegionSummary {
    let mut status_counts: BTreeMap<VerificationStatus, u32> = BTreeMap::new();
    for facility in facilities {
        *status_counts.entry(facility.status).or_insert(0) += 1;
    }

    let coverage = compute_coverage(facilities);
    let missing_critical = compute_missing_critical(&coverage);
    let desert_score = compute_desert_score(&missing_critical);
    let supporting_facility_ids = get_supporting_facilities(facilities);

    trace.log(
        SpanKind::Aggregate {
            country: country.clone(),
            region: region.clone(),
            facilities: facilities.len() as u32,
            desert_score,
            missing_critical: missing_critical.len() as u32,
        },
        facilities.len() as u32,
    );

    RegionSummary {
        country,
        region,
        total_facilities: facilities.len() as u32,
        facilities_analyzed: facilities.len() as u32,
        status_counts,
        coverage,
        missing_critical,
        desert_score,
        supporting_facility_ids,
        trace_id: medlinker_common::generate_trace_id(),
    }
}

/// Aggregate facility analyses into one summary per (country, region),
/// sorted by desert score descending. Ties keep first-encounter order.
pub fn aggregate_regions(
    facilities: &[FacilityAnalysis],
    sink: &dyn TraceSink,
) -> Result<Vec<RegionSummary>, MedLinkerError> {
    if let Some(blank) = facilities.iter().find(|f| f.facility_id.trim().is_empty()) {
        return Err(MedLinkerError::AggregationInput(format!(
            "facility with blank facility_id (status {})",
            blank.status
        )));
    }
    if facilities.is_empty() {
        return Ok(Vec::new());
    }

    let mut trace = Trace::new(medlinker_common::generate_trace_id());
    let mut summaries: Vec<RegionSummary> = group_by_region(facilities)
        .into_iter()
        .map(|((country, region), group)| {
            compute_region_summary(country, region, &group, &mut trace)
        })
        .collect();

    summaries.sort_by(|a, b| b.desert_score.cmp(&a.desert_score));

    trace.finish(sink)?;
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medlinker_common::{CapabilitySet, Confidence, NullTraceSink};

    fn facility(
        id: &str,
        country: Option<&str>,
        region: Option<&str>,
        status: VerificationStatus,
        caps: CapabilitySet,
    ) -> FacilityAnalysis {
        FacilityAnalysis {
            facility_id: id.to_string(),
            facility_name: format!("Facility {id}"),
            country: country.map(str::to_string),
            region: region.map(str::to_string),
            capabilities: caps,
            status,
            reasons: Vec::new(),
            confidence: Confidence::High,
            citations: Vec::new(),
            trace_id: "t".to_string(),
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let summaries = aggregate_regions(&[], &NullTraceSink).unwrap();
        assert!(summaries.is_empty());
    }

    #[test]
    fn blank_facility_id_rejected() {
        let f = facility(
            "  ",
            Some("GH"),
            Some("Volta"),
            VerificationStatus::Verified,
            CapabilitySet::default(),
        );
        let err = aggregate_regions(&[f], &NullTraceSink).unwrap_err();
        assert!(matches!(err, MedLinkerError::AggregationInput(_)));
    }

    #[test]
    fn missing_location_groups_under_unknown() {
        let f = facility(
            "F1",
            None,
            None,
            VerificationStatus::Verified,
            CapabilitySet::default(),
        );
        let summaries = aggregate_regions(&[f], &NullTraceSink).unwrap();
        assert_eq!(summaries[0].country, "UNKNOWN");
        assert_eq!(summaries[0].region, "UNKNOWN");
    }

    #[test]
    fn empty_region_scores_maximum_desert() {
        let f = facility(
            "F1",
            Some("GH"),
            Some("Volta"),
            VerificationStatus::Incomplete,
            CapabilitySet::default(),
        );
        let summaries = aggregate_regions(&[f], &NullTraceSink).unwrap();
        let s = &summaries[0];
        // 5 services * 20 + 2 equipment * 15 + 2 staffing * 10 = 150, capped.
        assert_eq!(s.desert_score, MAX_DESERT_SCORE);
        assert_eq!(s.missing_critical.len(), 9);
        assert!(s
            .missing_critical
            .contains(&"service:c-section".to_string()));
        assert!(s.missing_critical.contains(&"equipment:x-ray".to_string()));
        assert!(s.missing_critical.contains(&"staffing:midwife".to_string()));
    }

    #[test]
    fn synonyms_satisfy_critical_coverage() {
        let caps = CapabilitySet {
            services: vec![
                "Cesarean".to_string(),
                "A&E".to_string(),
                "Ultra Sound".to_string(),
                "XRay".to_string(),
                "Lab Services".to_string(),
            ],
            equipment: vec!["Ultrasound".to_string(), "X Ray".to_string()],
            staffing: vec!["Midwives".to_string(), "Physicians".to_string()],
            ..Default::default()
        };
        let f = facility("F1", Some("GH"), Some("Volta"), VerificationStatus::Verified, caps);
        let summaries = aggregate_regions(&[f], &NullTraceSink).unwrap();
        assert!(summaries[0].missing_critical.is_empty());
        assert_eq!(summaries[0].desert_score, 0);
    }

    #[test]
    fn coverage_counts_facilities_not_mentions() {
        let caps = CapabilitySet {
            services: vec!["Cesarean".to_string(), "C-Section".to_string()],
            ..Default::default()
        };
        let f = facility("F1", Some("GH"), Some("Volta"), VerificationStatus::Verified, caps);
        let summaries = aggregate_regions(&[f], &NullTraceSink).unwrap();
        let services = &summaries[0].coverage[&CapabilityCategory::Services];
        assert_eq!(services["c-section"], 1);
    }

    #[test]
    fn summaries_sorted_by_desert_score_descending() {
        let full = CapabilitySet {
            services: vec![
                "C-Section".to_string(),
                "Emergency".to_string(),
                "Ultrasound".to_string(),
                "X-Ray".to_string(),
                "Laboratory".to_string(),
            ],
            equipment: vec!["Ultrasound".to_string(), "X-Ray".to_string()],
            staffing: vec!["Midwife".to_string(), "Doctor".to_string()],
            ..Default::default()
        };
        let a = facility("F1", Some("GH"), Some("Ashanti"), VerificationStatus::Verified, full);
        let b = facility(
            "F2",
            Some("GH"),
            Some("Volta"),
            VerificationStatus::Incomplete,
            CapabilitySet::default(),
        );
        let summaries = aggregate_regions(&[a, b], &NullTraceSink).unwrap();
        assert_eq!(summaries[0].region, "Volta");
        assert_eq!(summaries[1].region, "Ashanti");
        assert!(summaries[0].desert_score > summaries[1].desert_score);
    }

    #[test]
    fn supporting_facilities_prefer_verified_and_cap_at_five() {
        let mut facilities = Vec::new();
        for i in 0..4 {
            facilities.push(facility(
                &format!("S{i}"),
                Some("GH"),
                Some("Volta"),
                VerificationStatus::Suspicious,
                CapabilitySet::default(),
            ));
        }
        for i in 0..3 {
            facilities.push(facility(
                &format!("V{i}"),
                Some("GH"),
                Some("Volta"),
                VerificationStatus::Verified,
                CapabilitySet::default(),
            ));
        }
        let summaries = aggregate_regions(&facilities, &NullTraceSink).unwrap();
        let ids = &summaries[0].supporting_facility_ids;
        assert_eq!(ids.len(), 5);
        assert_eq!(&ids[..3], &["V0", "V1", "V2"]);
        assert_eq!(&ids[3..], &["S0", "S1"]);
    }

    #[test]
    fn status_counts_tally_per_region() {
        let facilities = vec![
            facility("F1", Some("GH"), Some("Volta"), VerificationStatus::Verified, CapabilitySet::default()),
            facility("F2", Some("GH"), Some("Volta"), VerificationStatus::Verified, CapabilitySet::default()),
            facility("F3", Some("GH"), Some("Volta"), VerificationStatus::Suspicious, CapabilitySet::default()),
        ];
        let summaries = aggregate_regions(&facilities, &NullTraceSink).unwrap();
        let counts = &summaries[0].status_counts;
        assert_eq!(counts[&VerificationStatus::Verified], 2);
        assert_eq!(counts[&VerificationStatus::Suspicious], 1);
        assert_eq!(summaries[0].total_facilities, 3);
    }
}

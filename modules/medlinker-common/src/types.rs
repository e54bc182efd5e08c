use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::MedLinkerError;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Website,
    Report,
    Pdf,
    DatasetRow,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Website => write!(f, "website"),
            SourceType::Report => write!(f, "report"),
            SourceType::Pdf => write!(f, "pdf"),
            SourceType::DatasetRow => write!(f, "dataset_row"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferralCapacity {
    None,
    Basic,
    Advanced,
    #[default]
    Unknown,
}

impl std::fmt::Display for ReferralCapacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferralCapacity::None => write!(f, "NONE"),
            ReferralCapacity::Basic => write!(f, "BASIC"),
            ReferralCapacity::Advanced => write!(f, "ADVANCED"),
            ReferralCapacity::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyCapability {
    Yes,
    No,
    #[default]
    Unknown,
}

impl std::fmt::Display for EmergencyCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmergencyCapability::Yes => write!(f, "YES"),
            EmergencyCapability::No => write!(f, "NO"),
            EmergencyCapability::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Verified,
    Incomplete,
    Suspicious,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Verified => write!(f, "VERIFIED"),
            VerificationStatus::Incomplete => write!(f, "INCOMPLETE"),
            VerificationStatus::Suspicious => write!(f, "SUSPICIOUS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "LOW"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::High => write!(f, "HIGH"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityCategory {
    Services,
    Equipment,
    Staffing,
}

impl CapabilityCategory {
    /// Prefix used in `missing_critical` entries ("service:c-section").
    pub fn missing_prefix(&self) -> &'static str {
        match self {
            CapabilityCategory::Services => "service",
            CapabilityCategory::Equipment => "equipment",
            CapabilityCategory::Staffing => "staffing",
        }
    }
}

impl std::fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityCategory::Services => write!(f, "services"),
            CapabilityCategory::Equipment => write!(f, "equipment"),
            CapabilityCategory::Staffing => write!(f, "staffing"),
        }
    }
}

// --- Raw input document ---

/// Messy, unstructured text about one facility from a single source.
/// Created by ingestion; immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RawDocument {
    pub facility_id: String,
    pub facility_name: String,
    pub country: String,
    pub region: String,
    pub source_id: String,
    pub source_type: SourceType,
    pub source_text: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

// --- Capability set ---

/// Structured facility capabilities as extracted from a document.
///
/// List fields are deduplicated, trimmed and non-blank; every producer
/// runs `normalized()` at construction time, including parsed extractor
/// output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CapabilitySet {
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub staffing: Vec<String>,
    #[serde(default)]
    pub hours: Option<String>,
    #[serde(default)]
    pub referral_capacity: ReferralCapacity,
    #[serde(default)]
    pub emergency_capability: EmergencyCapability,
}

impl CapabilitySet {
    /// Enforce the list invariants: trimmed, non-blank, first-seen order,
    /// no duplicates.
    pub fn normalized(mut self) -> Self {
        self.services = dedupe_trimmed(self.services);
        self.equipment = dedupe_trimmed(self.equipment);
        self.staffing = dedupe_trimmed(self.staffing);
        self
    }

    /// True when any field carries a claim: a non-empty list, hours, or a
    /// non-UNKNOWN enum. Claims require evidence.
    pub fn has_claims(&self) -> bool {
        !self.services.is_empty()
            || !self.equipment.is_empty()
            || !self.staffing.is_empty()
            || self.hours.is_some()
            || self.referral_capacity != ReferralCapacity::Unknown
            || self.emergency_capability != EmergencyCapability::Unknown
    }
}

fn dedupe_trimmed(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            result.push(trimmed.to_string());
        }
    }
    result
}

// --- Citation ---

/// Citation fields an extractor may emit. Flag citations (`flag:*`) are
/// synthesized by the rule verifier; `region_summary` by the answerer.
pub const EXTRACTION_CITATION_FIELDS: &[&str] = &[
    "services",
    "equipment",
    "staffing",
    "hours",
    "referral_capacity",
    "emergency_capability",
];

pub const FIELD_FLAG_INCOMPLETE: &str = "flag:incomplete";
pub const FIELD_FLAG_SUSPICIOUS: &str = "flag:suspicious";
pub const FIELD_REGION_SUMMARY: &str = "region_summary";

pub const MAX_SNIPPET_CHARS: usize = 500;

/// Returns true when `field` is acceptable in extractor output.
pub fn is_extraction_field(field: &str) -> bool {
    EXTRACTION_CITATION_FIELDS.contains(&field) || field.starts_with("flag:")
}

/// A verbatim evidence snippet tied to a field or flag.
///
/// Invariant: `snippet` is an exact case-sensitive substring of the
/// source text it was derived from. The grounding verifier enforces this
/// for extractor output; all other producers construct snippets directly
/// from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Citation {
    pub source_id: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub snippet: String,
    pub field: String,
    #[serde(default)]
    pub start_char: Option<usize>,
    #[serde(default)]
    pub end_char: Option<usize>,
}

impl Citation {
    pub fn new(source_id: impl Into<String>, snippet: &str, field: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source_url: None,
            snippet: snippet.trim().to_string(),
            field: field.into(),
            start_char: None,
            end_char: None,
        }
    }

    /// Field-level invariants: snippet 1..=500 chars after trimming,
    /// char range ordered when both ends are present.
    pub fn validate(&self) -> Result<(), MedLinkerError> {
        let snippet = self.snippet.trim();
        if snippet.is_empty() {
            return Err(MedLinkerError::Validation(
                "citation snippet is blank".to_string(),
            ));
        }
        if snippet.chars().count() > MAX_SNIPPET_CHARS {
            return Err(MedLinkerError::Validation(format!(
                "citation snippet exceeds {MAX_SNIPPET_CHARS} chars"
            )));
        }
        if let (Some(start), Some(end)) = (self.start_char, self.end_char) {
            if start >= end {
                return Err(MedLinkerError::Validation(format!(
                    "citation char range inverted: start={start}, end={end}"
                )));
            }
        }
        Ok(())
    }
}

// --- Facility analysis ---

/// Complete analysis of one facility document: extracted capabilities,
/// verification status, and the evidence behind both. Created once per
/// document by the verification pass; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityAnalysis {
    pub facility_id: String,
    pub facility_name: String,
    /// Carried from the originating document so the aggregator can group;
    /// missing values group under "UNKNOWN".
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub capabilities: CapabilitySet,
    pub status: VerificationStatus,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub confidence: Confidence,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub trace_id: String,
}

// --- Region summary ---

/// Aggregated view of one (country, region) pair with medical desert
/// scoring. Recomputed wholesale from the current facility set on every
/// aggregation call, never incrementally mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub country: String,
    pub region: String,
    pub total_facilities: u32,
    pub facilities_analyzed: u32,
    pub status_counts: BTreeMap<VerificationStatus, u32>,
    pub coverage: BTreeMap<CapabilityCategory, BTreeMap<String, u32>>,
    pub missing_critical: Vec<String>,
    pub desert_score: u32,
    pub supporting_facility_ids: Vec<String>,
    pub trace_id: String,
}

// --- Grounded answer ---

/// Answer to a planner question with the citations backing every factual
/// claim it makes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub trace_id: String,
}

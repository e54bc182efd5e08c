//! Canonicalization of capability terms.
//!
//! Coverage counting only merges across facilities when every counter uses
//! the same canonical form, so anything that counts terms goes through
//! `normalize_and_map`.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Conservative synonym table. Unmapped terms pass through normalized but
/// uncanonicalized.
static SYNONYM_MAP: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        // C-section variations
        ("cesarean", "c-section"),
        ("caesarean", "c-section"),
        ("c section", "c-section"),
        ("c-section", "c-section"),
        // Emergency variations
        ("accident & emergency", "emergency"),
        ("accident and emergency", "emergency"),
        ("a&e", "emergency"),
        ("er", "emergency"),
        ("emergency", "emergency"),
        // X-ray variations
        ("xray", "x-ray"),
        ("x ray", "x-ray"),
        ("x-ray", "x-ray"),
        // Ultrasound variations
        ("ultra sound", "ultrasound"),
        ("ultrasound", "ultrasound"),
        // Laboratory variations
        ("lab", "laboratory"),
        ("laboratory", "laboratory"),
        ("lab services", "laboratory"),
        // Midwife variations
        ("midwives", "midwife"),
        ("midwife", "midwife"),
        // Doctor variations
        ("doctors", "doctor"),
        ("doctor", "doctor"),
        ("physician", "doctor"),
        ("physicians", "doctor"),
    ])
});

/// Lowercase, trim, collapse internal whitespace.
pub fn normalize_term(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Map a normalized term to its canonical form, or pass it through.
pub fn map_synonym(term: &str) -> String {
    let normalized = normalize_term(term);
    match SYNONYM_MAP.get(normalized.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => normalized,
    }
}

/// Normalize and map in one step.
pub fn normalize_and_map(term: &str) -> String {
    map_synonym(term)
}

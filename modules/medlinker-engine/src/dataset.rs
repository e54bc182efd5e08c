//! Dataset file I/O.
//!
//! Pipeline artifacts travel as JSON Lines: one record per line for
//! documents, facility analyses and region summaries. Single-object JSON
//! files are accepted on the read side for one-off `verify` calls.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use medlinker_common::{FacilityAnalysis, MedLinkerError, RawDocument, RegionSummary};

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, MedLinkerError> {
    let file = fs::File::open(path).map_err(|e| {
        MedLinkerError::Validation(format!("cannot open {}: {e}", path.display()))
    })?;
    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            MedLinkerError::Validation(format!("read error in {}: {e}", path.display()))
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: T = serde_json::from_str(&line).map_err(|e| {
            MedLinkerError::Validation(format!(
                "malformed record at {}:{}: {e}",
                path.display(),
                line_no + 1
            ))
        })?;
        records.push(record);
    }
    debug!(path = %path.display(), records = records.len(), "Loaded dataset file");
    Ok(records)
}

fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<(), MedLinkerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| MedLinkerError::Validation(format!("cannot create output dir: {e}")))?;
        }
    }
    let mut file = fs::File::create(path).map_err(|e| {
        MedLinkerError::Validation(format!("cannot create {}: {e}", path.display()))
    })?;
    for record in records {
        let line = serde_json::to_string(record)
            .map_err(|e| MedLinkerError::Validation(format!("serialize error: {e}")))?;
        writeln!(file, "{line}")
            .map_err(|e| MedLinkerError::Validation(format!("write error: {e}")))?;
    }
    Ok(())
}

/// Load one document from a single-object JSON file.
pub fn load_document(path: &Path) -> Result<RawDocument, MedLinkerError> {
    let text = fs::read_to_string(path).map_err(|e| {
        MedLinkerError::Validation(format!("cannot read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        MedLinkerError::Validation(format!("malformed document {}: {e}", path.display()))
    })
}

pub fn load_documents(path: &Path) -> Result<Vec<RawDocument>, MedLinkerError> {
    read_jsonl(path)
}

pub fn load_facilities(path: &Path) -> Result<Vec<FacilityAnalysis>, MedLinkerError> {
    read_jsonl(path)
}

pub fn load_regions(path: &Path) -> Result<Vec<RegionSummary>, MedLinkerError> {
    read_jsonl(path)
}

pub fn write_facilities(path: &Path, records: &[FacilityAnalysis]) -> Result<(), MedLinkerError> {
    write_jsonl(path, records)
}

pub fn write_regions(path: &Path, records: &[RegionSummary]) -> Result<(), MedLinkerError> {
    write_jsonl(path, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medlinker_common::{CapabilitySet, Confidence, VerificationStatus};

    #[test]
    fn facilities_round_trip_through_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facilities.jsonl");
        let records = vec![FacilityAnalysis {
            facility_id: "F1".to_string(),
            facility_name: "Clinic".to_string(),
            country: Some("GH".to_string()),
            region: Some("Volta".to_string()),
            capabilities: CapabilitySet::default(),
            status: VerificationStatus::Verified,
            reasons: Vec::new(),
            confidence: Confidence::High,
            citations: Vec::new(),
            trace_id: "t1".to_string(),
        }];

        write_facilities(&path, &records).unwrap();
        let loaded = load_facilities(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].facility_id, "F1");
        assert_eq!(loaded[0].status, VerificationStatus::Verified);
    }

    #[test]
    fn malformed_row_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"not\": \"a facility\"}\n").unwrap();
        let err = load_facilities(&path).unwrap_err();
        assert!(matches!(err, MedLinkerError::Validation(_)));
        assert!(err.to_string().contains("bad.jsonl:1"));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.jsonl");
        let doc = serde_json::json!({
            "facility_id": "F1",
            "facility_name": "Clinic",
            "country": "GH",
            "region": "Volta",
            "source_id": "src-1",
            "source_type": "website",
            "source_text": "text"
        });
        std::fs::write(&path, format!("{doc}\n\n{doc}\n")).unwrap();
        assert_eq!(load_documents(&path).unwrap().len(), 2);
    }
}

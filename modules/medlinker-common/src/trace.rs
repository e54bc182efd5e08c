//! Pipeline tracing: persisted timeline of every grounded step.
//!
//! Each pipeline call (verify / aggregate / answer) builds a call-scoped
//! [`Trace`], logs one span per step, and flushes the whole run to a
//! [`TraceSink`] at call end. Traces are never shared across concurrent
//! calls; each is keyed by its own trace id.
//!
//! Span summaries carry only short strings, counts and ids, never raw
//! source text.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::types::{Confidence, VerificationStatus};

pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SpanKind {
    Extract {
        facility_id: String,
        source_id: String,
        services: u32,
        equipment: u32,
        staffing: u32,
        attempts: u32,
        fallback_used: bool,
    },
    Verify {
        facility_id: String,
        status: VerificationStatus,
        reasons: u32,
        confidence: Confidence,
    },
    Aggregate {
        country: String,
        region: String,
        facilities: u32,
        desert_score: u32,
        missing_critical: u32,
    },
    Answer {
        /// Truncated to 100 chars before logging.
        question: String,
        intent: String,
        facilities_retrieved: u32,
        regions_retrieved: u32,
        answer_chars: u32,
        citations: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSpan {
    pub seq: u32,
    pub ts: DateTime<Utc>,
    /// Count of citations/evidence behind this step.
    pub evidence_refs: u32,
    #[serde(flatten)]
    pub kind: SpanKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRun {
    pub trace_id: String,
    pub spans: Vec<TraceSpan>,
}

// ---------------------------------------------------------------------------
// Call-scoped accumulator
// ---------------------------------------------------------------------------

/// Created at call start, flushed at call end.
pub struct Trace {
    run: TraceRun,
    seq: u32,
}

impl Trace {
    pub fn new(trace_id: String) -> Self {
        Self {
            run: TraceRun {
                trace_id,
                spans: Vec::new(),
            },
            seq: 0,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.run.trace_id
    }

    pub fn log(&mut self, kind: SpanKind, evidence_refs: u32) {
        self.run.spans.push(TraceSpan {
            seq: self.seq,
            ts: Utc::now(),
            evidence_refs,
            kind,
        });
        self.seq += 1;
    }

    /// Flush the accumulated run to the sink.
    pub fn finish(self, sink: &dyn TraceSink) -> Result<()> {
        debug!(trace_id = %self.run.trace_id, spans = self.run.spans.len(), "Flushing trace");
        sink.append(&self.run)
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

pub trait TraceSink: Send + Sync {
    fn append(&self, run: &TraceRun) -> Result<()>;
}

/// Discards every run. Useful for pure library callers and tests.
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn append(&self, _run: &TraceRun) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON line per run. Appends are serialized through a mutex
/// so concurrent pipeline calls sharing a sink never interleave lines.
pub struct JsonlTraceSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlTraceSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find a run by trace id. Scans the file; fine at this scale.
    pub fn read_run(&self, trace_id: &str) -> Result<Option<TraceRun>> {
        let _guard = self.lock.lock().expect("trace sink lock poisoned");
        if !self.path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(&self.path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let run: TraceRun = serde_json::from_str(&line)?;
            if run.trace_id == trace_id {
                return Ok(Some(run));
            }
        }
        Ok(None)
    }

    /// Most recent trace ids, newest first.
    pub fn list_recent(&self, limit: usize) -> Result<Vec<String>> {
        let _guard = self.lock.lock().expect("trace sink lock poisoned");
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let mut ids = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let run: TraceRun = serde_json::from_str(&line)?;
            ids.push(run.trace_id);
        }
        ids.reverse();
        ids.truncate(limit);
        Ok(ids)
    }
}

impl TraceSink for JsonlTraceSink {
    fn append(&self, run: &TraceRun) -> Result<()> {
        let _guard = self.lock.lock().expect("trace sink lock poisoned");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(run)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

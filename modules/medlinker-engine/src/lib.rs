//! Grounding-and-verification engine for facility capability records.
//!
//! The pipeline runs extraction through a strict grounding boundary,
//! applies deterministic verification rules, aggregates regions into
//! medical desert scores, and answers planner questions with citations.

pub mod aggregate;
pub mod dataset;
pub mod extractor;
pub mod grounding;
pub mod heuristic;
pub mod qa;
mod text;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use aggregate::aggregate_regions;
pub use extractor::{CapabilityExtractor, LlmExtractor};
pub use grounding::{extract_capabilities, validate_extraction_output, verify_citation_snippets};
pub use heuristic::HeuristicExtractor;
pub use qa::{answer_question, detect_question_intent, QuestionIntent, Retriever};
pub use verify::verify_facility;

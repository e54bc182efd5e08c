use thiserror::Error;

#[derive(Error, Debug)]
pub enum MedLinkerError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Grounding error: {0}")]
    Grounding(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Retriever unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Aggregation input error: {0}")]
    AggregationInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

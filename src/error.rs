use thiserror::Error;

#[derive(Error, Debug)]
pub enum NoiAnalyzerError {
    #[error("Invalid extraction: {0}")]
    InvalidExtraction(String),

    #[error("Consistency violation in {check}: calculated {calculated} != reported {reported} (difference {difference})")]
    ConsistencyViolation {
        check: String,
        calculated: f64,
        reported: f64,
        difference: f64,
    },

    #[error("Unknown period label: {0}")]
    UnknownPeriodLabel(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "llm")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, NoiAnalyzerError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid chart of accounts: {0}")]
    InvalidChart(String),

    #[error("Invalid period '{0}': expected YYYY-MM")]
    InvalidPeriod(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Extraction engine '{engine}' failed: {reason}")]
    EngineFailure { engine: String, reason: String },

    #[error("No extraction engines registered")]
    NoEnginesRegistered,

    #[error("Accounting equation violation for {property} {period}: Assets ({assets}) != Liabilities ({liabilities}) + Capital ({capital})")]
    AccountingEquationViolation {
        property: String,
        period: String,
        assets: String,
        liabilities: String,
        capital: String,
    },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

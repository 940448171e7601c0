use thiserror::Error;

/// Process-level failures: configuration, store setup, I/O.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("LLM client error: {0}")]
    Llm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// The SQL Synthesizer could not produce a candidate query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SynthesisFailure {
    #[error("LLM returned no usable SQL")]
    EmptyResponse,

    #[error("LLM call failed: {0}")]
    TransportError(String),
}

impl SynthesisFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyResponse => "empty_response",
            Self::TransportError(_) => "transport_error",
        }
    }
}

/// The Query Guard refused a candidate query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardRejection {
    #[error("query is not a single read-only SELECT: {0}")]
    NotReadOnly(String),

    #[error("query references unknown table '{0}'")]
    UnknownTable(String),

    #[error("query exceeds complexity bounds: {0}")]
    TooComplex(String),
}

impl GuardRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotReadOnly(_) => "not_read_only",
            Self::UnknownTable(_) => "unknown_table",
            Self::TooComplex(_) => "too_complex",
        }
    }
}

/// The store refused or failed a validated query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    #[error("SQL error: {0}")]
    SqlError(String),
}

impl ExecutionFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::SqlError(_) => "sql_error",
        }
    }
}

/// The Result Summarizer could not produce an explanation. Never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummaryFailure {
    #[error("LLM returned an empty summary")]
    EmptyResponse,

    #[error("LLM call failed: {0}")]
    TransportError(String),
}

impl SummaryFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EmptyResponse => "empty_response",
            Self::TransportError(_) => "transport_error",
        }
    }
}

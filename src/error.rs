use thiserror::Error;

/// Failures raised by the analysis core. Every variant is recoverable by the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("square root of {radicand} did not converge within {iterations} iterations")]
    NoConvergence { radicand: f64, iterations: u32 },

    #[error("no {epoch} records to average for {subject}")]
    EmptyEpoch { epoch: String, subject: String },

    #[error("cannot compute percent change: baseline mean is zero")]
    DivisionByZero,

    #[error("{field} {value} is outside the valid range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("unknown subject: {0}")]
    UnknownSubject(String),

    #[error("unknown demographic field: {0}")]
    UnknownDemographic(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

//! Error taxonomy for the BQL engine (§7). Each variant is a distinct,
//! caller-matchable failure category; nothing here is retried inside
//! the engine — retries and backoff belong to the graph-service client.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Where in the pipeline a `ServiceError` occurred, per §5's
/// "partially applied" vs "failed before mutation" distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorStage {
    /// The call failed before any mutation had been sent for this query.
    PreMutation,
    /// At least one mutation for this query already reached the graph
    /// service; it is not rolled back.
    PartiallyApplied,
}

/// The cap that was exceeded, for `LimitExceeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cap {
    HopUpperBound,
    SetBatch,
    DeleteBatch,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("parse error at line {line}, column {column}: expected one of {expected:?}, found {found}")]
    ParseError {
        line: usize,
        column: usize,
        expected: Vec<String>,
        found: String,
    },

    #[error("semantic error: {rule}")]
    SemanticError { rule: String },

    #[error("under-constrained variable `{variable}`: {reason}")]
    ResolutionError { variable: String, reason: String },

    #[error("{cap:?} exceeded: observed {observed}, cap {cap_value}")]
    LimitExceeded {
        cap: Cap,
        cap_value: usize,
        observed: usize,
    },

    #[error("graph service call failed ({stage:?}): {source}")]
    ServiceError {
        stage: ServiceErrorStage,
        #[source]
        source: bql_api::Error,
    },
}

impl Error {
    pub fn semantic(rule: impl Into<String>) -> Self {
        Error::SemanticError { rule: rule.into() }
    }

    pub fn resolution(variable: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ResolutionError {
            variable: variable.into(),
            reason: reason.into(),
        }
    }
}

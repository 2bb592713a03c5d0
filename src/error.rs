use std::time::Duration;
use thiserror::Error;

/// Failures reported by the browser collaborator.
///
/// Absence of an element is not an error; locating returns `Ok(None)` for that.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrowserError {
    #[error("timed out: {0}")]
    Timeout(String),

    /// The session itself is unusable (crashed browser, closed connection).
    #[error("browser session lost: {0}")]
    SessionLost(String),

    #[error("{0}")]
    Protocol(String),
}

impl BrowserError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrowserError::SessionLost(_))
    }
}

pub type BrowserResult<T> = std::result::Result<T, BrowserError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("no content in model response: {0}")]
    MissingContent(String),
}

/// Plan-level translation failures. These are the only errors returned to
/// the caller of an instruction; action failures live in the trace.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("could not parse model response: {source}\nResponse: {raw}")]
    Schema {
        source: serde_json::Error,
        raw: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model did not answer within {0:?}")]
    Timeout(Duration),
}

impl PlanError {
    /// The raw model text, when the failure was a parse failure.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            PlanError::Schema { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("browser session lost: {0}")]
    SessionFatal(String),

    #[error("browser worker failed: {0}")]
    Worker(String),
}

//! Error taxonomy for the explorer core.
//!
//! Library APIs return [`ExplorerError`]; application glue (config, the binary,
//! poll actions) wraps it in `anyhow` with context.

use thiserror::Error;

pub type ExplorerResult<T> = std::result::Result<T, ExplorerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExplorerError {
    /// Malformed block number or extrinsic index. Programmer error when it
    /// comes from validated input.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The remote confirmed the resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Transport or server failure. Retryable.
    #[error("fetch failed{}: {message}", status_suffix(.status))]
    Fetch {
        status: Option<u16>,
        message: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (http {s})")).unwrap_or_default()
}

impl ExplorerError {
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        ExplorerError::InvalidFormat(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ExplorerError::NotFound(what.into())
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        ExplorerError::Fetch {
            status: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ExplorerError::Fetch {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ExplorerError::NotFound(_))
    }

    /// Only transport failures are worth retrying; absence and bad input are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExplorerError::Fetch { .. })
    }
}

impl From<reqwest::Error> for ExplorerError {
    fn from(e: reqwest::Error) -> Self {
        ExplorerError::Fetch {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for ExplorerError {
    fn from(e: serde_json::Error) -> Self {
        ExplorerError::fetch(format!("invalid response payload: {e}"))
    }
}

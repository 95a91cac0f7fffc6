use std::fmt;

use thiserror::Error;

/// Which side of the relay an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Input,
    Output,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Input => f.write_str("input"),
            Endpoint::Output => f.write_str("output"),
        }
    }
}

/// Errors raised by a relay session, one variant per failing stage.
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("could not open {endpoint} '{url}': {reason}")]
    Open {
        endpoint: Endpoint,
        url: String,
        reason: String,
    },

    #[error("failed to map input stream {index}: {reason}")]
    Negotiation { index: usize, reason: String },

    #[error("error occurred when opening output '{url}': {reason}")]
    HeaderWrite { url: String, reason: String },

    #[error("error muxing packet on stream {index}: {reason}")]
    Mux { index: usize, reason: String },

    #[error("error reading packet from '{url}': {reason}")]
    Read { url: String, reason: String },

    #[error("session already ran (state {0})")]
    AlreadyRun(String),
}

impl RelayError {
    pub(crate) fn open(endpoint: Endpoint, url: &str, cause: anyhow::Error) -> Self {
        Self::Open {
            endpoint,
            url: url.to_string(),
            reason: format!("{:#}", cause),
        }
    }
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;

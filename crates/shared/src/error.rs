use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::RunState;

/// Failure of a single call to an AI backend or news API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("backend call timed out")]
    Timeout,
}

impl BackendError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Unreachable(err.to_string())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = body.trim();
        match status.as_u16() {
            401 | 403 => Self::Rejected(format!("authentication failed ({})", status)),
            429 => Self::Rejected("rate limit exceeded".to_string()),
            _ if status.is_server_error() => Self::Unreachable(format!("{}: {}", status, body)),
            _ => Self::Rejected(format!("{}: {}", status, body)),
        }
    }
}

/// Fatal: the run cannot continue without a complete headline list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquisitionError {
    #[error("news source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("insufficient results: wanted {wanted}, got {got}")]
    InsufficientResults { wanted: usize, got: usize },

    #[error("malformed structure: {0}")]
    MalformedStructure(String),
}

impl From<BackendError> for AcquisitionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unreachable(reason) | BackendError::Rejected(reason) => {
                Self::SourceUnreachable(reason)
            }
            BackendError::Timeout => Self::SourceUnreachable("request timed out".to_string()),
        }
    }
}

/// Per-article, per-provider summary failure. Absorbed into a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummaryError {
    #[error("provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("provider rejected request: {0}")]
    ProviderRejected(String),

    #[error("provider timed out")]
    Timeout,
}

impl From<BackendError> for SummaryError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unreachable(reason) => Self::ProviderUnreachable(reason),
            BackendError::Rejected(reason) => Self::ProviderRejected(reason),
            BackendError::Timeout => Self::Timeout,
        }
    }
}

/// Per-article image failure. Never retried; the image is simply omitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("image unreachable: {0}")]
    Unreachable(String),

    #[error("unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("image fetch timed out")]
    Timeout,

    #[error("image larger than {0} bytes")]
    TooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblyError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Everything that can end a run without a document.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("headline acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("report assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("run timed out after {after:?} while {stage}")]
    RunTimedOut { stage: RunState, after: Duration },

    #[error("run cancelled while {stage}")]
    Cancelled { stage: RunState },

    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl PipelineError {
    /// The stage the run was in when it failed.
    pub fn stage(&self) -> RunState {
        match self {
            Self::Acquisition(_) => RunState::Acquiring,
            Self::Assembly(_) => RunState::Assembling,
            Self::RunTimedOut { stage, .. } | Self::Cancelled { stage } => *stage,
            Self::Delivery(_) => RunState::Done,
        }
    }
}

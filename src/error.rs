//! Error types shared by the API client, the durable stores and the orchestrator.

use crate::form::FieldError;
use thiserror::Error;

/// Errors from the stock-video REST API layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// The envelope parsed but did not carry the expected payload.
    #[error("unexpected response: {0}")]
    Payload(String),
}

/// Errors from the local durable records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode {path}")]
    Serde {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record lock poisoned")]
    Poisoned,
}

/// Why a submission or a tracked task did not reach success.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("form validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("history holds {limit} videos; delete old entries first")]
    AdmissionLimit { limit: usize },

    #[error("a video task is already being created or tracked")]
    Busy,

    #[error("failed to create video task")]
    RemoteCreate(#[source] ApiError),

    #[error("status request failed")]
    PollTransport(#[source] ApiError),

    #[error("remote job {task_id} failed")]
    RemoteJobFailed { task_id: String },

    #[error("gave up on {task_id} after {attempts} status checks")]
    PollTimeout { task_id: String, attempts: u32 },

    #[error("failed to persist task state")]
    Store(#[from] StoreError),
}

impl TaskError {
    /// First field that should receive focus after a validation failure.
    pub fn focus_target(&self) -> Option<&'static str> {
        match self {
            TaskError::Validation(errors) => errors.first().and_then(|e| e.field.input_name()),
            _ => None,
        }
    }
}

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::envelope::ProxyEnvelope;

/// Startup-only failures. Any of these stops the process before it binds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid PORT '{value}': expected an integer between 1 and 65535")]
    InvalidPort { value: String },

    #[error("Invalid {key} '{value}': {reason}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid UPSTREAM_TIMEOUT_MS '{value}': expected a positive integer")]
    InvalidTimeout { value: String },

    #[error("Unsupported UPSTREAM_MODE '{value}'. Supported modes: forward, direct.")]
    UnknownMode { value: String },

    #[error("GEMINI_API_KEY must be set when UPSTREAM_MODE=direct")]
    MissingApiKey,

    #[error("GEMINI_MODEL must not be empty")]
    EmptyModel,
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid JSON body: {0}")]
    InvalidBody(String),

    #[error("Missing userData")]
    MissingUserData,

    #[error("{0}")]
    InvalidPlan(String),

    #[error("{message}")]
    UpstreamRejected { status: StatusCode, message: String },

    #[error("{service} returned an unreadable response (status {status})")]
    UpstreamMalformed { service: String, status: StatusCode },

    #[error("Backend request timeout after {timeout:?}. The service took too long to respond.")]
    Timeout { timeout: Duration },

    #[error("Service unavailable: {reason}. Make sure {service} is running on {url}")]
    Unavailable {
        reason: String,
        service: String,
        url: String,
    },

    #[error("No response generated from API")]
    NoCandidates,
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_)
            | Self::MissingUserData
            | Self::InvalidPlan(_)
            | Self::NoCandidates => StatusCode::BAD_REQUEST,
            Self::UpstreamRejected { status, .. } => *status,
            Self::UpstreamMalformed { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } | Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ProxyEnvelope::failure(self.to_string()))).into_response()
    }
}

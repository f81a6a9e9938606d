//! Backend error types

use thiserror::Error;

/// Error from a backend call, classified by what went wrong
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    /// HTTP status, when the request completed
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unauthorized, message).with_status(401)
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Rejected, message).with_status(status)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, message)
    }

    /// Classify a completed response by status code
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 401 {
            Self::unauthorized(message)
        } else {
            Self::rejected(status, message)
        }
    }

    /// The request never completed
    pub fn is_network(&self) -> bool {
        self.kind == ApiErrorKind::Network
    }

    /// The request completed but the backend refused it
    pub fn is_rejection(&self) -> bool {
        matches!(
            self.kind,
            ApiErrorKind::Rejected | ApiErrorKind::Unauthorized | ApiErrorKind::Decode
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection failure or timeout; the request did not complete
    Network,
    /// 401: the bearer credential is missing or expired
    Unauthorized,
    /// Non-success status or a `success: false` payload
    Rejected,
    /// Completed, but the body was not what we expected
    Decode,
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return ApiError::decode(format!("Unexpected response body: {error}"));
        }
        match error.status() {
            Some(status) => ApiError::from_status(status.as_u16(), error.to_string()),
            None => ApiError::network(error.to_string()),
        }
    }
}

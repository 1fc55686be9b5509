//! Error condition module
//!
//! A status + message pair raised by a stage and rendered centrally by the
//! error page. Both fields are optional; an unset status reads as 500 and
//! an unset message as a generic string.

use hyper::StatusCode;

const GENERIC_MESSAGE: &str = "Internal Server Error";

/// A failure raised by a pipeline stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCondition {
    status: Option<StatusCode>,
    message: Option<String>,
}

impl ErrorCondition {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: Some(message.into()),
        }
    }

    /// Error raised without an explicit status; reads as 500 with the raw
    /// message attached.
    #[must_use]
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: Some(message.into()),
        }
    }

    /// The condition produced when no stage matched the request
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(GENERIC_MESSAGE)
    }
}

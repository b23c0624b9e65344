//! Error response body shared by every endpoint.

use serde::Serialize;

use crate::domain::foundation::DomainError;

/// JSON body for every non-2xx response.
///
/// `error_code` is the SCREAMING_SNAKE `ErrorCode` string that callers
/// branch on; `message` is for humans only.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        let mut response = Self::new(error_code, message);
        response.details = Some(details);
        response
    }
}

impl From<DomainError> for ErrorResponse {
    fn from(err: DomainError) -> Self {
        if err.details.is_empty() {
            return Self::new(err.code.as_str(), err.message);
        }
        let details = err
            .details
            .into_iter()
            .map(|(key, value)| (key, serde_json::Value::String(value)))
            .collect();
        Self::with_details(err.code.as_str(), err.message, serde_json::Value::Object(details))
    }
}

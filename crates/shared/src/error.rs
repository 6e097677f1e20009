use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure body the backend returns in place of a success payload, usually
/// with an HTTP 200 status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct ApiFailure {
    pub error: String,
}

impl ApiFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Envelope for every REST reply: either `{ "error": ... }` or the payload.
///
/// `Failure` is tried first so payloads made of optional fields cannot
/// swallow an error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiReply<T> {
    Failure(ApiFailure),
    Success(T),
}

impl<T> ApiReply<T> {
    pub fn into_result(self) -> Result<T, ApiFailure> {
        match self {
            ApiReply::Failure(failure) => Err(failure),
            ApiReply::Success(value) => Ok(value),
        }
    }
}

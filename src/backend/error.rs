//! Errors raised by array clients.

use serde::Deserialize;
use thiserror::Error;

/// Errors returned by [`FlashArrayApi`](super::FlashArrayApi) calls.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// The addressed object does not exist on the array.
    #[error("{path}: {message}")]
    NotFound {
        /// Request path relative to the API root.
        path: String,
        /// Message reported by the array.
        message: String,
    },
    /// The array answered with a non-success status.
    #[error("{method} {path} failed with status {status}: {message}")]
    Status {
        /// HTTP method of the failed request.
        method: String,
        /// Request path relative to the API root.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Message reported by the array.
        message: String,
    },
    /// The request never produced a response.
    #[error("transport error: {message}")]
    Transport {
        /// Message reported by the HTTP client.
        message: String,
    },
    /// The response body could not be decoded.
    #[error("failed to decode response from {path}: {message}")]
    Decode {
        /// Request path relative to the API root.
        path: String,
        /// Decoder message.
        message: String,
    },
    /// Authentication or session setup was rejected.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Message reported by the array.
        message: String,
    },
    /// None of the REST versions offered by the array are supported.
    #[error("no supported REST version offered by the array (offered: {offered})")]
    UnsupportedVersion {
        /// Comma separated versions offered by the array.
        offered: String,
    },
    /// The client could not be constructed.
    #[error("client setup failed: {message}")]
    Setup {
        /// Description of the setup failure.
        message: String,
    },
}

impl ApiError {
    /// Returns true when the error means the object is absent.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Builds the error for a failed response, classifying "does not exist"
    /// answers as [`ApiError::NotFound`].
    #[must_use]
    pub fn from_response(method: &str, path: &str, status: u16, body: &str) -> Self {
        let message = error_message(body);
        if status == 404 || (status == 400 && mentions_missing_object(&message)) {
            return Self::NotFound {
                path: path.to_owned(),
                message,
            };
        }
        Self::Status {
            method: method.to_owned(),
            path: path.to_owned(),
            status,
            message,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEntry {
    msg: String,
    #[serde(default)]
    ctx: Option<String>,
}

/// Extracts a readable message from an array error body. The array answers
/// with a list of `{msg, ctx}` entries; anything else is passed through.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Vec<ErrorEntry>>(body) {
        Ok(entries) if !entries.is_empty() => entries
            .into_iter()
            .map(|entry| match entry.ctx {
                Some(ctx) if !ctx.is_empty() => format!("{ctx}: {}", entry.msg),
                _ => entry.msg,
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.trim().to_owned(),
    }
}

fn mentions_missing_object(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("does not exist") || lowered.contains("no such")
}

/// Converts not-found errors into `None`.
pub trait OptionalExt<T> {
    /// Maps [`ApiError::NotFound`] to `Ok(None)` and keeps other errors.
    ///
    /// # Errors
    ///
    /// Returns every error that is not a not-found answer.
    fn optional(self) -> Result<Option<T>, ApiError>;
}

impl<T> OptionalExt<T> for Result<T, ApiError> {
    fn optional(self) -> Result<Option<T>, ApiError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

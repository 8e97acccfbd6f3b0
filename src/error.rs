use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::time::Duration;

pub(crate) const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Structured error payload returned by a certificate authority.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ApiError {
    /// HTTP status of the response carrying the error.
    pub status: u16,
    /// Authority-specific error code, when the payload carries one.
    pub code: Option<i32>,
    pub message: String,
    pub description: Option<String>,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            code: None,
            message: message.into(),
            description: None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status={}", self.status)?;
        if let Some(code) = self.code {
            write!(f, ", code={code}")?;
        }
        if !self.message.is_empty() {
            write!(f, ", message={}", self.message)?;
        }
        if let Some(ref description) = self.description {
            write!(f, ", description={description}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Config(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("authentication failed: {0}")]
    Authentication(ApiError),
    #[error("scope denied: requested '{requested}', granted '{granted}'")]
    ScopeDenied { requested: String, granted: String },
    #[error("insufficient scope: '{required}' is required, token grants '{granted}'")]
    InsufficientScope { required: String, granted: String },
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
    #[error("not authorized: {0}")]
    Authorization(ApiError),
    #[error("certificate authority error: {0}")]
    Authority(ApiError),
    #[error("no certificate request found for key id {0}")]
    NotFound(String),
    #[error("certificate for key id {key_id} was not issued: {reason}")]
    IncompleteIssuance { key_id: String, reason: String },
    #[error("certificate for key id {key_id} still pending after {attempts} attempts ({elapsed:?})")]
    Timeout {
        key_id: String,
        attempts: u32,
        elapsed: Duration,
    },
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("public key returned for key id {0} does not match the submitted public key")]
    PublicKeyMismatch(String),
}

impl Error {
    /// True for network-level failures that may succeed on a later attempt.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// The authority payload attached to this error, if any.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Authentication(err) | Error::Authorization(err) | Error::Authority(err) => {
                Some(err)
            }
            _ => None,
        }
    }
}

/// Reads at most `limit` bytes. A read failure keeps whatever arrived before it.
pub(crate) fn read_body_with_limit<R: Read>(reader: &mut R, limit: usize) -> Vec<u8> {
    let mut body = Vec::new();
    let mut limited = reader.take(limit as u64);
    if let Err(err) = limited.read_to_end(&mut body) {
        log::debug!("error body truncated after read failure: {err}");
    }
    body
}

pub(crate) fn fallback_message(status: StatusCode, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        status
            .canonical_reason()
            .map(str::to_owned)
            .unwrap_or_else(|| format!("http status {}", status.as_u16()))
    } else {
        text.to_string()
    }
}

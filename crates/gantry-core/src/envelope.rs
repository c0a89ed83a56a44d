//! The standard response envelope and structured handler replies.
//!
//! Every non-raw service response is wrapped in [`Envelope`]:
//! `code == 0` means success; any other code mirrors the HTTP status.
//! Handlers that want to control the emitted code return a [`Reply`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::Error;

/// Standard JSON wrapper around a business payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// 0 on success, HTTP-aligned code otherwise.
    pub code: u16,
    /// Short human-readable status.
    pub msg: String,
    /// Business payload; omitted on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Optional diagnostic detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Request id, also present in every log line for this request.
    pub rid: String,
}

impl Envelope {
    /// Successful envelope wrapping `data`.
    pub fn success(rid: impl Into<String>, data: Value) -> Self {
        Self {
            code: 0,
            msg: "success".to_string(),
            data: Some(data),
            detail: None,
            rid: rid.into(),
        }
    }

    /// Failure envelope with an explicit code.
    pub fn failure(rid: impl Into<String>, code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
            detail: None,
            rid: rid.into(),
        }
    }

    /// Failure envelope carrying a detail string when one exists.
    pub fn from_error(rid: impl Into<String>, err: &Error) -> Self {
        Self {
            code: err.code(),
            msg: err.message.clone(),
            data: None,
            detail: err.detail.clone(),
            rid: rid.into(),
        }
    }
}

/// Structured reply a handler can return to control the emitted code.
///
/// The pipeline propagates `code` verbatim as both the HTTP status and the
/// envelope code. Any other handler error is wrapped as a 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    msg: String,
    detail: Option<String>,
}

impl Reply {
    /// Reply with a code and message.
    pub fn new(code: u16, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            detail: None,
        }
    }

    /// Attach a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Internal-failure reply (500).
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(500, msg)
    }

    /// The code emitted as HTTP status and envelope code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// The envelope message.
    pub fn msg(&self) -> &str {
        &self.msg
    }

    /// The optional detail.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.msg, self.code)
    }
}

impl std::error::Error for Reply {}

impl From<Error> for Reply {
    fn from(err: Error) -> Self {
        Self {
            code: err.code(),
            msg: err.message,
            detail: err.detail,
        }
    }
}

/// Result type handlers return: output value or a structured reply.
pub type HandlerResult<O> = std::result::Result<O, Reply>;

//! Unified error type for the request pipeline.
//!
//! Every phase of the dispatcher reports failures through [`Error`], which
//! carries a classification, a human-readable message and an optional detail
//! string. The classification maps onto the HTTP-aligned envelope codes the
//! framework emits (400/401/403/404/500).

use std::fmt;

/// Result alias used across the framework.
pub type Result<T> = std::result::Result<T, Error>;

/// Error classification for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Request body, envelope or parameters were malformed (400).
    BadRequest,
    /// Missing, unknown, expired or revoked credentials (401).
    Unauthenticated,
    /// Permission evaluation denied the request (403).
    PermissionDenied,
    /// No service registered under the requested name (404).
    NotFound,
    /// Crypto, cache-write or handler failure (500).
    Internal,
}

impl ErrorKind {
    /// HTTP status (and envelope code) this classification maps to.
    pub fn status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthenticated => 401,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::Internal => 500,
        }
    }
}

/// Pipeline error with classification and optional detail.
#[derive(Debug, Clone)]
pub struct Error {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message, safe to return to the client.
    pub message: String,
    /// Optional diagnostic detail (also returned to the client).
    pub detail: Option<String>,
}

impl Error {
    /// Create an error with an explicit classification.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a detail string.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Malformed request input (400).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// Authentication failure (401).
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    /// Authorization failure (403).
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    /// Unknown service (404).
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Server-side failure (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Envelope code for this error.
    pub fn code(&self) -> u16 {
        self.kind.status()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({})", self.message, detail),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_maps_to_http_status() {
        assert_eq!(ErrorKind::BadRequest.status(), 400);
        assert_eq!(ErrorKind::Unauthenticated.status(), 401);
        assert_eq!(ErrorKind::PermissionDenied.status(), 403);
        assert_eq!(ErrorKind::NotFound.status(), 404);
        assert_eq!(ErrorKind::Internal.status(), 500);
    }

    #[test]
    fn constructors_set_kind() {
        assert_eq!(Error::bad_request("x").kind, ErrorKind::BadRequest);
        assert_eq!(Error::unauthenticated("x").kind, ErrorKind::Unauthenticated);
        assert_eq!(Error::permission_denied("x").kind, ErrorKind::PermissionDenied);
        assert_eq!(Error::not_found("x").kind, ErrorKind::NotFound);
        assert_eq!(Error::internal("x").kind, ErrorKind::Internal);
    }

    #[test]
    fn display_includes_detail() {
        let err = Error::bad_request("invalid envelope").with_detail("data is not base64");
        assert_eq!(err.to_string(), "invalid envelope (data is not base64)");
        assert_eq!(err.code(), 400);
    }
}

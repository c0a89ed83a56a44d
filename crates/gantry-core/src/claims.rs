//! Bearer-token claims carried by access and refresh tokens.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Claims embedded in issued tokens.
///
/// Access and refresh tokens share this shape; they differ only in `exp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Application user id.
    pub user_id: String,
    /// Display username.
    pub username: String,
    /// User email.
    pub email: String,
    /// Primary role.
    pub role: String,
    /// Free-form application claims.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<HashMap<String, Value>>,

    /// Issuer.
    pub iss: String,
    /// Subject (mirrors `user_id`).
    pub sub: String,
    /// Issued-at, unix seconds.
    pub iat: u64,
    /// Not-before, unix seconds.
    pub nbf: u64,
    /// Expiry, unix seconds.
    pub exp: u64,
}

impl Claims {
    /// Whether the token carried `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_is_omitted_when_absent() {
        let claims = Claims {
            user_id: "1".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            role: "admin".into(),
            extra: None,
            iss: "gantry".into(),
            sub: "1".into(),
            iat: 1,
            nbf: 1,
            exp: 2,
        };
        let v = serde_json::to_value(&claims).unwrap();
        assert!(v.get("extra").is_none());
        assert!(claims.has_role("admin"));
        assert!(!claims.has_role("user"));
    }
}

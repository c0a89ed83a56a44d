//! Bearer-token issuance, validation, refresh and revocation.
//!
//! Tokens are HMAC-signed JWTs (HS256/HS384/HS512). Revocation writes a
//! blacklist entry into the token store keyed by the raw token string;
//! presence of the entry rejects the token even while its signature and
//! expiry are still valid.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use gantry_core::{parse_duration, Claims};
use gantry_store::TokenStore;

/// JWT configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Gate for all JWT operations.
    pub enabled: bool,
    /// HMAC signing secret.
    pub secret_key: SecretString,
    /// Required `iss` value.
    pub issuer: String,
    /// Signing algorithm: HS256 (default), HS384 or HS512.
    pub algorithm: String,
    /// Access-token lifetime, e.g. `"24h"`.
    pub expire_duration: String,
    /// Refresh-token lifetime, e.g. `"168h"`.
    pub refresh_expire_duration: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret_key: SecretString::new(String::new()),
            issuer: String::new(),
            algorithm: "HS256".to_string(),
            expire_duration: "24h".to_string(),
            refresh_expire_duration: "168h".to_string(),
        }
    }
}

/// Blacklist wiring: which store and key prefix revocation writes to.
#[derive(Debug, Clone)]
pub struct BlacklistConfig {
    /// Mirrors `token.validation.enabled`; revocation is a no-op when off.
    pub enabled: bool,
    /// Cache key prefix shared with token-store validation.
    pub key_prefix: String,
}

/// Token pair returned by issuance and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Access-token lifetime in seconds.
    pub access_token_expires_in: u64,
    /// Refresh-token lifetime in seconds.
    pub refresh_token_expires_in: u64,
    /// Always `Bearer`.
    pub token_type: String,
}

/// JWT operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// JWT support is disabled by configuration.
    #[error("JWT is not enabled")]
    Disabled,
    /// No signing secret configured.
    #[error("JWT secret key is not configured")]
    MissingSecret,
    /// Signature, expiry, nbf or structural failure.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    /// `iss` did not match the configured issuer.
    #[error("invalid token issuer")]
    InvalidIssuer,
}

/// Issues and verifies bearer tokens; owns no state beyond configuration
/// and a handle to the token store for the blacklist.
pub struct JwtManager {
    config: JwtConfig,
    blacklist: BlacklistConfig,
    store: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("issuer", &self.config.issuer)
            .field("algorithm", &self.config.algorithm)
            .finish()
    }
}

impl JwtManager {
    /// Build a manager over the shared token store.
    pub fn new(config: JwtConfig, blacklist: BlacklistConfig, store: Arc<dyn TokenStore>) -> Self {
        Self {
            config,
            blacklist,
            store,
        }
    }

    /// Whether JWT operations are enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn algorithm(&self) -> Algorithm {
        match self.config.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => {
                warn!(algorithm = other, "unsupported JWT algorithm, using HS256");
                Algorithm::HS256
            }
        }
    }

    fn access_ttl(&self) -> Duration {
        parse_duration(&self.config.expire_duration).unwrap_or_else(|| {
            warn!(
                value = %self.config.expire_duration,
                "invalid JWT expire_duration, using default 24h"
            );
            Duration::from_secs(24 * 3600)
        })
    }

    fn refresh_ttl(&self) -> Duration {
        parse_duration(&self.config.refresh_expire_duration).unwrap_or_else(|| {
            warn!(
                value = %self.config.refresh_expire_duration,
                "invalid JWT refresh_expire_duration, using default 168h"
            );
            Duration::from_secs(168 * 3600)
        })
    }

    fn secret(&self) -> Result<&str, AuthError> {
        if !self.config.enabled {
            return Err(AuthError::Disabled);
        }
        let secret = self.config.secret_key.expose_secret();
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        Ok(secret)
    }

    /// Issue an access/refresh token pair for a principal.
    ///
    /// Both tokens carry the same application claims except `extra`,
    /// which only travels on the access token.
    pub fn issue(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        role: &str,
        extra: Option<std::collections::HashMap<String, serde_json::Value>>,
    ) -> Result<TokenPair, AuthError> {
        let secret = self.secret()?;
        let now = unix_now();
        let access_ttl = self.access_ttl();
        let refresh_ttl = self.refresh_ttl();

        let base = Claims {
            user_id: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            extra: None,
            iss: self.config.issuer.clone(),
            sub: user_id.to_string(),
            iat: now,
            nbf: now,
            exp: now + access_ttl.as_secs(),
        };

        let access_claims = Claims {
            extra,
            ..base.clone()
        };
        let refresh_claims = Claims {
            exp: now + refresh_ttl.as_secs(),
            ..base
        };

        let header = Header::new(self.algorithm());
        let key = EncodingKey::from_secret(secret.as_bytes());
        let access_token = encode(&header, &access_claims, &key)?;
        let refresh_token = encode(&header, &refresh_claims, &key)?;

        info!(
            user_id,
            username,
            access_expires_in = access_ttl.as_secs(),
            refresh_expires_in = refresh_ttl.as_secs(),
            "JWT tokens issued"
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_token_expires_in: access_ttl.as_secs(),
            refresh_token_expires_in: refresh_ttl.as_secs(),
            token_type: "Bearer".to_string(),
        })
    }

    /// Parse and verify a token: signature, `exp`, `nbf` and issuer.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.decode(token, true)?;
        debug!(user_id = %claims.user_id, sub = %claims.sub, "token validated");
        Ok(claims)
    }

    fn decode(&self, token: &str, check_exp: bool) -> Result<Claims, AuthError> {
        let secret = self.secret()?;

        let mut validation = Validation::new(self.algorithm());
        validation.leeway = 0;
        validation.validate_exp = check_exp;
        validation.validate_nbf = true;
        if !self.config.issuer.is_empty() {
            validation.set_issuer(&[&self.config.issuer]);
        }

        let key = DecodingKey::from_secret(secret.as_bytes());
        let data = decode::<Claims>(token, &key, &validation)?;

        if data.claims.iss != self.config.issuer {
            return Err(AuthError::InvalidIssuer);
        }
        Ok(data.claims)
    }

    /// Validate a refresh token and issue a fresh pair with the same
    /// principal claims. The old pair is not revoked.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate(refresh_token)?;
        self.issue(
            &claims.user_id,
            &claims.username,
            &claims.email,
            &claims.role,
            claims.extra,
        )
    }

    /// Revoke a token by writing a blacklist entry keyed by the raw token.
    ///
    /// Expired tokens with a valid signature are still blacklisted. A
    /// failed blacklist write is logged but does not fail the call.
    pub async fn revoke(&self, token: &str) -> Result<(), AuthError> {
        let claims = match self.decode(token, true) {
            Ok(claims) => claims,
            Err(AuthError::InvalidToken(e))
                if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) =>
            {
                warn!("revoking an already expired token");
                self.decode(token, false)?
            }
            Err(e) => return Err(e),
        };

        if self.blacklist.enabled {
            let key = blacklist_key(&self.blacklist.key_prefix, token);
            let now = unix_now();
            let blob = json!({"revoked_at": now, "user_id": claims.user_id}).to_string();
            let ttl = Duration::from_secs(claims.exp.saturating_sub(now).max(60));

            if let Err(e) = self.store.put(&key, blob.as_bytes(), Some(ttl)).await {
                warn!(error = %e, "failed to add token to the blacklist");
            }
        }

        info!(user_id = %claims.user_id, expires_at = claims.exp, "token revoked");
        Ok(())
    }

    /// Whether a blacklist entry exists for this token.
    ///
    /// Store failures read as "not blacklisted" so a degraded cache does
    /// not lock every principal out.
    pub async fn is_blacklisted(&self, token: &str) -> bool {
        if !self.config.enabled || !self.blacklist.enabled {
            return false;
        }
        let key = blacklist_key(&self.blacklist.key_prefix, token);
        self.store.exists(&key).await.unwrap_or(false)
    }
}

fn blacklist_key(prefix: &str, token: &str) -> String {
    format!("{prefix}blacklist:{token}")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_store::{MemoryStore, MemoryStoreConfig};

    fn manager() -> JwtManager {
        manager_with(|_| {})
    }

    fn manager_with(tweak: impl FnOnce(&mut JwtConfig)) -> JwtManager {
        let mut config = JwtConfig {
            enabled: true,
            secret_key: SecretString::new("unit-test-secret".to_string()),
            issuer: "gantry-test".to_string(),
            ..Default::default()
        };
        tweak(&mut config);
        JwtManager::new(
            config,
            BlacklistConfig {
                enabled: true,
                key_prefix: "tok:".to_string(),
            },
            Arc::new(MemoryStore::new(MemoryStoreConfig::default())),
        )
    }

    #[test]
    fn issue_and_validate_roundtrip() {
        let manager = manager();
        let pair = manager.issue("1", "alice", "alice@example.com", "admin", None).unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.access_token_expires_in, 86_400);
        assert_eq!(pair.refresh_token_expires_in, 604_800);
        assert_ne!(pair.access_token, pair.refresh_token);

        let claims = manager.validate(&pair.access_token).unwrap();
        assert_eq!(claims.user_id, "1");
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.sub, "1");
        assert_eq!(claims.iss, "gantry-test");
    }

    #[test]
    fn extra_claims_travel_on_access_only() {
        let manager = manager();
        let mut extra = std::collections::HashMap::new();
        extra.insert("tenant".to_string(), json!("acme"));

        let pair = manager.issue("1", "alice", "a@b.c", "admin", Some(extra)).unwrap();
        let access = manager.validate(&pair.access_token).unwrap();
        let refresh = manager.validate(&pair.refresh_token).unwrap();

        assert_eq!(access.extra.unwrap()["tenant"], json!("acme"));
        assert!(refresh.extra.is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuing = manager();
        let pair = issuing.issue("1", "alice", "a@b.c", "user", None).unwrap();

        let verifying = manager_with(|c| {
            c.secret_key = SecretString::new("a-different-secret".to_string());
        });
        assert!(matches!(
            verifying.validate(&pair.access_token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn wrong_issuer_is_rejected() {
        let issuing = manager_with(|c| c.issuer = "someone-else".to_string());
        let pair = issuing.issue("1", "alice", "a@b.c", "user", None).unwrap();

        let verifying = manager();
        assert!(verifying.validate(&pair.access_token).is_err());
    }

    #[test]
    fn disabled_manager_refuses_to_issue() {
        let manager = manager_with(|c| c.enabled = false);
        assert!(matches!(
            manager.issue("1", "a", "a@b.c", "user", None),
            Err(AuthError::Disabled)
        ));
    }

    #[test]
    fn empty_secret_refuses_to_issue() {
        let manager = manager_with(|c| c.secret_key = SecretString::new(String::new()));
        assert!(matches!(
            manager.issue("1", "a", "a@b.c", "user", None),
            Err(AuthError::MissingSecret)
        ));
    }

    #[test]
    fn unsupported_algorithm_falls_back_to_hs256() {
        let manager = manager_with(|c| c.algorithm = "RS256".to_string());
        let pair = manager.issue("1", "a", "a@b.c", "user", None).unwrap();
        assert!(manager.validate(&pair.access_token).is_ok());
    }

    #[test]
    fn refresh_issues_a_distinct_valid_pair() {
        let manager = manager();
        let pair = manager.issue("1", "alice", "a@b.c", "admin", None).unwrap();
        let renewed = manager.refresh(&pair.refresh_token).unwrap();

        assert_ne!(renewed.access_token, pair.access_token);
        assert!(manager.validate(&renewed.access_token).is_ok());
        // The old pair stays valid until natural expiry.
        assert!(manager.validate(&pair.access_token).is_ok());
    }

    #[tokio::test]
    async fn revoke_blacklists_the_raw_token() {
        let manager = manager();
        let pair = manager.issue("1", "alice", "a@b.c", "admin", None).unwrap();

        assert!(!manager.is_blacklisted(&pair.access_token).await);
        manager.revoke(&pair.access_token).await.unwrap();
        assert!(manager.is_blacklisted(&pair.access_token).await);
        // Validation alone still succeeds; rejection is the pipeline's job.
        assert!(manager.validate(&pair.access_token).is_ok());
    }

    #[tokio::test]
    async fn revoking_garbage_fails() {
        let manager = manager();
        assert!(manager.revoke("not-a-jwt").await.is_err());
    }
}

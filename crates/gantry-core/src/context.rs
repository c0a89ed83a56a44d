//! Per-request context handed to service handlers.
//!
//! The context is cheap to clone (everything behind an `Arc`) and exposes
//! the request id, the bearer token and the parsed JWT claims when the JWT
//! middleware attached them.

use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

use crate::claims::Claims;
use crate::rid::RequestIdGenerator;

/// Request-scoped context.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    service: String,
    group: String,
    generator: Arc<RequestIdGenerator>,
    rid: OnceLock<String>,
    token: RwLock<Option<String>>,
    claims: RwLock<Option<Claims>>,
}

impl ServiceContext {
    /// Context for a request dispatched to `service` in `group`.
    pub fn new(
        service: impl Into<String>,
        group: impl Into<String>,
        generator: Arc<RequestIdGenerator>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                service: service.into(),
                group: group.into(),
                generator,
                rid: OnceLock::new(),
                token: RwLock::new(None),
                claims: RwLock::new(None),
            }),
        }
    }

    /// The service name this request resolved to.
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// The service group, empty when the service has none.
    pub fn group(&self) -> &str {
        &self.inner.group
    }

    /// Request id, generated on first observation.
    pub fn rid(&self) -> &str {
        self.inner
            .rid
            .get_or_init(|| self.inner.generator.next_string())
    }

    /// Cache the extracted bearer token.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.inner.token.write() = Some(token.into());
    }

    /// The bearer token extracted in phase 1, if any.
    pub fn token(&self) -> Option<String> {
        self.inner.token.read().clone()
    }

    /// Attach parsed JWT claims.
    pub fn set_claims(&self, claims: Claims) {
        *self.inner.claims.write() = Some(claims);
    }

    /// Parsed JWT claims, when the JWT middleware attached them.
    pub fn claims(&self) -> Option<Claims> {
        self.inner.claims.read().clone()
    }

    /// Whether JWT claims are attached.
    pub fn is_authenticated(&self) -> bool {
        self.inner.claims.read().is_some()
    }

    /// User id from claims.
    pub fn user_id(&self) -> Option<String> {
        self.inner.claims.read().as_ref().map(|c| c.user_id.clone())
    }

    /// Username from claims.
    pub fn username(&self) -> Option<String> {
        self.inner.claims.read().as_ref().map(|c| c.username.clone())
    }

    /// Email from claims.
    pub fn user_email(&self) -> Option<String> {
        self.inner.claims.read().as_ref().map(|c| c.email.clone())
    }

    /// Role from claims.
    pub fn user_role(&self) -> Option<String> {
        self.inner.claims.read().as_ref().map(|c| c.role.clone())
    }

    /// Whether the authenticated user carries `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.user_role().as_deref() == Some(role)
    }

    /// Whether the authenticated user carries any of `roles`.
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        match self.user_role() {
            Some(role) => roles.iter().any(|r| *r == role),
            None => false,
        }
    }
}

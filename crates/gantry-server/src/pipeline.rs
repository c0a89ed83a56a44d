//! The request pipeline.
//!
//! One dispatcher serves every registered service. Phases run in strict
//! order and short-circuit into a typed error envelope:
//!
//! 1. token extraction            (skipped for `skip_auth` services)
//! 2. token-store validation      (skipped when validation is disabled)
//! 3. JWT parse                   (per the application's JWT mode)
//! 4. role check + permission evaluation
//! 5. envelope unwrap             (signature verify, then decrypt)
//! 6. typed input assembly        (inside the handler adapter)
//! 7. mock substitution, or
//! 8. handler invocation
//! 9. response wrap               (envelope, then encrypt + sign)
//!
//! Store *read* failures during phase 2 log and fail open; everything
//! else fails closed.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use gantry_auth::{check_service_permission, JwtManager};
use gantry_core::envelope::{Envelope, Reply};
use gantry_core::error::Error;
use gantry_core::params::RequestSources;
use gantry_core::{RequestIdGenerator, ServiceContext};
use gantry_crypto::{
    AsymmetricAlgorithm, AsymmetricCipher, CryptoError, Decision, EncryptionResolver, Signer,
    SymmetricAlgorithm, SymmetricCipher,
};
use gantry_store::{StoreError, TokenStore};

use crate::config::GantryConfig;
use crate::mock;
use crate::registry::{RegisteredService, ServiceRegistry};

/// How the pipeline treats JWTs in phase 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JwtMode {
    /// Phase 3 is skipped.
    #[default]
    Disabled,
    /// Claims are attached when a valid token is present; only a
    /// blacklisted token is rejected.
    Optional,
    /// Requests without a valid, unrevoked token are rejected.
    Required,
}

/// Shared state behind every dispatch.
pub(crate) struct PipelineState {
    pub config: GantryConfig,
    pub registry: ServiceRegistry,
    pub store: Arc<dyn TokenStore>,
    pub jwt: JwtManager,
    pub resolver: EncryptionResolver,
    pub rid: Arc<RequestIdGenerator>,
    pub jwt_mode: JwtMode,
    pub body_limit: usize,
}

/// Encrypted request body on the wire.
#[derive(Debug, Deserialize)]
struct EncryptedRequest {
    /// Base64 ciphertext.
    data: String,
    /// Base64 HMAC over the raw ciphertext.
    #[serde(default)]
    signature: String,
}

/// Encrypted response body on the wire.
#[derive(Debug, Serialize)]
struct EncryptedResponse {
    data: String,
    signature: String,
    mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    algorithm: Option<String>,
}

/// Axum entry point: `POST <prefix>/{name}`.
pub(crate) async fn dispatch(
    State(state): State<Arc<PipelineState>>,
    Path(name): Path<String>,
    req: Request<Body>,
) -> Response {
    let group = state
        .registry
        .get(&name)
        .map(|entry| entry.service.group.clone())
        .unwrap_or_default();
    let ctx = ServiceContext::new(name.clone(), group, Arc::clone(&state.rid));

    let Some(entry) = state.registry.get(&name) else {
        return error_response(&ctx, &Error::not_found("Service not found"));
    };

    let (parts, body) = req.into_parts();

    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect();

    let query: Vec<(String, String)> = parts
        .uri
        .query()
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();

    let body_bytes = match axum::body::to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            return error_response(
                &ctx,
                &Error::bad_request("Failed to read request body").with_detail(e.to_string()),
            );
        }
    };

    let is_form = headers.iter().any(|(name, value)| {
        name == "content-type" && value.starts_with("application/x-www-form-urlencoded")
    });

    match run_phases(&state, &entry, &ctx, headers, query, body_bytes, is_form).await {
        Ok(response) => response,
        Err(Failure::Error(err)) => error_response(&ctx, &err),
        Err(Failure::Reply(reply)) => reply_response(&ctx, &reply),
    }
}

/// Either a pipeline-classified error or a handler-structured reply.
enum Failure {
    Error(Error),
    Reply(Reply),
}

impl From<Error> for Failure {
    fn from(err: Error) -> Self {
        Self::Error(err)
    }
}

impl From<Reply> for Failure {
    fn from(reply: Reply) -> Self {
        Self::Reply(reply)
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_phases(
    state: &PipelineState,
    entry: &Arc<RegisteredService>,
    ctx: &ServiceContext,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Vec<u8>,
    is_form: bool,
) -> Result<Response, Failure> {
    let service = &entry.service;
    let name = service.name.as_str();
    let group = service.group.as_str();

    // Phase 1: token extraction.
    if !service.skip_auth {
        debug!(rid = %ctx.rid(), service = name, phase = "token", "extracting token");
        let token = extract_token(&headers, &query, &state.config.app.token_keys)
            .ok_or_else(|| Error::unauthenticated("Unauthorized"))?;
        ctx.set_token(token);
    }

    // Phase 2: token-store validation.
    if !service.skip_auth && state.config.token.validation.enabled {
        debug!(rid = %ctx.rid(), service = name, phase = "validate", "consulting token store");
        let token = ctx.token().unwrap_or_default();
        validate_token(state, ctx, &token).await?;
    }

    // Phase 3: JWT parse.
    if state.jwt_mode != JwtMode::Disabled && state.jwt.is_enabled() {
        debug!(rid = %ctx.rid(), service = name, phase = "jwt", "parsing JWT");
        let token = match ctx.token() {
            Some(token) => Some(token),
            None => {
                let token = extract_token(&headers, &query, &state.config.app.token_keys);
                if let Some(ref token) = token {
                    ctx.set_token(token.clone());
                }
                token
            }
        };

        match token {
            None if state.jwt_mode == JwtMode::Required => {
                return Err(Error::unauthenticated("Missing authentication token").into());
            }
            None => {}
            Some(token) => {
                if state.jwt.is_blacklisted(&token).await {
                    warn!(rid = %ctx.rid(), service = name, "blacklisted token attempted access");
                    return Err(Error::unauthenticated("Token has been revoked").into());
                }
                match state.jwt.validate(&token) {
                    Ok(claims) => ctx.set_claims(claims),
                    Err(e) if state.jwt_mode == JwtMode::Required => {
                        debug!(rid = %ctx.rid(), error = %e, "JWT validation failed");
                        return Err(Error::unauthenticated("Invalid authentication token").into());
                    }
                    Err(e) => {
                        debug!(rid = %ctx.rid(), error = %e, "ignoring invalid optional JWT");
                    }
                }
            }
        }
    }

    // Phase 4: role check and permission evaluation.
    if let Some(allowed) = &service.allowed_roles {
        debug!(rid = %ctx.rid(), service = name, phase = "roles", "checking roles");
        let role = ctx
            .user_role()
            .ok_or_else(|| Error::unauthenticated("Authentication required"))?;
        if !allowed.iter().any(|r| *r == role) {
            warn!(rid = %ctx.rid(), service = name, role = %role, "insufficient role");
            return Err(Error::permission_denied("Insufficient permissions").into());
        }
    }
    if let Some(permission) = &service.permission {
        if !permission.rules.is_empty() {
            debug!(rid = %ctx.rid(), service = name, phase = "permission", "evaluating rules");
            let token = ctx
                .token()
                .ok_or_else(|| Error::permission_denied("Permission denied"))?;
            let prefix = state.config.token.validation.cache_key_prefix.as_str();
            if !check_service_permission(&state.store, prefix, &token, permission).await {
                return Err(Error::permission_denied("Permission denied").into());
            }
        }
    }

    // Phase 5: envelope unwrap.
    let decision = state.resolver.resolve(name, group);
    let body = if decision.enabled {
        debug!(
            rid = %ctx.rid(),
            service = name,
            phase = "decrypt",
            mode = %decision.mode,
            algorithm = %decision.algorithm,
            "unwrapping encrypted request"
        );
        unwrap_envelope(state, &decision, &body).map_err(|err| {
            error!(
                rid = %ctx.rid(),
                service = name,
                group = group,
                mode = %decision.mode,
                algorithm = %decision.algorithm,
                error = %err,
                "failed to process encrypted request"
            );
            err
        })?
    } else {
        body
    };

    // Phase 6 sources; assembly itself runs inside the handler adapter.
    let sources = RequestSources {
        form: if is_form && !decision.enabled {
            form_urlencoded::parse(&body)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        } else {
            Vec::new()
        },
        body: if is_form && !decision.enabled { Vec::new() } else { body },
        query,
        headers,
    };

    // Phases 7 and 8: mock substitution or handler invocation.
    let output = if state.config.mock.enabled_for(name, group) {
        debug!(rid = %ctx.rid(), service = name, phase = "mock", "substituting mock response");
        entry
            .handler
            .validate_input(sources, Arc::clone(&entry.hints))?;
        info!(rid = %ctx.rid(), service = name, group = group, "using mock data for service");
        match entry.handler.output_shape() {
            Some(shape) => mock::generate(&shape),
            None => Value::Null,
        }
    } else {
        debug!(rid = %ctx.rid(), service = name, phase = "handler", "invoking handler");
        let invocation = entry
            .handler
            .call(ctx.clone(), sources, Arc::clone(&entry.hints));
        match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(Ok(value)) => value,
            Ok(Err(reply)) => {
                error!(
                    rid = %ctx.rid(),
                    service = name,
                    code = reply.code(),
                    error = %reply,
                    "service handler failed"
                );
                return Err(reply.into());
            }
            Err(_) => {
                error!(rid = %ctx.rid(), service = name, "service handler panicked");
                return Err(Error::internal("Internal server error").into());
            }
        }
    };

    // Phase 9: response wrap.
    debug!(rid = %ctx.rid(), service = name, phase = "respond", "writing response");
    let payload = if service.return_raw {
        output
    } else {
        serde_json::to_value(Envelope::success(ctx.rid(), output))
            .map_err(|e| Error::internal("Failed to serialize response").with_detail(e.to_string()))?
    };

    if decision.enabled {
        let encrypted = wrap_response(state, &decision, &payload).map_err(|err| {
            error!(rid = %ctx.rid(), service = name, error = %err, "failed to encrypt response");
            Error::internal("Failed to encrypt response").with_detail(err.to_string())
        })?;
        Ok((StatusCode::OK, Json(encrypted)).into_response())
    } else {
        Ok((StatusCode::OK, Json(payload)).into_response())
    }
}

/// Scan the configured header names, then the same-named query
/// parameters; the first non-empty value wins. A leading `Bearer ` is
/// stripped so `Authorization: Bearer t` and `X-API-Key: t` extract the
/// same string.
fn extract_token(
    headers: &[(String, String)],
    query: &[(String, String)],
    token_keys: &[String],
) -> Option<String> {
    let strip = |value: &str| {
        value
            .strip_prefix("Bearer ")
            .unwrap_or(value)
            .trim()
            .to_string()
    };

    for key in token_keys {
        let key = key.to_ascii_lowercase();
        if let Some((_, value)) = headers.iter().find(|(name, v)| *name == key && !v.is_empty()) {
            return Some(strip(value));
        }
    }
    for key in token_keys {
        let key = key.to_ascii_lowercase();
        if let Some((_, value)) = query.iter().find(|(name, v)| *name == key && !v.is_empty()) {
            return Some(strip(value));
        }
    }
    None
}

/// Phase 2: the token must exist in the store. Read failures other than
/// NotFound log and let the request through.
async fn validate_token(
    state: &PipelineState,
    ctx: &ServiceContext,
    token: &str,
) -> Result<(), Error> {
    if token.is_empty() {
        return Err(Error::unauthenticated("Invalid token"));
    }
    let key = format!("{}{}", state.config.token.validation.cache_key_prefix, token);
    match state.store.get(&key).await {
        Ok(_) => Ok(()),
        Err(StoreError::NotFound) => {
            warn!(rid = %ctx.rid(), service = %ctx.service(), "token validation failed");
            Err(Error::unauthenticated("Invalid token"))
        }
        Err(e) => {
            warn!(
                rid = %ctx.rid(),
                service = %ctx.service(),
                error = %e,
                "token store read failed, allowing request through"
            );
            Ok(())
        }
    }
}

/// Phase 5: base64-decode, verify the HMAC over the raw ciphertext, then
/// decrypt under the resolved mode and algorithm.
fn unwrap_envelope(
    state: &PipelineState,
    decision: &Decision,
    body: &[u8],
) -> Result<Vec<u8>, Error> {
    let envelope: EncryptedRequest = serde_json::from_slice(body)
        .map_err(|e| Error::bad_request("Decryption failed").with_detail(e.to_string()))?;

    let ciphertext = STANDARD
        .decode(envelope.data.as_bytes())
        .map_err(|e| Error::bad_request("Decryption failed").with_detail(format!("data: {e}")))?;
    let signature = STANDARD
        .decode(envelope.signature.as_bytes())
        .map_err(|e| Error::bad_request("Decryption failed").with_detail(format!("signature: {e}")))?;

    let encryption = state.resolver.config();

    // Signature first, over the ciphertext, before any decryption.
    if state.resolver.signature_enabled() {
        let signer = Signer::from_config(&encryption.signature).map_err(config_crypto_error)?;
        signer
            .verify(&ciphertext, &signature)
            .map_err(|_| Error::bad_request("Decryption failed").with_detail("signature verification failed"))?;
    }

    match decision.mode.as_str() {
        "symmetric" => {
            let cipher =
                SymmetricCipher::from_config(&encryption.symmetric).map_err(config_crypto_error)?;
            let algorithm =
                SymmetricAlgorithm::from_name(&decision.algorithm).map_err(data_crypto_error)?;
            cipher.decrypt_with(algorithm, &ciphertext).map_err(data_crypto_error)
        }
        "asymmetric" => {
            let cipher =
                AsymmetricCipher::from_config(&encryption.asymmetric).map_err(config_crypto_error)?;
            let algorithm =
                AsymmetricAlgorithm::from_name(&decision.algorithm).map_err(data_crypto_error)?;
            cipher.decrypt_with(algorithm, &ciphertext).map_err(data_crypto_error)
        }
        other => Err(Error::bad_request("Decryption failed")
            .with_detail(format!("unsupported encryption mode: {other}"))),
    }
}

/// Phase 9: encrypt the serialized payload and sign the ciphertext.
fn wrap_response(
    state: &PipelineState,
    decision: &Decision,
    payload: &Value,
) -> Result<EncryptedResponse, CryptoError> {
    let plaintext = serde_json::to_vec(payload).map_err(|_| CryptoError::EncryptionFailed)?;
    let encryption = state.resolver.config();

    let ciphertext = match decision.mode.as_str() {
        "symmetric" => {
            let cipher = SymmetricCipher::from_config(&encryption.symmetric)?;
            let algorithm = SymmetricAlgorithm::from_name(&decision.algorithm)?;
            cipher.encrypt_with(algorithm, &plaintext)?
        }
        "asymmetric" => {
            let cipher = AsymmetricCipher::from_config(&encryption.asymmetric)?;
            let algorithm = AsymmetricAlgorithm::from_name(&decision.algorithm)?;
            cipher.encrypt_with(algorithm, &plaintext)?
        }
        other => return Err(CryptoError::UnsupportedMode(other.to_string())),
    };

    let signature = if state.resolver.signature_enabled() {
        Signer::from_config(&encryption.signature)?.sign(&ciphertext)?
    } else {
        Vec::new()
    };

    Ok(EncryptedResponse {
        data: STANDARD.encode(&ciphertext),
        signature: STANDARD.encode(&signature),
        mode: decision.mode.clone(),
        algorithm: if decision.algorithm.is_empty() {
            None
        } else {
            Some(decision.algorithm.clone())
        },
    })
}

/// Client-data crypto failures map to 400.
fn data_crypto_error(e: CryptoError) -> Error {
    match e {
        CryptoError::MissingKey | CryptoError::InvalidKey(_) | CryptoError::Io(_) => {
            config_crypto_error(e)
        }
        other => Error::bad_request("Decryption failed").with_detail(other.to_string()),
    }
}

/// Key-material and configuration failures are server-side 500s.
fn config_crypto_error(e: CryptoError) -> Error {
    Error::internal("Encryption configuration error").with_detail(e.to_string())
}

/// Build the failure response for a pipeline error.
pub(crate) fn error_response(ctx: &ServiceContext, err: &Error) -> Response {
    let status = StatusCode::from_u16(err.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(Envelope::from_error(ctx.rid(), err))).into_response()
}

/// Build the response for a handler-structured reply: its code is both
/// the HTTP status and the envelope code.
fn reply_response(ctx: &ServiceContext, reply: &Reply) -> Response {
    let status = StatusCode::from_u16(reply.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut envelope = Envelope::failure(ctx.rid(), reply.code(), reply.msg());
    envelope.detail = reply.detail().map(str::to_string);
    (status, Json(envelope)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const KEYS: &[&str] = &["authorization", "x-api-key"];

    fn keys() -> Vec<String> {
        KEYS.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn bearer_header_api_key_and_query_extract_identically() {
        let t = "tok-123";
        let from_bearer = extract_token(
            &headers(&[("authorization", &format!("Bearer {t}"))]),
            &[],
            &keys(),
        );
        let from_api_key = extract_token(&headers(&[("x-api-key", t)]), &[], &keys());
        let from_query = extract_token(
            &[],
            &[("authorization".to_string(), t.to_string())],
            &keys(),
        );

        assert_eq!(from_bearer.as_deref(), Some(t));
        assert_eq!(from_api_key.as_deref(), Some(t));
        assert_eq!(from_query.as_deref(), Some(t));
    }

    #[test]
    fn header_order_follows_configured_keys() {
        let found = extract_token(
            &headers(&[("x-api-key", "second"), ("authorization", "first")]),
            &[],
            &keys(),
        );
        assert_eq!(found.as_deref(), Some("first"));
    }

    #[test]
    fn headers_win_over_query() {
        let found = extract_token(
            &headers(&[("x-api-key", "from-header")]),
            &[("authorization".to_string(), "from-query".to_string())],
            &keys(),
        );
        assert_eq!(found.as_deref(), Some("from-header"));
    }

    #[test]
    fn empty_values_are_skipped() {
        let found = extract_token(
            &headers(&[("authorization", "")]),
            &[("x-api-key".to_string(), "via-query".to_string())],
            &keys(),
        );
        assert_eq!(found.as_deref(), Some("via-query"));
    }

    #[test]
    fn nothing_found_is_none() {
        assert_eq!(extract_token(&[], &[], &keys()), None);
    }
}

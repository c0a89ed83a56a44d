//! The application object.
//!
//! Owns the configuration, the service catalog, the token store, the
//! request-id generator and the JWT wiring. Services are registered at
//! startup; `into_router()` freezes everything into the shared pipeline
//! state and produces the axum router that `run()` serves.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use axum::routing::post;
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use gantry_auth::{AuthError, BlacklistConfig, JwtManager, TokenPair};
use gantry_core::service::Service;
use gantry_core::{parse_duration, Claims, RequestIdGenerator};
use gantry_crypto::EncryptionResolver;
use gantry_store::{DiskStore, MemoryStore, RedisStore, StoreError, TokenStore};

use crate::config::{parse_size, GantryConfig};
use crate::pipeline::{dispatch, JwtMode, PipelineState};
use crate::registry::{RegistryError, ServiceRegistry};

const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Application-level failures.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// Service registration failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Token-store failure surfaced to the caller.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// JWT operation failure.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Socket binding or serving failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The gantry application.
pub struct App {
    config: GantryConfig,
    registry: ServiceRegistry,
    store: Arc<dyn TokenStore>,
    rid: Arc<RequestIdGenerator>,
    jwt_mode: JwtMode,
}

impl App {
    /// Build the application: select and connect the token-store backend
    /// per `token.validation.cache_strategy`.
    ///
    /// When validation is disabled the in-memory backend is used
    /// regardless, so the blacklist and principal lookups stay wired.
    pub async fn new(config: GantryConfig) -> Result<Self, AppError> {
        let store: Arc<dyn TokenStore> = if !config.token.validation.enabled {
            Arc::new(MemoryStore::new(config.cache.memory.clone()))
        } else {
            match config.token.validation.cache_strategy.as_str() {
                "memory" => Arc::new(MemoryStore::new(config.cache.memory.clone())),
                "disk" => Arc::new(DiskStore::open(config.cache.disk.clone())?),
                "redis" => Arc::new(RedisStore::connect(config.cache.redis.clone()).await?),
                other => {
                    return Err(AppError::Config(format!(
                        "unknown token cache_strategy: {other}"
                    )));
                }
            }
        };

        info!(
            strategy = %config.token.validation.cache_strategy,
            validation = config.token.validation.enabled,
            "token store initialised"
        );

        Ok(Self {
            config,
            registry: ServiceRegistry::new(),
            store,
            rid: Arc::new(RequestIdGenerator::new()),
            jwt_mode: JwtMode::Disabled,
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &GantryConfig {
        &self.config
    }

    /// The shared token store.
    pub fn store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.store)
    }

    /// Register a service descriptor.
    pub fn register(&self, service: Service) -> Result<(), AppError> {
        self.registry.register(service)?;
        Ok(())
    }

    /// Require a valid, unrevoked JWT on every request.
    pub fn use_jwt(&mut self) {
        self.jwt_mode = JwtMode::Required;
    }

    /// Attach claims when a valid JWT is present; reject only revoked
    /// tokens.
    pub fn use_optional_jwt(&mut self) {
        self.jwt_mode = JwtMode::Optional;
    }

    /// A JWT manager over this application's configuration and store.
    pub fn jwt_manager(&self) -> JwtManager {
        JwtManager::new(
            self.config.token.jwt.clone(),
            BlacklistConfig {
                enabled: self.config.token.validation.enabled,
                key_prefix: self.config.token.validation.cache_key_prefix.clone(),
            },
            Arc::clone(&self.store),
        )
    }

    /// Issue an access/refresh pair (see [`JwtManager::issue`]).
    pub fn issue_tokens(
        &self,
        user_id: &str,
        username: &str,
        email: &str,
        role: &str,
        extra: Option<std::collections::HashMap<String, serde_json::Value>>,
    ) -> Result<TokenPair, AppError> {
        Ok(self.jwt_manager().issue(user_id, username, email, role, extra)?)
    }

    /// Validate a JWT and return its claims.
    pub fn validate_jwt(&self, token: &str) -> Result<Claims, AppError> {
        Ok(self.jwt_manager().validate(token)?)
    }

    /// Refresh a token pair from a refresh token.
    pub fn refresh_jwt(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        Ok(self.jwt_manager().refresh(refresh_token)?)
    }

    /// Revoke a token (blacklist it until its natural expiry).
    pub async fn revoke_jwt(&self, token: &str) -> Result<(), AppError> {
        Ok(self.jwt_manager().revoke(token).await?)
    }

    /// Store principal attributes for a bearer token.
    ///
    /// A no-op when token validation is disabled. Write failures are
    /// surfaced to the caller.
    pub async fn set_token<T: serde::Serialize>(
        &self,
        token: &str,
        data: &T,
    ) -> Result<(), AppError> {
        if !self.config.token.validation.enabled {
            return Ok(());
        }
        let blob = serde_json::to_vec(data)
            .map_err(|e| AppError::Config(format!("failed to serialize token data: {e}")))?;
        let key = self.token_key(token);
        self.store.put(&key, &blob, None).await?;
        Ok(())
    }

    /// Remove a bearer token (logout).
    pub async fn remove_token(&self, token: &str) -> Result<(), AppError> {
        if !self.config.token.validation.enabled {
            return Ok(());
        }
        let key = self.token_key(token);
        self.store.delete(&key).await?;
        Ok(())
    }

    /// Fetch the principal blob stored for a bearer token.
    pub async fn token_data(&self, token: &str) -> Result<Vec<u8>, AppError> {
        if !self.config.token.validation.enabled {
            return Err(AppError::Config("token validation is not enabled".to_string()));
        }
        let key = self.token_key(token);
        Ok(self.store.get(&key).await?)
    }

    fn token_key(&self, token: &str) -> String {
        format!("{}{}", self.config.token.validation.cache_key_prefix, token)
    }

    /// Freeze the application into an axum router.
    pub fn into_router(self) -> Router {
        let body_limit = parse_size(&self.config.server.body_limit).unwrap_or_else(|| {
            warn!(
                value = %self.config.server.body_limit,
                "invalid server.body_limit, using 4MB"
            );
            DEFAULT_BODY_LIMIT
        });

        let prefix = self.config.service_prefix();
        let request_timeout = parse_duration(&self.config.server.request_timeout);
        let concurrency = self.config.server.concurrency;

        let jwt = JwtManager::new(
            self.config.token.jwt.clone(),
            BlacklistConfig {
                enabled: self.config.token.validation.enabled,
                key_prefix: self.config.token.validation.cache_key_prefix.clone(),
            },
            Arc::clone(&self.store),
        );
        let resolver = EncryptionResolver::new(self.config.encryption.clone());

        let state = Arc::new(PipelineState {
            config: self.config,
            registry: self.registry,
            store: self.store,
            jwt,
            resolver,
            rid: self.rid,
            jwt_mode: self.jwt_mode,
            body_limit,
        });

        let mut router = Router::new()
            .route(&format!("{prefix}/{{name}}"), post(dispatch))
            .with_state(state);

        if let Some(timeout) = request_timeout {
            router = router.layer(TimeoutLayer::new(timeout));
        }
        if concurrency > 0 {
            router = router.layer(GlobalConcurrencyLimitLayer::new(concurrency));
        }
        router
    }

    /// Serve until ctrl-c, then close the store.
    pub async fn run(self) -> Result<(), AppError> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let store = Arc::clone(&self.store);
        let router = self.into_router();

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(address = %addr, "server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
            })
            .await?;

        if let Err(e) = store.close().await {
            warn!(error = %e, "failed to close token store");
        }
        Ok(())
    }

    /// Close backend resources without serving (tests, CLI tools).
    pub async fn close(&self) -> Result<(), AppError> {
        self.store.close().await?;
        Ok(())
    }
}

/// Mint an opaque bearer token (uppercase hex, no hyphens) for
/// applications that pair the token store with non-JWT tokens.
pub fn new_opaque_token() -> String {
    uuid::Uuid::new_v4().simple().to_string().to_uppercase()
}

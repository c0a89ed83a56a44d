//! Service registry, request pipeline and HTTP runtime for the gantry
//! service framework.
//!
//! An application registers named services with typed handlers, then the
//! dispatcher runs each `POST <prefix>/<name>` request through the
//! authentication, permission, decryption, parsing, mock and response
//! phases described in the crate-level modules.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use garde::Validate;
//! use gantry_core::{HandlerResult, Service, ServiceContext};
//! use gantry_server::{App, GantryConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize, Validate, Default)]
//! struct GetUserInput {
//!     #[garde(length(min = 1))]
//!     id: String,
//! }
//!
//! #[derive(Debug, Serialize, Default)]
//! struct GetUserOutput {
//!     id: String,
//!     name: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let app = App::new(GantryConfig::default()).await?;
//! app.register(
//!     Service::new("get_user", "Get user").handler(
//!         |_ctx: ServiceContext, input: GetUserInput| async move {
//!             Ok(GetUserOutput { id: input.id, name: "alice".into() })
//!         },
//!     ),
//! )?;
//! app.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod logging;
pub mod mock;
pub mod pipeline;
pub mod registry;

pub use app::{new_opaque_token, App, AppError};
pub use config::{ConfigError, GantryConfig};
pub use logging::{LogOutput, LogRotation, LoggingConfig, LoggingGuard};
pub use mock::MockConfig;
pub use pipeline::JwtMode;
pub use registry::{RegistryError, ServiceRegistry};

pub use gantry_auth::{JwtConfig, JwtManager, TokenPair};
pub use gantry_core::{
    Envelope, Handler, HandlerResult, ParamSource, PermissionConfig, PermissionLogic,
    PermissionOperator, PermissionRule, Reply, Service, ServiceContext,
};
pub use gantry_crypto::EncryptionConfig;
pub use gantry_store::TokenStore;

// Input types derive `garde::Validate`; re-exported so applications need
// no separate dependency pin.
pub use garde;


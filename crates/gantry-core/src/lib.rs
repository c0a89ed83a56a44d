//! Core types for the gantry service framework.
//!
//! This crate holds everything the other gantry crates agree on: the
//! response envelope, the unified pipeline error, bearer-token claims,
//! the per-request context, permission rule shapes, request-id
//! generation and the typed-handler adaptation that turns
//! `async fn(ctx, In) -> Result<Out, Reply>` functions into a uniform
//! dispatchable form.

pub mod claims;
pub mod context;
pub mod duration;
pub mod envelope;
pub mod error;
pub mod params;
pub mod permission;
pub mod rid;
pub mod service;

pub use claims::Claims;
pub use context::ServiceContext;
pub use duration::parse_duration;
pub use envelope::{Envelope, HandlerResult, Reply};
pub use error::{Error, ErrorKind, Result};
pub use params::{ParamSource, RequestSources};
pub use permission::{PermissionConfig, PermissionLogic, PermissionOperator, PermissionRule};
pub use rid::RequestIdGenerator;
pub use service::{Handler, Service};

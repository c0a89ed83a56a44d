//! Service descriptors and typed handler adaptation.
//!
//! A service is registered once at startup with a name, documentation
//! metadata, dispatch flags and a typed handler. The typed handler is
//! erased into a uniform function over `(ServiceContext, RequestSources)`
//! so the dispatcher stays monomorphic; input assembly, validation and
//! output serialization happen inside the adapter where the concrete
//! types are still known.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::ServiceContext;
use crate::envelope::{HandlerResult, Reply};
use crate::params::{assemble_input, ParamSource, RequestSources};
use crate::permission::PermissionConfig;

type ErasedFn = Arc<
    dyn Fn(
            ServiceContext,
            RequestSources,
            Arc<HashMap<String, ParamSource>>,
        ) -> BoxFuture<'static, Result<Value, Reply>>
        + Send
        + Sync,
>;

type ShapeFn = Arc<dyn Fn() -> Value + Send + Sync>;

type ProbeFn = Arc<
    dyn Fn(RequestSources, Arc<HashMap<String, ParamSource>>) -> Result<(), Reply> + Send + Sync,
>;

/// Type-erased service handler with its output shape witness.
#[derive(Clone)]
pub struct Handler {
    func: ErasedFn,
    probe: ProbeFn,
    output_shape: Option<ShapeFn>,
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("has_output_shape", &self.output_shape.is_some())
            .finish()
    }
}

impl Handler {
    /// Adapt a typed `async fn(ctx, input) -> Result<output, Reply>`.
    ///
    /// The adapter assembles and validates the input from the request
    /// sources, invokes the function and serializes its output. Input
    /// types derive `Serialize`, `Deserialize`, `Default` and
    /// `garde::Validate`; output types derive `Serialize` and `Default`
    /// (the default instance is the shape witness for mock generation).
    pub fn typed<I, O, F, Fut>(func: F) -> Self
    where
        I: DeserializeOwned + Serialize + Default + garde::Validate + Send + 'static,
        I::Context: Default,
        O: Serialize + Default + Send + 'static,
        F: Fn(ServiceContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<O>> + Send + 'static,
    {
        let func = Arc::new(func);
        Self {
            func: Arc::new(move |ctx, sources, hints| {
                let func = Arc::clone(&func);
                Box::pin(async move {
                    let input: I = assemble_input(&sources, &hints)?;
                    let output = func(ctx, input).await?;
                    serde_json::to_value(output)
                        .map_err(|e| Reply::internal("Failed to serialize response").with_detail(e.to_string()))
                }) as BoxFuture<'static, Result<Value, Reply>>
            }),
            probe: Arc::new(|sources, hints| {
                assemble_input::<I>(&sources, &hints).map(|_| ())
            }),
            output_shape: Some(Arc::new(|| {
                serde_json::to_value(O::default()).unwrap_or(Value::Null)
            })),
        }
    }

    /// Invoke the handler with the descriptor's source hints.
    pub fn call(
        &self,
        ctx: ServiceContext,
        sources: RequestSources,
        hints: Arc<HashMap<String, ParamSource>>,
    ) -> BoxFuture<'static, Result<Value, Reply>> {
        (self.func)(ctx, sources, hints)
    }

    /// Assemble and validate the input without invoking the function.
    ///
    /// The mock path uses this so input parsing and validation still run
    /// when the user handler is substituted.
    pub fn validate_input(
        &self,
        sources: RequestSources,
        hints: Arc<HashMap<String, ParamSource>>,
    ) -> Result<(), Reply> {
        (self.probe)(sources, hints)
    }

    /// Serialized default instance of the output type, used as the shape
    /// witness for mock generation. `None` means mock substitution is
    /// skipped for this service.
    pub fn output_shape(&self) -> Option<Value> {
        self.output_shape.as_ref().map(|f| f())
    }
}

/// A named, immutable service registered at startup.
#[derive(Debug, Clone)]
pub struct Service {
    /// Unique identifier, used as the URL path segment.
    pub name: String,
    /// Human-readable name (documentation metadata).
    pub display_name: String,
    /// Longer description (documentation metadata).
    pub description: String,
    /// Group label, used by three-tier configuration resolution.
    pub group: String,
    /// Sort key for documentation ordering.
    pub sort_key: i32,
    /// Bypass token extraction and token-store validation.
    pub skip_auth: bool,
    /// Write handler output verbatim instead of wrapping it.
    pub return_raw: bool,
    /// Roles allowed to call this service; `None` means unrestricted.
    pub allowed_roles: Option<Vec<String>>,
    /// Rule-based permission configuration.
    pub permission: Option<PermissionConfig>,
    /// Per-field source hints for input assembly.
    pub param_sources: HashMap<String, ParamSource>,
    /// The erased handler.
    pub handler: Option<Handler>,
}

impl Service {
    /// Descriptor with the mandatory name and display name.
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: String::new(),
            group: String::new(),
            sort_key: 0,
            skip_auth: false,
            return_raw: false,
            allowed_roles: None,
            permission: None,
            param_sources: HashMap::new(),
            handler: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the group label.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Set the documentation sort key.
    #[must_use]
    pub fn sort_key(mut self, sort_key: i32) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// Bypass authentication for this service.
    #[must_use]
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Write handler output verbatim instead of wrapping it.
    #[must_use]
    pub fn return_raw(mut self) -> Self {
        self.return_raw = true;
        self
    }

    /// Restrict the service to the given roles.
    #[must_use]
    pub fn allowed_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Attach a rule-based permission configuration.
    #[must_use]
    pub fn permission(mut self, permission: PermissionConfig) -> Self {
        self.permission = Some(permission);
        self
    }

    /// Hint the source of an input field.
    #[must_use]
    pub fn param_source(mut self, field: impl Into<String>, source: ParamSource) -> Self {
        self.param_sources.insert(field.into(), source);
        self
    }

    /// Attach the typed handler.
    #[must_use]
    pub fn handler<I, O, F, Fut>(mut self, func: F) -> Self
    where
        I: DeserializeOwned + Serialize + Default + garde::Validate + Send + 'static,
        I::Context: Default,
        O: Serialize + Default + Send + 'static,
        F: Fn(ServiceContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<O>> + Send + 'static,
    {
        self.handler = Some(Handler::typed(func));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rid::RequestIdGenerator;
    use garde::Validate;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, Validate, Default)]
    struct EchoInput {
        #[garde(skip)]
        id: String,
    }

    #[derive(Debug, Serialize, Default)]
    struct EchoOutput {
        id: String,
        greeting: String,
    }

    fn test_ctx() -> ServiceContext {
        ServiceContext::new("echo", "", Arc::new(RequestIdGenerator::with_node_id(3)))
    }

    #[tokio::test]
    async fn typed_handler_roundtrip() {
        let handler = Handler::typed(|_ctx: ServiceContext, input: EchoInput| async move {
            Ok(EchoOutput {
                greeting: format!("hello {}", input.id),
                id: input.id,
            })
        });

        let sources = RequestSources {
            body: br#"{"id":"1"}"#.to_vec(),
            ..Default::default()
        };
        let value = handler
            .call(test_ctx(), sources, Arc::new(HashMap::new()))
            .await
            .unwrap();
        assert_eq!(value["id"], "1");
        assert_eq!(value["greeting"], "hello 1");
    }

    #[tokio::test]
    async fn handler_reply_propagates() {
        let handler = Handler::typed(|_ctx: ServiceContext, _input: EchoInput| async move {
            Err::<EchoOutput, _>(Reply::new(418, "teapot"))
        });

        let sources = RequestSources {
            body: br#"{"id":"1"}"#.to_vec(),
            ..Default::default()
        };
        let err = handler
            .call(test_ctx(), sources, Arc::new(HashMap::new()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 418);
    }

    #[test]
    fn output_shape_is_the_default_instance() {
        let handler = Handler::typed(|_ctx: ServiceContext, input: EchoInput| async move {
            Ok(EchoOutput {
                id: input.id,
                greeting: String::new(),
            })
        });
        let shape = handler.output_shape().unwrap();
        assert_eq!(shape["id"], "");
        assert_eq!(shape["greeting"], "");
    }

    #[test]
    fn builder_accumulates_metadata() {
        let svc = Service::new("get_user", "Get user")
            .description("Fetch a user by id")
            .group("user")
            .sort_key(10)
            .skip_auth()
            .allowed_roles(["admin"])
            .param_source("trace", ParamSource::Header("x-trace-id".into()));

        assert_eq!(svc.name, "get_user");
        assert!(svc.skip_auth);
        assert!(!svc.return_raw);
        assert_eq!(svc.allowed_roles.as_deref(), Some(&["admin".to_string()][..]));
        assert!(svc.param_sources.contains_key("trace"));
        assert!(svc.handler.is_none());
    }
}

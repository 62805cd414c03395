//! Method matching and the per-route builder.

use crate::handler::{BoxedHandler, Handler};
use crate::validate::SchemaMap;
use http::Method;
use std::fmt;
use std::sync::Arc;

/// The method a handler set answers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    /// Every method.
    All,
    Only(Method),
}

impl RouteMethod {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            RouteMethod::All => true,
            RouteMethod::Only(expected) => expected == method,
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteMethod::All => f.write_str("ALL"),
            RouteMethod::Only(method) => f.write_str(method.as_str()),
        }
    }
}

impl From<Method> for RouteMethod {
    fn from(method: Method) -> Self {
        RouteMethod::Only(method)
    }
}

/// One method of one route: its handlers, in order, and an optional schema.
///
/// ```
/// use sprig::router::get;
/// use sprig::validate::{schema, SchemaMap};
/// use sprig::{endpoint_fn, handler_fn};
///
/// # #[derive(serde::Deserialize, serde::Serialize)]
/// # struct Search { q: String }
/// let route = get(handler_fn(|ctx, next| Box::pin(async move { next.run(ctx).await })))
///     .then(endpoint_fn(|ctx| Box::pin(async move { ctx.text("found") })))
///     .schema(SchemaMap::new().query(schema::<Search>()));
/// # let _ = route;
/// ```
pub struct MethodRoute {
    pub(crate) method: RouteMethod,
    pub(crate) handlers: Vec<BoxedHandler>,
    pub(crate) schema: Option<SchemaMap>,
}

impl MethodRoute {
    pub fn new<H: Handler + 'static>(method: RouteMethod, handler: H) -> Self {
        Self { method, handlers: vec![Arc::new(handler)], schema: None }
    }

    /// Appends another handler, run when the previous one calls `next`.
    #[must_use]
    pub fn then<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Declares the schema requests to this route are validated against.
    #[must_use]
    pub fn schema(mut self, schema: SchemaMap) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl fmt::Debug for MethodRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRoute")
            .field("method", &self.method)
            .field("handlers", &self.handlers.len())
            .field("schema", &self.schema)
            .finish()
    }
}

macro_rules! method_route {
    ($fn_name:ident, $method:ident) => {
        pub fn $fn_name<H: Handler + 'static>(handler: H) -> MethodRoute {
            MethodRoute::new(RouteMethod::Only(Method::$method), handler)
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(head, HEAD);
method_route!(options, OPTIONS);
method_route!(connect, CONNECT);
method_route!(patch, PATCH);
method_route!(trace, TRACE);

/// Answers every method.
pub fn all<H: Handler + 'static>(handler: H) -> MethodRoute {
    MethodRoute::new(RouteMethod::All, handler)
}

//! The router: registration, sub-router mounting and dispatch.
//!
//! A [`RouterBuilder`] collects routes and the configuration of its own scope (middleware, guard schema,
//! decorators, state and derivations). [`register`](RouterBuilder::register) mounts another builder under a path
//! prefix; the mounted routes keep the scope of the builder that declared them, so its middleware, guard and
//! injections apply to them and only to them.
//!
//! ```
//! use sprig::router::{get, Router};
//! use sprig::endpoint_fn;
//!
//! let router = Router::builder()
//!     .route("/hello", get(endpoint_fn(|ctx| Box::pin(async move { ctx.text("world") }))))
//!     .register("/books", |books: sprig::RouterBuilder| {
//!         books.route("/:id", get(endpoint_fn(|ctx| {
//!             Box::pin(async move {
//!                 let id = ctx.param("id").unwrap_or_default().to_string();
//!                 ctx.text(id)
//!             })
//!         })))
//!     })
//!     .build()
//!     .unwrap();
//! # let _ = router;
//! ```

mod method;
mod pattern;
pub(crate) mod scope;
mod tree;

pub use method::{all, connect, delete, get, head, options, patch, post, put, trace, MethodRoute, RouteMethod};
pub use scope::{Decorators, States};

use crate::body::{RequestBody, ResponseBody};
use crate::chain::{Exhausted, Next};
use crate::context::RequestContext;
use crate::error::{self, RouterError};
use crate::handler::{BoxedHandler, Handler};
use crate::request::RouterRequest;
use crate::responder::plain_text;
use crate::validate::{validate_request, Channel, SchemaMap, Validated};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use scope::{Scope, ScopeId};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use tree::{primary, Node, PathTrie, Target};

const DEFAULT_ORIGIN: &str = "http://localhost";

type NotFound = Arc<dyn Fn() -> Response<ResponseBody> + Send + Sync>;

#[derive(Clone)]
struct RouterOptions {
    not_found: NotFound,
    origin: String,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self { not_found: Arc::new(|| plain_text(StatusCode::NOT_FOUND, "404 not found")), origin: DEFAULT_ORIGIN.to_string() }
    }
}

/// Collects routes and configuration, then freezes them into a [`Router`].
pub struct RouterBuilder {
    trie: PathTrie,
    /// `scopes[0]` is this builder's own scope, mounted builders' scopes follow.
    scopes: Vec<Scope>,
    options: RouterOptions,
    error: Option<RouterError>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { trie: PathTrie::default(), scopes: vec![Scope::default()], options: RouterOptions::default(), error: None }
    }

    /// An empty builder that starts from a copy of this builder's own configuration.
    pub fn fork(&self) -> RouterBuilder {
        Self {
            trie: PathTrie::default(),
            scopes: vec![self.own_scope().clone()],
            options: self.options.clone(),
            error: None,
        }
    }

    /// Registers `route` at `path`. Registering the same method and path again appends handlers.
    #[must_use]
    pub fn route(mut self, path: &str, route: MethodRoute) -> Self {
        let MethodRoute { method, handlers, schema } = route;
        trace!(%method, path, handlers = handlers.len(), "registering route");
        let target = Target::Method { method, handlers, scope: ScopeId::ROOT };
        let result = self.trie.insert(path, schema, target);
        self.record(result);
        self
    }

    /// Adds middleware to this router. It wraps every route this router matches, in registration order.
    #[must_use]
    pub fn middleware<H: Handler + 'static>(mut self, handler: H) -> Self {
        self.own_scope_mut().middleware.push(Arc::new(handler));
        self
    }

    /// Declares a schema every route of this router is validated against, on top of the route's own schema.
    #[must_use]
    pub fn guard(mut self, schema: SchemaMap) -> Self {
        let scope = self.own_scope_mut();
        scope.guard = scope.guard.merge(&schema);
        self
    }

    /// Copies `value` into the context of every request this router matches.
    #[must_use]
    pub fn decorate<V: Clone + Send + Sync + 'static>(self, key: impl Into<String>, value: V) -> Self {
        self.decorate_all(Decorators::new().with(key, value))
    }

    #[must_use]
    pub fn decorate_all(mut self, decorators: Decorators) -> Self {
        self.own_scope_mut().decorate(decorators);
        self
    }

    /// Calls `init` once per request and puts the result in the context.
    #[must_use]
    pub fn state<T, F>(self, key: impl Into<String>, init: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.state_all(States::new().with(key, init))
    }

    #[must_use]
    pub fn state_all(mut self, states: States) -> Self {
        self.own_scope_mut().state(states);
        self
    }

    /// Computes a field from the context once decorators, state and earlier derivations are in place.
    #[must_use]
    pub fn derive<T, F>(mut self, key: impl Into<String>, derive: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&RequestContext) -> T + Send + Sync + 'static,
    {
        self.own_scope_mut().derive(key.into(), derive);
        self
    }

    /// Mounts the routes of `mount` under `prefix`.
    ///
    /// A closure receives a [`fork`](Self::fork) of this builder, so it inherits this router's middleware,
    /// guard and injections and can add its own. A prebuilt builder keeps its own configuration, with this
    /// router's middleware, guard and injections put around every scope it brings.
    #[must_use]
    pub fn register<M: Mount>(mut self, prefix: &str, mount: M) -> Self {
        let RouterBuilder { trie, scopes, error, .. } = mount.mount(&self);
        if let Some(e) = error {
            self.record(Err(e));
        }

        debug!(prefix, scopes = scopes.len(), "mounting router");
        let scope_offset = self.scopes.len();
        self.scopes.extend(scopes);
        let result = self.trie.graft(prefix, trie, scope_offset);
        self.record(result);
        self
    }

    /// Replaces the response sent when no route answers a request.
    #[must_use]
    pub fn not_found<F>(mut self, not_found: F) -> Self
    where
        F: Fn() -> Response<ResponseBody> + Send + Sync + 'static,
    {
        self.options.not_found = Arc::new(not_found);
        self
    }

    /// The origin relative request paths are resolved against, `http://localhost` by default.
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.options.origin = origin.into();
        self
    }

    /// # Errors
    ///
    /// Fails with the first error met while registering routes, such as an invalid regex constraint.
    pub fn build(self) -> Result<Router, RouterError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let RouterBuilder { trie, scopes, options, .. } = self;
        Ok(Router { inner: Arc::new(RouterInner { trie, scopes, options }) })
    }

    fn own_scope(&self) -> &Scope {
        &self.scopes[ScopeId::ROOT.index()]
    }

    fn own_scope_mut(&mut self) -> &mut Scope {
        &mut self.scopes[ScopeId::ROOT.index()]
    }

    fn record(&mut self, result: Result<(), RouterError>) {
        if let Err(e) = result {
            warn!(cause = %e, "route registration failed");
            self.error.get_or_insert(e);
        }
    }
}

macro_rules! method_shortcut {
    ($fn_name:ident) => {
        #[must_use]
        pub fn $fn_name<H: Handler + 'static>(self, path: &str, handler: H) -> Self {
            self.route(path, $fn_name(handler))
        }
    };
}

impl RouterBuilder {
    method_shortcut!(get);
    method_shortcut!(post);
    method_shortcut!(put);
    method_shortcut!(delete);
    method_shortcut!(patch);
    method_shortcut!(head);
    method_shortcut!(options);
    method_shortcut!(all);
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("scopes", &self.scopes).field("error", &self.error).finish_non_exhaustive()
    }
}

/// Something [`RouterBuilder::register`] can mount.
pub trait Mount {
    fn mount(self, parent: &RouterBuilder) -> RouterBuilder;
}

impl Mount for RouterBuilder {
    fn mount(mut self, parent: &RouterBuilder) -> RouterBuilder {
        for scope in &mut self.scopes {
            scope.inherit(parent.own_scope());
        }
        self
    }
}

impl<F> Mount for F
where
    F: FnOnce(RouterBuilder) -> RouterBuilder,
{
    fn mount(self, parent: &RouterBuilder) -> RouterBuilder {
        self(parent.fork())
    }
}

/// Anything that can be turned into a request for [`Router::request`].
pub trait IntoRequest {
    /// # Errors
    ///
    /// Fails when the input does not form a valid request.
    fn into_request(self, origin: &str) -> Result<Request<RequestBody>, http::Error>;
}

impl IntoRequest for &str {
    fn into_request(self, origin: &str) -> Result<Request<RequestBody>, http::Error> {
        Request::builder().uri(resolve(self, origin)).body(RequestBody::empty())
    }
}

impl IntoRequest for String {
    fn into_request(self, origin: &str) -> Result<Request<RequestBody>, http::Error> {
        self.as_str().into_request(origin)
    }
}

impl<B: Into<RequestBody>> IntoRequest for Request<B> {
    fn into_request(self, _origin: &str) -> Result<Request<RequestBody>, http::Error> {
        Ok(self.map(Into::into))
    }
}

/// Resolves a path against `origin`, dropping empty segments. Absolute URLs are kept as they are.
fn resolve(input: &str, origin: &str) -> String {
    if input.starts_with("http://") || input.starts_with("https://") {
        return input.to_string();
    }
    let (path, rest) = input.find(|c| c == '?' || c == '#').map_or((input, ""), |at| input.split_at(at));
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    format!("{}/{}{rest}", origin.trim_end_matches('/'), segments.join("/"))
}

/// Overrides applied to a request before dispatch.
#[derive(Debug, Default)]
pub struct RequestInit {
    method: Option<Method>,
    headers: HeaderMap,
    body: Option<RequestBody>,
    error: Option<http::Error>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a header. An invalid name or value makes the request fail before dispatch.
    #[must_use]
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(name).map_err(Into::into);
        let value = HeaderValue::try_from(value).map_err(Into::into);
        match (name, value) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            (Err(e), _) | (_, Err(e)) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sends `value` as a JSON body with a JSON content type.
    #[must_use]
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref()).body(bytes),
            Err(e) => {
                warn!(cause = %e, "failed to serialize json request body");
                self
            }
        }
    }

    fn apply(self, mut request: Request<RequestBody>) -> Result<Request<RequestBody>, http::Error> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if let Some(method) = self.method {
            *request.method_mut() = method;
        }
        let mut last_name = None;
        for (name, value) in self.headers {
            let name = match name {
                Some(name) => {
                    request.headers_mut().remove(&name);
                    last_name = Some(name.clone());
                    name
                }
                None => match &last_name {
                    Some(name) => name.clone(),
                    None => continue,
                },
            };
            request.headers_mut().append(name, value);
        }
        if let Some(body) = self.body {
            *request.body_mut() = body;
        }
        Ok(request)
    }
}

/// A registered route, as listed by [`Router::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub method: RouteMethod,
    pub path: String,
    /// Channels validated for this route, guard channels included.
    pub channels: Vec<Channel>,
}

struct RouterInner {
    trie: PathTrie,
    scopes: Vec<Scope>,
    options: RouterOptions,
}

/// A built router. Cloning is cheap, clones share the same routes.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Dispatches a request given as a path, an absolute URL or a full [`Request`].
    pub async fn request<I: IntoRequest>(&self, input: I) -> Response<ResponseBody> {
        self.request_with(input, RequestInit::new()).await
    }

    pub async fn request_with<I: IntoRequest>(&self, input: I, init: RequestInit) -> Response<ResponseBody> {
        match input.into_request(&self.inner.options.origin).and_then(|request| init.apply(request)) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                warn!(cause = %e, "invalid request");
                plain_text(StatusCode::BAD_REQUEST, "Bad Request")
            }
        }
    }

    /// Matches, validates and runs the handler chain for `request`.
    pub async fn dispatch(&self, request: Request<RequestBody>) -> Response<ResponseBody> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let matches = self.inner.trie.search(&method, &path);
        let Some(primary) = primary(&matches) else {
            warn!(%method, %path, "no route matched");
            return self.not_found_response();
        };
        debug!(%method, %path, matched = matches.len(), "route matched");

        let scope = &self.inner.scopes[primary.set.scope.index()];
        let schema = match primary.schema {
            Some(schema) if scope.guard.is_empty() => Cow::Borrowed(schema),
            Some(schema) => Cow::Owned(scope.guard.merge(schema)),
            None => Cow::Borrowed(&scope.guard),
        };

        // Catch-alls alone never answer, so the request is not found and there is nothing to validate.
        let answerable = matches.iter().any(|m| !m.wildcard);
        let mut request = RouterRequest::new(request);
        let validated = if answerable {
            match validate_request(&mut request, &schema).await {
                Ok(validated) => validated,
                Err(e) => {
                    warn!(cause = %e, %method, %path, "request rejected");
                    return e.to_response();
                }
            }
        } else {
            Validated::default()
        };

        let mut ctx = RequestContext::new(self.clone(), request, primary.params.clone(), validated);
        scope.inject(&mut ctx);

        let routes: Vec<BoxedHandler> = matches.iter().flat_map(|m| m.set.handlers.iter().cloned()).collect();
        let exhausted = if answerable { Exhausted::Unanswered } else { Exhausted::NotFound };

        match Next::new(&scope.middleware, &routes, exhausted).run(&mut ctx).await {
            Ok(response) => response,
            Err(e) => error::into_response(&e),
        }
    }

    /// Every route, in registration order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let mut routes: Vec<(usize, RouteInfo)> =
            self.inner.trie.routes().into_iter().flat_map(|(path, node)| self.route_infos(&path, node)).collect();
        routes.sort_by_key(|(score, _)| *score);
        routes.into_iter().map(|(_, info)| info).collect()
    }

    /// The routes registered at exactly `path`, pattern tokens included: `find("/users/:id")` lists the routes
    /// declared as `/users/:id`, while `find("/users/7")` lists nothing.
    pub fn find(&self, path: &str) -> Vec<RouteInfo> {
        let Some(node) = self.inner.trie.find(path).filter(|node| node.is_terminal()) else {
            return Vec::new();
        };
        let path = format!("/{}", pattern::split_routing_path(path).join("/"));
        let mut routes = self.route_infos(&path, node);
        routes.sort_by_key(|(score, _)| *score);
        routes.into_iter().map(|(_, info)| info).collect()
    }

    fn route_infos(&self, path: &str, node: &Node) -> Vec<(usize, RouteInfo)> {
        node.sets()
            .iter()
            .map(|set| {
                let guard = &self.inner.scopes[set.scope.index()].guard;
                let schema = node.schema().map_or_else(|| guard.clone(), |schema| guard.merge(schema));
                let info = RouteInfo { method: set.method.clone(), path: path.to_string(), channels: schema.channels().collect() };
                (set.score, info)
            })
            .collect()
    }

    pub(crate) fn not_found_response(&self) -> Response<ResponseBody> {
        (self.inner.options.not_found)()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes().len())
            .field("origin", &self.inner.options.origin)
            .finish_non_exhaustive()
    }
}

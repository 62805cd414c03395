//! An asynchronous micro HTTP router
//!
//! This crate routes [`http::Request`]s to chains of async handlers. It does not listen on sockets: requests
//! come in through [`Router::dispatch`] or [`Router::request`] and leave as [`http::Response`]s, so it can sit
//! behind any server that speaks the `http` types.
//!
//! # Features
//!
//! - Trie based path matching with named parameters, regex constraints and wildcards
//! - Onion middleware: every handler decides whether and when the rest of the chain runs
//! - Request validation of json, query, headers, cookies and form input before any handler runs
//! - Mountable sub-routers, each with its own middleware, guard schema and injected context fields
//! - Cookie parsing and `Set-Cookie` serialization
//!
//! # Example
//!
//! ```
//! use sprig::router::{get, post};
//! use sprig::validate::{schema, Channel, SchemaMap};
//! use sprig::{endpoint_fn, handler_fn, Router};
//!
//! #[derive(serde::Deserialize, serde::Serialize)]
//! struct NewBook {
//!     title: String,
//! }
//!
//! let router = Router::builder()
//!     .middleware(handler_fn(|ctx, next| {
//!         Box::pin(async move {
//!             let mut response = next.run(ctx).await?;
//!             response.headers_mut().insert("x-powered-by", http::HeaderValue::from_static("sprig"));
//!             Ok(response)
//!         })
//!     }))
//!     .decorate("greeting", String::from("hello"))
//!     .route("/hello", get(endpoint_fn(|ctx| {
//!         Box::pin(async move {
//!             let greeting = ctx.field::<String>("greeting")?.clone();
//!             ctx.text(greeting)
//!         })
//!     })))
//!     .route("/books", post(endpoint_fn(|ctx| {
//!         Box::pin(async move {
//!             let book: NewBook = ctx.valid_as(Channel::Json)?;
//!             ctx.text(book.title)
//!         })
//!     }))
//!     .schema(SchemaMap::new().json(schema::<NewBook>())))
//!     .build()
//!     .expect("routes should be valid");
//! # let _ = router;
//! ```

mod body;
mod chain;
mod context;
mod handler;
mod request;
mod responder;

pub mod cookie;
pub mod error;
pub mod router;
pub mod validate;

pub use body::RequestBody;
pub use body::ResponseBody;
pub use chain::Next;
pub use context::RequestContext;
pub use error::BoxError;
pub use error::HttpError;
pub use handler::endpoint_fn;
pub use handler::handler_fn;
pub use handler::EndpointFn;
pub use handler::FnHandler;
pub use handler::Handler;
pub use handler::ResponseResult;
pub use request::{FormData, FormFile, FormValue, PathParams, QueryMap, QueryValue, RouterRequest};
pub use responder::{Html, Json, Responder};
pub use router::{Decorators, IntoRequest, Mount, RequestInit, RouteInfo, Router, RouterBuilder, States};

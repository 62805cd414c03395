//! Errors raised while routing, validating and answering a request.
//!
//! Handlers return [`BoxError`], so any error type can travel up the chain. When a chain fails, the router
//! inspects the error once at the dispatch boundary:
//!
//! - [`HttpError`] is answered with its own status and message
//! - [`ValidationError`] and [`BodyError`] are client mistakes and become `400 Bad Request`
//! - [`Misconfiguration`] is a wiring mistake in the application and becomes a logged `500`
//! - everything else becomes a logged `500 Internal Server Error` without leaking its details

use crate::body::ResponseBody;
use crate::cookie::CookieError;
use crate::responder::{json_response, plain_text};
use crate::validate::{Channel, Issue};
use http::{Response, StatusCode};
use std::error::Error;
use thiserror::Error;
use tracing::{error, warn};

pub type BoxError = Box<dyn Error + Send + Sync>;

/// An error that already knows the status and message it should be answered with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Raised when an incoming request does not satisfy the schema declared for its route.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid {channel}, unsupported content type: {found}")]
    UnsupportedContentType { channel: Channel, found: String },

    #[error("Invalid json, malformed JSON: {reason}")]
    MalformedJson { reason: String },

    #[error("Invalid form, malformed body: {reason}")]
    MalformedForm { reason: String },

    #[error("Invalid headers, cookie not set")]
    MissingCookie,

    #[error("Invalid body: {source}")]
    Body {
        #[from]
        source: BodyError,
    },

    #[error("Invalid {channel}, rejected by schema")]
    Rejected { channel: Channel, issues: Vec<Issue> },
}

impl ValidationError {
    pub fn unsupported_content_type(channel: Channel, found: Option<&str>) -> Self {
        Self::UnsupportedContentType { channel, found: found.unwrap_or("none").to_string() }
    }

    pub fn malformed_json<S: ToString>(reason: S) -> Self {
        Self::MalformedJson { reason: reason.to_string() }
    }

    pub fn malformed_form<S: ToString>(reason: S) -> Self {
        Self::MalformedForm { reason: reason.to_string() }
    }

    pub fn rejected(channel: Channel, issues: Vec<Issue>) -> Self {
        Self::Rejected { channel, issues }
    }

    /// The schema issues, empty unless the schema itself rejected the input.
    pub fn issues(&self) -> &[Issue] {
        match self {
            Self::Rejected { issues, .. } => issues,
            _ => &[],
        }
    }

    pub(crate) fn to_response(&self) -> Response<ResponseBody> {
        match self {
            Self::Rejected { issues, .. } => json_response(StatusCode::BAD_REQUEST, issues),
            other => plain_text(StatusCode::BAD_REQUEST, other.to_string()),
        }
    }
}

/// Raised while reading or decoding the request body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("failed to read body: {source}")]
    Read { source: BoxError },

    #[error("body stream failed on an earlier read")]
    Consumed,

    #[error("body is not valid utf-8")]
    NotUtf8,

    #[error("invalid json body: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid form body: {reason}")]
    Form { reason: String },
}

impl BodyError {
    pub(crate) fn read<E: Into<BoxError>>(source: E) -> Self {
        Self::Read { source: source.into() }
    }

    pub(crate) fn form<S: ToString>(reason: S) -> Self {
        Self::Form { reason: reason.to_string() }
    }
}

/// A mistake in how the application wired its routes, not in the incoming request.
#[derive(Debug, Error)]
pub enum Misconfiguration {
    #[error("handler chain completed without producing a response, the last route handler must not call next")]
    UnansweredChain,

    #[error("channel '{0}' was read but no guard or route schema declares it")]
    UndeclaredChannel(Channel),

    #[error("context field '{key}' is missing or holds a different type")]
    MissingField { key: String },

    #[error("cookie can not be serialized: {source}")]
    Cookie {
        #[from]
        source: CookieError,
    },

    #[error("validated {channel} can not be converted: {source}")]
    ValidatedShape { channel: Channel, source: serde_json::Error },
}

impl Misconfiguration {
    pub(crate) fn missing_field<S: Into<String>>(key: S) -> Self {
        Self::MissingField { key: key.into() }
    }
}

/// Raised while building a router.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid route pattern '{token}': {source}")]
    InvalidPattern {
        token: String,
        #[source]
        source: Box<regex::Error>,
    },
}

impl RouterError {
    pub(crate) fn invalid_pattern<S: Into<String>>(token: S, source: regex::Error) -> Self {
        Self::InvalidPattern { token: token.into(), source: Box::new(source) }
    }
}

/// Turns the error that escaped a handler chain into the response sent back to the caller.
pub(crate) fn into_response(err: &BoxError) -> Response<ResponseBody> {
    if let Some(e) = err.downcast_ref::<HttpError>() {
        return plain_text(e.status, e.message.clone());
    }

    if let Some(e) = err.downcast_ref::<ValidationError>() {
        warn!(cause = %e, "request rejected");
        return e.to_response();
    }

    if let Some(e) = err.downcast_ref::<BodyError>() {
        warn!(cause = %e, "failed to read request body");
        return plain_text(StatusCode::BAD_REQUEST, e.to_string());
    }

    if let Some(e) = err.downcast_ref::<Misconfiguration>() {
        error!(cause = %e, "route is misconfigured");
        return plain_text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    error!(cause = %err, "handler failed");
    plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

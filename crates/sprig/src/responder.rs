//! Conversion of handler results into HTTP responses.
//!
//! The [`Responder`] trait decides how a value becomes a response. [`RequestContext::respond`] feeds its result
//! through the context so pending cookies, headers and status are merged in.
//!
//! [`RequestContext::respond`]: crate::RequestContext::respond

use crate::body::ResponseBody;
use crate::context::RequestContext;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use tracing::error;

pub(crate) const TEXT_PLAIN_UTF_8: &str = "text/plain; charset=UTF-8";
pub(crate) const APPLICATION_JSON_UTF_8: &str = "application/json; charset=UTF-8";
pub(crate) const TEXT_HTML_UTF_8: &str = "text/html; charset=UTF-8";

/// A trait for types that can be converted into HTTP responses.
pub trait Responder {
    fn response_to(self, ctx: &RequestContext) -> Response<ResponseBody>;
}

/// Serializes the inner value as a JSON response.
#[derive(Debug, Clone, Copy)]
pub struct Json<T>(pub T);

/// Sends the inner value with an HTML content type.
#[derive(Debug, Clone, Copy)]
pub struct Html<T>(pub T);

impl<T: Responder, E: Responder> Responder for Result<T, E> {
    fn response_to(self, ctx: &RequestContext) -> Response<ResponseBody> {
        match self {
            Ok(t) => t.response_to(ctx),
            Err(e) => e.response_to(ctx),
        }
    }
}

/// `None` answers with the router's not found response.
impl<T: Responder> Responder for Option<T> {
    fn response_to(self, ctx: &RequestContext) -> Response<ResponseBody> {
        match self {
            Some(t) => t.response_to(ctx),
            None => ctx.not_found(),
        }
    }
}

impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn response_to(self, _ctx: &RequestContext) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, ctx: &RequestContext) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.response_to(ctx);
        *response.status_mut() = status;
        response
    }
}

impl<T: Responder> Responder for (T, StatusCode) {
    fn response_to(self, ctx: &RequestContext) -> Response<ResponseBody> {
        let (responder, status) = self;
        (status, responder).response_to(ctx)
    }
}

impl<T: Responder> Responder for Box<T> {
    fn response_to(self, ctx: &RequestContext) -> Response<ResponseBody> {
        (*self).response_to(ctx)
    }
}

impl Responder for () {
    fn response_to(self, _ctx: &RequestContext) -> Response<ResponseBody> {
        Response::new(ResponseBody::empty())
    }
}

impl Responder for &'static str {
    fn response_to(self, _ctx: &RequestContext) -> Response<ResponseBody> {
        with_content_type(StatusCode::OK, TEXT_PLAIN_UTF_8, ResponseBody::from(self))
    }
}

impl Responder for String {
    fn response_to(self, _ctx: &RequestContext) -> Response<ResponseBody> {
        with_content_type(StatusCode::OK, TEXT_PLAIN_UTF_8, ResponseBody::from(self))
    }
}

impl<T: Serialize> Responder for Json<T> {
    fn response_to(self, _ctx: &RequestContext) -> Response<ResponseBody> {
        json_response(StatusCode::OK, &self.0)
    }
}

impl<T: Into<ResponseBody>> Responder for Html<T> {
    fn response_to(self, _ctx: &RequestContext) -> Response<ResponseBody> {
        with_content_type(StatusCode::OK, TEXT_HTML_UTF_8, self.0.into())
    }
}

impl Responder for Infallible {
    fn response_to(self, _ctx: &RequestContext) -> Response<ResponseBody> {
        match self {}
    }
}

pub(crate) fn plain_text<B: Into<ResponseBody>>(status: StatusCode, body: B) -> Response<ResponseBody> {
    with_content_type(status, TEXT_PLAIN_UTF_8, body.into())
}

pub(crate) fn json_response<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    match serde_json::to_vec(value) {
        Ok(bytes) => with_content_type(status, APPLICATION_JSON_UTF_8, ResponseBody::from(bytes)),
        Err(e) => {
            error!(cause = %e, "failed to serialize json response");
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn with_content_type(status: StatusCode, content_type: &'static str, body: ResponseBody) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

//! The per-request context every handler receives.
//!
//! A context is built fresh for each dispatch. It exposes the request, the captured path parameters and the
//! validated channels, carries the fields injected by the matched router (decorators, state and derivations),
//! and collects what the response should carry besides its body: cookies, headers and a default status.

use crate::body::ResponseBody;
use crate::cookie::Cookies;
use crate::error::Misconfiguration;
use crate::handler::ResponseResult;
use crate::request::{PathParams, RouterRequest};
use crate::responder::{Html, Json, Responder};
use crate::router::scope::Field;
use crate::router::{IntoRequest, RequestInit, Router};
use crate::validate::{Channel, Validated};
use futures::future::BoxFuture;
use http::header::{AsHeaderName, LOCATION, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

pub struct RequestContext {
    router: Router,
    request: RouterRequest,
    params: PathParams,
    validated: Validated,
    cookies: Cookies,
    headers: HeaderMap,
    status: Option<StatusCode>,
    fields: HashMap<String, Field>,
}

impl RequestContext {
    pub(crate) fn new(router: Router, request: RouterRequest, params: PathParams, validated: Validated) -> Self {
        let cookies = Cookies::from_headers(request.headers());
        Self {
            router,
            request,
            params,
            validated,
            cookies,
            headers: HeaderMap::new(),
            status: None,
            fields: HashMap::new(),
        }
    }

    pub fn req(&self) -> &RouterRequest {
        &self.request
    }

    /// Mutable access, needed to read the body.
    pub fn req_mut(&mut self) -> &mut RouterRequest {
        &mut self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The validated value of `channel`.
    ///
    /// # Errors
    ///
    /// Fails when neither the route nor a guard of its routers declared `channel`.
    pub fn valid(&self, channel: Channel) -> Result<&Value, Misconfiguration> {
        self.validated.get(channel).ok_or(Misconfiguration::UndeclaredChannel(channel))
    }

    /// The validated value of `channel`, deserialized into `T`.
    ///
    /// # Errors
    ///
    /// Fails when `channel` was not declared or its validated value does not fit `T`.
    pub fn valid_as<T: DeserializeOwned>(&self, channel: Channel) -> Result<T, Misconfiguration> {
        let value = self.valid(channel)?;
        T::deserialize(value).map_err(|source| Misconfiguration::ValidatedShape { channel, source })
    }

    /// The field `key` if it holds a `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.fields.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.fields.get_mut(key).and_then(|value| value.downcast_mut::<T>())
    }

    /// Like [`get`](Self::get), for fields the router is known to inject.
    ///
    /// # Errors
    ///
    /// Fails when the field is missing or holds another type.
    pub fn field<T: Any>(&self, key: &str) -> Result<&T, Misconfiguration> {
        self.get(key).ok_or_else(|| Misconfiguration::missing_field(key))
    }

    /// # Errors
    ///
    /// Fails when the field is missing or holds another type.
    pub fn field_mut<T: Any>(&mut self, key: &str) -> Result<&mut T, Misconfiguration> {
        self.get_mut(key).ok_or_else(|| Misconfiguration::missing_field(key))
    }

    /// Adds or replaces field `key`, visible to every handler after this one.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.fields.insert(key.into(), Box::new(value));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub(crate) fn insert_field(&mut self, key: &str, value: Field) {
        self.fields.insert(key.to_string(), value);
    }

    pub fn cookies(&self) -> &Cookies {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut Cookies {
        &mut self.cookies
    }

    /// Sets a response header, replacing earlier values of the same name.
    ///
    /// # Errors
    ///
    /// Fails when `name` or `value` is not a valid header.
    pub fn header<K, V>(&mut self, name: K, value: V) -> Result<(), http::Error>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Adds a response header value, keeping earlier values of the same name.
    ///
    /// # Errors
    ///
    /// Fails when `name` or `value` is not a valid header.
    pub fn append_header<K, V>(&mut self, name: K, value: V) -> Result<(), http::Error>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    pub fn remove_header<K: AsHeaderName>(&mut self, name: K) {
        self.headers.remove(name);
    }

    /// Headers every response built through this context will carry.
    pub fn response_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The status used when a responder does not choose one itself.
    pub fn status(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    /// Builds the response for `responder` and merges in the context's cookies, headers and status.
    ///
    /// Cookies come first, then headers set on the context, then headers of the responder itself; each later
    /// source replaces every value of a header name it sets.
    ///
    /// # Errors
    ///
    /// Fails when a cookie written during the request can not be serialized.
    pub fn respond<R: Responder>(&self, responder: R) -> ResponseResult {
        let (mut parts, body) = responder.response_to(self).into_parts();

        let mut headers = HeaderMap::new();
        for cookie in self.cookies.set_cookie_headers().map_err(Misconfiguration::from)? {
            headers.append(SET_COOKIE, HeaderValue::try_from(cookie)?);
        }
        overlay(&mut headers, &self.headers);
        overlay(&mut headers, &parts.headers);
        parts.headers = headers;

        if let Some(status) = self.status {
            if parts.status == StatusCode::OK {
                parts.status = status;
            }
        }
        Ok(Response::from_parts(parts, body))
    }

    /// # Errors
    ///
    /// See [`respond`](Self::respond).
    pub fn text(&self, body: impl Into<String>) -> ResponseResult {
        let body: String = body.into();
        self.respond(body)
    }

    /// # Errors
    ///
    /// See [`respond`](Self::respond).
    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> ResponseResult {
        self.respond(Json(value))
    }

    /// # Errors
    ///
    /// See [`respond`](Self::respond).
    pub fn html(&self, body: impl Into<String>) -> ResponseResult {
        let body: String = body.into();
        self.respond(Html(body))
    }

    /// Redirects with `302 Found`.
    ///
    /// # Errors
    ///
    /// Fails when `location` is not a valid header value.
    pub fn redirect(&self, location: &str) -> ResponseResult {
        self.redirect_with(location, StatusCode::FOUND)
    }

    /// # Errors
    ///
    /// Fails when `location` is not a valid header value.
    pub fn redirect_with(&self, location: &str, status: StatusCode) -> ResponseResult {
        let mut response = Response::new(ResponseBody::empty());
        *response.status_mut() = status;
        response.headers_mut().insert(LOCATION, HeaderValue::try_from(location)?);
        self.respond(response)
    }

    /// The router's not found response.
    pub fn not_found(&self) -> Response<ResponseBody> {
        self.router.not_found_response()
    }

    /// Dispatches another request through the whole router, as if it came from outside.
    pub fn forward<I>(&self, input: I) -> BoxFuture<'static, Response<ResponseBody>>
    where
        I: IntoRequest + Send + 'static,
    {
        self.forward_with(input, RequestInit::new())
    }

    pub fn forward_with<I>(&self, input: I, init: RequestInit) -> BoxFuture<'static, Response<ResponseBody>>
    where
        I: IntoRequest + Send + 'static,
    {
        let router = self.router.clone();
        Box::pin(async move { router.request_with(input, init).await })
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request", &self.request)
            .field("params", &self.params)
            .field("validated", &self.validated)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn header_pair<K, V>(name: K, value: V) -> Result<(HeaderName, HeaderValue), http::Error>
where
    HeaderName: TryFrom<K>,
    <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
    HeaderValue: TryFrom<V>,
    <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
{
    let name = HeaderName::try_from(name).map_err(Into::into)?;
    let value = HeaderValue::try_from(value).map_err(Into::into)?;
    Ok((name, value))
}

/// Copies every header name of `source` into `target`, replacing the values `target` had for it.
fn overlay(target: &mut HeaderMap, source: &HeaderMap) {
    for name in source.keys() {
        target.remove(name);
        for value in source.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

//! Request access for handlers.
//!
//! [`RouterRequest`] wraps the dispatched [`http::Request`] and caches its body the first time it is read, so
//! validation and any number of handlers can read it again in another representation.

mod form;
mod query;

pub use form::{FormData, FormFile, FormValue};
pub use query::{QueryMap, QueryValue};

use crate::body::RequestBody;
use crate::error::BodyError;
use bytes::Bytes;
use http::header::{AsHeaderName, CONTENT_TYPE};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use serde::de::DeserializeOwned;
use std::fmt;

enum BodyState {
    Unread(RequestBody),
    Read(Bytes),
    Failed,
}

/// The request being dispatched.
pub struct RouterRequest {
    parts: Parts,
    body: BodyState,
    form: Option<FormData>,
}

impl RouterRequest {
    pub(crate) fn new(request: Request<RequestBody>) -> Self {
        let (parts, body) = request.into_parts();
        Self { parts, body: BodyState::Unread(body), form: None }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn version(&self) -> Version {
        self.parts.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// The first value of header `name`, if it is visible ASCII.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.parts.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    /// The first value of query parameter `key`.
    pub fn query(&self, key: &str) -> Option<String> {
        query::pairs(self.parts.uri.query()).into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Every value of query parameter `key`, in order.
    pub fn queries(&self, key: &str) -> Vec<String> {
        query::pairs(self.parts.uri.query()).into_iter().filter(|(k, _)| k == key).map(|(_, v)| v).collect()
    }

    pub fn query_map(&self) -> QueryMap {
        QueryMap::parse(self.parts.uri.query())
    }

    /// Deserializes the query string into `T`, nested keys like `user[name]=x` included.
    ///
    /// # Errors
    ///
    /// Fails when the query string does not fit `T`.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, serde_qs::Error> {
        serde_qs::from_str(self.parts.uri.query().unwrap_or_default())
    }

    /// The raw body. The stream is drained on the first call and served from memory afterwards.
    ///
    /// # Errors
    ///
    /// Fails when the underlying stream fails, now or on an earlier read.
    pub async fn bytes(&mut self) -> Result<Bytes, BodyError> {
        if let BodyState::Read(bytes) = &self.body {
            return Ok(bytes.clone());
        }
        match std::mem::replace(&mut self.body, BodyState::Failed) {
            BodyState::Unread(body) => {
                let bytes = body.collect_bytes().await?;
                self.body = BodyState::Read(bytes.clone());
                Ok(bytes)
            }
            BodyState::Read(bytes) => {
                self.body = BodyState::Read(bytes.clone());
                Ok(bytes)
            }
            BodyState::Failed => Err(BodyError::Consumed),
        }
    }

    /// # Errors
    ///
    /// Fails when the body can not be read or is not UTF-8.
    pub async fn text(&mut self) -> Result<String, BodyError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BodyError::NotUtf8)
    }

    /// # Errors
    ///
    /// Fails when the body can not be read or is not JSON for `T`.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, BodyError> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// The body decoded as `application/x-www-form-urlencoded` or `multipart/form-data`.
    ///
    /// # Errors
    ///
    /// Fails when the body can not be read, has another content type, or is malformed.
    pub async fn form(&mut self) -> Result<&FormData, BodyError> {
        let form = match self.form.take() {
            Some(form) => form,
            None => self.decode_form().await?,
        };
        Ok(self.form.insert(form))
    }

    async fn decode_form(&mut self) -> Result<FormData, BodyError> {
        let content_type = self.content_type().unwrap_or_default().to_string();
        let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

        if essence == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
            let bytes = self.bytes().await?;
            FormData::from_urlencoded(&bytes)
        } else if essence == mime::MULTIPART_FORM_DATA.essence_str() {
            let boundary = multer::parse_boundary(&content_type).map_err(BodyError::form)?;
            let bytes = self.bytes().await?;
            FormData::from_multipart(bytes, boundary).await
        } else {
            Err(BodyError::form(format!("unsupported content type '{content_type}'")))
        }
    }
}

impl fmt::Debug for RouterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterRequest")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("headers", &self.parts.headers)
            .finish_non_exhaustive()
    }
}

/// Named segments captured while matching the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    pub(crate) fn push(&mut self, name: &str, value: String) {
        self.entries.push((name.to_string(), value));
    }

    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The value captured for `name`. When a name repeats along the path, the last capture wins.
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.entries.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

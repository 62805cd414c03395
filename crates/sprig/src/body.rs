//! Request and response bodies exchanged with the router.
//!
//! [`RequestBody`] is whatever the caller hands to [`Router::dispatch`](crate::Router::dispatch): an in-memory
//! buffer or any streaming [`http_body::Body`]. [`ResponseBody`] is what every handler answers with, either a single
//! chunk of bytes or a boxed stream.

use crate::error::{BodyError, BoxError};
use bytes::Bytes;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::combinators::{BoxBody, UnsyncBoxBody};
use http_body_util::{BodyExt, Full};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The body of an incoming request.
pub struct RequestBody {
    inner: BoxBody<Bytes, BoxError>,
}

impl RequestBody {
    pub fn empty() -> Self {
        Self::from(Bytes::new())
    }

    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: body.map_err(Into::into).boxed() }
    }

    /// Drains the whole body into a single buffer.
    pub(crate) async fn collect_bytes(self) -> Result<Bytes, BodyError> {
        self.inner.collect().await.map(|collected| collected.to_bytes()).map_err(BodyError::read)
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBody").field("size_hint", &self.inner.size_hint()).finish_non_exhaustive()
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self { inner: Full::new(bytes).map_err(|never| match never {}).boxed() }
    }
}

impl From<()> for RequestBody {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl From<&'static str> for RequestBody {
    fn from(value: &'static str) -> Self {
        Self::from(Bytes::from_static(value.as_bytes()))
    }
}

impl From<String> for RequestBody {
    fn from(value: String) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl HttpBody for RequestBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// The body of a response produced by a handler.
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(UnsyncBoxBody<Bytes, BoxError>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Kind::Once(Some(bytes)) } }
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: Kind::Stream(body.map_err(Into::into).boxed_unsync()) }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Kind::Once(bytes) => f.debug_tuple("ResponseBody::Once").field(bytes).finish(),
            Kind::Stream(_) => f.write_str("ResponseBody::Stream"),
        }
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<()> for ResponseBody {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<Option<Bytes>> for ResponseBody {
    fn from(option: Option<Bytes>) -> Self {
        option.map_or_else(Self::empty, Self::once)
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Once(option_bytes) => Poll::Ready(option_bytes.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Stream(box_body) => Pin::new(box_body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Once(option_bytes) => option_bytes.is_none(),
            Kind::Stream(box_body) => box_body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Stream(box_body) => box_body.size_hint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RequestBody, ResponseBody};
    use bytes::Bytes;
    use futures::stream;
    use http_body::{Body as HttpBody, Frame};
    use http_body_util::{BodyExt, StreamBody};
    use std::io;

    fn check_send<T: Send>() {}

    #[test]
    fn is_send() {
        check_send::<ResponseBody>();
        check_send::<RequestBody>();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_string_body() {
        let s = "Hello world".to_string();
        let len = s.len() as u64;

        let mut body = ResponseBody::from(s);

        assert_eq!(body.size_hint().exact(), Some(len));
        assert!(!body.is_end_stream());

        let bytes = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(bytes, Bytes::from("Hello world"));

        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_empty_body() {
        let mut body = ResponseBody::from("");

        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));

        assert!(body.frame().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_stream_body() {
        let chunks: Vec<Result<_, io::Error>> =
            vec![Ok(Frame::data(Bytes::from_static(b"ab"))), Ok(Frame::data(Bytes::from_static(b"cd")))];
        let body = ResponseBody::stream(StreamBody::new(stream::iter(chunks)));

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, Bytes::from_static(b"abcd"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_request_body_collects_stream() {
        let chunks: Vec<Result<_, io::Error>> =
            vec![Ok(Frame::data(Bytes::from_static(b"{\"a\""))), Ok(Frame::data(Bytes::from_static(b":1}")))];
        let body = RequestBody::new(StreamBody::new(stream::iter(chunks)));

        assert_eq!(body.collect_bytes().await.unwrap(), Bytes::from_static(b"{\"a\":1}"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_request_body_read_error() {
        let chunks: Vec<Result<Frame<Bytes>, io::Error>> = vec![Err(io::Error::other("connection reset"))];
        let body = RequestBody::new(StreamBody::new(stream::iter(chunks)));

        let err = body.collect_bytes().await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}

//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Every toolkit operation that answers a client hands back a [`Response`].
//! Pass it to hyper (or any `http`-based server) with
//! [`Response::into_inner`].

use std::io;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};

/// Response body: buffered JSON or a file streamed from disk.
pub type Body = UnsyncBoxBody<Bytes, io::Error>;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use http::StatusCode;
/// use toolkit::Response;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header(http::header::LOCATION, http::HeaderValue::from_static("/users/42"))
///     .json(br#"{"id":42}"#.to_vec());
/// ```
pub struct Response {
    inner: http::Response<Body>,
}

impl Response {
    /// `200 OK` with `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::builder().json(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        let mut inner = http::Response::new(empty());
        *inner.status_mut() = code;
        Self { inner }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Header value as a string, if present and visible ASCII.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.inner.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// The underlying `http::Response`, ready for hyper.
    pub fn into_inner(self) -> http::Response<Body> {
        self.inner
    }

    /// Drains the body into memory.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        Ok(self.inner.into_body().collect().await?.to_bytes())
    }

    pub(crate) fn from_http(inner: http::Response<Body>) -> Self {
        Self { inner }
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Merges every entry of `headers`, keeping repeated values.
    pub fn headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.append(name, value.clone());
        }
        self
    }

    /// Terminate with a JSON body. `content-type` is always
    /// `application/json`, whatever was merged before.
    pub fn json(mut self, body: Vec<u8>) -> Response {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.finish(full(body))
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        self.finish(empty())
    }

    fn finish(self, body: Body) -> Response {
        let mut inner = http::Response::new(body);
        *inner.status_mut() = self.status;
        *inner.headers_mut() = self.headers;
        Response { inner }
    }
}

fn full(body: Vec<u8>) -> Body {
    Full::new(Bytes::from(body)).map_err(|never| match never {}).boxed_unsync()
}

fn empty() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync()
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implemented for [`Error`](crate::Error), which renders itself as a JSON
/// error envelope, and for [`JsonResponse`](crate::JsonResponse).
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

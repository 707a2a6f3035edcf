//! Strict JSON decoding and the response envelope.
//!
//! Decoding rejects what a lenient decoder would let slide: oversized bodies,
//! empty bodies, unknown object keys (unless allowed) and anything after the
//! first JSON value. Each rejection is its own [`Error`] variant, so the
//! handler can tell a client exactly what was wrong.
//!
//! Encoding goes through one function, [`encode`], for success payloads,
//! error envelopes and remote pushes alike, so their shape cannot drift.
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use serde::Deserialize;
//! use toolkit::{JsonResponse, Response, Toolkit, error_json, write_json};
//!
//! #[derive(Deserialize)]
//! struct RequestPayload {
//!     action: String,
//!     message: String,
//! }
//!
//! async fn receive_post(
//!     toolkit: &Toolkit,
//!     req: http::Request<http_body_util::Full<bytes::Bytes>>,
//! ) -> Result<Response, toolkit::Error> {
//!     let payload: RequestPayload = match toolkit.read_json(req).await {
//!         Ok(payload) => payload,
//!         Err(err) => return error_json(&err, Some(err.status())),
//!     };
//!     let reply: JsonResponse = JsonResponse::ok(format!("{} received", payload.action));
//!     write_json(StatusCode::ACCEPTED, &reply, None)
//! }
//! ```

use std::fmt;
use std::io;

use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::error::Category;
use tracing::debug;

use crate::error::{BoxError, Error};
use crate::response::{IntoResponse, Response};
use crate::toolkit::Toolkit;

/// The envelope wrapped around every JSON response the toolkit writes.
///
/// `data` is left out of the JSON entirely when it is `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JsonResponse<T = serde_json::Value> {
    pub error: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> JsonResponse<T> {
    /// A success envelope without data.
    pub fn ok(message: impl Into<String>) -> Self {
        Self { error: false, message: message.into(), data: None }
    }

    /// A failure envelope. An empty message is replaced so the client always
    /// learns something.
    pub fn error(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message.push_str("unknown error");
        }
        Self { error: true, message, data: None }
    }

    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }
}

impl<T: Serialize> IntoResponse for JsonResponse<T> {
    fn into_response(self) -> Response {
        let status = if self.error { StatusCode::BAD_REQUEST } else { StatusCode::OK };
        write_json(status, &self, None)
            .unwrap_or_else(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

/// Renders the error as a JSON envelope at [`Error::status`].
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error_json(&self, Some(self.status()))
            .unwrap_or_else(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

/// Serializes `payload` the one way the toolkit writes JSON: indented.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec_pretty(payload).map_err(Error::Encode)
}

/// Writes `payload` as an `application/json` response with `status`.
///
/// `headers` are merged into the response; `content-type` always ends up
/// `application/json`. A payload that cannot be serialized is reported as
/// [`Error::Encode`], never as a half-written response.
pub fn write_json<T: Serialize + ?Sized>(
    status: StatusCode,
    payload: &T,
    headers: Option<&HeaderMap>,
) -> Result<Response, Error> {
    let body = encode(payload)?;
    let mut builder = Response::builder().status(status);
    if let Some(headers) = headers {
        builder = builder.headers(headers);
    }
    Ok(builder.json(body))
}

/// Writes `{"error": true, "message": <err>}` with `status`, or
/// `400 Bad Request` when `status` is `None`.
pub fn error_json(err: impl fmt::Display, status: Option<StatusCode>) -> Result<Response, Error> {
    let status = status.unwrap_or(StatusCode::BAD_REQUEST);
    let mut message = err.to_string();
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or_default().to_owned();
    }
    let envelope: JsonResponse = JsonResponse::error(message);
    write_json(status, &envelope, None)
}

/// Decodes exactly one JSON value of type `T` from `body`.
///
/// Checks run in this order: size, emptiness, syntax and types (with
/// unknown keys rejected unless `allow_unknown`), then trailing content.
pub fn decode_json<T: DeserializeOwned>(
    body: &[u8],
    max_size: usize,
    allow_unknown: bool,
) -> Result<T, Error> {
    if body.len() > max_size {
        return Err(Error::BodyTooLarge { limit: max_size });
    }
    if body.iter().all(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
        return Err(Error::EmptyBody);
    }

    // Syntax of the first value is checked before its shape.
    IgnoredAny::deserialize(&mut serde_json::Deserializer::from_slice(body)).map_err(classify)?;

    let mut de = serde_json::Deserializer::from_slice(body);
    let value = if allow_unknown {
        T::deserialize(&mut de).map_err(classify)?
    } else {
        let mut unknown = None;
        let value: T = serde_ignored::deserialize(&mut de, |path| {
            unknown.get_or_insert_with(|| path.to_string());
        })
        .map_err(classify)?;
        if let Some(field) = unknown {
            return Err(Error::UnknownField { field });
        }
        value
    };

    de.end().map_err(|_| Error::TrailingData)?;
    Ok(value)
}

fn classify(err: serde_json::Error) -> Error {
    match err.classify() {
        Category::Syntax | Category::Eof => Error::Syntax { line: err.line(), column: err.column() },
        Category::Data => Error::TypeMismatch { detail: err.to_string() },
        Category::Io => Error::Io(io::Error::from(err)),
    }
}

impl Toolkit {
    /// Reads the request body, at most `max_json_size` bytes of it, and
    /// decodes it with [`decode_json`] under the configured strictness.
    ///
    /// Reading stops as soon as the ceiling is crossed; the rest of an
    /// oversized body is never buffered.
    pub async fn read_json<T, B>(&self, req: Request<B>) -> Result<T, Error>
    where
        T: DeserializeOwned,
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let limit = self.config().max_json_size;
        let body = match Limited::new(req.into_body(), limit).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) if err.is::<LengthLimitError>() => {
                debug!(limit, "JSON body over limit");
                return Err(Error::BodyTooLarge { limit });
            }
            Err(err) => return Err(Error::Io(io::Error::other(err))),
        };
        decode_json(&body, limit, self.config().allow_unknown_json_fields)
    }
}

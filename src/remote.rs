//! Pushing JSON to a remote endpoint.
//!
//! The HTTP client is injected through [`Transport`] so that callers can pass
//! a shared [`reqwest::Client`] in production and a closure in tests.
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), toolkit::Error> {
//! let client = reqwest::Client::new();
//! let response = toolkit::push_json(
//!     "https://hooks.example.com/events",
//!     &serde_json::json!({ "action": "created" }),
//!     &client,
//! )
//! .await?;
//! println!("remote said {}", response.status());
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use tracing::debug;

use crate::error::{BoxError, Error};
use crate::json::encode;

/// Sends a fully built request and returns the buffered response.
pub trait Transport {
    fn round_trip(
        &self,
        request: http::Request<Bytes>,
    ) -> impl Future<Output = Result<http::Response<Bytes>, BoxError>> + Send;
}

/// Adapts an async function into a [`Transport`].
///
/// ```rust
/// use bytes::Bytes;
/// use toolkit::{BoxError, TransportFn};
///
/// let canned = TransportFn(|_req: http::Request<Bytes>| async {
///     Ok::<_, BoxError>(http::Response::new(Bytes::from_static(b"ok")))
/// });
/// # let _ = canned;
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TransportFn<F>(pub F);

impl<F, Fut> Transport for TransportFn<F>
where
    F: Fn(http::Request<Bytes>) -> Fut,
    Fut: Future<Output = Result<http::Response<Bytes>, BoxError>> + Send,
{
    fn round_trip(
        &self,
        request: http::Request<Bytes>,
    ) -> impl Future<Output = Result<http::Response<Bytes>, BoxError>> + Send {
        (self.0)(request)
    }
}

impl Transport for reqwest::Client {
    fn round_trip(
        &self,
        request: http::Request<Bytes>,
    ) -> impl Future<Output = Result<http::Response<Bytes>, BoxError>> + Send {
        async move {
            let request = reqwest::Request::try_from(request)?;
            let response = self.execute(request).await?;

            let status = response.status();
            let version = response.version();
            let headers = response.headers().clone();
            let body = response.bytes().await?;

            let mut out = http::Response::new(body);
            *out.status_mut() = status;
            *out.version_mut() = version;
            *out.headers_mut() = headers;
            Ok(out)
        }
    }
}

/// POSTs `payload` as JSON to `url` through `client`.
///
/// Any response the remote sends back counts as success, whatever its status;
/// only encoding failures and transport failures (bad URL, connection refused,
/// timeouts) are errors.
#[tracing::instrument(skip_all, fields(url = %url))]
pub async fn push_json<T, C>(url: &str, payload: &T, client: &C) -> Result<http::Response<Bytes>, Error>
where
    T: Serialize + ?Sized,
    C: Transport,
{
    let body = encode(payload)?;
    let request = http::Request::post(url)
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(Bytes::from(body))
        .map_err(|e| Error::Transport(e.into()))?;

    let response = client.round_trip(request).await.map_err(Error::Transport)?;
    debug!(status = %response.status(), "remote responded");
    Ok(response)
}

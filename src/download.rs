//! File downloads.

use std::path::Path;

use http::Request;
use http::header::{CONTENT_DISPOSITION, HeaderValue};
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use crate::error::Error;
use crate::response::Response;

/// Streams the file at `source_path` as an attachment named `display_name`.
///
/// The file is served by tower-http's [`ServeFile`], which fills in
/// `Content-Length` and a `Content-Type` guessed from the extension, honours
/// `HEAD` and range requests, and answers a missing file with
/// `404 Not Found`. That status is passed through untouched.
///
/// Fails only when `display_name` cannot be carried in a header value (for
/// example, it contains a line break).
///
/// ```rust,no_run
/// # async fn handler(req: http::Request<()>) -> Result<toolkit::Response, toolkit::Error> {
/// toolkit::download_static_file(req, "./static/pic.jpg", "puppy.jpg").await
/// # }
/// ```
pub async fn download_static_file<B>(
    req: Request<B>,
    source_path: impl AsRef<Path>,
    display_name: &str,
) -> Result<Response, Error>
where
    B: Send + 'static,
{
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        quote_escape(display_name)
    ))?;

    let source_path = source_path.as_ref();
    let response = match ServeFile::new(source_path).oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    debug!(path = %source_path.display(), status = %response.status(), "serving download");

    let (mut parts, body) = response.into_parts();
    parts.headers.insert(CONTENT_DISPOSITION, disposition);
    Ok(Response::from_http(http::Response::from_parts(parts, body.boxed_unsync())))
}

fn quote_escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

//! # toolkit
//!
//! Server-side helpers for the chores every HTTP handler ends up writing.
//! Nothing more. Nothing less.
//!
//! ## What's in the box
//!
//! - **Tokens**: [`random_string`], cryptographically random and URL-safe-ish
//! - **Slugs**: [`slugify`], lower-case ASCII words joined by dashes
//! - **JSON**: [`Toolkit::read_json`] with size and unknown-field limits,
//!   [`write_json`] and [`error_json`] for the envelope going out
//! - **Uploads**: [`Toolkit::upload_files`] streams multipart files to disk,
//!   accepting them by sniffed content, never by the client's word
//! - **Downloads**: [`download_static_file`] serves a file as an attachment
//! - **Outbound JSON**: [`push_json`] through any [`Transport`]
//!
//! The toolkit works on plain [`http`] types. Any framework that hands out an
//! `http::Request<B>` with a [`http_body::Body`] can use it, and the
//! [`Response`] it returns unwraps into an `http::Response` with
//! [`Response::into_inner`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use toolkit::{JsonResponse, Response, Toolkit, ToolkitConfig, write_json};
//!
//! #[derive(Deserialize)]
//! struct NewUser {
//!     name: String,
//! }
//!
//! async fn create_user<B>(tools: &Toolkit, req: http::Request<B>) -> Response
//! where
//!     B: http_body::Body<Data = bytes::Bytes>,
//!     B::Error: Into<toolkit::BoxError>,
//! {
//!     let user: NewUser = match tools.read_json(req).await {
//!         Ok(user) => user,
//!         Err(err) => return toolkit::IntoResponse::into_response(err),
//!     };
//!     let slug = toolkit::slugify(&user.name).unwrap_or_default();
//!     let reply: JsonResponse = JsonResponse::ok(format!("created {slug}"));
//!     write_json(http::StatusCode::CREATED, &reply, None)
//!         .unwrap_or_else(toolkit::IntoResponse::into_response)
//! }
//!
//! # fn main() -> Result<(), toolkit::Error> {
//! let tools = Toolkit::new(ToolkitConfig::from_env()?);
//! # let _ = tools;
//! # Ok(())
//! # }
//! ```

mod config;
mod download;
mod error;
mod json;
mod random;
mod remote;
mod response;
mod slug;
mod sniff;
mod toolkit;
mod upload;

#[cfg(test)]
mod test_utils;

pub use config::{DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_JSON_SIZE, ToolkitConfig};
pub use download::download_static_file;
pub use error::{BoxError, Error};
pub use json::{JsonResponse, decode_json, encode, error_json, write_json};
pub use random::random_string;
pub use remote::{Transport, TransportFn, push_json};
pub use response::{Body, IntoResponse, Response, ResponseBuilder};
pub use slug::slugify;
pub use sniff::{SNIFF_LEN, detect_content_type};
pub use toolkit::Toolkit;
pub use upload::{RENAMED_FILE_LEN, UploadedFile, create_dir_if_not_exist};

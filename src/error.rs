//! Unified error type.

use std::io;

use http::StatusCode;
use thiserror::Error as ThisError;

/// Boxed error used at the transport seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type returned by the toolkit's fallible operations.
///
/// Every variant is a distinct, matchable failure. The toolkit never logs and
/// drops an error; map it to a status with [`Error::status`] and render it
/// with [`error_json`](crate::error_json) (or [`IntoResponse`](crate::IntoResponse)).
#[derive(ThisError, Debug)]
pub enum Error {
    // ── JSON decoding ─────────────────────────────────────────────────────────
    #[error("body must not be larger than {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("body must not be empty")]
    EmptyBody,

    #[error("body contains badly-formed JSON (at line {line}, column {column})")]
    Syntax { line: usize, column: usize },

    #[error("body contains incorrect JSON type: {detail}")]
    TypeMismatch { detail: String },

    #[error("body contains unknown key \"{field}\"")]
    UnknownField { field: String },

    #[error("body must contain only one JSON value")]
    TrailingData,

    // ── Uploads ───────────────────────────────────────────────────────────────
    #[error("the uploaded file is too big (limit {limit} bytes)")]
    TooLarge { limit: u64 },

    #[error("the uploaded file type {content_type} is not permitted")]
    UnsupportedType { content_type: String },

    #[error("no file was uploaded")]
    MissingFile,

    #[error("invalid file name {0:?}")]
    InvalidFileName(String),

    #[error("malformed multipart body: {0}")]
    Multipart(#[source] multer::Error),

    // ── Slugs ─────────────────────────────────────────────────────────────────
    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ── Encoding and remote calls ─────────────────────────────────────────────
    #[error("failed to encode JSON: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("transport: {0}")]
    Transport(#[source] BoxError),

    // ── Infrastructure ────────────────────────────────────────────────────────
    #[error("entropy source unavailable: {0}")]
    Entropy(#[source] io::Error),

    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),

    #[error("configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The HTTP status a handler should answer with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BodyTooLarge { .. } | Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::EmptyBody
            | Self::Syntax { .. }
            | Self::TypeMismatch { .. }
            | Self::UnknownField { .. }
            | Self::TrailingData
            | Self::MissingFile
            | Self::InvalidFileName(_)
            | Self::Multipart(_)
            | Self::InvalidInput(_)
            | Self::InvalidHeader(_) => StatusCode::BAD_REQUEST,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Encode(_) | Self::Entropy(_) | Self::Config(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Oversized bodies become [`Error::TooLarge`]. A body stream that fails or
/// ends mid-part is an I/O failure, not a malformed request.
impl From<multer::Error> for Error {
    fn from(e: multer::Error) -> Self {
        match e {
            multer::Error::StreamSizeExceeded { limit } => Self::TooLarge { limit },
            multer::Error::StreamReadFailed(source) => Self::Io(io::Error::other(source)),
            e @ (multer::Error::IncompleteStream | multer::Error::IncompleteFieldData { .. }) => {
                Self::Io(io::Error::new(io::ErrorKind::UnexpectedEof, e))
            }
            other => Self::Multipart(other),
        }
    }
}

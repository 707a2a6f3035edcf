//! Multipart file uploads.
//!
//! # Pipeline
//!
//! For every file part of a `multipart/form-data` request, in order:
//!
//! 1. Buffer the first [`SNIFF_LEN`] bytes and sniff the real content type.
//!    The client's own `Content-Type` for the part is ignored.
//! 2. Reject the part if an allow-list is configured and the sniffed type is
//!    not on it. Nothing has touched the disk at this point.
//! 3. Pick the stored name: the client's file name, or a random token plus
//!    the original extension when renaming.
//! 4. Create the destination directory if needed, write the buffered probe,
//!    then stream the rest of the part.
//!
//! The whole request body is capped at `max_file_size`. Parts are handled
//! one after another; a failure aborts the call and leaves files written by
//! earlier parts in place.

use std::ffi::OsStr;
use std::path::Path;

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Request};
use http_body::Body;
use http_body_util::BodyExt;
use multer::{Constraints, Field, Multipart, SizeLimit};
use serde::Serialize;
use tokio::fs::{DirBuilder, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{BoxError, Error};
use crate::random::random_string;
use crate::sniff::{SNIFF_LEN, detect_content_type};
use crate::toolkit::Toolkit;

/// Length of the random base name given to renamed uploads.
pub const RENAMED_FILE_LEN: usize = 25;

/// One stored upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Name the client sent, reduced to its last path component.
    pub original_file_name: String,
    /// Name written to disk, inside the destination directory.
    pub new_file_name: String,
    /// Bytes written.
    pub file_size: u64,
}

impl Toolkit {
    /// Stores every file part of a `multipart/form-data` request under
    /// `destination`.
    ///
    /// Form fields without a file name are skipped. With `rename`, each file
    /// gets a random [`RENAMED_FILE_LEN`]-character name that keeps the
    /// original extension.
    ///
    /// # Errors
    ///
    /// - [`Error::TooLarge`]: the body exceeds `max_file_size`.
    /// - [`Error::UnsupportedType`]: a sniffed type is not allowed.
    /// - [`Error::Multipart`]: not a multipart request, or a malformed one.
    /// - [`Error::InvalidFileName`]: a file name with no usable last component.
    /// - [`Error::Io`]: creating the directory or writing a file failed, or
    ///   the request body broke off mid-part.
    pub async fn upload_files<B>(
        &self,
        req: Request<B>,
        destination: impl AsRef<Path>,
        rename: bool,
    ) -> Result<Vec<UploadedFile>, Error>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        self.upload(req, destination.as_ref(), rename, usize::MAX).await
    }

    /// Like [`upload_files`](Toolkit::upload_files) but stores only the first
    /// file part. Fails with [`Error::MissingFile`] if the request has none.
    pub async fn upload_one_file<B>(
        &self,
        req: Request<B>,
        destination: impl AsRef<Path>,
        rename: bool,
    ) -> Result<UploadedFile, Error>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        self.upload(req, destination.as_ref(), rename, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::MissingFile)
    }

    #[tracing::instrument(skip_all, fields(destination = %destination.display(), rename = rename))]
    async fn upload<B>(
        &self,
        req: Request<B>,
        destination: &Path,
        rename: bool,
        max_files: usize,
    ) -> Result<Vec<UploadedFile>, Error>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let limit = self.config().max_file_size;
        if content_length(req.headers()).is_some_and(|len| len > limit) {
            return Err(Error::TooLarge { limit });
        }

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let boundary = multer::parse_boundary(content_type)?;
        let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(limit));
        let mut multipart =
            Multipart::with_constraints(req.into_body().into_data_stream(), boundary, constraints);

        let mut stored = Vec::new();
        while stored.len() < max_files {
            let Some(field) = multipart.next_field().await? else {
                break;
            };
            let Some(client_name) = field.file_name().map(str::to_owned) else {
                continue;
            };
            stored.push(self.store(field, &client_name, destination, rename).await?);
        }
        Ok(stored)
    }

    async fn store(
        &self,
        mut field: Field<'_>,
        client_name: &str,
        destination: &Path,
        rename: bool,
    ) -> Result<UploadedFile, Error> {
        let mut probe = BytesMut::with_capacity(SNIFF_LEN);
        while probe.len() < SNIFF_LEN {
            match field.chunk().await? {
                Some(chunk) => probe.extend_from_slice(&chunk),
                None => break,
            }
        }

        let content_type = detect_content_type(&probe);
        if !self.config().allows_file_type(content_type) {
            debug!(file = client_name, content_type, "rejected upload");
            return Err(Error::UnsupportedType { content_type: content_type.to_owned() });
        }

        let original_file_name = base_name(client_name)?;
        let new_file_name = if rename {
            renamed(&original_file_name)?
        } else {
            original_file_name.clone()
        };

        create_dir_if_not_exist(destination).await?;
        let path = destination.join(&new_file_name);
        let mut file = File::create(&path).await?;

        file.write_all(&probe).await?;
        let mut file_size = probe.len() as u64;
        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await?;
            file_size += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(
            original = %original_file_name,
            stored = %path.display(),
            content_type,
            file_size,
            "stored upload"
        );
        Ok(UploadedFile { original_file_name, new_file_name, file_size })
    }
}

/// Creates `path` and any missing parents. An existing directory is success,
/// so concurrent uploads into the same place do not race each other.
pub async fn create_dir_if_not_exist(path: impl AsRef<Path>) -> Result<(), Error> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(path).await?;
    Ok(())
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

fn base_name(client_name: &str) -> Result<String, Error> {
    Path::new(client_name)
        .file_name()
        .and_then(OsStr::to_str)
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidFileName(client_name.to_owned()))
}

/// Random token plus everything from the last `.` of `original`, so a
/// dot-file such as `.env` keeps `.env` as its extension.
fn renamed(original: &str) -> Result<String, Error> {
    let token = random_string(RENAMED_FILE_LEN)?;
    Ok(match original.rfind('.') {
        Some(dot) => format!("{token}{}", &original[dot..]),
        None => token,
    })
}

#[cfg(test)]
mod tests {
    use std::io;

    use http_body::Frame;
    use http_body_util::{Full, StreamBody};

    use super::*;
    use crate::config::ToolkitConfig;
    use crate::test_utils::{BOUNDARY, PNG, multipart_request};

    const IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/jfif"];

    #[test_log::test(tokio::test)]
    async fn upload_table() {
        let cases: &[(&str, &[&str], bool, bool)] = &[
            ("allowed no rename", &IMAGE_TYPES[..], false, true),
            ("allowed rename", &IMAGE_TYPES[..], true, true),
            ("not allowed", &["image/jpeg", "image/gif", "image/jfif"][..], false, false),
        ];

        for (name, allowed, rename, ok) in cases {
            let dir = tempfile::tempdir().unwrap();
            let uploads = dir.path().join("uploads");
            let toolkit = Toolkit::new(ToolkitConfig::default().with_allowed_file_types(allowed.iter().copied()));
            let request = multipart_request(&[("file", Some("./test/img.png"), PNG)]);

            let result = toolkit.upload_files(request, &uploads, *rename).await;
            assert_eq!(result.is_ok(), *ok, "{name}: {result:?}");

            match result {
                Ok(files) => {
                    assert_eq!(files.len(), 1, "{name}");
                    let file = &files[0];
                    assert_eq!(file.original_file_name, "img.png", "{name}");
                    assert_eq!(file.file_size, PNG.len() as u64, "{name}");
                    let stored = std::fs::read(uploads.join(&file.new_file_name)).unwrap();
                    assert_eq!(stored, PNG, "{name}");
                }
                Err(err) => {
                    assert!(matches!(err, Error::UnsupportedType { ref content_type } if content_type == "image/png"));
                    assert!(!uploads.exists(), "{name}: nothing written");
                }
            }
        }
    }

    #[test_log::test(tokio::test)]
    async fn rename_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(&[("file", Some("holiday.png"), PNG)]);

        let file = Toolkit::default().upload_one_file(request, dir.path(), true).await.unwrap();
        assert_ne!(file.new_file_name, file.original_file_name);
        assert_eq!(file.new_file_name.len(), RENAMED_FILE_LEN + ".png".len());
        assert!(file.new_file_name.ends_with(".png"));
        assert!(dir.path().join(&file.new_file_name).exists());
    }

    #[test_log::test(tokio::test)]
    async fn large_parts_are_copied_whole() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = PNG.to_vec();
        content.extend((0..100_000u32).map(|i| (i % 251) as u8));
        let request = multipart_request(&[("file", Some("big.png"), &content[..])]);

        let file = Toolkit::default().upload_one_file(request, dir.path(), false).await.unwrap();
        assert_eq!(file.new_file_name, "big.png");
        assert_eq!(file.file_size, content.len() as u64);
        assert_eq!(std::fs::read(dir.path().join("big.png")).unwrap(), content);
    }

    #[tokio::test]
    async fn several_files_and_plain_fields() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(&[
            ("title", None, &b"holiday pictures"[..]),
            ("file", Some("a.png"), PNG),
            ("file", Some("notes.txt"), &b"plain words"[..]),
        ]);

        let files = Toolkit::default().upload_files(request, dir.path(), false).await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.new_file_name.as_str()).collect();
        assert_eq!(names, ["a.png", "notes.txt"]);
    }

    #[tokio::test]
    async fn upload_one_file_stops_after_the_first() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(&[
            ("file", Some("a.png"), PNG),
            ("file", Some("b.png"), PNG),
        ]);

        let file = Toolkit::default().upload_one_file(request, dir.path(), false).await.unwrap();
        assert_eq!(file.new_file_name, "a.png");
        assert!(!dir.path().join("b.png").exists());
    }

    #[tokio::test]
    async fn upload_one_file_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(&[("title", None, &b"no file here"[..])]);

        let result = Toolkit::default().upload_one_file(request, dir.path(), false).await;
        assert!(matches!(result, Err(Error::MissingFile)));
    }

    #[tokio::test]
    async fn client_paths_are_reduced_to_the_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        let request = multipart_request(&[("file", Some("../../etc/evil.png"), PNG)]);

        let file = Toolkit::default().upload_one_file(request, &uploads, false).await.unwrap();
        assert_eq!(file.new_file_name, "evil.png");
        assert!(uploads.join("evil.png").exists());
    }

    #[tokio::test]
    async fn body_over_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let toolkit = Toolkit::new(ToolkitConfig::default().with_max_file_size(64));
        let content = vec![b'a'; 1024];

        let request = multipart_request(&[("file", Some("a.txt"), &content[..])]);
        let result = toolkit.upload_files(request, dir.path(), false).await;
        assert!(matches!(result, Err(Error::TooLarge { limit: 64 })));

        // Without a Content-Length header the parser enforces the ceiling.
        let (mut parts, body) = multipart_request(&[("file", Some("a.txt"), &content[..])]).into_parts();
        parts.headers.remove(CONTENT_LENGTH);
        let result = toolkit.upload_files(Request::from_parts(parts, body), dir.path(), false).await;
        assert!(matches!(result, Err(Error::TooLarge { limit: 64 })));
    }

    #[tokio::test]
    async fn not_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::post("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();

        let result = Toolkit::default().upload_files(request, dir.path(), false).await;
        assert!(matches!(result, Err(Error::Multipart(_))));
    }

    #[tokio::test]
    async fn create_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("my").join("dir");

        create_dir_if_not_exist(&nested).await.unwrap();
        create_dir_if_not_exist(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn base_names() {
        assert_eq!(base_name("./test/img.png").unwrap(), "img.png");
        assert_eq!(base_name("img.png").unwrap(), "img.png");
        assert!(matches!(base_name(".."), Err(Error::InvalidFileName(_))));
        assert!(matches!(base_name(""), Err(Error::InvalidFileName(_))));
    }

    #[tokio::test]
    async fn body_failing_mid_copy_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut head = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"cut.png\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .into_bytes();
        head.extend_from_slice(PNG);
        head.resize(head.len() + 2000, 0x42);

        let frames: Vec<Result<Frame<Bytes>, io::Error>> = vec![
            Ok(Frame::data(Bytes::from(head))),
            Err(io::Error::from(io::ErrorKind::ConnectionReset)),
        ];
        let request = Request::post("/upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(StreamBody::new(futures::stream::iter(frames)))
            .unwrap();

        let result = Toolkit::default().upload_files(request, dir.path(), false).await;
        assert!(matches!(result, Err(Error::Io(_))), "{result:?}");
    }

    #[tokio::test]
    async fn destination_that_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let occupied = dir.path().join("occupied");
        std::fs::write(&occupied, "not a directory").unwrap();

        let request = multipart_request(&[("file", Some("a.png"), PNG)]);
        let result = Toolkit::default().upload_files(request, occupied.join("uploads"), false).await;
        assert!(matches!(result, Err(Error::Io(_))), "{result:?}");
    }

    #[tokio::test]
    async fn failed_write_keeps_earlier_files() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the second file's name makes its create fail.
        std::fs::create_dir(dir.path().join("b.png")).unwrap();

        let request = multipart_request(&[
            ("file", Some("a.png"), PNG),
            ("file", Some("b.png"), PNG),
        ]);
        let result = Toolkit::default().upload_files(request, dir.path(), false).await;

        assert!(matches!(result, Err(Error::Io(_))), "{result:?}");
        assert_eq!(std::fs::read(dir.path().join("a.png")).unwrap(), PNG);
    }

    #[test]
    fn renamed_keeps_dot_file_extension() {
        let name = renamed(".env").unwrap();
        assert_eq!(name.len(), RENAMED_FILE_LEN + ".env".len());
        assert!(name.ends_with(".env"));

        let name = renamed("photo.tar.gz").unwrap();
        assert_eq!(name.len(), RENAMED_FILE_LEN + ".gz".len());
        assert!(name.ends_with(".gz"));
    }

    #[test]
    fn renamed_without_extension() {
        let name = renamed("README").unwrap();
        assert_eq!(name.len(), RENAMED_FILE_LEN);
        assert!(!name.contains('.'));
    }
}

//! Multipart upload intake.
//!
//! The `file` field is streamed straight to disk under the uploads directory
//! with a collision-free name. Oversized or broken uploads leave nothing
//! behind.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use df_core::{Error, Result};

/// Multipart field carrying the document.
pub const FILE_FIELD: &str = "file";

/// Longest extension (including the dot) kept on a stored upload.
const MAX_EXT_LEN: usize = 10;

/// An upload that has been written to disk.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Absolute path of the stored file.
    pub path: PathBuf,
    /// File name as sent by the client.
    pub original_name: String,
    /// Bytes written.
    pub size: u64,
}

/// Store the `file` field of `multipart` in `dir`.
///
/// Other fields are skipped. Returns [`Error::NoInputProvided`] if no file
/// field is present and [`Error::PayloadTooLarge`] as soon as the field
/// grows past `max_size` bytes.
pub async fn store_upload(
    multipart: &mut Multipart,
    dir: &Path,
    max_size: u64,
) -> Result<StoredUpload> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let path = dir.join(stored_file_name(&original_name));
        let partial = PartialUpload::new(path);

        let mut file = tokio::fs::File::create(partial.path()).await?;
        let mut size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_size))?
        {
            size += chunk.len() as u64;
            if size > max_size {
                return Err(Error::PayloadTooLarge { limit: max_size });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        let path = partial.keep();
        tracing::debug!(
            path = %path.display(),
            original_name = %original_name,
            size,
            "Upload stored"
        );
        return Ok(StoredUpload {
            path,
            original_name,
            size,
        });
    }

    Err(Error::NoInputProvided)
}

/// Unique on-disk name: `<unix millis>-<uuid><ext>`.
///
/// Only the client's extension survives, trimmed to ASCII alphanumerics so
/// the name can never escape the uploads directory.
pub fn stored_file_name(original_name: &str) -> String {
    let ext: String = Path::new(original_name)
        .extension()
        .map(|e| {
            e.to_string_lossy()
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect()
        })
        .unwrap_or_default();

    let mut suffix = String::new();
    if !ext.is_empty() {
        suffix.push('.');
        suffix.push_str(&ext);
        suffix.truncate(MAX_EXT_LEN);
    }

    format!(
        "{}-{}{}",
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        suffix
    )
}

fn multipart_error(err: MultipartError, max_size: u64) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge { limit: max_size }
    } else {
        Error::Validation(err.body_text())
    }
}

/// Removes a half-written upload unless [`keep`](Self::keep) is called.
struct PartialUpload {
    path: Option<PathBuf>,
}

impl PartialUpload {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), "Failed to remove partial upload: {e}");
                }
            }
        }
    }
}

//! Product images: read from multipart forms, written under the upload dir.
//! Serving them back at `/uploads` is left to `actix_files`.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use actix_multipart::{Field, MultipartError};
use actix_web::web;
use anyhow::Context;
use futures_util::TryStreamExt;
use tracing::{debug, error, warn};

use crate::error::ApiError;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Allowed content types and the extension each is stored under.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    IMAGE_TYPES
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(mime))
        .map(|(_, ext)| *ext)
}

pub fn invalid_form(e: MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid form data: {}", e))
}

/// A validated image part, held in memory until it is stored.
#[derive(Debug)]
pub struct ImageUpload {
    ext: &'static str,
    bytes: web::Bytes,
}

impl ImageUpload {
    /// Reads an `image` part. The type is checked before any byte is read
    /// and the size while the chunks arrive.
    pub async fn read(field: &mut Field) -> Result<Self, ApiError> {
        let ext = field
            .content_type()
            .and_then(|mime| extension_for(mime.essence_str()))
            .ok_or_else(|| {
                ApiError::bad_request("Only PNG, JPEG, GIF or WEBP images are allowed.")
            })?;

        let mut bytes = web::BytesMut::new();
        while let Some(chunk) = field.try_next().await.map_err(invalid_form)? {
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(ApiError::bad_request("Image must be at most 5 MB."));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(ApiError::bad_request("Image is empty."));
        }

        Ok(Self {
            ext,
            bytes: bytes.freeze(),
        })
    }
}

/// Writes product images into the upload dir.
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Creates the upload dir if needed.
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating upload dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stores the image as `toode_<millis>.<ext>` and returns its public path.
    pub async fn save(&self, image: ImageUpload) -> Result<String, ApiError> {
        let dir = self.dir.clone();
        let millis = chrono::Utc::now().timestamp_millis();

        let file_name = web::block(move || -> anyhow::Result<String> {
            // two uploads in the same millisecond get consecutive stamps
            let mut stamp = millis;
            loop {
                let name = format!("toode_{}.{}", stamp, image.ext);
                match OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(dir.join(&name))
                {
                    Ok(mut file) => {
                        file.write_all(&image.bytes)
                            .with_context(|| format!("writing {}", name))?;
                        return Ok(name);
                    }
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                    Err(e) => return Err(e).with_context(|| format!("creating {}", name)),
                }
            }
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Upload worker failed");
            ApiError::Internal
        })??;

        debug!(file = %file_name, "Stored upload");
        Ok(format!("/uploads/{}", file_name))
    }

    /// Drops a file written by `save` whose record was never stored.
    pub async fn discard(&self, public_path: &str) {
        let Some(name) = public_path.strip_prefix("/uploads/") else {
            return;
        };
        let path = self.dir.join(name);
        let removed = web::block(move || fs::remove_file(path)).await;
        if !matches!(removed, Ok(Ok(()))) {
            warn!(file = %public_path, "Failed to remove orphaned upload");
        }
    }
}

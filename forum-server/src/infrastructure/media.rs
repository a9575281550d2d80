//! On-disk storage for post attachments under `MEDIA_ROOT/posts/<post id>/`.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageFormat};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::validation::{IMAGE_EXTENSIONS, TEXT_FILE_EXTENSIONS, allowed_extension};

pub const THUMBNAIL_WIDTH: u32 = 320;
pub const THUMBNAIL_HEIGHT: u32 = 240;
pub const MAX_TEXT_FILE_BYTES: usize = 100 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    Rejected(String),
    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<MediaError> for DomainError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Rejected(message) => DomainError::Validation(message),
            MediaError::Image(e) => DomainError::validation(format!("could not decode image: {e}")),
            other => DomainError::Internal(other.to_string()),
        }
    }
}

impl From<DomainError> for MediaError {
    fn from(err: DomainError) -> Self {
        MediaError::Rejected(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decodes, shrinks to fit 320x240 and stores the image. Returns the path
    /// relative to the media root.
    pub async fn save_image(
        &self,
        post_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, MediaError> {
        let extension = allowed_extension(filename, IMAGE_EXTENSIONS)?;
        let format = ImageFormat::from_extension(&extension)
            .ok_or_else(|| MediaError::Rejected(format!("unsupported image type: {extension}")))?;

        let encoded = tokio::task::spawn_blocking(move || thumbnail(&bytes, format)).await??;

        let relative = relative_path(post_id, filename);
        self.write(&relative, &encoded).await?;
        info!(post_id = %post_id, path = %relative, "image stored");
        Ok(relative)
    }

    pub async fn save_text_file(
        &self,
        post_id: Uuid,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<String, MediaError> {
        check_text_file(filename, &bytes)?;

        let relative = relative_path(post_id, filename);
        self.write(&relative, &bytes).await?;
        info!(post_id = %post_id, path = %relative, "text file stored");
        Ok(relative)
    }

    /// Best effort; a missing directory is not an error.
    pub async fn remove_post_media(&self, post_id: Uuid) {
        let dir = self.root.join("posts").join(post_id.to_string());
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(post_id = %post_id, "post media removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(post_id = %post_id, error = %err, "failed to remove post media"),
        }
    }

    /// Best effort removal of one stored attachment.
    pub async fn remove_file(&self, relative: &str) {
        match tokio::fs::remove_file(self.root.join(relative)).await {
            Ok(()) => debug!(path = %relative, "attachment removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %relative, error = %err, "failed to remove attachment"),
        }
    }

    async fn write(&self, relative: &str, bytes: &[u8]) -> Result<(), MediaError> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

fn check_text_file(filename: &str, bytes: &[u8]) -> Result<(), MediaError> {
    allowed_extension(filename, TEXT_FILE_EXTENSIONS)?;
    if bytes.len() > MAX_TEXT_FILE_BYTES {
        return Err(MediaError::Rejected(format!(
            "text file must be at most {} KiB",
            MAX_TEXT_FILE_BYTES / 1024
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(MediaError::Rejected("text file must be valid UTF-8".into()));
    }
    Ok(())
}

fn thumbnail(bytes: &[u8], format: ImageFormat) -> Result<Vec<u8>, MediaError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();

    let img = if width > THUMBNAIL_WIDTH || height > THUMBNAIL_HEIGHT {
        img.thumbnail(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT)
    } else {
        img
    };
    // jpeg has no alpha channel
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format)?;
    Ok(out.into_inner())
}

fn relative_path(post_id: Uuid, filename: &str) -> String {
    format!("posts/{}/{}", post_id, safe_file_name(filename))
}

/// Keeps the final path component and replaces anything outside `[A-Za-z0-9._-]`.
fn safe_file_name(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

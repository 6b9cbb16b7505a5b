//! Profile picture storage.
//!
//! Uploads are decoded, shrunk to fit a 125×125 box (aspect ratio kept) and
//! written under `<static_dir>/img/profilepics/` as `<16 random hex>.<ext>`.
//! Replaced avatars are left on disk.

use crate::db::DEFAULT_IMAGE_FILE;
use crate::error::{BlogError, BlogResult};
use crate::util::random_hex;
use anyhow::Context;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Thumbnail bounding box edge, in pixels.
pub const THUMBNAIL_SIZE: u32 = 125;

/// Random bytes in a stored filename (8 bytes = 16 hex chars).
const FILENAME_TOKEN_BYTES: usize = 8;

/// Path of the avatar directory relative to the static root.
const AVATAR_SUBDIR: &str = "img/profilepics";

/// Extensions accepted for upload.
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
pub struct AvatarStore {
    dir: PathBuf,
}

impl AvatarStore {
    /// Avatar store rooted at `<static_dir>/img/profilepics`.
    pub fn new(static_dir: &Path) -> Self {
        Self {
            dir: static_dir.join(AVATAR_SUBDIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Public URL of an avatar filename.
    pub fn url_for(image_file: &str) -> String {
        format!("/static/{AVATAR_SUBDIR}/{}", urlencoding::encode(image_file))
    }

    /// Create the directory and a plain placeholder for new accounts.
    pub fn ensure_default(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create avatar dir: {}", self.dir.display()))?;
        let default_path = self.dir.join(DEFAULT_IMAGE_FILE);
        if !default_path.exists() {
            let placeholder =
                RgbImage::from_pixel(THUMBNAIL_SIZE, THUMBNAIL_SIZE, Rgb([0xd0, 0xd4, 0xda]));
            placeholder
                .save_with_format(&default_path, ImageFormat::Jpeg)
                .with_context(|| format!("Failed to write {}", default_path.display()))?;
            tracing::info!(path = %default_path.display(), "Wrote placeholder avatar");
        }
        Ok(())
    }

    /// Store an uploaded picture and return its new filename.
    ///
    /// Blocking: decodes and re-encodes the image.
    pub fn save(&self, original_filename: &str, bytes: &[u8]) -> BlogResult<String> {
        let ext = allowed_extension(original_filename).ok_or_else(|| {
            BlogError::InvalidImage(format!(
                "only {} files are allowed",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;
        let format = if ext == "png" {
            ImageFormat::Png
        } else {
            ImageFormat::Jpeg
        };

        let decoded =
            image::load_from_memory(bytes).map_err(|e| BlogError::InvalidImage(e.to_string()))?;
        let thumb = decoded.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);
        // JPEG has no alpha channel.
        let thumb = match format {
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(thumb.to_rgb8()),
            _ => thumb,
        };

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create avatar dir: {}", self.dir.display()))?;
        let filename = format!("{}.{ext}", random_hex(FILENAME_TOKEN_BYTES));
        let path = self.dir.join(&filename);
        thumb
            .save_with_format(&path, format)
            .with_context(|| format!("Failed to write avatar {}", path.display()))?;

        tracing::info!(file = %filename, "Saved avatar");
        Ok(filename)
    }

    /// Remove a saved avatar that never made it onto an account.
    /// The shared placeholder is never removed.
    pub fn discard(&self, image_file: &str) {
        if image_file == DEFAULT_IMAGE_FILE {
            return;
        }
        let path = self.dir.join(image_file);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), "Failed to discard avatar: {e}");
        }
    }
}

/// Lower-cased extension if it is one of `ALLOWED_EXTENSIONS`.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

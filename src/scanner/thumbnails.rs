use image::codecs::jpeg::JpegEncoder;
use md5::{Digest, Md5};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::ThumbnailConfig;
use crate::db::normalize_path;

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("failed to decode source image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode thumbnail: {0}")]
    Encode(#[source] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A thumbnail file on disk, freshly written or reused from the cache.
#[derive(Debug, Clone)]
pub struct GeneratedThumbnail {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub file_size: i64,
}

/// Manages thumbnail generation and caching
pub struct ThumbnailManager {
    cache_dir: PathBuf,
    size: u32,
    quality: u8,
}

impl ThumbnailManager {
    pub fn new(config: &ThumbnailConfig) -> Self {
        Self {
            cache_dir: config.path.clone(),
            size: config.size,
            quality: config.quality,
        }
    }

    /// Ensure cache directory exists
    fn ensure_cache_dir(&self) -> Result<(), ThumbnailError> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Cache filename for an image: the catalog id plus a digest of the
    /// normalized source path, so renames never collide.
    fn cache_path(&self, image_id: i64, original: &Path) -> PathBuf {
        let normalized = normalize_path(original);
        let mut hasher = Md5::new();
        hasher.update(normalized.to_string_lossy().as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        self.cache_dir.join(format!("{}_{}.jpg", image_id, digest))
    }

    /// Generate and cache a thumbnail for the given image.
    /// An already cached file is reused without re-encoding.
    pub fn generate(
        &self,
        image_id: i64,
        original: &Path,
    ) -> Result<GeneratedThumbnail, ThumbnailError> {
        self.ensure_cache_dir()?;

        let cache_path = self.cache_path(image_id, original);

        if cache_path.exists() {
            let (width, height) =
                image::image_dimensions(&cache_path).map_err(ThumbnailError::Decode)?;
            let file_size = fs::metadata(&cache_path)?.len() as i64;
            return Ok(GeneratedThumbnail {
                path: cache_path,
                width,
                height,
                file_size,
            });
        }

        let img = image::open(original).map_err(ThumbnailError::Decode)?;
        let flattened = flatten_onto_white(img);

        // Bound the longer edge, never upscale
        let thumbnail = if flattened.width() <= self.size && flattened.height() <= self.size {
            flattened
        } else {
            flattened.resize(self.size, self.size, image::imageops::FilterType::Lanczos3)
        };

        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, self.quality);
        thumbnail
            .write_with_encoder(encoder)
            .map_err(ThumbnailError::Encode)?;
        let bytes = buf.into_inner();
        fs::write(&cache_path, &bytes)?;

        Ok(GeneratedThumbnail {
            path: cache_path,
            width: thumbnail.width(),
            height: thumbnail.height(),
            file_size: bytes.len() as i64,
        })
    }
}

/// Composite transparent pixels onto a white background so the JPEG
/// output has no black fill where alpha was zero.
fn flatten_onto_white(img: image::DynamicImage) -> image::DynamicImage {
    if !img.color().has_alpha() {
        return img;
    }

    let rgba = img.to_rgba8();
    let mut canvas = image::RgbaImage::from_pixel(
        rgba.width(),
        rgba.height(),
        image::Rgba([255, 255, 255, 255]),
    );
    image::imageops::overlay(&mut canvas, &rgba, 0, 0);

    image::DynamicImage::ImageRgba8(canvas).to_rgb8().into()
}

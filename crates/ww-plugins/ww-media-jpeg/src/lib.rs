//! # ww-media-jpeg
//! wastewise/crates/ww-plugins/ww-media-jpeg/src/lib.rs
//! `ImageProcessor` that normalizes captured bin photos before upload.
//! Features: width capping, JPEG re-encoding, and content-addressed filenames.

use std::io::Cursor;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use sha2::{Digest, Sha256};
use ww_core::traits::ImageProcessor;
use ww_core::PreparedImage;

/// Photos wider than this are scaled down, keeping aspect ratio.
pub const DEFAULT_MAX_WIDTH: u32 = 800;
/// JPEG quality, 0-100.
pub const DEFAULT_QUALITY: u8 = 70;

pub struct JpegImageProcessor {
    max_width: u32,
    quality: u8,
}

impl Default for JpegImageProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WIDTH, DEFAULT_QUALITY)
    }
}

impl JpegImageProcessor {
    pub fn new(max_width: u32, quality: u8) -> Self {
        Self {
            max_width: max_width.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    /// Decode, cap width, drop alpha, encode. CPU-bound; run off the reactor.
    fn encode(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()?
            .decode()?;

        let img = if img.width() > self.max_width {
            let height = scaled_height(img.width(), img.height(), self.max_width);
            img.resize_exact(self.max_width, height, FilterType::Triangle)
        } else {
            img
        };

        // JPEG has no alpha channel
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
        rgb.write_with_encoder(encoder)?;
        Ok(out)
    }
}

fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = (u64::from(height) * u64::from(target_width) + u64::from(width) / 2) / u64::from(width);
    scaled.max(1) as u32
}

#[async_trait]
impl ImageProcessor for JpegImageProcessor {
    /// The filename is the SHA-256 of the encoded bytes, so re-uploads of the
    /// same photo are recognizable.
    async fn prepare(&self, data: Vec<u8>) -> anyhow::Result<PreparedImage> {
        let processor = Self::new(self.max_width, self.quality);
        let bytes = tokio::task::spawn_blocking(move || processor.encode(&data)).await??;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let filename = format!("{}.jpg", hex::encode(hasher.finalize()));

        log::debug!("prepared image {} ({} bytes)", filename, bytes.len());
        Ok(PreparedImage { filename, bytes })
    }
}

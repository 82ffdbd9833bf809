//! Poster image decoding into RGBA8 pixels.

use anyhow::{Context, Result, ensure};
use image::imageops::FilterType;

/// RGBA8 image in CPU memory, ready for GPU upload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl TextureData {
    pub const BYTES_PER_PIXEL: u32 = 4;

    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * Self::BYTES_PER_PIXEL as usize;
        ensure!(
            data.len() == expected,
            "RGBA8 data is {} bytes, expected {} for {}x{}",
            data.len(),
            expected,
            width,
            height
        );
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Decode an encoded image (PNG) from memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes).context("Failed to decode image")?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("Decoded poster {}x{}", width, height);
        Self::new_rgba8(width, height, rgba.into_raw())
    }

    /// Single-color image; used as a stand-in when tests need pixels.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba.repeat(width as usize * height as usize);
        Self {
            data,
            width,
            height,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len()
                == self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL as usize
    }

    /// Downscale (keeping aspect) so neither side exceeds `max_dim`.
    pub fn fit_within(self, max_dim: u32) -> Result<Self> {
        let max_dim = max_dim.max(1);
        if self.width <= max_dim && self.height <= max_dim {
            return Ok(self);
        }
        let scale = max_dim as f32 / self.width.max(self.height) as f32;
        let width = ((self.width as f32 * scale).round() as u32).clamp(1, max_dim);
        let height = ((self.height as f32 * scale).round() as u32).clamp(1, max_dim);
        log::info!(
            "Downscaling poster {}x{} -> {}x{}",
            self.width,
            self.height,
            width,
            height
        );
        let img = image::RgbaImage::from_raw(self.width, self.height, self.data)
            .context("Texture data does not match its dimensions")?;
        let resized = image::imageops::resize(&img, width, height, FilterType::Triangle);
        Self::new_rgba8(width, height, resized.into_raw())
    }

    /// width / height; 1.0 for a degenerate image.
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

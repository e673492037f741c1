//! Source image ingestion (made by FontLab https://www.fontlab.com/)

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;

/// An immutable 8-bit pixel buffer.
///
/// Channels: 1 = gray, 2 = gray + alpha, 3 = RGB, 4 = RGBA. Rows are stored
/// top to bottom, as decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    width: u32,
    height: u32,
    channels: u8,
    pixels: Vec<u8>,
}

impl SourceImage {
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self> {
        if !(1..=4).contains(&channels) {
            return Err(anyhow!("unsupported channel count: {channels}"));
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("image has no pixels ({width}x{height})"));
        }
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            return Err(anyhow!(
                "pixel buffer holds {} bytes, {width}x{height}x{channels} needs {expected}",
                pixels.len()
            ));
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels,
        })
    }

    /// Decode PNG or JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes).context("decoding image")?;
        Ok(Self::from_dynamic(decoded))
    }

    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
        Self::decode(&data).with_context(|| format!("decoding image {}", path.display()))
    }

    pub fn from_dynamic(img: DynamicImage) -> Self {
        let (width, height, channels, pixels) = match img {
            DynamicImage::ImageLuma8(buf) => (buf.width(), buf.height(), 1, buf.into_raw()),
            DynamicImage::ImageLumaA8(buf) => (buf.width(), buf.height(), 2, buf.into_raw()),
            DynamicImage::ImageRgb8(buf) => (buf.width(), buf.height(), 3, buf.into_raw()),
            other => {
                let buf = other.into_rgba8();
                (buf.width(), buf.height(), 4, buf.into_raw())
            }
        };
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Gray level (mean of RGB) and alpha of the pixel at `(x, y)`.
    pub fn luma_alpha(&self, x: u32, y: u32) -> (u8, u8) {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        let px = &self.pixels[idx..idx + self.channels as usize];
        match px {
            [g] => (*g, 255),
            [g, a] => (*g, *a),
            [r, g, b] => (mean3(*r, *g, *b), 255),
            [r, g, b, a] => (mean3(*r, *g, *b), *a),
            _ => unreachable!("channel count validated on construction"),
        }
    }
}

fn mean3(r: u8, g: u8, b: u8) -> u8 {
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}

use image::{
    codecs::{jpeg, png},
    ExtendedColorType, ImageEncoder,
};

use crate::{render::PixelBuffer, Result};

/// Turns a read-back frame into file bytes.
pub trait FrameEncoder: Send + Sync {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;
    /// `quality` is in `0..=1`; lossless encoders ignore it.
    fn encode(&self, frame: &PixelBuffer, quality: f32) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl FrameEncoder for JpegEncoder {
    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn encode(&self, frame: &PixelBuffer, quality: f32) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut encoder = jpeg::JpegEncoder::new_with_quality(&mut out, jpeg_quality(quality));
            encoder.encode(&frame.to_rgb(), frame.width, frame.height, ExtendedColorType::Rgb8)?;
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl FrameEncoder for PngEncoder {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn encode(&self, frame: &PixelBuffer, _quality: f32) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        png::PngEncoder::new(&mut out).write_image(
            &frame.rgba,
            frame.width,
            frame.height,
            ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() { quality } else { 1.0 };
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

use super::ImageCodec;
use crate::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

/// Lossy JPEG pipeline backed by the `image` crate.
pub struct JpegCodec {
    filter: FilterType,
}

impl JpegCodec {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a `[0, 1]` quality factor onto the encoder's 1..=100 scale.
pub(crate) fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Composites onto opaque black, the way a canvas JPEG export does.
fn flatten(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let scale = |c: u8| ((u16::from(c) * alpha + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([scale(pixel[0]), scale(pixel[1]), scale(pixel[2])]));
    }
    out
}

impl ImageCodec for JpegCodec {
    type Surface = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes).map_err(|e| Error::Decode(e.to_string()))
    }

    fn dimensions(&self, surface: &DynamicImage) -> (u32, u32) {
        (surface.width(), surface.height())
    }

    fn render(&self, surface: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage> {
        if width == 0 || height == 0 {
            return Err(Error::Invariant(format!(
                "cannot render a {}x{} canvas",
                width, height
            )));
        }

        let flattened = if (surface.width(), surface.height()) == (width, height) {
            flatten(surface)
        } else {
            flatten(&surface.resize_exact(width, height, self.filter))
        };
        Ok(DynamicImage::ImageRgb8(flattened))
    }

    fn encode(&self, surface: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality));
        surface.write_with_encoder(encoder)?;
        Ok(buf)
    }

    fn output_mime(&self) -> &'static str {
        "image/jpeg"
    }
}

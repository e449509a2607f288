use super::ImageCodec;
use crate::{Error, Result};
use std::sync::{Arc, Mutex};

const MAGIC: &[u8; 4] = b"MOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSurface {
    pub width: u32,
    pub height: u32,
}

/// Codec whose encoded size is a linear function of pixel count and quality.
#[derive(Clone)]
pub struct MockCodec {
    bytes_per_pixel: f64,
    min_output: usize,
    should_fail: Arc<Mutex<bool>>,
    qualities: Arc<Mutex<Vec<f32>>>,
    renders: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl MockCodec {
    pub fn new() -> Self {
        Self {
            bytes_per_pixel: 0.5,
            min_output: 16,
            should_fail: Arc::new(Mutex::new(false)),
            qualities: Arc::new(Mutex::new(Vec::new())),
            renders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Encoded bytes per pixel at quality 1.0.
    pub fn with_bytes_per_pixel(mut self, bytes_per_pixel: f64) -> Self {
        self.bytes_per_pixel = bytes_per_pixel;
        self
    }

    /// Smallest output the encoder ever produces, whatever the quality.
    pub fn with_min_output(mut self, min_output: usize) -> Self {
        self.min_output = min_output;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    /// Source bytes this codec decodes into a `width x height` surface.
    pub fn source_image(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&width.to_le_bytes());
        bytes.extend_from_slice(&height.to_le_bytes());
        bytes
    }

    pub fn get_encode_qualities(&self) -> Vec<f32> {
        self.qualities.lock().unwrap().clone()
    }

    pub fn get_renders(&self) -> Vec<(u32, u32)> {
        self.renders.lock().unwrap().clone()
    }
}

impl Default for MockCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageCodec for MockCodec {
    type Surface = MockSurface;

    fn decode(&self, bytes: &[u8]) -> Result<MockSurface> {
        if *self.should_fail.lock().unwrap() {
            return Err(Error::Decode("Mock failure".to_string()));
        }

        match bytes {
            [m0, m1, m2, m3, w @ .., h0, h1, h2, h3]
                if [*m0, *m1, *m2, *m3] == *MAGIC && w.len() == 4 =>
            {
                Ok(MockSurface {
                    width: u32::from_le_bytes([w[0], w[1], w[2], w[3]]),
                    height: u32::from_le_bytes([*h0, *h1, *h2, *h3]),
                })
            }
            _ => Err(Error::Decode("unrecognized mock image".to_string())),
        }
    }

    fn dimensions(&self, surface: &MockSurface) -> (u32, u32) {
        (surface.width, surface.height)
    }

    fn render(&self, _surface: &MockSurface, width: u32, height: u32) -> Result<MockSurface> {
        self.renders.lock().unwrap().push((width, height));
        Ok(MockSurface { width, height })
    }

    fn encode(&self, surface: &MockSurface, quality: f32) -> Result<Vec<u8>> {
        self.qualities.lock().unwrap().push(quality);

        let pixels = f64::from(surface.width) * f64::from(surface.height);
        let len = (pixels * self.bytes_per_pixel * f64::from(quality)).round() as usize;
        Ok(vec![0xAB; len.max(self.min_output)])
    }

    fn output_mime(&self) -> &'static str {
        "image/jpeg"
    }
}

//! Image decode/render/encode seam
//!
//! The transcoder only talks to an [`ImageCodec`], so the resize and
//! quality-search logic can run against the real JPEG pipeline or a
//! deterministic mock.

pub mod jpeg;
pub mod mock;

pub use jpeg::JpegCodec;
pub use mock::{MockCodec, MockSurface};

use crate::Result;

pub trait ImageCodec: Send + Sync {
    /// Decoded pixel surface.
    type Surface: Send;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Surface>;

    fn dimensions(&self, surface: &Self::Surface) -> (u32, u32);

    /// Draw `surface` onto an opaque canvas of the given size.
    fn render(&self, surface: &Self::Surface, width: u32, height: u32) -> Result<Self::Surface>;

    /// Encode with `quality` in `[0, 1]`.
    fn encode(&self, surface: &Self::Surface, quality: f32) -> Result<Vec<u8>>;

    fn output_mime(&self) -> &'static str;
}

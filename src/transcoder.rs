//! Size-bounded image transcoding
//!
//! Shrinks an inline image so that its longer side fits `max_side` and its
//! encoded data URL fits `max_size_kb`, lowering the lossy quality step by
//! step until the budget is met or the quality floor is reached.

use crate::codec::ImageCodec;
use crate::data_url::DataUrl;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_QUALITY: f32 = 0.7;
pub const DEFAULT_MAX_SIDE: u32 = 2048;
pub const DEFAULT_MAX_SIZE_KB: usize = 1024;
pub const DEFAULT_UNSCALED_QUALITY: f32 = 0.6;

/// Parameters for a single transcode call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscodeRequest {
    pub quality: f32,
    pub max_side: u32,
    pub max_size_kb: usize,
}

impl TranscodeRequest {
    pub fn new(quality: f32) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    pub fn with_max_side(mut self, max_side: u32) -> Self {
        self.max_side = max_side;
        self
    }

    pub fn with_max_size_kb(mut self, max_size_kb: usize) -> Self {
        self.max_size_kb = max_size_kb;
        self
    }
}

impl Default for TranscodeRequest {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            max_side: DEFAULT_MAX_SIDE,
            max_size_kb: DEFAULT_MAX_SIZE_KB,
        }
    }
}

/// Transcoder-wide behavior, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TranscoderConfig {
    /// Quality used when no downscaling happens; `None` keeps the caller's.
    pub quality_when_unscaled: Option<f32>,
    pub quality_floor: f32,
    pub quality_step: f32,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            quality_when_unscaled: Some(DEFAULT_UNSCALED_QUALITY),
            quality_floor: 0.01,
            quality_step: 0.01,
        }
    }
}

/// Outcome of a transcode: the data URL plus how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcoded {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub encodes: u32,
    pub within_budget: bool,
}

/// Output canvas size: the longer side is capped at `max_side`, never upscaled.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_side {
        return (width, height);
    }

    let scale = f64::from(max_side) / f64::from(longest);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max_side);
    if width >= height {
        (max_side, scaled(height))
    } else {
        (scaled(width), max_side)
    }
}

fn to_hundredths(quality: f32) -> u32 {
    (quality * 100.0).round() as u32
}

fn validate_quality(quality: f32) -> Result<f32> {
    if quality.is_finite() && (0.0..=1.0).contains(&quality) {
        Ok(quality)
    } else {
        Err(Error::InvalidQuality(quality))
    }
}

pub struct Transcoder<C: ImageCodec> {
    codec: Arc<C>,
    config: TranscoderConfig,
}

impl<C: ImageCodec> Clone for Transcoder<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            config: self.config,
        }
    }
}

impl<C: ImageCodec> Transcoder<C> {
    pub fn new(codec: C) -> Self {
        Self::with_config(codec, TranscoderConfig::default())
    }

    pub fn with_config(codec: C, config: TranscoderConfig) -> Self {
        Self {
            codec: Arc::new(codec),
            config,
        }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Transcode a `data:` URL into a size-bounded JPEG `data:` URL.
    pub fn transcode(&self, source: &str, request: &TranscodeRequest) -> Result<Transcoded> {
        let source: DataUrl = source.parse()?;
        self.transcode_bytes(source.bytes(), request)
    }

    pub fn transcode_bytes(&self, bytes: &[u8], request: &TranscodeRequest) -> Result<Transcoded> {
        let requested = validate_quality(request.quality)?;
        let floor = to_hundredths(validate_quality(self.config.quality_floor)?).max(1);
        let step = to_hundredths(self.config.quality_step).max(1);
        if request.max_side == 0 {
            return Err(Error::Invariant("max_side must be positive".to_string()));
        }

        let surface = self.codec.decode(bytes)?;
        let (width, height) = self.codec.dimensions(&surface);
        if width == 0 || height == 0 {
            return Err(Error::Decode(format!(
                "image has empty dimensions {}x{}",
                width, height
            )));
        }

        let (out_width, out_height) = fit_within(width, height, request.max_side);
        let scaled = (out_width, out_height) != (width, height);
        let quality = match (scaled, self.config.quality_when_unscaled) {
            (false, Some(fixed)) => validate_quality(fixed)?,
            _ => requested,
        };
        debug!(
            "Transcoding {}x{} -> {}x{} at quality {:.2}",
            width, height, out_width, out_height, quality
        );

        let canvas = self.codec.render(&surface, out_width, out_height)?;
        let budget = request.max_size_kb.saturating_mul(1024);

        let mut hundredths = to_hundredths(quality).max(floor);
        let mut candidate = self.encode(&canvas, hundredths)?;
        let mut encodes = 1;

        while candidate.encoded_len() > budget && hundredths > floor {
            hundredths = hundredths.saturating_sub(step).max(floor);
            candidate = self.encode(&canvas, hundredths)?;
            encodes += 1;
            debug!(
                "Re-encoded at quality {:.2}: {} bytes",
                hundredths as f32 / 100.0,
                candidate.encoded_len()
            );
        }

        let within_budget = candidate.encoded_len() <= budget;
        if !within_budget {
            warn!(
                "Image still {} KB after reaching quality floor {:.2}, budget is {} KB",
                candidate.encoded_len() / 1024,
                floor as f32 / 100.0,
                request.max_size_kb
            );
        }

        Ok(Transcoded {
            data_url: candidate.to_string(),
            width: out_width,
            height: out_height,
            quality: hundredths as f32 / 100.0,
            encodes,
            within_budget,
        })
    }

    fn encode(&self, canvas: &C::Surface, hundredths: u32) -> Result<DataUrl> {
        let bytes = self.codec.encode(canvas, hundredths as f32 / 100.0)?;
        Ok(DataUrl::new(self.codec.output_mime(), bytes))
    }
}

impl<C> Transcoder<C>
where
    C: ImageCodec + 'static,
{
    /// Runs [`Transcoder::transcode`] on the blocking pool.
    pub async fn transcode_blocking(
        &self,
        source: String,
        request: TranscodeRequest,
    ) -> Result<Transcoded> {
        let transcoder = self.clone();
        tokio::task::spawn_blocking(move || transcoder.transcode(&source, &request))
            .await
            .map_err(|e| Error::Invariant(format!("Transcode task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{JpegCodec, MockCodec};
    use image::{ImageFormat, Rgb, RgbImage};

    fn mock_source(width: u32, height: u32) -> String {
        DataUrl::new("image/png", MockCodec::source_image(width, height)).to_string()
    }

    fn noisy_png(width: u32, height: u32) -> String {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        DataUrl::new("image/png", bytes).to_string()
    }

    #[test]
    fn test_fit_within_keeps_small_images() {
        assert_eq!(fit_within(10, 10, 2048), (10, 10));
        assert_eq!(fit_within(2048, 100, 2048), (2048, 100));
    }

    #[test]
    fn test_fit_within_scales_longer_side() {
        assert_eq!(fit_within(4096, 2048, 2048), (2048, 1024));
        assert_eq!(fit_within(1000, 3000, 2048), (683, 2048));
        assert_eq!(fit_within(5000, 1, 100), (100, 1));
    }

    #[test]
    fn test_large_image_is_downscaled_with_caller_quality() {
        let codec = MockCodec::new().with_bytes_per_pixel(0.01);
        let transcoder = Transcoder::new(codec.clone());

        let result = transcoder
            .transcode(&mock_source(4096, 2048), &TranscodeRequest::new(0.7))
            .unwrap();

        assert_eq!((result.width, result.height), (2048, 1024));
        assert_eq!(codec.get_renders(), vec![(2048, 1024)]);
        assert_eq!(codec.get_encode_qualities(), vec![0.7]);
        assert!(result.within_budget);
        assert!(result.data_url.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_unscaled_image_uses_fixed_quality() {
        let codec = MockCodec::new();
        let transcoder = Transcoder::new(codec.clone());

        let result = transcoder
            .transcode(&mock_source(10, 10), &TranscodeRequest::new(0.95))
            .unwrap();

        assert_eq!((result.width, result.height), (10, 10));
        assert_eq!(result.quality, 0.6);
        assert_eq!(codec.get_encode_qualities(), vec![0.6]);
    }

    #[test]
    fn test_unscaled_quality_can_defer_to_caller() {
        let codec = MockCodec::new();
        let config = TranscoderConfig {
            quality_when_unscaled: None,
            ..TranscoderConfig::default()
        };
        let transcoder = Transcoder::with_config(codec.clone(), config);

        let result = transcoder
            .transcode(&mock_source(10, 10), &TranscodeRequest::new(0.95))
            .unwrap();

        assert_eq!(result.quality, 0.95);
        assert_eq!(codec.get_encode_qualities(), vec![0.95]);
    }

    #[test]
    fn test_quality_steps_down_until_within_budget() {
        // 1000x1000 at 0.1 bytes/px: 100 KB * quality, base64 inflates by 4/3.
        let codec = MockCodec::new().with_bytes_per_pixel(0.1);
        let transcoder = Transcoder::new(codec.clone());
        let request = TranscodeRequest::new(0.7)
            .with_max_side(500)
            .with_max_size_kb(10);

        let result = transcoder
            .transcode(&mock_source(1000, 1000), &request)
            .unwrap();

        assert!(result.within_budget);
        assert!(result.data_url.len() <= 10 * 1024);
        assert!(result.quality < 0.7);
        assert_eq!(result.encodes as usize, codec.get_encode_qualities().len());

        let qualities = codec.get_encode_qualities();
        assert!(qualities.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_unreachable_budget_stops_at_floor() {
        let codec = MockCodec::new().with_min_output(4096);
        let transcoder = Transcoder::new(codec.clone());
        let request = TranscodeRequest::new(0.7).with_max_size_kb(1);

        let result = transcoder
            .transcode(&mock_source(10, 10), &request)
            .unwrap();

        assert!(!result.within_budget);
        assert_eq!(result.quality, 0.01);
        // 0.60 down to 0.01 in hundredths.
        assert_eq!(result.encodes, 60);
        assert!(codec.get_encode_qualities().iter().all(|q| *q >= 0.01));
    }

    #[test]
    fn test_zero_budget_terminates() {
        let transcoder = Transcoder::new(MockCodec::new());
        let request = TranscodeRequest::new(1.0)
            .with_max_side(1)
            .with_max_size_kb(0);

        let result = transcoder.transcode(&mock_source(8, 2), &request).unwrap();

        assert!(!result.within_budget);
        assert!(result.encodes <= 100);
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let transcoder = Transcoder::new(MockCodec::new());

        for quality in [-0.1, 1.5, f32::NAN] {
            let err = transcoder
                .transcode(&mock_source(10, 10), &TranscodeRequest::new(quality))
                .unwrap_err();
            assert!(matches!(err, Error::InvalidQuality(_)));
        }
    }

    #[test]
    fn test_decode_failure_is_explicit() {
        let transcoder = Transcoder::new(MockCodec::new().with_failure(true));

        let err = transcoder
            .transcode(&mock_source(10, 10), &TranscodeRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_malformed_source_is_decode_error() {
        let transcoder = Transcoder::new(MockCodec::new());

        let err = transcoder
            .transcode("not a data url", &TranscodeRequest::default())
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_jpeg_codec_downscales_real_image() {
        let transcoder = Transcoder::new(JpegCodec::new());
        let request = TranscodeRequest::new(0.7).with_max_side(64);

        let result = transcoder.transcode(&noisy_png(160, 80), &request).unwrap();
        assert_eq!((result.width, result.height), (64, 32));

        let output: DataUrl = result.data_url.parse().unwrap();
        assert_eq!(output.mime(), "image/jpeg");
        let decoded = image::load_from_memory(output.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 32));
    }

    #[test]
    fn test_jpeg_codec_meets_tight_budget() {
        let transcoder = Transcoder::new(JpegCodec::new());
        let request = TranscodeRequest::new(0.9).with_max_size_kb(8);

        let result = transcoder.transcode(&noisy_png(96, 96), &request).unwrap();

        assert!(result.within_budget || result.quality == 0.01);
        if result.within_budget {
            assert!(result.data_url.len() <= 8 * 1024);
        }
        assert!(result.encodes <= 100);
    }

    #[tokio::test]
    async fn test_transcode_blocking() {
        let transcoder = Transcoder::new(MockCodec::new());

        let result = transcoder
            .transcode_blocking(mock_source(3000, 1500), TranscodeRequest::default())
            .await
            .unwrap();
        assert_eq!((result.width, result.height), (2048, 1024));
    }
}

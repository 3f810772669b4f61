//! Red-channel extraction from raw RGBA camera frames.
//!
//! With a fingertip pressed against the lens and the torch on, the red channel
//! carries the blood-volume pulse. Each frame is reduced to one scalar: the
//! mean red intensity over all pixels.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::outcome::{Insufficiency, Outcome};

/// Bytes per pixel (R, G, B, A).
pub const BYTES_PER_PIXEL: usize = 4;

/// A borrowed camera capture in RGBA byte layout.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    width: usize,
    height: usize,
    data: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Wrap raw pixel bytes.
    ///
    /// Empty `data` is accepted regardless of the declared size and means
    /// "no data this tick". Non-empty data must be exactly `width * height * 4`.
    pub fn new(width: usize, height: usize, data: &'a [u8]) -> Result<Self> {
        let expected = width * height * BYTES_PER_PIXEL;
        if !data.is_empty() && data.len() != expected {
            return Err(SignalError::FrameSizeMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / BYTES_PER_PIXEL
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() < BYTES_PER_PIXEL
    }

    fn pixels(&self) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.data.chunks_exact(BYTES_PER_PIXEL)
    }
}

/// Per-frame colour statistics and fingertip presence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameStats {
    pub mean_red: f32,
    pub mean_green: f32,
    pub mean_blue: f32,
    /// `(R + G + B) / 3` averaged over the frame.
    pub brightness: f32,
    /// Fraction of pixels that look like illuminated tissue.
    pub valid_pixel_ratio: f32,
    pub finger_detected: bool,
}

/// Thresholds used to decide whether a fingertip covers the lens.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Minimum red value for a pixel to count as tissue
    pub min_red_value: f32,
    /// Red must exceed `min_red_dominance * max(green, blue)`
    pub min_red_dominance: f32,
    /// Minimum fraction of tissue pixels for finger presence
    pub min_valid_pixels_ratio: f32,
    /// Minimum mean brightness for finger presence
    pub min_brightness: f32,
    /// Multiplier applied to the extracted red sample
    pub red_intensity: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_red_value: 15.0,
            min_red_dominance: 1.2,
            min_valid_pixels_ratio: 0.2,
            min_brightness: 80.0,
            red_intensity: 1.0,
        }
    }
}

/// Reduces a frame to a scalar red-intensity sample.
#[derive(Debug, Clone, Default)]
pub struct ChannelExtractor {
    config: ExtractorConfig,
}

impl ChannelExtractor {
    pub fn new() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// First-channel value of every pixel, in pixel order.
    ///
    /// Empty frame data yields an empty vector.
    pub fn extract_red_channel(frame: &Frame<'_>) -> Vec<f32> {
        frame.pixels().map(|px| px[0] as f32).collect()
    }

    /// Colour statistics for one frame.
    pub fn frame_stats(&self, frame: &Frame<'_>) -> Outcome<FrameStats> {
        if frame.is_empty() {
            return Outcome::Insufficient(Insufficiency::EmptyWindow);
        }

        let mut sum = [0u64; 3];
        let mut valid = 0usize;
        for px in frame.pixels() {
            let (r, g, b) = (px[0], px[1], px[2]);
            sum[0] += r as u64;
            sum[1] += g as u64;
            sum[2] += b as u64;

            let r = r as f32;
            let other = g.max(b) as f32;
            if r >= self.config.min_red_value && r >= self.config.min_red_dominance * other {
                valid += 1;
            }
        }

        let n = frame.pixel_count() as f32;
        let mean_red = sum[0] as f32 / n;
        let mean_green = sum[1] as f32 / n;
        let mean_blue = sum[2] as f32 / n;
        let brightness = (mean_red + mean_green + mean_blue) / 3.0;
        let valid_pixel_ratio = valid as f32 / n;
        let finger_detected = valid_pixel_ratio >= self.config.min_valid_pixels_ratio
            && brightness >= self.config.min_brightness;

        log::trace!(
            "frame stats: red={:.1} brightness={:.1} valid={:.2} finger={}",
            mean_red,
            brightness,
            valid_pixel_ratio,
            finger_detected
        );

        Outcome::Ready(FrameStats {
            mean_red,
            mean_green,
            mean_blue,
            brightness,
            valid_pixel_ratio,
            finger_detected,
        })
    }

    /// Mean red intensity scaled by the configured red gain.
    pub fn extract(&self, frame: &Frame<'_>) -> Outcome<f32> {
        self.frame_stats(frame)
            .map(|stats| stats.mean_red * self.config.red_intensity)
    }
}

//! Background/content pixel classification.
//!
//! A pixel is *content* when any of its colour channels is brighter than the
//! matching background threshold. Encoded video rarely produces a perfect
//! black, so the thresholds sit a little above zero.

use crate::error::UnletterboxError;

/// Per-channel maximum intensities still considered background.
///
/// A channel value exactly equal to its threshold is background; only values
/// strictly above it count as content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Thresholds {
    /// Red channel threshold.
    pub red: u8,
    /// Green channel threshold.
    pub green: u8,
    /// Blue channel threshold.
    pub blue: u8,
}

/// Default background thresholds: near-black on every channel.
pub const DEFAULT_THRESHOLDS: Thresholds = Thresholds::uniform(7);

impl Default for Thresholds {
    fn default() -> Self {
        DEFAULT_THRESHOLDS
    }
}

impl Thresholds {
    /// Build thresholds from explicit per-channel values.
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Use the same threshold for all three channels.
    pub const fn uniform(value: u8) -> Self {
        Self::new(value, value, value)
    }

    /// Classify a single pixel given as ordered `[red, green, blue, ..]`
    /// channel values.
    ///
    /// Extra channels (e.g. alpha) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`UnletterboxError::InvalidPixel`] if fewer than three
    /// channels are present.
    pub fn is_content(&self, pixel: &[u8]) -> Result<bool, UnletterboxError> {
        let [red, green, blue, ..] = pixel else {
            return Err(UnletterboxError::InvalidPixel {
                reason: format!("expected 3 colour channels, got {}", pixel.len()),
            });
        };

        Ok(*red > self.red || *green > self.green || *blue > self.blue)
    }
}

/// Free-function form of [`Thresholds::is_content`].
pub fn is_content(pixel: &[u8], thresholds: &Thresholds) -> Result<bool, UnletterboxError> {
    thresholds.is_content(pixel)
}

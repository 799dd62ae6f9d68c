//! Detection configuration.
//!
//! [`DetectionOptions`] is an immutable bundle of everything the detector
//! needs: background thresholds, the noise allowance, the overlay exclusion
//! predicate, the aggregation strategy, and where in the video to sample.
//! It is built once and passed by reference to every component.
//!
//! # Example
//!
//! ```
//! use unletterbox::{DetectionOptions, OverlayRegion, Thresholds};
//!
//! let options = DetectionOptions::new()
//!     .with_thresholds(Thresholds::uniform(12))
//!     .with_noise_allowance(4)
//!     .with_exclusion(OverlayRegion::new(140, 50));
//! assert_eq!(options.noise_allowance, 4);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::{
    aggregate::{EdgeAggregator, Median},
    classifier::{DEFAULT_THRESHOLDS, Thresholds},
    overlay::{ExclusionPredicate, OverlayRegion},
};

/// Content pixels tolerated in a scan before a line counts as content.
pub const DEFAULT_NOISE_ALLOWANCE: u32 = 16;

/// Fractions of the duration at which frames are sampled.
///
/// The very start and end are avoided because fades and title cards there
/// are often darker than the rest of the video.
pub const DEFAULT_SAMPLE_FRACTIONS: [f64; 3] = [0.1, 0.5, 0.9];

/// Configuration for border detection.
///
/// A default-constructed value uses the crate constants:
/// [`DEFAULT_THRESHOLDS`], [`DEFAULT_NOISE_ALLOWANCE`], a default
/// [`OverlayRegion`] in both top corners, the [`Median`] aggregator, and
/// [`DEFAULT_SAMPLE_FRACTIONS`].
#[derive(Clone)]
pub struct DetectionOptions {
    /// Background thresholds for the pixel classifier.
    pub thresholds: Thresholds,
    /// Content pixels tolerated before a scan line is declared content.
    pub noise_allowance: u32,
    /// Predicate deciding which pixels never count.
    pub(crate) exclusion: Arc<dyn ExclusionPredicate>,
    /// Strategy combining per-frame estimates into one value per side.
    pub(crate) aggregator: Arc<dyn EdgeAggregator>,
    /// Fractions of the duration at which to sample frames.
    pub(crate) sample_fractions: Vec<f64>,
}

impl Debug for DetectionOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DetectionOptions")
            .field("thresholds", &self.thresholds)
            .field("noise_allowance", &self.noise_allowance)
            .field("sample_fractions", &self.sample_fractions)
            .finish_non_exhaustive()
    }
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS,
            noise_allowance: DEFAULT_NOISE_ALLOWANCE,
            exclusion: Arc::new(OverlayRegion::default()),
            aggregator: Arc::new(Median),
            sample_fractions: DEFAULT_SAMPLE_FRACTIONS.to_vec(),
        }
    }
}

impl DetectionOptions {
    /// Create options with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the background thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the noise allowance.
    #[must_use]
    pub fn with_noise_allowance(mut self, noise_allowance: u32) -> Self {
        self.noise_allowance = noise_allowance;
        self
    }

    /// Replace the exclusion predicate.
    #[must_use]
    pub fn with_exclusion<P: ExclusionPredicate + 'static>(mut self, exclusion: P) -> Self {
        self.exclusion = Arc::new(exclusion);
        self
    }

    /// Disable overlay exclusion entirely.
    #[must_use]
    pub fn without_exclusion(self) -> Self {
        self.with_exclusion(OverlayRegion::disabled())
    }

    /// Replace the aggregation strategy.
    #[must_use]
    pub fn with_aggregator<A: EdgeAggregator + 'static>(mut self, aggregator: A) -> Self {
        self.aggregator = Arc::new(aggregator);
        self
    }

    /// Set the sample positions as fractions of the duration.
    ///
    /// Values are clamped to `0.0..=1.0`; non-finite values are dropped.
    #[must_use]
    pub fn with_sample_fractions(mut self, fractions: &[f64]) -> Self {
        self.sample_fractions = fractions
            .iter()
            .filter(|fraction| fraction.is_finite())
            .map(|fraction| fraction.clamp(0.0, 1.0))
            .collect();
        self
    }

    /// The configured sample fractions.
    pub fn sample_fractions(&self) -> &[f64] {
        &self.sample_fractions
    }

    /// The configured exclusion predicate.
    pub fn exclusion(&self) -> &dyn ExclusionPredicate {
        self.exclusion.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_crate_constants() {
        let options = DetectionOptions::new();
        assert_eq!(options.thresholds, Thresholds::uniform(7));
        assert_eq!(options.noise_allowance, DEFAULT_NOISE_ALLOWANCE);
        assert_eq!(options.sample_fractions(), &[0.1, 0.5, 0.9]);
        assert!(options.exclusion().is_excluded(0, 0, 1920, 1080));
        assert!(!options.exclusion().is_excluded(960, 540, 1920, 1080));
    }

    #[test]
    fn exclusion_can_be_disabled() {
        let options = DetectionOptions::new().without_exclusion();
        assert!(!options.exclusion().is_excluded(0, 0, 1920, 1080));
    }

    #[test]
    fn sample_fractions_are_sanitised() {
        let options = DetectionOptions::new().with_sample_fractions(&[-0.5, 0.25, f64::NAN, 3.0]);
        assert_eq!(options.sample_fractions(), &[0.0, 0.25, 1.0]);
    }
}

//! Multi-frame border aggregation.
//!
//! A single frame is a poor witness for the border: a dark scene, a fade, or
//! compression noise can move any edge. [`detect_crop`] samples several
//! frames spread over the video, scans each one, and combines each side's
//! values with an [`EdgeAggregator`] ([`Median`] by default).
//!
//! # Example
//!
//! ```
//! use unletterbox::{EdgeAggregator, Median};
//!
//! assert_eq!(Median.combine(&[10, 40, 20]), Some(20));
//! ```

use std::time::Duration;

use image::DynamicImage;

use crate::{
    configuration::DetectionOptions,
    error::UnletterboxError,
    scanner::{EdgeEstimate, EdgeScanner, rgb_frame},
};

/// Something that can hand out decoded frames by timestamp.
///
/// [`MediaFile`](crate::MediaFile) implements this over FFmpeg; tests
/// implement it over synthetic images.
pub trait FrameSource {
    /// Total duration of the clip.
    fn duration(&self) -> Duration;

    /// Decode the frame shown at `timestamp`.
    fn frame_at(&mut self, timestamp: Duration) -> Result<DynamicImage, UnletterboxError>;
}

/// Combines one side's per-frame estimates into a single value.
pub trait EdgeAggregator: Send + Sync {
    /// Combine `values`. Returns `None` only when `values` is empty.
    fn combine(&self, values: &[u32]) -> Option<u32>;
}

/// The median of the estimates.
///
/// For an odd count this is the middle value after sorting. For an even
/// count it is the mean of the two middle values, rounded down.
#[derive(Debug, Clone, Copy, Default)]
pub struct Median;

impl EdgeAggregator for Median {
    fn combine(&self, values: &[u32]) -> Option<u32> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        let middle = sorted.len() / 2;

        if sorted.len() % 2 == 1 {
            Some(sorted[middle])
        } else {
            let sum = u64::from(sorted[middle - 1]) + u64::from(sorted[middle]);
            Some((sum / 2) as u32)
        }
    }
}

/// The final inclusive content bounds of a `frame_width × frame_height`
/// video.
///
/// Always satisfies `left < right < frame_width` and
/// `top < bottom < frame_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CropRectangle {
    left: u32,
    right: u32,
    top: u32,
    bottom: u32,
    frame_width: u32,
    frame_height: u32,
}

impl CropRectangle {
    /// Build a rectangle, checking it lies inside the frame and has positive
    /// extent on both axes.
    ///
    /// # Errors
    ///
    /// Returns [`UnletterboxError::InvalidCropRectangle`] if the invariant
    /// does not hold.
    pub fn new(
        left: u32,
        right: u32,
        top: u32,
        bottom: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Self, UnletterboxError> {
        if left >= right || right >= frame_width || top >= bottom || bottom >= frame_height {
            return Err(UnletterboxError::InvalidCropRectangle {
                left,
                right,
                top,
                bottom,
                width: frame_width,
                height: frame_height,
            });
        }

        Ok(Self {
            left,
            right,
            top,
            bottom,
            frame_width,
            frame_height,
        })
    }

    /// Leftmost content column.
    pub fn left(&self) -> u32 {
        self.left
    }

    /// Rightmost content column.
    pub fn right(&self) -> u32 {
        self.right
    }

    /// Topmost content row.
    pub fn top(&self) -> u32 {
        self.top
    }

    /// Bottommost content row.
    pub fn bottom(&self) -> u32 {
        self.bottom
    }

    /// Width of the cropped picture.
    pub fn width(&self) -> u32 {
        self.right - self.left + 1
    }

    /// Height of the cropped picture.
    pub fn height(&self) -> u32 {
        self.bottom - self.top + 1
    }

    /// Dimensions of the frame the rectangle was detected in.
    pub fn frame_dimensions(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Picture size after encoding to 4:2:0, which needs even dimensions.
    ///
    /// An odd width or height loses its last column or row; neither drops
    /// below 2.
    pub fn encoded_dimensions(&self) -> (u32, u32) {
        ((self.width() & !1).max(2), (self.height() & !1).max(2))
    }

    /// `true` if the rectangle covers the whole frame.
    pub fn is_full_frame(&self) -> bool {
        self.width() == self.frame_width && self.height() == self.frame_height
    }
}

/// Timestamps at which to sample a clip of length `duration`.
///
/// Fractions are clamped to `0.0..=1.0`; NaN and infinite values are
/// skipped.
pub fn sample_timestamps(duration: Duration, fractions: &[f64]) -> Vec<Duration> {
    fractions
        .iter()
        .filter(|fraction| fraction.is_finite())
        .map(|fraction| duration.mul_f64(fraction.clamp(0.0, 1.0)))
        .collect()
}

/// Combine per-frame estimates into a validated [`CropRectangle`].
///
/// # Errors
///
/// - [`UnletterboxError::NoSamples`] if `estimates` is empty.
/// - [`UnletterboxError::InvalidCropRectangle`] if the combined bounds are
///   not a valid rectangle.
pub fn aggregate_estimates(
    estimates: &[EdgeEstimate],
    aggregator: &dyn EdgeAggregator,
    frame_width: u32,
    frame_height: u32,
) -> Result<CropRectangle, UnletterboxError> {
    let combine = |side: fn(&EdgeEstimate) -> u32| {
        let values: Vec<u32> = estimates.iter().map(side).collect();
        aggregator.combine(&values).ok_or(UnletterboxError::NoSamples)
    };

    let left = combine(|estimate| estimate.left)?;
    let right = combine(|estimate| estimate.right)?;
    let top = combine(|estimate| estimate.top)?;
    let bottom = combine(|estimate| estimate.bottom)?;

    CropRectangle::new(left, right, top, bottom, frame_width, frame_height)
}

/// Sample frames from `source`, scan them, and aggregate the edges.
///
/// # Errors
///
/// - [`UnletterboxError::BorderNotDetectable`] if any sampled frame has a
///   side with no edge.
/// - [`UnletterboxError::VideoDecodeError`] if sampled frames differ in size.
/// - Any error from the frame source, passed through unchanged.
/// - Errors from [`aggregate_estimates`].
pub fn detect_crop<S: FrameSource + ?Sized>(
    source: &mut S,
    options: &DetectionOptions,
) -> Result<CropRectangle, UnletterboxError> {
    let duration = source.duration();
    let timestamps = sample_timestamps(duration, &options.sample_fractions);
    if timestamps.is_empty() {
        return Err(UnletterboxError::NoSamples);
    }

    let scanner = EdgeScanner::from_options(options);
    let mut dimensions: Option<(u32, u32)> = None;
    let mut estimates = Vec::with_capacity(timestamps.len());

    for timestamp in timestamps {
        let frame = rgb_frame(source.frame_at(timestamp)?)?;

        match dimensions {
            None => dimensions = Some(frame.dimensions()),
            Some(expected) if expected != frame.dimensions() => {
                return Err(UnletterboxError::VideoDecodeError(format!(
                    "frame at {timestamp:?} is {}x{}, expected {}x{}",
                    frame.width(),
                    frame.height(),
                    expected.0,
                    expected.1,
                )));
            }
            Some(_) => {}
        }

        let estimate = scanner.estimate(&frame).map_err(|error| match error {
            UnletterboxError::NoEdgeFound { direction } => {
                UnletterboxError::BorderNotDetectable {
                    timestamp,
                    direction,
                }
            }
            other => other,
        })?;

        log::debug!(
            "Frame at {:.2}s: left={}, right={}, top={}, bottom={}",
            timestamp.as_secs_f64(),
            estimate.left,
            estimate.right,
            estimate.top,
            estimate.bottom,
        );
        estimates.push(estimate);
    }

    let (frame_width, frame_height) = dimensions.ok_or(UnletterboxError::NoSamples)?;
    aggregate_estimates(
        &estimates,
        options.aggregator.as_ref(),
        frame_width,
        frame_height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_fractions_are_skipped() {
        let duration = Duration::from_secs(100);
        let timestamps =
            sample_timestamps(duration, &[f64::NAN, 0.5, f64::INFINITY, 2.0, f64::NEG_INFINITY]);
        assert_eq!(timestamps, vec![Duration::from_secs(50), duration]);
    }

    #[test]
    fn encoded_dimensions_round_down_to_even() {
        let odd = CropRectangle::new(10, 160, 5, 125, 320, 240).unwrap();
        assert_eq!((odd.width(), odd.height()), (151, 121));
        assert_eq!(odd.encoded_dimensions(), (150, 120));

        let even = CropRectangle::new(0, 1439, 0, 1079, 1440, 1080).unwrap();
        assert_eq!(even.encoded_dimensions(), (1440, 1080));

        let tiny = CropRectangle::new(0, 2, 0, 1, 4, 4).unwrap();
        assert_eq!(tiny.encoded_dimensions(), (2, 2));
    }

    #[test]
    fn median_of_three_is_order_independent() {
        for values in [
            [10, 40, 20],
            [10, 20, 40],
            [20, 10, 40],
            [20, 40, 10],
            [40, 10, 20],
            [40, 20, 10],
        ] {
            assert_eq!(Median.combine(&values), Some(20), "{values:?}");
        }
    }

    #[test]
    fn median_handles_ties_and_even_counts() {
        assert_eq!(Median.combine(&[5, 5, 90]), Some(5));
        assert_eq!(Median.combine(&[7]), Some(7));
        assert_eq!(Median.combine(&[10, 20, 30, 41]), Some(25));
        assert_eq!(Median.combine(&[u32::MAX, u32::MAX]), Some(u32::MAX));
        assert_eq!(Median.combine(&[]), None);
    }

    #[test]
    fn sample_timestamps_follow_fractions() {
        let timestamps = sample_timestamps(Duration::from_secs(100), &[0.1, 0.5, 0.9]);
        assert_eq!(
            timestamps,
            vec![
                Duration::from_secs(10),
                Duration::from_secs(50),
                Duration::from_secs(90),
            ]
        );
        assert!(sample_timestamps(Duration::from_secs(100), &[]).is_empty());
    }

    #[test]
    fn rectangle_invariant_is_enforced() {
        assert!(CropRectangle::new(0, 9, 0, 9, 10, 10).is_ok());
        assert!(CropRectangle::new(5, 5, 0, 9, 10, 10).is_err());
        assert!(CropRectangle::new(6, 5, 0, 9, 10, 10).is_err());
        assert!(CropRectangle::new(0, 10, 0, 9, 10, 10).is_err());
        assert!(CropRectangle::new(0, 9, 4, 4, 10, 10).is_err());
        assert!(CropRectangle::new(0, 9, 0, 10, 10, 10).is_err());
    }

    #[test]
    fn rectangle_dimensions_are_inclusive() {
        let rectangle = CropRectangle::new(50, 200, 30, 150, 256, 180).unwrap();
        assert_eq!(rectangle.width(), 151);
        assert_eq!(rectangle.height(), 121);
        assert!(!rectangle.is_full_frame());
        assert!(CropRectangle::new(0, 255, 0, 179, 256, 180).unwrap().is_full_frame());
    }

    #[test]
    fn estimates_are_combined_per_side() {
        let estimates = [
            EdgeEstimate { left: 10, right: 200, top: 31, bottom: 149 },
            EdgeEstimate { left: 40, right: 198, top: 0, bottom: 150 },
            EdgeEstimate { left: 20, right: 201, top: 30, bottom: 179 },
        ];
        let rectangle = aggregate_estimates(&estimates, &Median, 256, 180).unwrap();
        assert_eq!(rectangle.left(), 20);
        assert_eq!(rectangle.right(), 200);
        assert_eq!(rectangle.top(), 30);
        assert_eq!(rectangle.bottom(), 150);
    }

    #[test]
    fn empty_estimates_are_rejected() {
        assert!(matches!(
            aggregate_estimates(&[], &Median, 10, 10),
            Err(UnletterboxError::NoSamples)
        ));
    }
}

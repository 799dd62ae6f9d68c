//! Single-frame edge scanning.
//!
//! [`EdgeScanner`] walks a frame one scan line at a time from one of four
//! sides and reports the first line where content begins. Each content pixel
//! that is not excluded by the overlay predicate adds one to a running tally;
//! the scan stops at the first line where the tally exceeds the noise
//! allowance.
//!
//! The tally is kept for the whole scan, not per line. Scattered noise pixels
//! in the border therefore accumulate, and enough of them can trip the
//! allowance before the true content boundary is reached. Callers that need
//! a strictly per-line rule should use an allowance of zero.

use std::fmt::{Display, Formatter, Result as FmtResult};

use image::{DynamicImage, Pixel, RgbImage};

use crate::{
    classifier::Thresholds, configuration::DetectionOptions, error::UnletterboxError,
    overlay::ExclusionPredicate,
};

/// A decoded RGB8 video frame. Row 0 is the visual top of the picture.
pub type Frame = RgbImage;

/// The order in which scan lines are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanDirection {
    /// Columns from 0 upward; finds the left edge.
    LeftToRight,
    /// Columns from `width - 1` downward; finds the right edge.
    RightToLeft,
    /// Rows from 0 upward; finds the top edge.
    TopToBottom,
    /// Rows from `height - 1` downward; finds the bottom edge.
    BottomToTop,
}

impl ScanDirection {
    /// All four directions in `left, right, top, bottom` order.
    pub const ALL: [ScanDirection; 4] = [
        ScanDirection::LeftToRight,
        ScanDirection::RightToLeft,
        ScanDirection::TopToBottom,
        ScanDirection::BottomToTop,
    ];

    /// `true` if scan lines are columns.
    fn scans_columns(self) -> bool {
        matches!(self, ScanDirection::LeftToRight | ScanDirection::RightToLeft)
    }

    /// `true` if scan lines are visited from the highest index down.
    fn is_reversed(self) -> bool {
        matches!(self, ScanDirection::RightToLeft | ScanDirection::BottomToTop)
    }
}

impl Display for ScanDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            ScanDirection::LeftToRight => "left to right",
            ScanDirection::RightToLeft => "right to left",
            ScanDirection::TopToBottom => "top to bottom",
            ScanDirection::BottomToTop => "bottom to top",
        };
        f.write_str(name)
    }
}

/// The four edges found in one frame.
///
/// `left`/`right` are column indices and `top`/`bottom` are row indices, all
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeEstimate {
    /// First content column from the left.
    pub left: u32,
    /// First content column from the right.
    pub right: u32,
    /// First content row from the top.
    pub top: u32,
    /// First content row from the bottom.
    pub bottom: u32,
}

/// Finds content edges in a single frame.
///
/// Holds only borrowed, immutable configuration, so one scanner can be reused
/// for any number of frames.
pub struct EdgeScanner<'a> {
    thresholds: Thresholds,
    noise_allowance: u32,
    exclusion: &'a dyn ExclusionPredicate,
}

impl<'a> EdgeScanner<'a> {
    /// Create a scanner from explicit parts.
    pub fn new(
        thresholds: Thresholds,
        noise_allowance: u32,
        exclusion: &'a dyn ExclusionPredicate,
    ) -> Self {
        Self {
            thresholds,
            noise_allowance,
            exclusion,
        }
    }

    /// Create a scanner using the thresholds, allowance, and exclusion
    /// predicate of `options`.
    pub fn from_options(options: &'a DetectionOptions) -> Self {
        Self::new(
            options.thresholds,
            options.noise_allowance,
            options.exclusion.as_ref(),
        )
    }

    /// Return the index of the first scan line, in `direction` order, at
    /// which the running content tally exceeds the noise allowance.
    ///
    /// # Errors
    ///
    /// - [`UnletterboxError::NoEdgeFound`] if the whole frame is scanned
    ///   without the tally exceeding the allowance.
    /// - [`UnletterboxError::InvalidPixel`] if a pixel cannot be classified.
    pub fn find_edge(
        &self,
        frame: &Frame,
        direction: ScanDirection,
    ) -> Result<u32, UnletterboxError> {
        let (width, height) = frame.dimensions();
        let (line_count, line_length) = if direction.scans_columns() {
            (width, height)
        } else {
            (height, width)
        };

        let mut tally: u64 = 0;
        for step in 0..line_count {
            let line = if direction.is_reversed() {
                line_count - 1 - step
            } else {
                step
            };

            for position in 0..line_length {
                let (column, row) = if direction.scans_columns() {
                    (line, position)
                } else {
                    (position, line)
                };

                let pixel = frame.get_pixel(column, row);
                if !self.thresholds.is_content(pixel.channels())? {
                    continue;
                }

                if self.exclusion.is_excluded(column, row, width, height) {
                    log::trace!(
                        "Ignoring content pixel at ({column}, {row}) inside the overlay region"
                    );
                    continue;
                }

                tally += 1;
                if tally > u64::from(self.noise_allowance) {
                    log::trace!(
                        "Edge found scanning {direction} at line {line} (tally={tally})"
                    );
                    return Ok(line);
                }
            }
        }

        Err(UnletterboxError::NoEdgeFound { direction })
    }

    /// First content column scanning from the left.
    pub fn left_edge(&self, frame: &Frame) -> Result<u32, UnletterboxError> {
        self.find_edge(frame, ScanDirection::LeftToRight)
    }

    /// First content column scanning from the right.
    pub fn right_edge(&self, frame: &Frame) -> Result<u32, UnletterboxError> {
        self.find_edge(frame, ScanDirection::RightToLeft)
    }

    /// First content row scanning from the top.
    pub fn top_edge(&self, frame: &Frame) -> Result<u32, UnletterboxError> {
        self.find_edge(frame, ScanDirection::TopToBottom)
    }

    /// First content row scanning from the bottom.
    pub fn bottom_edge(&self, frame: &Frame) -> Result<u32, UnletterboxError> {
        self.find_edge(frame, ScanDirection::BottomToTop)
    }

    /// Run all four scans on `frame`.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`find_edge`](EdgeScanner::find_edge).
    pub fn estimate(&self, frame: &Frame) -> Result<EdgeEstimate, UnletterboxError> {
        Ok(EdgeEstimate {
            left: self.left_edge(frame)?,
            right: self.right_edge(frame)?,
            top: self.top_edge(frame)?,
            bottom: self.bottom_edge(frame)?,
        })
    }
}

/// Turn a decoded image into a scannable [`Frame`].
///
/// # Errors
///
/// Returns [`UnletterboxError::InvalidPixel`] if the image is not 8-bit RGB.
/// Frames are never silently converted, since a lossy conversion could hide
/// malformed decoder output.
pub fn rgb_frame(image: DynamicImage) -> Result<Frame, UnletterboxError> {
    match image {
        DynamicImage::ImageRgb8(frame) => Ok(frame),
        other => Err(UnletterboxError::InvalidPixel {
            reason: format!("expected an RGB8 frame, got {:?}", other.color()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::overlay::OverlayRegion;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn blank(width: u32, height: u32) -> Frame {
        RgbImage::from_pixel(width, height, Rgb([0, 0, 0]))
    }

    fn no_overlay() -> OverlayRegion {
        OverlayRegion::disabled()
    }

    #[test]
    fn single_pixel_is_every_edge() {
        let exclusion = no_overlay();
        let scanner = EdgeScanner::new(Thresholds::default(), 0, &exclusion);
        let mut frame = blank(64, 48);
        frame.put_pixel(17, 29, WHITE);

        let estimate = scanner.estimate(&frame).unwrap();
        assert_eq!(
            estimate,
            EdgeEstimate {
                left: 17,
                right: 17,
                top: 29,
                bottom: 29,
            }
        );
    }

    #[test]
    fn uniform_frame_has_no_edge() {
        let exclusion = no_overlay();
        let scanner = EdgeScanner::new(Thresholds::default(), 0, &exclusion);
        let frame = RgbImage::from_pixel(32, 32, Rgb([7, 7, 7]));

        for direction in ScanDirection::ALL {
            let result = scanner.find_edge(&frame, direction);
            assert!(
                matches!(result, Err(UnletterboxError::NoEdgeFound { direction: d }) if d == direction),
                "{direction}: {result:?}"
            );
        }
    }

    #[test]
    fn empty_frame_has_no_edge() {
        let exclusion = no_overlay();
        let scanner = EdgeScanner::new(Thresholds::default(), 0, &exclusion);
        assert!(scanner.left_edge(&blank(0, 0)).is_err());
    }

    #[test]
    fn pixel_inside_overlay_is_ignored() {
        let exclusion = OverlayRegion::new(10, 10);
        let scanner = EdgeScanner::new(Thresholds::default(), 0, &exclusion);
        let mut frame = blank(64, 48);
        frame.put_pixel(3, 3, WHITE);

        assert!(matches!(
            scanner.left_edge(&frame),
            Err(UnletterboxError::NoEdgeFound {
                direction: ScanDirection::LeftToRight
            })
        ));
    }

    #[test]
    fn noise_allowance_absorbs_stray_pixels() {
        let exclusion = no_overlay();
        let scanner = EdgeScanner::new(Thresholds::default(), 5, &exclusion);
        let mut frame = blank(40, 50);
        for row in 0..3 {
            frame.put_pixel(4, row, WHITE);
        }
        for row in 0..50 {
            frame.put_pixel(20, row, WHITE);
        }

        assert_eq!(scanner.left_edge(&frame).unwrap(), 20);
        assert_eq!(scanner.right_edge(&frame).unwrap(), 20);
    }

    #[test]
    fn tally_is_kept_across_scan_lines() {
        let exclusion = no_overlay();
        let scanner = EdgeScanner::new(Thresholds::default(), 3, &exclusion);
        let mut frame = blank(40, 50);
        // Two sparse columns of noise, neither over the allowance on its own.
        frame.put_pixel(2, 10, WHITE);
        frame.put_pixel(2, 20, WHITE);
        frame.put_pixel(5, 10, WHITE);
        frame.put_pixel(5, 20, WHITE);
        for row in 0..50 {
            frame.put_pixel(30, row, WHITE);
        }

        assert_eq!(scanner.left_edge(&frame).unwrap(), 5);
    }

    #[test]
    fn scanning_is_deterministic() {
        let exclusion = OverlayRegion::new(8, 8);
        let scanner = EdgeScanner::new(Thresholds::uniform(20), 2, &exclusion);
        let frame = RgbImage::from_fn(50, 30, |x, y| {
            if (x * 7 + y * 13) % 11 == 0 {
                Rgb([40, 0, 0])
            } else {
                Rgb([0, 0, 0])
            }
        });

        for direction in ScanDirection::ALL {
            let first = scanner.find_edge(&frame, direction).ok();
            let second = scanner.find_edge(&frame, direction).ok();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn letterboxed_frame() {
        let exclusion = no_overlay();
        let scanner = EdgeScanner::new(Thresholds::default(), 0, &exclusion);
        let frame = RgbImage::from_fn(160, 90, |x, y| {
            if (12..=147).contains(&x) && (10..=79).contains(&y) {
                Rgb([90, 60, 30])
            } else {
                Rgb([3, 2, 4])
            }
        });

        let estimate = scanner.estimate(&frame).unwrap();
        assert_eq!(estimate.left, 12);
        assert_eq!(estimate.right, 147);
        assert_eq!(estimate.top, 10);
        assert_eq!(estimate.bottom, 79);
    }

    #[test]
    fn non_rgb_images_are_rejected() {
        let gray = DynamicImage::new_luma8(4, 4);
        assert!(matches!(
            rgb_frame(gray),
            Err(UnletterboxError::InvalidPixel { .. })
        ));

        let rgb = DynamicImage::new_rgb8(4, 4);
        assert_eq!(rgb_frame(rgb).unwrap().dimensions(), (4, 4));
    }
}

//! Overlay exclusion.
//!
//! Screen recordings often carry a fixed-size on-screen counter (an FPS
//! meter, a recording timer) drawn on top of the black bars. Those pixels are
//! bright but are not content, so the scanner asks an [`ExclusionPredicate`]
//! whether each pixel should be ignored before it is counted.
//!
//! [`OverlayRegion`] describes one fixed-size rectangle anchored at any subset
//! of the four frame corners. Because the rectangle is anchored to corners,
//! its absolute position depends on the frame size and is recomputed for
//! every frame.
//!
//! # Example
//!
//! ```
//! use unletterbox::{ExclusionPredicate, OverlayCorners, OverlayRegion};
//!
//! let overlay = OverlayRegion::new(100, 40).with_corners(OverlayCorners::TOP);
//! assert!(overlay.is_excluded(5, 5, 1920, 1080));
//! assert!(overlay.is_excluded(1915, 5, 1920, 1080));
//! assert!(!overlay.is_excluded(960, 540, 1920, 1080));
//! ```

/// Decides whether a pixel must be ignored during edge detection.
///
/// Implementations must be pure functions of their arguments: the scanner
/// calls them once per pixel and relies on identical answers for identical
/// inputs.
pub trait ExclusionPredicate: Send + Sync {
    /// Return `true` if `(column, row)` of a `width × height` frame is
    /// excluded.
    fn is_excluded(&self, column: u32, row: u32, width: u32, height: u32) -> bool;
}

impl<P: ExclusionPredicate + ?Sized> ExclusionPredicate for Box<P> {
    fn is_excluded(&self, column: u32, row: u32, width: u32, height: u32) -> bool {
        (**self).is_excluded(column, row, width, height)
    }
}

/// Several predicates combined: a pixel is excluded if any of them excludes
/// it.
impl<P: ExclusionPredicate> ExclusionPredicate for Vec<P> {
    fn is_excluded(&self, column: u32, row: u32, width: u32, height: u32) -> bool {
        self.iter()
            .any(|predicate| predicate.is_excluded(column, row, width, height))
    }
}

/// Which frame corners an [`OverlayRegion`] is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OverlayCorners {
    /// Anchor at the top-left corner.
    pub top_left: bool,
    /// Anchor at the top-right corner.
    pub top_right: bool,
    /// Anchor at the bottom-left corner.
    pub bottom_left: bool,
    /// Anchor at the bottom-right corner.
    pub bottom_right: bool,
}

impl OverlayCorners {
    /// No corners: the region never excludes anything.
    pub const NONE: Self = Self {
        top_left: false,
        top_right: false,
        bottom_left: false,
        bottom_right: false,
    };

    /// Both top corners (the usual home of an FPS counter).
    pub const TOP: Self = Self {
        top_left: true,
        top_right: true,
        bottom_left: false,
        bottom_right: false,
    };

    /// Both bottom corners.
    pub const BOTTOM: Self = Self {
        top_left: false,
        top_right: false,
        bottom_left: true,
        bottom_right: true,
    };

    /// All four corners.
    pub const ALL: Self = Self {
        top_left: true,
        top_right: true,
        bottom_left: true,
        bottom_right: true,
    };

    /// `true` if no corner is enabled.
    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// Default overlay width in pixels.
pub const DEFAULT_OVERLAY_WIDTH: u32 = 120;
/// Default overlay height in pixels.
pub const DEFAULT_OVERLAY_HEIGHT: u32 = 60;
/// Default distance between the overlay and the left/right frame edge.
pub const DEFAULT_OVERLAY_HORIZONTAL_MARGIN: u32 = 0;
/// Default distance between the overlay and the top/bottom frame edge.
pub const DEFAULT_OVERLAY_VERTICAL_MARGIN: u32 = 0;

/// A fixed-size rectangle mirrored into one or more frame corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct OverlayRegion {
    /// Rectangle width in pixels.
    pub width: u32,
    /// Rectangle height in pixels.
    pub height: u32,
    /// Offset from the left edge (left corners) or right edge (right corners).
    pub horizontal_margin: u32,
    /// Offset from the top edge (top corners) or bottom edge (bottom corners).
    pub vertical_margin: u32,
    /// Corners the rectangle is mirrored into.
    pub corners: OverlayCorners,
}

impl Default for OverlayRegion {
    fn default() -> Self {
        Self {
            width: DEFAULT_OVERLAY_WIDTH,
            height: DEFAULT_OVERLAY_HEIGHT,
            horizontal_margin: DEFAULT_OVERLAY_HORIZONTAL_MARGIN,
            vertical_margin: DEFAULT_OVERLAY_VERTICAL_MARGIN,
            corners: OverlayCorners::TOP,
        }
    }
}

impl OverlayRegion {
    /// A `width × height` region in both top corners with no margins.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            horizontal_margin: 0,
            vertical_margin: 0,
            corners: OverlayCorners::TOP,
        }
    }

    /// A region that never excludes anything.
    pub fn disabled() -> Self {
        Self::default().with_corners(OverlayCorners::NONE)
    }

    /// Set the horizontal and vertical corner offsets.
    pub fn with_margins(mut self, horizontal: u32, vertical: u32) -> Self {
        self.horizontal_margin = horizontal;
        self.vertical_margin = vertical;
        self
    }

    /// Set the corners the rectangle is anchored to.
    pub fn with_corners(mut self, corners: OverlayCorners) -> Self {
        self.corners = corners;
        self
    }

    /// `true` if this region can exclude at least one pixel.
    pub fn is_enabled(&self) -> bool {
        !self.corners.is_empty() && self.width > 0 && self.height > 0
    }

    /// Test whether `(column, row)` falls in any enabled corner instance.
    pub fn in_excluded_region(&self, column: u32, row: u32, width: u32, height: u32) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let in_left = span_contains(self.horizontal_margin, self.width, column);
        let in_right = span_contains(
            width.saturating_sub(self.horizontal_margin.saturating_add(self.width)),
            self.width,
            column,
        ) && column < width.saturating_sub(self.horizontal_margin);
        let in_top = span_contains(self.vertical_margin, self.height, row);
        let in_bottom = span_contains(
            height.saturating_sub(self.vertical_margin.saturating_add(self.height)),
            self.height,
            row,
        ) && row < height.saturating_sub(self.vertical_margin);

        (self.corners.top_left && in_top && in_left)
            || (self.corners.top_right && in_top && in_right)
            || (self.corners.bottom_left && in_bottom && in_left)
            || (self.corners.bottom_right && in_bottom && in_right)
    }
}

impl ExclusionPredicate for OverlayRegion {
    fn is_excluded(&self, column: u32, row: u32, width: u32, height: u32) -> bool {
        self.in_excluded_region(column, row, width, height)
    }
}

fn span_contains(start: u32, length: u32, value: u32) -> bool {
    value >= start && value - start < length
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDTH: u32 = 640;
    const HEIGHT: u32 = 360;

    #[test]
    fn top_corners_are_mirrored() {
        let overlay = OverlayRegion::new(50, 20).with_margins(10, 4);

        // Left instance covers columns 10..60, rows 4..24.
        assert!(overlay.in_excluded_region(10, 4, WIDTH, HEIGHT));
        assert!(overlay.in_excluded_region(59, 23, WIDTH, HEIGHT));
        assert!(!overlay.in_excluded_region(9, 4, WIDTH, HEIGHT));
        assert!(!overlay.in_excluded_region(60, 4, WIDTH, HEIGHT));
        assert!(!overlay.in_excluded_region(10, 24, WIDTH, HEIGHT));

        // Right instance covers columns 580..630.
        assert!(overlay.in_excluded_region(WIDTH - 1 - 10, 4, WIDTH, HEIGHT));
        assert!(overlay.in_excluded_region(580, 23, WIDTH, HEIGHT));
        assert!(!overlay.in_excluded_region(WIDTH - 10, 4, WIDTH, HEIGHT));
        assert!(!overlay.in_excluded_region(579, 4, WIDTH, HEIGHT));
    }

    #[test]
    fn left_and_right_instances_are_symmetric() {
        let overlay = OverlayRegion::new(37, 13).with_margins(3, 2);
        for row in 0..30 {
            for offset in 0..60 {
                assert_eq!(
                    overlay.in_excluded_region(offset, row, WIDTH, HEIGHT),
                    overlay.in_excluded_region(WIDTH - 1 - offset, row, WIDTH, HEIGHT),
                    "offset={offset} row={row}"
                );
            }
        }
    }

    #[test]
    fn bottom_corners_only_when_enabled() {
        let top_only = OverlayRegion::new(50, 20);
        assert!(!top_only.in_excluded_region(0, HEIGHT - 1, WIDTH, HEIGHT));

        let bottom = top_only.with_corners(OverlayCorners::BOTTOM);
        assert!(bottom.in_excluded_region(0, HEIGHT - 1, WIDTH, HEIGHT));
        assert!(bottom.in_excluded_region(WIDTH - 1, HEIGHT - 20, WIDTH, HEIGHT));
        assert!(!bottom.in_excluded_region(0, 0, WIDTH, HEIGHT));
    }

    #[test]
    fn disabled_region_excludes_nothing() {
        let overlay = OverlayRegion::disabled();
        for (column, row) in [(0, 0), (WIDTH - 1, 0), (0, HEIGHT - 1), (320, 180)] {
            assert!(!overlay.in_excluded_region(column, row, WIDTH, HEIGHT));
        }
        assert!(!OverlayRegion::new(0, 20).is_enabled());
    }

    #[test]
    fn position_follows_frame_size() {
        let overlay = OverlayRegion::new(20, 10);
        assert!(overlay.in_excluded_region(90, 0, 100, 50));
        assert!(!overlay.in_excluded_region(90, 0, 200, 50));
        assert!(overlay.in_excluded_region(190, 0, 200, 50));
    }

    #[test]
    fn tiny_frames_do_not_underflow() {
        let overlay = OverlayRegion::new(200, 100).with_margins(50, 50);
        assert!(!overlay.in_excluded_region(0, 0, 10, 10));
        assert!(!overlay.in_excluded_region(9, 9, 10, 10));
    }

    #[test]
    fn combined_predicates_exclude_union() {
        let regions = vec![
            OverlayRegion::new(10, 10),
            OverlayRegion::new(10, 10).with_corners(OverlayCorners::BOTTOM),
        ];
        assert!(regions.is_excluded(0, 0, WIDTH, HEIGHT));
        assert!(regions.is_excluded(0, HEIGHT - 1, WIDTH, HEIGHT));
        assert!(!regions.is_excluded(320, 180, WIDTH, HEIGHT));
    }
}

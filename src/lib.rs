//! # unletterbox
//!
//! Detect uniform black letterbox and pillarbox borders in a video and write
//! a cropped copy without them.
//!
//! Detection samples a handful of frames, scans each from all four sides for
//! the first line whose cumulative count of non-background pixels exceeds a
//! noise allowance, and combines the per-frame edges with a median. Corner
//! regions where channel logos and watermarks usually sit are ignored. The
//! resulting [`CropRectangle`] is applied with FFmpeg's `crop` filter and the
//! video is re-encoded next to the input as `<stem>_cropped<.ext>`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use unletterbox::{Unletterbox, UnletterboxError};
//!
//! let report = Unletterbox::new("input.mp4").run()?;
//! println!(
//!     "{}x{} -> {}x{}",
//!     report.original_width,
//!     report.original_height,
//!     report.rectangle.width(),
//!     report.rectangle.height(),
//! );
//! # Ok::<(), UnletterboxError>(())
//! ```
//!
//! ### Detection only
//!
//! The scanning pieces work on plain [`image::RgbImage`] frames and need no
//! FFmpeg at all:
//!
//! ```
//! use image::{Rgb, RgbImage};
//! use unletterbox::{DetectionOptions, EdgeScanner};
//!
//! let frame = RgbImage::from_fn(320, 240, |_, y| {
//!     if (30..210).contains(&y) { Rgb([90, 120, 200]) } else { Rgb([0, 0, 0]) }
//! });
//! let options = DetectionOptions::new();
//! let estimate = EdgeScanner::from_options(&options).estimate(&frame)?;
//! assert_eq!((estimate.top, estimate.bottom), (30, 209));
//! # Ok::<(), unletterbox::UnletterboxError>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://crates.io/crates/log) facade:
//! resolutions at `info`, per-frame edges at `debug`, per-pixel exclusion
//! decisions at `trace`. FFmpeg's own stderr output is controlled separately
//! with [`set_ffmpeg_log_level`].

pub mod aggregate;
pub mod classifier;
pub mod configuration;
mod conversion;
pub mod cropper;
pub mod error;
pub mod ffmpeg;
pub mod media;
pub mod metadata;
pub mod orchestrator;
pub mod overlay;
pub mod progress;
pub mod scanner;
pub mod video;

pub use aggregate::{
    CropRectangle, EdgeAggregator, FrameSource, Median, aggregate_estimates, detect_crop,
    sample_timestamps,
};
pub use classifier::{DEFAULT_THRESHOLDS, Thresholds, is_content};
pub use configuration::{DEFAULT_NOISE_ALLOWANCE, DEFAULT_SAMPLE_FRACTIONS, DetectionOptions};
pub use cropper::{CroppedClip, EncodeOptions, VideoCodec};
pub use error::UnletterboxError;
pub use ffmpeg::{FfmpegLogLevel, get_ffmpeg_log_level, set_ffmpeg_log_level};
pub use media::{MediaFile, VideoClip};
pub use metadata::{MediaMetadata, VideoMetadata};
pub use orchestrator::{CropReport, Unletterbox, cropped_output_path};
pub use overlay::{ExclusionPredicate, OverlayCorners, OverlayRegion};
pub use progress::{NoOpProgress, OperationType, ProgressCallback, ProgressInfo};
pub use scanner::{EdgeEstimate, EdgeScanner, Frame, ScanDirection, rgb_frame};
pub use video::VideoHandle;

//! Error types for the `unletterbox` crate.
//!
//! This module defines [`UnletterboxError`], the unified error type returned by
//! all fallible operations in the crate. Detection failures carry the scan
//! direction and sample timestamp that caused them; FFmpeg failures carry the
//! upstream message unchanged.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

use crate::scanner::ScanDirection;

/// Process exit status for a missing input path.
pub const EXIT_INVALID_INPUT_PATH: i32 = 2;

/// Process exit status for a failed border detection.
pub const EXIT_DETECTION_FAILED: i32 = 3;

/// Process exit status for every other failure.
pub const EXIT_FAILURE: i32 = 1;

/// The unified error type for all `unletterbox` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UnletterboxError {
    /// The input path does not exist.
    #[error("Not a valid path: {}", path.display())]
    InvalidInputPath {
        /// Path that was passed to the orchestrator.
        path: PathBuf,
    },

    /// A frame handed to the scanner is malformed.
    #[error("Invalid pixel data: {reason}")]
    InvalidPixel {
        /// What was wrong with the frame or pixel.
        reason: String,
    },

    /// A single-frame scan never crossed the noise allowance.
    #[error("No edge found scanning {direction}")]
    NoEdgeFound {
        /// The direction that was being scanned.
        direction: ScanDirection,
    },

    /// A sampled frame had no detectable edge, so no rectangle can be built.
    #[error("Border not detectable: frame at {timestamp:?} has no edge scanning {direction}")]
    BorderNotDetectable {
        /// Timestamp of the sampled frame.
        timestamp: Duration,
        /// The direction whose scan failed.
        direction: ScanDirection,
    },

    /// Detection was asked to aggregate zero sampled frames.
    #[error("No frames were sampled for border detection")]
    NoSamples,

    /// The aggregated bounds do not describe a valid content rectangle.
    #[error(
        "Invalid crop rectangle (left={left}, right={right}, top={top}, bottom={bottom}) for a {width}x{height} frame"
    )]
    InvalidCropRectangle {
        /// Leftmost content column.
        left: u32,
        /// Rightmost content column.
        right: u32,
        /// Topmost content row.
        top: u32,
        /// Bottommost content row.
        bottom: u32,
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },

    /// The derived output file already exists.
    #[error("Output already exists: {} (use --overwrite to replace)", path.display())]
    OutputExists {
        /// The output path that would have been written.
        path: PathBuf,
    },

    /// The media file could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::MediaFile::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The cropped video could not be encoded or written.
    #[error("Video encoding error: {0}")]
    VideoEncodeError(String),

    /// The requested timestamp exceeds the media duration.
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(Duration),

    /// FFmpeg filter graph setup or processing failed.
    #[error("Filter graph error: {0}")]
    FilterGraphError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl UnletterboxError {
    /// The process exit status the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            UnletterboxError::InvalidInputPath { .. } => EXIT_INVALID_INPUT_PATH,
            UnletterboxError::InvalidPixel { .. }
            | UnletterboxError::NoEdgeFound { .. }
            | UnletterboxError::BorderNotDetectable { .. }
            | UnletterboxError::NoSamples
            | UnletterboxError::InvalidCropRectangle { .. } => EXIT_DETECTION_FAILED,
            _ => EXIT_FAILURE,
        }
    }
}

impl From<FfmpegError> for UnletterboxError {
    fn from(error: FfmpegError) -> Self {
        UnletterboxError::FfmpegError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let missing = UnletterboxError::InvalidInputPath {
            path: PathBuf::from("nope.mp4"),
        };
        assert_eq!(missing.exit_code(), 2);

        let no_edge = UnletterboxError::BorderNotDetectable {
            timestamp: Duration::from_secs(1),
            direction: ScanDirection::LeftToRight,
        };
        assert_eq!(no_edge.exit_code(), 3);

        let encode = UnletterboxError::VideoEncodeError("boom".to_string());
        assert_eq!(encode.exit_code(), 1);
    }

    #[test]
    fn invalid_path_message_matches_cli_wording() {
        let error = UnletterboxError::InvalidInputPath {
            path: PathBuf::from("missing.mkv"),
        };
        assert_eq!(error.to_string(), "Not a valid path: missing.mkv");
    }
}

//! Media metadata types.
//!
//! Metadata is extracted once when a [`MediaFile`](crate::MediaFile) is
//! opened and cached for its lifetime.

use std::time::Duration;

/// Container-level metadata plus the streams the cropper cares about.
#[derive(Debug, Clone)]
#[must_use]
pub struct MediaMetadata {
    /// Metadata of the best video stream, if one is present.
    pub video: Option<VideoMetadata>,
    /// Number of audio streams, all of which are copied into the cropped
    /// output.
    pub audio_streams: usize,
    /// Total duration of the media file.
    pub duration: Duration,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`, `"matroska,webm"`).
    pub format: String,
}

/// Metadata for a video stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total number of frames, computed from duration and frame rate.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
    /// Index of this stream within the container.
    pub stream_index: usize,
}


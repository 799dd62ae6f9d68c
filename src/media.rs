//! Core [`MediaFile`] implementation.
//!
//! `MediaFile` is the FFmpeg side of the crate. It opens a media file,
//! extracts and caches metadata, decodes sample frames through
//! [`VideoHandle`], and produces cropped copies through
//! [`CroppedClip`].

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{codec::context::Context as CodecContext, format::context::Input, media::Type};
use image::DynamicImage;

use crate::{
    aggregate::{CropRectangle, FrameSource},
    cropper::{CroppedClip, EncodeOptions},
    error::UnletterboxError,
    metadata::{MediaMetadata, VideoMetadata},
    video::VideoHandle,
};

/// An opened media file.
///
/// # Example
///
/// ```no_run
/// use unletterbox::{MediaFile, UnletterboxError};
///
/// let mut media = MediaFile::open("input.mp4")?;
/// println!("Duration: {:?}", media.metadata().duration);
///
/// let frame = media.video().frame_at(std::time::Duration::from_secs(1))?;
/// frame.save("one_second.png")?;
/// # Ok::<(), UnletterboxError>(())
/// ```
pub struct MediaFile {
    /// The opened FFmpeg input (demuxer) context.
    pub(crate) input_context: Input,
    /// Cached metadata extracted at open time.
    pub(crate) metadata: MediaMetadata,
    /// Index of the best video stream, if one exists.
    pub(crate) video_stream_index: Option<usize>,
    /// Path to the opened media file.
    pub(crate) file_path: PathBuf,
}

impl Debug for MediaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MediaFile")
            .field("metadata", &self.metadata)
            .field("video_stream_index", &self.video_stream_index)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl MediaFile {
    /// Open a media file.
    ///
    /// Initializes FFmpeg (idempotent), opens the file, locates the best
    /// video stream, and caches video and audio metadata.
    ///
    /// # Errors
    ///
    /// Returns [`UnletterboxError::FileOpen`] if the file cannot be opened
    /// or its codec parameters cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, UnletterboxError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!("Opening media file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| UnletterboxError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| UnletterboxError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let video_stream_index = input_context
            .streams()
            .best(Type::Video)
            .map(|stream| stream.index());

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        let format = input_context.format().name().to_string();

        let video = match video_stream_index {
            Some(index) => Some(read_video_metadata(&input_context, index, duration, &file_path)?),
            None => None,
        };

        // Counted from the stream parameters alone; audio is stream-copied
        // and never decoded.
        let audio_streams = input_context
            .streams()
            .filter(|stream| stream.parameters().medium() == Type::Audio)
            .count();

        let metadata = MediaMetadata {
            video,
            audio_streams,
            duration,
            format,
        };

        log::info!(
            "Opened media file: {} (format={}, duration={:.2}s, audio_streams={})",
            file_path.display(),
            metadata.format,
            metadata.duration.as_secs_f64(),
            metadata.audio_streams,
        );

        if let Some(video) = &metadata.video {
            log::debug!(
                "Best video stream: index={}, {}x{}, {:.2} fps, codec={}, ~{} frames",
                video.stream_index,
                video.width,
                video.height,
                video.frames_per_second,
                video.codec,
                video.frame_count,
            );
        }

        Ok(Self {
            input_context,
            metadata,
            video_stream_index,
            file_path,
        })
    }

    /// Get a reference to the cached media metadata.
    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Obtain a [`VideoHandle`] for decoding frames.
    pub fn video(&mut self) -> VideoHandle<'_> {
        VideoHandle { media: self }
    }

    /// Describe a cropped copy of this file.
    ///
    /// Nothing is decoded until [`CroppedClip::write`] is called.
    pub fn crop(&self, rectangle: CropRectangle) -> CroppedClip<'_> {
        CroppedClip::new(self, rectangle)
    }
}

fn read_video_metadata(
    input_context: &Input,
    index: usize,
    duration: Duration,
    file_path: &Path,
) -> Result<VideoMetadata, UnletterboxError> {
    let stream = input_context
        .stream(index)
        .ok_or(UnletterboxError::NoVideoStream)?;

    let decoder_context = CodecContext::from_parameters(stream.parameters()).map_err(|error| {
        UnletterboxError::FileOpen {
            path: file_path.to_path_buf(),
            reason: format!("Failed to read video codec parameters for stream {index}: {error}"),
        }
    })?;
    let video_decoder =
        decoder_context
            .decoder()
            .video()
            .map_err(|error| UnletterboxError::FileOpen {
                path: file_path.to_path_buf(),
                reason: format!("Failed to create video decoder for stream {index}: {error}"),
            })?;

    // Prefer the average frame rate; fall back to the stream's base rate.
    let frame_rate = stream.avg_frame_rate();
    let frames_per_second = if frame_rate.denominator() != 0 {
        frame_rate.numerator() as f64 / frame_rate.denominator() as f64
    } else {
        let rate = stream.rate();
        if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        }
    };

    let frame_count = if frames_per_second > 0.0 {
        (duration.as_secs_f64() * frames_per_second) as u64
    } else {
        0
    };

    Ok(VideoMetadata {
        width: video_decoder.width(),
        height: video_decoder.height(),
        frames_per_second,
        frame_count,
        codec: video_decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        stream_index: index,
    })
}

impl FrameSource for MediaFile {
    fn duration(&self) -> Duration {
        self.metadata.duration
    }

    fn frame_at(&mut self, timestamp: Duration) -> Result<DynamicImage, UnletterboxError> {
        self.video().frame_at(timestamp)
    }
}

/// A clip that can be sampled for frames and written out cropped.
///
/// This is the whole surface the [`Unletterbox`](crate::Unletterbox)
/// orchestrator needs from a video backend.
pub trait VideoClip: FrameSource {
    /// Crop every frame to `rectangle`, re-encode, and write the result to
    /// `path`.
    fn write_cropped(
        &mut self,
        rectangle: CropRectangle,
        path: &Path,
        options: &EncodeOptions,
    ) -> Result<(), UnletterboxError>;
}

impl VideoClip for MediaFile {
    fn write_cropped(
        &mut self,
        rectangle: CropRectangle,
        path: &Path,
        options: &EncodeOptions,
    ) -> Result<(), UnletterboxError> {
        self.crop(rectangle).options(options.clone()).write(path)
    }
}

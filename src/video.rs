//! Sample frame decoding.
//!
//! [`VideoHandle`] decodes single frames by timestamp. Each call builds a
//! fresh decoder, seeks to the nearest keyframe before the target, and
//! decodes forward until the target frame is reached. Frames are returned as
//! RGB8 [`DynamicImage`] values with row 0 at the visual top.

use std::time::Duration;

use ffmpeg_next::{
    codec::context::Context as CodecContext,
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, RgbImage};

use crate::{conversion, error::UnletterboxError, media::MediaFile};

/// Frame decoding operations.
///
/// Obtained via [`MediaFile::video`].
pub struct VideoHandle<'a> {
    pub(crate) media: &'a mut MediaFile,
}

impl<'a> VideoHandle<'a> {
    /// Decode the frame shown at `timestamp`.
    ///
    /// Returns the first decoded frame whose frame number is at or after the
    /// one `timestamp` maps to.
    ///
    /// # Errors
    ///
    /// - [`UnletterboxError::InvalidTimestamp`] if `timestamp` exceeds the
    ///   media duration.
    /// - [`UnletterboxError::NoVideoStream`] if the file has no video.
    /// - [`UnletterboxError::VideoDecodeError`] if no frame could be decoded
    ///   at or after the target.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::time::Duration;
    ///
    /// use unletterbox::MediaFile;
    ///
    /// let mut media = MediaFile::open("input.mp4")?;
    /// let frame = media.video().frame_at(Duration::from_secs(30))?;
    /// frame.save("frame_at_30s.png")?;
    /// # Ok::<(), unletterbox::UnletterboxError>(())
    /// ```
    pub fn frame_at(&mut self, timestamp: Duration) -> Result<DynamicImage, UnletterboxError> {
        let duration = self.media.metadata.duration;
        if timestamp > duration {
            return Err(UnletterboxError::InvalidTimestamp(timestamp));
        }

        let video_stream_index = self
            .media
            .video_stream_index
            .ok_or(UnletterboxError::NoVideoStream)?;
        let video_metadata = self
            .media
            .metadata
            .video
            .as_ref()
            .ok_or(UnletterboxError::NoVideoStream)?;

        let frames_per_second = video_metadata.frames_per_second;
        let target_width = video_metadata.width;
        let target_height = video_metadata.height;
        let target_frame = conversion::timestamp_to_frame_number(timestamp, frames_per_second);

        log::debug!(
            "Decoding frame at {:.3}s (frame ~{target_frame})",
            timestamp.as_secs_f64()
        );

        let stream = self
            .media
            .input_context
            .stream(video_stream_index)
            .ok_or(UnletterboxError::NoVideoStream)?;
        let time_base = stream.time_base();
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let mut decoder = decoder_context.decoder().video()?;

        // Source format → RGB24 at the native resolution.
        let mut scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            target_width,
            target_height,
            ScalingFlags::BILINEAR,
        )?;

        let seek_timestamp = conversion::duration_to_seek_timestamp(timestamp);
        self.media
            .input_context
            .seek(seek_timestamp, ..seek_timestamp)?;

        let mut decoded_frame = VideoFrame::empty();
        let mut rgb_frame = VideoFrame::empty();

        for (stream, packet) in self.media.input_context.packets() {
            if stream.index() != video_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;

            while decoder.receive_frame(&mut decoded_frame).is_ok() {
                let pts = decoded_frame.pts().unwrap_or(0);
                let current_frame =
                    conversion::pts_to_frame_number(pts, time_base, frames_per_second);

                if current_frame >= target_frame {
                    scaler.run(&decoded_frame, &mut rgb_frame)?;
                    return convert_frame_to_image(&rgb_frame, target_width, target_height);
                }
            }
        }

        // Flush the decoder.
        decoder.send_eof()?;
        let mut last_frame = None;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            let pts = decoded_frame.pts().unwrap_or(0);
            let current_frame = conversion::pts_to_frame_number(pts, time_base, frames_per_second);

            scaler.run(&decoded_frame, &mut rgb_frame)?;
            let image = convert_frame_to_image(&rgb_frame, target_width, target_height)?;
            if current_frame >= target_frame {
                return Ok(image);
            }
            last_frame = Some(image);
        }

        // A timestamp at the very end of the container can map past the last
        // decodable frame; the final frame is the closest one.
        last_frame.ok_or_else(|| {
            UnletterboxError::VideoDecodeError(format!(
                "Could not locate a frame at {timestamp:?} in the video stream"
            ))
        })
    }
}

/// Convert a scaled RGB24 video frame to an [`image::DynamicImage`].
fn convert_frame_to_image(
    rgb_frame: &VideoFrame,
    width: u32,
    height: u32,
) -> Result<DynamicImage, UnletterboxError> {
    let buffer = conversion::frame_to_buffer(rgb_frame, width, height, 3);
    let rgb_image =
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| UnletterboxError::InvalidPixel {
            reason: "decoded frame buffer does not match its dimensions".to_string(),
        })?;
    Ok(DynamicImage::ImageRgb8(rgb_image))
}

//! Internal conversion helpers.
//!
//! Pixel-data copying and timestamp arithmetic shared by frame sampling and
//! the cropper.

use std::time::Duration;

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy pixel data from an FFmpeg video frame into a tightly-packed buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × bpp).
/// This strips that padding so the result can be passed directly to
/// [`image::RgbImage::from_raw`].
pub fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Convert a [`Duration`] to a frame number using the video's frame rate.
pub fn timestamp_to_frame_number(timestamp: Duration, frames_per_second: f64) -> u64 {
    (timestamp.as_secs_f64() * frames_per_second) as u64
}

/// Rescale a PTS value from stream time base to seconds.
pub fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value to a frame number.
pub fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts_to_seconds(pts, time_base).max(0.0);
    (seconds * frames_per_second) as u64
}

/// Convert a [`Duration`] to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `input_context.seek()` (via `avformat_seek_file` with `stream_index = -1`)
/// expects timestamps in AV_TIME_BASE, not in the stream's time base.
pub fn duration_to_seek_timestamp(duration: Duration) -> i64 {
    duration.as_micros() as i64
}

/// Frames per second as a rational, or `None` if the rate is unknown.
pub fn frame_rate_or_none(rate: Rational) -> Option<Rational> {
    (rate.numerator() > 0 && rate.denominator() > 0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_maps_to_frame_number() {
        assert_eq!(timestamp_to_frame_number(Duration::from_secs(2), 30.0), 60);
        assert_eq!(timestamp_to_frame_number(Duration::from_millis(500), 24.0), 12);
        assert_eq!(timestamp_to_frame_number(Duration::from_secs(5), 0.0), 0);
    }

    #[test]
    fn pts_round_trips_through_seconds() {
        let time_base = Rational::new(1, 90_000);
        assert!((pts_to_seconds(180_000, time_base) - 2.0).abs() < f64::EPSILON);
        assert_eq!(pts_to_frame_number(180_000, time_base, 25.0), 50);
        assert_eq!(pts_to_frame_number(-3_000, time_base, 25.0), 0);
        assert_eq!(pts_to_seconds(100, Rational::new(1, 0)), 0.0);
    }

    #[test]
    fn seek_timestamps_are_microseconds() {
        assert_eq!(duration_to_seek_timestamp(Duration::from_millis(1500)), 1_500_000);
    }

    #[test]
    fn unknown_frame_rates_are_filtered() {
        assert!(frame_rate_or_none(Rational::new(0, 1)).is_none());
        assert!(frame_rate_or_none(Rational::new(30, 0)).is_none());
        let rate = frame_rate_or_none(Rational::new(30000, 1001)).unwrap();
        assert_eq!((rate.numerator(), rate.denominator()), (30000, 1001));
    }
}

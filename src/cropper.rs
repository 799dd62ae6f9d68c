//! Crop and re-encode.
//!
//! [`CroppedClip`] decodes the video stream of a [`MediaFile`], runs every
//! frame through an FFmpeg `crop` filter, re-encodes it, and writes it to a
//! new file in the container implied by the output extension. Audio streams
//! are copied packet-for-packet without re-encoding.
//!
//! # Example
//!
//! ```no_run
//! use unletterbox::{CropRectangle, EncodeOptions, MediaFile, UnletterboxError, VideoCodec};
//!
//! let media = MediaFile::open("input.mp4")?;
//! let rectangle = CropRectangle::new(240, 1679, 0, 1079, 1920, 1080)?;
//! media
//!     .crop(rectangle)
//!     .options(EncodeOptions::default().codec(VideoCodec::H264).crf(20))
//!     .write("input_cropped.mp4")?;
//! # Ok::<(), UnletterboxError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::Path,
    sync::Arc,
};

use ffmpeg_next::{
    Dictionary, Packet, Rational,
    codec::{Id, context::Context as CodecContext, encoder::video::Encoder as VideoEncoder},
    filter::Graph as FilterGraph,
    format::{Flags as FormatFlags, Pixel, context::Output},
    frame::Video as VideoFrame,
    media::Type,
    picture,
};

use crate::{
    aggregate::CropRectangle,
    conversion,
    error::UnletterboxError,
    media::MediaFile,
    progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
};

/// Frames between progress reports while encoding.
const PROGRESS_BATCH: u64 = 25;

/// Video codecs the cropper can be asked to encode with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// H.264 / AVC.
    H264,
    /// H.265 / HEVC.
    H265,
    /// MPEG-4 Part 2.
    Mpeg4,
}

impl VideoCodec {
    fn to_codec_id(self) -> Id {
        match self {
            VideoCodec::H264 => Id::H264,
            VideoCodec::H265 => Id::HEVC,
            VideoCodec::Mpeg4 => Id::MPEG4,
        }
    }
}

/// Encoder settings for the cropped output.
///
/// By default the input's own codec is reused when FFmpeg has an encoder for
/// it, falling back to H.264 otherwise, and all audio streams are copied.
#[derive(Clone)]
pub struct EncodeOptions {
    /// Codec to encode with. `None` reuses the input's codec when possible.
    pub codec: Option<VideoCodec>,
    /// Constant Rate Factor passed to encoders that understand it.
    pub crf: Option<u32>,
    /// Target bitrate in bits per second.
    pub bitrate: Option<usize>,
    /// Copy audio streams into the output.
    pub copy_audio: bool,
    pub(crate) progress: Arc<dyn ProgressCallback>,
}

impl Debug for EncodeOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("EncodeOptions")
            .field("codec", &self.codec)
            .field("crf", &self.crf)
            .field("bitrate", &self.bitrate)
            .field("copy_audio", &self.copy_audio)
            .finish_non_exhaustive()
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            codec: None,
            crf: None,
            bitrate: None,
            copy_audio: true,
            progress: Arc::new(NoOpProgress),
        }
    }
}

impl EncodeOptions {
    /// Force a specific output codec.
    #[must_use]
    pub fn codec(mut self, codec: VideoCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Set the CRF quality value.
    #[must_use]
    pub fn crf(mut self, crf: u32) -> Self {
        self.crf = Some(crf);
        self
    }

    /// Set the target bitrate in bits per second.
    #[must_use]
    pub fn bitrate(mut self, bitrate: usize) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    /// Choose whether audio streams are copied.
    #[must_use]
    pub fn copy_audio(mut self, copy_audio: bool) -> Self {
        self.copy_audio = copy_audio;
        self
    }

    /// Receive progress updates while encoding.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }
}

/// A cropped view of a [`MediaFile`], ready to be written.
///
/// Obtained via [`MediaFile::crop`].
pub struct CroppedClip<'a> {
    media: &'a MediaFile,
    rectangle: CropRectangle,
    options: EncodeOptions,
}

impl<'a> CroppedClip<'a> {
    pub(crate) fn new(media: &'a MediaFile, rectangle: CropRectangle) -> Self {
        Self {
            media,
            rectangle,
            options: EncodeOptions::default(),
        }
    }

    /// Replace the encoder settings.
    #[must_use]
    pub fn options(mut self, options: EncodeOptions) -> Self {
        self.options = options;
        self
    }

    /// The rectangle this clip is cropped to.
    pub fn rectangle(&self) -> CropRectangle {
        self.rectangle
    }

    /// Dimensions of the encoded picture.
    ///
    /// The output is YUV 4:2:0, which needs even dimensions, so an odd
    /// rectangle width or height loses its last column or row.
    pub fn output_dimensions(&self) -> (u32, u32) {
        self.rectangle.encoded_dimensions()
    }

    /// Decode, crop, re-encode, and write the clip to `path`.
    ///
    /// The container format is inferred from the extension of `path`.
    ///
    /// # Errors
    ///
    /// - [`UnletterboxError::NoVideoStream`] if the source has no video.
    /// - [`UnletterboxError::FilterGraphError`] if the crop filter cannot be
    ///   built.
    /// - [`UnletterboxError::VideoEncodeError`] on encoder or muxer failure.
    /// - [`UnletterboxError::VideoDecodeError`] if the source cannot be
    ///   decoded.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), UnletterboxError> {
        let path = path.as_ref();
        let video_metadata = self
            .media
            .metadata
            .video
            .as_ref()
            .ok_or(UnletterboxError::NoVideoStream)?;
        let video_stream_index = video_metadata.stream_index;
        let (crop_width, crop_height) = self.output_dimensions();

        if (crop_width, crop_height) != (self.rectangle.width(), self.rectangle.height()) {
            log::debug!(
                "Rounding crop size {}x{} down to {crop_width}x{crop_height} for 4:2:0 output",
                self.rectangle.width(),
                self.rectangle.height(),
            );
        }

        log::info!(
            "Writing cropped video to {} ({crop_width}x{crop_height} at x={}, y={})",
            path.display(),
            self.rectangle.left(),
            self.rectangle.top(),
        );

        // A fresh demuxer, so earlier frame sampling seeks don't matter.
        let mut input_context = ffmpeg_next::format::input(&self.media.file_path).map_err(
            |error| UnletterboxError::FileOpen {
                path: self.media.file_path.clone(),
                reason: error.to_string(),
            },
        )?;

        let mut output = ffmpeg_next::format::output(&path).map_err(|error| {
            UnletterboxError::VideoEncodeError(format!("cannot open output: {error}"))
        })?;
        let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);

        let (time_base, frame_rate, source_codec, mut decoder) = {
            let stream = input_context
                .stream(video_stream_index)
                .ok_or(UnletterboxError::NoVideoStream)?;
            let decoder_context = CodecContext::from_parameters(stream.parameters())?;
            let decoder = decoder_context.decoder().video().map_err(|error| {
                UnletterboxError::VideoDecodeError(format!("cannot open video decoder: {error}"))
            })?;
            (
                stream.time_base(),
                conversion::frame_rate_or_none(stream.avg_frame_rate()),
                stream.parameters().id(),
                decoder,
            )
        };

        let encoder_id = select_encoder(self.options.codec, source_codec)?;
        let encoder_codec = ffmpeg_next::encoder::find(encoder_id).ok_or_else(|| {
            UnletterboxError::VideoEncodeError(format!("codec {encoder_id:?} not available"))
        })?;
        log::debug!("Encoding with {encoder_id:?} (source codec {source_codec:?})");

        let (video_output_index, mut encoder) = {
            let mut stream = output.add_stream(encoder_codec).map_err(|error| {
                UnletterboxError::VideoEncodeError(format!("cannot add video stream: {error}"))
            })?;

            let mut encoder = CodecContext::from_parameters(stream.parameters())
                .map_err(|error| {
                    UnletterboxError::VideoEncodeError(format!(
                        "cannot create codec context: {error}"
                    ))
                })?
                .encoder()
                .video()
                .map_err(|error| {
                    UnletterboxError::VideoEncodeError(format!("cannot open video encoder: {error}"))
                })?;

            encoder.set_width(crop_width);
            encoder.set_height(crop_height);
            encoder.set_format(Pixel::YUV420P);
            encoder.set_time_base(time_base);
            if let Some(rate) = frame_rate {
                encoder.set_frame_rate(Some(rate));
            }
            if let Some(bitrate) = self.options.bitrate {
                encoder.set_bit_rate(bitrate);
            }
            if needs_global_header {
                unsafe {
                    (*encoder.as_mut_ptr()).flags |=
                        ffmpeg_sys_next::AV_CODEC_FLAG_GLOBAL_HEADER as i32;
                }
            }

            let mut encoder_options = Dictionary::new();
            if let Some(crf) = self.options.crf {
                encoder_options.set("crf", &crf.to_string());
            }

            let encoder = encoder
                .open_as_with(encoder_codec, encoder_options)
                .map_err(|error| {
                    UnletterboxError::VideoEncodeError(format!("cannot open encoder: {error}"))
                })?;
            stream.set_parameters(&encoder);
            (stream.index(), encoder)
        };

        // Input stream index → output stream index for everything we keep.
        let mut stream_map: Vec<Option<usize>> = vec![None; input_context.streams().count()];
        stream_map[video_stream_index] = Some(video_output_index);

        if self.options.copy_audio {
            for stream in input_context.streams() {
                if stream.parameters().medium() != Type::Audio {
                    continue;
                }
                let mut output_stream = output
                    .add_stream(ffmpeg_next::encoder::find(Id::None))
                    .map_err(|error| {
                        UnletterboxError::VideoEncodeError(format!(
                            "cannot add audio stream: {error}"
                        ))
                    })?;
                output_stream.set_parameters(stream.parameters());
                // Let the muxer pick its own codec tag.
                unsafe {
                    (*output_stream.parameters().as_mut_ptr()).codec_tag = 0;
                }
                stream_map[stream.index()] = Some(output_stream.index());
            }
        }

        output.write_header().map_err(|error| {
            UnletterboxError::VideoEncodeError(format!("cannot write header: {error}"))
        })?;

        let crop = CropSpec {
            width: crop_width,
            height: crop_height,
            x: self.rectangle.left(),
            y: self.rectangle.top(),
        };
        let mut tracker = ProgressTracker::new(
            self.options.progress.clone(),
            OperationType::Encoding,
            Some(video_metadata.frame_count),
            PROGRESS_BATCH,
        );
        let mut sink = EncodeSink {
            encoder: &mut encoder,
            output: &mut output,
            stream_index: video_output_index,
            time_base,
            tracker: &mut tracker,
        };

        let mut graph: Option<FilterGraph> = None;
        let mut decoded_frame = VideoFrame::empty();

        for (stream, mut packet) in input_context.packets() {
            let input_index = stream.index();

            if input_index == video_stream_index {
                decoder.send_packet(&packet).map_err(|error| {
                    UnletterboxError::VideoDecodeError(error.to_string())
                })?;
                while decoder.receive_frame(&mut decoded_frame).is_ok() {
                    sink.push(&mut graph, &decoded_frame, &crop)?;
                }
                continue;
            }

            let Some(output_index) = stream_map.get(input_index).copied().flatten() else {
                continue;
            };
            let output_time_base = sink.output_time_base(output_index)?;
            packet.set_stream(output_index);
            packet.rescale_ts(stream.time_base(), output_time_base);
            packet.set_position(-1);
            packet.write_interleaved(&mut *sink.output).map_err(|error| {
                UnletterboxError::VideoEncodeError(format!("write audio packet failed: {error}"))
            })?;
        }

        // Flush the decoder, then the filter graph, then the encoder.
        decoder
            .send_eof()
            .map_err(|error| UnletterboxError::VideoDecodeError(error.to_string()))?;
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            sink.push(&mut graph, &decoded_frame, &crop)?;
        }

        let Some(graph) = graph.as_mut() else {
            return Err(UnletterboxError::VideoDecodeError(
                "no video frames were decoded".to_string(),
            ));
        };
        sink.filter_and_encode(graph, None)?;
        sink.finish()?;

        output.write_trailer().map_err(|error| {
            UnletterboxError::VideoEncodeError(format!("cannot write trailer: {error}"))
        })?;
        tracker.finish();

        Ok(())
    }
}

/// Pick the encoder: the requested codec, else the source codec, else H.264.
fn select_encoder(preferred: Option<VideoCodec>, source: Id) -> Result<Id, UnletterboxError> {
    if let Some(codec) = preferred {
        let id = codec.to_codec_id();
        return ffmpeg_next::encoder::find(id)
            .map(|_| id)
            .ok_or_else(|| UnletterboxError::VideoEncodeError(format!("codec {id:?} not available")));
    }

    if ffmpeg_next::encoder::find(source).is_some() {
        return Ok(source);
    }

    log::debug!("No encoder available for {source:?}, falling back to H.264");
    ffmpeg_next::encoder::find(Id::H264)
        .map(|_| Id::H264)
        .ok_or_else(|| {
            UnletterboxError::VideoEncodeError(format!(
                "no encoder available for {source:?} and H.264 fallback is missing"
            ))
        })
}

struct CropSpec {
    width: u32,
    height: u32,
    x: u32,
    y: u32,
}

/// Build `buffer → crop → format → buffersink` matching `frame`'s properties.
///
/// The buffer source is described from the first decoded frame rather than
/// the codec parameters, since decoders may report a different pixel format
/// before decoding starts.
fn build_crop_graph(
    frame: &VideoFrame,
    time_base: Rational,
    crop: &CropSpec,
) -> Result<FilterGraph, UnletterboxError> {
    let (pixel_format, color_space, color_range) = unsafe {
        let ptr = frame.as_ptr();
        ((*ptr).format, (*ptr).colorspace as i32, (*ptr).color_range as i32)
    };
    let aspect = frame.aspect_ratio();
    let (aspect_numerator, aspect_denominator) = if aspect.numerator() > 0 {
        (aspect.numerator(), aspect.denominator())
    } else {
        (1, 1)
    };

    let buffer_args = format!(
        "video_size={}x{}:pix_fmt={pixel_format}:time_base={}/{}:pixel_aspect={aspect_numerator}/{aspect_denominator}:colorspace={color_space}:range={color_range}",
        frame.width(),
        frame.height(),
        time_base.numerator(),
        time_base.denominator(),
    );

    let mut graph = FilterGraph::new();
    graph
        .add(
            &ffmpeg_next::filter::find("buffer").ok_or_else(|| {
                UnletterboxError::FilterGraphError("FFmpeg 'buffer' filter not found".to_string())
            })?,
            "in",
            &buffer_args,
        )
        .map_err(|error| {
            UnletterboxError::FilterGraphError(format!("Failed to add buffer filter: {error}"))
        })?;
    graph
        .add(
            &ffmpeg_next::filter::find("buffersink").ok_or_else(|| {
                UnletterboxError::FilterGraphError(
                    "FFmpeg 'buffersink' filter not found".to_string(),
                )
            })?,
            "out",
            "",
        )
        .map_err(|error| {
            UnletterboxError::FilterGraphError(format!("Failed to add buffersink filter: {error}"))
        })?;

    let spec = format!(
        "crop={}:{}:{}:{}:exact=1,format=pix_fmts=yuv420p",
        crop.width, crop.height, crop.x, crop.y
    );
    log::debug!("Crop filter graph: {spec}");

    graph
        .output("in", 0)
        .map_err(|error| UnletterboxError::FilterGraphError(format!("output: {error}")))?
        .input("out", 0)
        .map_err(|error| UnletterboxError::FilterGraphError(format!("input: {error}")))?
        .parse(&spec)
        .map_err(|error| UnletterboxError::FilterGraphError(format!("parse: {error}")))?;
    graph
        .validate()
        .map_err(|error| UnletterboxError::FilterGraphError(format!("validate: {error}")))?;

    Ok(graph)
}

/// The encoding half of the pipeline: filtered frames in, muxed packets out.
struct EncodeSink<'s> {
    encoder: &'s mut VideoEncoder,
    output: &'s mut Output,
    stream_index: usize,
    time_base: Rational,
    tracker: &'s mut ProgressTracker,
}

impl EncodeSink<'_> {
    fn output_time_base(&self, index: usize) -> Result<Rational, UnletterboxError> {
        self.output
            .stream(index)
            .map(|stream| stream.time_base())
            .ok_or_else(|| {
                UnletterboxError::VideoEncodeError(format!("output stream {index} missing"))
            })
    }

    /// Filter and encode a decoded frame, building the graph on first use.
    fn push(
        &mut self,
        graph: &mut Option<FilterGraph>,
        frame: &VideoFrame,
        crop: &CropSpec,
    ) -> Result<(), UnletterboxError> {
        if graph.is_none() {
            *graph = Some(build_crop_graph(frame, self.time_base, crop)?);
        }
        match graph.as_mut() {
            Some(graph) => self.filter_and_encode(graph, Some(frame)),
            None => Ok(()),
        }
    }

    /// Push `frame` (or end-of-stream for `None`) through the graph and
    /// encode whatever comes out.
    fn filter_and_encode(
        &mut self,
        graph: &mut FilterGraph,
        frame: Option<&VideoFrame>,
    ) -> Result<(), UnletterboxError> {
        let mut source = graph.get("in").ok_or_else(|| {
            UnletterboxError::FilterGraphError("Filter 'in' not found".to_string())
        })?;
        match frame {
            Some(frame) => source.source().add(frame),
            None => source.source().flush(),
        }
        .map_err(|error| {
            UnletterboxError::FilterGraphError(format!("Failed to feed filter: {error}"))
        })?;

        let mut filtered_frame = VideoFrame::empty();
        loop {
            let mut sink = graph.get("out").ok_or_else(|| {
                UnletterboxError::FilterGraphError("Filter 'out' not found".to_string())
            })?;
            if sink.sink().frame(&mut filtered_frame).is_err() {
                break;
            }

            // Let the encoder choose frame types instead of copying the
            // decoder's.
            filtered_frame.set_kind(picture::Type::None);
            self.encoder.send_frame(&filtered_frame).map_err(|error| {
                UnletterboxError::VideoEncodeError(format!("send_frame failed: {error}"))
            })?;

            let timestamp = filtered_frame.pts().map(|pts| {
                let seconds = conversion::pts_to_seconds(pts, self.time_base).max(0.0);
                std::time::Duration::from_secs_f64(seconds)
            });
            self.tracker.advance(timestamp);
            self.drain_packets()?;
        }

        Ok(())
    }

    fn drain_packets(&mut self) -> Result<(), UnletterboxError> {
        let output_time_base = self.output_time_base(self.stream_index)?;
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, output_time_base);
            packet.write_interleaved(&mut *self.output).map_err(|error| {
                UnletterboxError::VideoEncodeError(format!("write packet failed: {error}"))
            })?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), UnletterboxError> {
        self.encoder.send_eof().map_err(|error| {
            UnletterboxError::VideoEncodeError(format!("send_eof failed: {error}"))
        })?;
        self.drain_packets()
    }
}

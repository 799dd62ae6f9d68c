//! End-to-end crop runs.
//!
//! [`Unletterbox`] validates the input, samples and scans frames, reports
//! the original and cropped resolutions, and writes `<stem>_cropped<.ext>`
//! next to the input. The cropped file is encoded into a temporary file in
//! the output directory and renamed into place only once encoding succeeds,
//! so a failed run never leaves a partial output behind.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use image::DynamicImage;

use crate::{
    aggregate::{CropRectangle, FrameSource, detect_crop},
    configuration::DetectionOptions,
    cropper::EncodeOptions,
    error::UnletterboxError,
    media::{MediaFile, VideoClip},
    progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker},
};

/// Suffix appended to the input stem to name the output.
pub const OUTPUT_SUFFIX: &str = "_cropped";

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropReport {
    /// Width of the input video.
    pub original_width: u32,
    /// Height of the input video.
    pub original_height: u32,
    /// The detected content rectangle.
    pub rectangle: CropRectangle,
    /// Where the cropped video was written, or `None` for detect-only runs.
    pub output_path: Option<PathBuf>,
}

impl CropReport {
    /// Width and height of the detected content.
    pub fn cropped_resolution(&self) -> (u32, u32) {
        (self.rectangle.width(), self.rectangle.height())
    }

    /// Width and height of the written video, or `None` if nothing was
    /// written.
    ///
    /// Can be one pixel smaller than [`cropped_resolution`](Self::cropped_resolution)
    /// on each axis, since the encoder needs even dimensions.
    pub fn output_resolution(&self) -> Option<(u32, u32)> {
        self.output_path
            .as_ref()
            .map(|_| self.rectangle.encoded_dimensions())
    }
}

/// Builder for a single detect-and-crop run.
///
/// # Example
///
/// ```no_run
/// use unletterbox::{Unletterbox, UnletterboxError};
///
/// let report = Unletterbox::new("movie.mkv").overwrite(true).run()?;
/// let (width, height) = report.cropped_resolution();
/// println!("{width}x{height} -> {:?}", report.output_path);
/// # Ok::<(), UnletterboxError>(())
/// ```
#[derive(Clone)]
pub struct Unletterbox {
    input: PathBuf,
    output: Option<PathBuf>,
    detection: DetectionOptions,
    encode: EncodeOptions,
    progress: Arc<dyn ProgressCallback>,
    overwrite: bool,
    detect_only: bool,
}

impl fmt::Debug for Unletterbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unletterbox")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("detection", &self.detection)
            .field("encode", &self.encode)
            .field("overwrite", &self.overwrite)
            .field("detect_only", &self.detect_only)
            .finish_non_exhaustive()
    }
}

impl Unletterbox {
    /// Start a run for the video at `input`.
    pub fn new<P: AsRef<Path>>(input: P) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: None,
            detection: DetectionOptions::default(),
            encode: EncodeOptions::default(),
            progress: Arc::new(NoOpProgress),
            overwrite: false,
            detect_only: false,
        }
    }

    /// Write to `output` instead of the derived `<stem>_cropped` path.
    #[must_use]
    pub fn output<P: AsRef<Path>>(mut self, output: P) -> Self {
        self.output = Some(output.as_ref().to_path_buf());
        self
    }

    /// Replace the options used to find the border, such as background
    /// thresholds and sample positions.
    #[must_use]
    pub fn detection(mut self, detection: DetectionOptions) -> Self {
        self.detection = detection;
        self
    }

    /// Replace the encoder settings for the cropped output.
    ///
    /// Any progress callback inside `encode` is ignored; encoding reports to
    /// the one set with [`progress`](Self::progress).
    #[must_use]
    pub fn encode(mut self, encode: EncodeOptions) -> Self {
        self.encode = encode;
        self
    }

    /// Report sampling and encoding progress to `progress`.
    #[must_use]
    pub fn progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace an existing output file instead of failing.
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Stop after detection; nothing is written.
    #[must_use]
    pub fn detect_only(mut self, detect_only: bool) -> Self {
        self.detect_only = detect_only;
        self
    }

    /// The path the cropped video will be written to.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| cropped_output_path(&self.input))
    }

    /// Open the input with FFmpeg and run detection and cropping.
    ///
    /// # Errors
    ///
    /// - [`UnletterboxError::InvalidInputPath`] if the input does not exist.
    /// - [`UnletterboxError::OutputExists`] if the output exists and
    ///   overwriting was not requested.
    /// - Any detection, decode, or encode error.
    pub fn run(&self) -> Result<CropReport, UnletterboxError> {
        if !self.input.exists() {
            return Err(UnletterboxError::InvalidInputPath {
                path: self.input.clone(),
            });
        }
        self.check_output()?;

        let mut media = MediaFile::open(&self.input)?;
        self.run_with(&mut media)
    }

    /// Run detection and cropping against an already opened clip.
    ///
    /// The input path is only used to derive the output path; it is not
    /// checked for existence.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), minus the input path check.
    pub fn run_with<C: VideoClip + ?Sized>(
        &self,
        clip: &mut C,
    ) -> Result<CropReport, UnletterboxError> {
        self.check_output()?;

        let rectangle = {
            let mut sampling = SamplingProgress {
                inner: &mut *clip,
                tracker: ProgressTracker::new(
                    self.progress.clone(),
                    OperationType::FrameSampling,
                    Some(self.detection.sample_fractions().len() as u64),
                    1,
                ),
            };
            detect_crop(&mut sampling, &self.detection)?
        };

        let (original_width, original_height) = rectangle.frame_dimensions();
        log::info!("Original resolution: {original_width}x{original_height}");
        log::info!(
            "Cropped resolution: {}x{}",
            rectangle.width(),
            rectangle.height()
        );
        let (encoded_width, encoded_height) = rectangle.encoded_dimensions();
        if !self.detect_only
            && (encoded_width != rectangle.width() || encoded_height != rectangle.height())
        {
            log::info!("Encoded resolution: {encoded_width}x{encoded_height} (rounded to even)");
        }
        if rectangle.is_full_frame() {
            log::info!("No border detected; the output keeps the full frame");
        }

        let mut report = CropReport {
            original_width,
            original_height,
            rectangle,
            output_path: None,
        };
        if self.detect_only {
            return Ok(report);
        }

        let output = self.output_path();
        let encode = self.encode.clone().with_progress(self.progress.clone());
        write_atomically(&output, self.overwrite, |temporary| {
            clip.write_cropped(rectangle, temporary, &encode)
        })?;

        log::info!("Saved cropped video to {}", output.display());
        report.output_path = Some(output);
        Ok(report)
    }

    fn check_output(&self) -> Result<(), UnletterboxError> {
        if self.detect_only || self.overwrite {
            return Ok(());
        }
        let output = self.output_path();
        if output.exists() {
            return Err(UnletterboxError::OutputExists { path: output });
        }
        Ok(())
    }
}

/// Derive `<stem>_cropped<.ext>` alongside `input`.
///
/// ```
/// use std::path::Path;
///
/// let output = unletterbox::cropped_output_path(Path::new("films/heat.mkv"));
/// assert_eq!(output, Path::new("films/heat_cropped.mkv"));
/// ```
pub fn cropped_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match input.extension() {
        Some(extension) => format!("{stem}{OUTPUT_SUFFIX}.{}", extension.to_string_lossy()),
        None => format!("{stem}{OUTPUT_SUFFIX}"),
    };
    input.with_file_name(file_name)
}

/// Run `write` against a temporary file beside `output`, then move it into
/// place. The temporary file is removed if either step fails.
fn write_atomically<F>(output: &Path, overwrite: bool, write: F) -> Result<(), UnletterboxError>
where
    F: FnOnce(&Path) -> Result<(), UnletterboxError>,
{
    let directory = output
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    // Keep the extension so FFmpeg picks the same container.
    let suffix = output
        .extension()
        .map(|extension| format!(".{}", extension.to_string_lossy()))
        .unwrap_or_default();

    let mut builder = tempfile::Builder::new();
    builder.prefix(".unletterbox-").suffix(&suffix);
    // Temporary files default to 0600; the output should get the same
    // umask-derived mode as any newly created file.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let temporary = builder.tempfile_in(directory)?;
    log::debug!("Encoding into temporary file {}", temporary.path().display());

    write(temporary.path())?;

    let persisted = if overwrite {
        temporary.persist(output)
    } else {
        temporary.persist_noclobber(output)
    };
    persisted.map_err(|error| UnletterboxError::IoError(error.error))?;
    Ok(())
}

/// Frame source adapter that reports one progress step per sampled frame.
struct SamplingProgress<'c, C: ?Sized> {
    inner: &'c mut C,
    tracker: ProgressTracker,
}

impl<C: FrameSource + ?Sized> FrameSource for SamplingProgress<'_, C> {
    fn duration(&self) -> Duration {
        self.inner.duration()
    }

    fn frame_at(&mut self, timestamp: Duration) -> Result<DynamicImage, UnletterboxError> {
        let frame = self.inner.frame_at(timestamp)?;
        self.tracker.advance(Some(timestamp));
        Ok(frame)
    }
}

use std::{io::Write, path::PathBuf, process::ExitCode, sync::Arc, time::Instant};

use clap::{Parser, error::ErrorKind};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use serde_json::{Value, json};
use unletterbox::{
    CropReport, FfmpegLogLevel, OperationType, ProgressCallback, ProgressInfo, Unletterbox,
    UnletterboxError,
};

const CLI_AFTER_HELP: &str = "Examples:\n  unletterbox movie.mkv\n  unletterbox movie.mkv --detect-only --json\n  unletterbox movie.mp4 --overwrite --verbose\n\nExit status:\n  0  success\n  1  usage error or decode/encode failure\n  2  input path does not exist\n  3  borders could not be detected";

/// Exit status for usage errors; clap's own default is 2, which is reserved
/// for a missing input.
const EXIT_USAGE: u8 = 1;

#[derive(Debug, Parser)]
#[command(
    name = "unletterbox",
    version,
    about = "Detect and crop black letterbox/pillarbox borders from a video",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input video path.
    input: PathBuf,

    /// Show debug-level logging output.
    #[arg(long)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, default_value = "error")]
    ffmpeg_log_level: String,

    /// Print the crop report as JSON.
    #[arg(long)]
    json: bool,

    /// Report the detected rectangle without writing a cropped file.
    #[arg(long)]
    detect_only: bool,

    /// Replace an existing output file.
    #[arg(long)]
    overwrite: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format(|buf, record| {
            let level = match record.level() {
                log::Level::Error => "ERROR".bright_red(),
                log::Level::Warn => "WARN ".yellow(),
                log::Level::Info => "INFO ".green(),
                log::Level::Debug => "DEBUG".blue(),
                log::Level::Trace => "TRACE".magenta(),
            };
            writeln!(buf, "{level} {}", record.args())
        })
        .init();
}

/// Renders sampling and encoding progress on stderr.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, indicatif::style::TemplateError> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg:<10} {bar:40.cyan/blue} {pos}/{len} ({eta})",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    /// Remove the bar so the report or error prints on a clean line.
    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let label = match info.operation {
            OperationType::FrameSampling => "sampling",
            OperationType::Encoding => "encoding",
            _ => "working",
        };
        self.bar.set_message(label);
        if let Some(total) = info.total {
            self.bar.set_length(total.max(info.current));
        }
        self.bar.set_position(info.current);

        let done = info.total.is_some_and(|total| info.current >= total);
        if done && info.operation == OperationType::Encoding {
            self.bar.finish_and_clear();
        }
    }
}

fn report_json(report: &CropReport) -> Value {
    let (detected_width, detected_height) = report.cropped_resolution();
    let (cropped_width, cropped_height) = report
        .output_resolution()
        .unwrap_or((detected_width, detected_height));
    let rectangle = &report.rectangle;
    json!({
        "original_resolution": {
            "width": report.original_width,
            "height": report.original_height,
        },
        "detected_resolution": {
            "width": detected_width,
            "height": detected_height,
        },
        "cropped_resolution": {
            "width": cropped_width,
            "height": cropped_height,
        },
        "rectangle": {
            "left": rectangle.left(),
            "right": rectangle.right(),
            "top": rectangle.top(),
            "bottom": rectangle.bottom(),
        },
        "output": report.output_path.as_ref().map(|path| path.display().to_string()),
    })
}

fn print_report(report: &CropReport, as_json: bool) {
    if as_json {
        println!("{:#}", report_json(report));
        return;
    }

    println!(
        "Original resolution: {}x{}",
        report.original_width, report.original_height
    );
    let (detected_width, detected_height) = report.cropped_resolution();
    match report.output_resolution() {
        Some((width, height)) if (width, height) != (detected_width, detected_height) => {
            println!(
                "Cropped resolution: {width}x{height} (detected {detected_width}x{detected_height}, rounded to even)"
            );
        }
        _ => println!("Cropped resolution: {detected_width}x{detected_height}"),
    }
    if let Some(path) = &report.output_path {
        println!("{} {}", "saved".green().bold(), path.display());
    }
}

fn run(
    cli: &Cli,
    progress: Option<Arc<TerminalProgress>>,
) -> Result<CropReport, UnletterboxError> {
    let mut job = Unletterbox::new(&cli.input)
        .overwrite(cli.overwrite)
        .detect_only(cli.detect_only);
    if let Some(progress) = progress {
        job = job.progress(progress);
    }
    job.run()
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            // Printing can only fail if stdout/stderr are closed.
            let _ = error.print();
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    init_logging(cli.verbose);

    match cli.ffmpeg_log_level.parse::<FfmpegLogLevel>() {
        Ok(level) => unletterbox::set_ffmpeg_log_level(level),
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            return ExitCode::from(EXIT_USAGE);
        }
    }

    let progress = if cli.json {
        None
    } else {
        match TerminalProgress::new() {
            Ok(progress) => Some(Arc::new(progress)),
            Err(error) => {
                log::debug!("Progress bar disabled: {error}");
                None
            }
        }
    };

    let started = Instant::now();
    let result = run(&cli, progress.clone());
    if let Some(progress) = &progress {
        progress.clear();
    }

    match result {
        Ok(report) => {
            print_report(&report, cli.json);
            log::debug!("Finished in {:.1?}", started.elapsed());
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            ExitCode::from(error.exit_code() as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use clap::{Parser, error::ErrorKind};
    use unletterbox::{CropRectangle, CropReport, OperationType, ProgressCallback, ProgressInfo};

    use super::{Cli, TerminalProgress, report_json};

    fn report(output_path: Option<PathBuf>) -> CropReport {
        CropReport {
            original_width: 64,
            original_height: 48,
            rectangle: CropRectangle::new(8, 54, 6, 40, 64, 48).unwrap(),
            output_path,
        }
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "unletterbox",
            "movie.mkv",
            "--json",
            "--detect-only",
            "--ffmpeg-log-level",
            "quiet",
        ])
        .unwrap();
        assert_eq!(cli.input.to_str(), Some("movie.mkv"));
        assert!(cli.json);
        assert!(cli.detect_only);
        assert!(!cli.overwrite);
        assert_eq!(cli.ffmpeg_log_level, "quiet");
    }

    #[test]
    fn missing_input_is_a_usage_error() {
        let error = Cli::try_parse_from(["unletterbox"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn extra_positional_is_a_usage_error() {
        let error = Cli::try_parse_from(["unletterbox", "a.mp4", "b.mp4"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn unfinished_bar_is_cleared() {
        let progress = TerminalProgress::new().unwrap();
        progress.on_progress(&ProgressInfo {
            operation: OperationType::FrameSampling,
            current: 1,
            total: Some(3),
            percentage: Some(33.3),
            elapsed: Duration::from_millis(40),
            estimated_remaining: None,
            current_timestamp: None,
        });
        assert!(!progress.bar.is_finished());

        progress.clear();
        assert!(progress.bar.is_finished());
        progress.clear();
    }

    #[test]
    fn json_reports_encoded_size_when_written() {
        let value = report_json(&report(Some(PathBuf::from("clip_cropped.mp4"))));
        assert_eq!(value["detected_resolution"]["width"], 47);
        assert_eq!(value["detected_resolution"]["height"], 35);
        assert_eq!(value["cropped_resolution"]["width"], 46);
        assert_eq!(value["cropped_resolution"]["height"], 34);
        assert_eq!(value["output"], "clip_cropped.mp4");
    }

    #[test]
    fn json_reports_detected_size_when_detect_only() {
        let value = report_json(&report(None));
        assert_eq!(value["cropped_resolution"]["width"], 47);
        assert_eq!(value["cropped_resolution"]["height"], 35);
        assert!(value["output"].is_null());
    }
}

//! Exit status checks against the built binary.

use std::process::Command;

fn unletterbox() -> Command {
    Command::new(env!("CARGO_BIN_EXE_unletterbox"))
}

#[test]
fn missing_input_path_exits_with_two() {
    let directory = tempfile::tempdir().unwrap();
    let input = directory.path().join("absent.mp4");

    let output = unletterbox().arg(&input).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not a valid path"));
    assert!(!directory.path().join("absent_cropped.mp4").exists());
    assert_eq!(std::fs::read_dir(directory.path()).unwrap().count(), 0);
}

#[test]
fn no_arguments_is_a_usage_error() {
    let output = unletterbox().output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn too_many_arguments_is_a_usage_error() {
    let output = unletterbox().args(["a.mp4", "b.mp4"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unknown_ffmpeg_log_level_is_a_usage_error() {
    let output = unletterbox()
        .args(["input.mp4", "--ffmpeg-log-level", "shouty"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn help_and_version_succeed() {
    let help = unletterbox().arg("--help").output().unwrap();
    assert_eq!(help.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&help.stdout).contains("--detect-only"));

    let version = unletterbox().arg("--version").output().unwrap();
    assert_eq!(version.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&version.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unreadable_media_is_a_general_failure() {
    let directory = tempfile::tempdir().unwrap();
    let input = directory.path().join("not_a_video.mp4");
    std::fs::write(&input, b"plain text, not a container").unwrap();

    let output = unletterbox().arg(&input).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(!directory.path().join("not_a_video_cropped.mp4").exists());
}

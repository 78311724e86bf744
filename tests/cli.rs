use assert_cmd::Command;
use predicates::prelude::*;

fn vidgrab() -> Command {
    Command::cargo_bin("vidgrab").unwrap()
}

#[test]
fn test_help_lists_commands() {
    vidgrab()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("interactive"))
        .stdout(predicate::str::contains("clean-url"));
}

#[test]
fn test_clean_url_strips_playlist() {
    vidgrab()
        .args(["clean-url", "https://youtube.com/watch?v=abc123&list=PL999"])
        .assert()
        .success()
        .stdout("https://youtube.com/watch?v=abc123\n");
}

#[test]
fn test_clean_url_keeps_single_video_url() {
    vidgrab()
        .args(["clean-url", "https://youtu.be/abc123?t=42"])
        .assert()
        .success()
        .stdout("https://youtu.be/abc123?t=42\n");
}

#[test]
fn test_download_rejects_non_http_url() {
    vidgrab()
        .args(["download", "ftp://example.com/video.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP or HTTPS"));
}

#[test]
fn test_unknown_command_fails() {
    vidgrab().arg("transcode").assert().failure();
}

//! CLI integration tests
//!
//! These tests verify the CLI works correctly end-to-end.

#![cfg(feature = "cli")]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

fn cli_binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shorthand"));
    cmd.env_remove("SHORTHAND_CONFIG").env_remove("RUST_LOG");
    cmd
}

fn bundle_bytes() -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    zip.start_file("index.html", options).unwrap();
    zip.write_all(b"<html>story</html>").unwrap();

    zip.start_file("assets/app.js", options).unwrap();
    zip.write_all(b"start()").unwrap();

    zip.finish().unwrap().into_inner()
}

fn write_config(dir: &Path, server_url: &str) -> PathBuf {
    let path = dir.join("site.toml");
    let public = dir.join("files");
    fs::write(
        &path,
        format!(
            r#"
[shorthand]
server_url = "{}"
user_id = "7"
token = "tok"

[files]
public_path = "{}"
public_url = "https://example.org/files/"
"#,
            server_url,
            public.display()
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_cli_help() {
    let output = cli_binary().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Shorthand"));
    assert!(stdout.contains("stories"));
    assert!(stdout.contains("copy"));
    assert!(stdout.contains("--config"));
}

#[test]
fn test_cli_version() {
    let output = cli_binary().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("shorthand"));
}

#[test]
fn test_cli_completions() {
    let output = cli_binary()
        .arg("--completions")
        .arg("bash")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}

#[test]
fn test_cli_inspect() {
    let temp = tempfile::tempdir().unwrap();
    let zip_path = temp.path().join("story.zip");
    fs::write(&zip_path, bundle_bytes()).unwrap();

    let output = cli_binary().arg("inspect").arg(&zip_path).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("index.html"));
    assert!(stdout.contains("assets/app.js"));
    assert!(stdout.contains("2 entries"));
}

#[test]
fn test_cli_inspect_rejects_non_zip() {
    let temp = tempfile::tempdir().unwrap();
    let bogus = temp.path().join("story.zip");
    fs::write(&bogus, "plain text").unwrap();

    let output = cli_binary().arg("inspect").arg(&bogus).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("zip format error"));
}

#[test]
fn test_cli_copy_without_credentials() {
    let output = cli_binary().args(["copy", "42", "abc"]).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not configured"));
}

#[test]
fn test_cli_bad_config() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("site.toml");
    fs::write(&path, "[http]\ntimeout_secs = \"never\"\n").unwrap();

    let output = cli_binary()
        .arg("--config")
        .arg(&path)
        .arg("profile")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid configuration"));
}

#[test]
fn test_cli_stories_ids() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/api/index/")
        .with_body(r#"{"stories":[{"id":"s1","title":"Reef"},{"id":"s2"}]}"#)
        .create();
    let temp = tempfile::tempdir().unwrap();
    let config = write_config(temp.path(), &server.url());

    let output = cli_binary()
        .arg("--config")
        .arg(&config)
        .args(["stories", "--ids"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["s1", "s2"]);
}

#[test]
fn test_cli_copy() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/api/story/abc/")
        .with_body(bundle_bytes())
        .create();
    let temp = tempfile::tempdir().unwrap();
    let config = write_config(temp.path(), &server.url());

    let output = cli_binary()
        .arg("--config")
        .arg(&config)
        .args(["copy", "42", "abc"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Extracted 2 files"));
    assert!(stdout.contains("url: https://example.org/files/shorthand/42/abc"));
    assert!(temp
        .path()
        .join("files/shorthand/42/abc/index.html")
        .exists());
}

#[test]
fn test_cli_copy_download_failure() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/api/story/abc/")
        .with_status(500)
        .create();
    let temp = tempfile::tempdir().unwrap();
    let config = write_config(temp.path(), &server.url());

    let output = cli_binary()
        .arg("--config")
        .arg(&config)
        .args(["copy", "42", "abc"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("download failed (HTTP 500)"));
}

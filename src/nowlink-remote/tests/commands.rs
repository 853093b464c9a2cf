#![cfg(unix)]

//! Command-dispatcher tests against shell-script stand-ins for the helper.
//! The script receives `<binding> <command> [args...]`, so `$2` is the
//! command word.

use nowlink_remote::{CommandRunner, HelperCommand, HelperConfig, HelperError};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use tempfile::NamedTempFile;

fn fake_helper(body: &str) -> tempfile::TempPath {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "#!/bin/bash\n{body}").unwrap();
    file.flush().unwrap();
    std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    file.into_temp_path()
}

fn runner_for(script: &tempfile::TempPath) -> CommandRunner {
    CommandRunner::new(HelperConfig::new(script.to_path_buf(), "/dev/null"))
}

#[tokio::test]
async fn run_captures_both_streams_and_status() {
    let script = fake_helper(
        r#"echo "ran $2"
echo "something went sideways" >&2
exit 3"#,
    );
    let runner = runner_for(&script);

    let output = runner.run(HelperCommand::Play).await.expect("should spawn");
    assert_eq!(output.stdout, "ran play");
    assert_eq!(output.stderr, "something went sideways");
    assert!(!output.success());
    assert_eq!(output.status.code(), Some(3));
}

#[tokio::test]
async fn run_reports_success_on_zero_exit() {
    let script = fake_helper("exit 0");
    let runner = runner_for(&script);

    let output = runner.run(HelperCommand::Pause).await.expect("should spawn");
    assert!(output.success());
    assert!(output.stdout.is_empty());
}

#[tokio::test]
async fn target_id_is_passed_to_every_invocation() {
    let script = fake_helper(r#"echo "$1 $2 $3 $4""#);
    let config = HelperConfig::new(script.to_path_buf(), "/dev/null")
        .with_target_id("com.example.player");
    let runner = CommandRunner::new(config);

    let output = runner
        .run(HelperCommand::NextTrack)
        .await
        .expect("should spawn");
    assert_eq!(output.stdout, "--id com.example.player /dev/null next_track");
}

#[tokio::test]
async fn missing_helper_is_a_spawn_failure() {
    let config = HelperConfig::new("/nonexistent/nowlink-helper", "/dev/null");
    let runner = CommandRunner::new(config);

    let err = runner
        .run(HelperCommand::Play)
        .await
        .expect_err("spawn should fail");
    assert!(matches!(err, HelperError::SpawnFailed { .. }));
}

#[tokio::test]
async fn fetch_now_playing_returns_first_valid_record() {
    let script = fake_helper(
        r#"if [ "$2" = "get" ]; then
  echo 'this is not a record'
  echo '{"payload":{"title":"Current","isPlaying":1}}'
  echo '{"payload":{"title":"Later"}}'
fi"#,
    );
    let runner = runner_for(&script);

    let event = runner
        .fetch_now_playing()
        .await
        .expect("query should run")
        .expect("should find a record");
    assert_eq!(event.payload.title.as_deref(), Some("Current"));
    assert_eq!(event.payload.is_playing, Some(true));
}

#[tokio::test]
async fn fetch_now_playing_maps_sentinel_to_none() {
    let script = fake_helper("echo 'NIL'");
    let runner = runner_for(&script);

    let state = runner.fetch_now_playing().await.expect("query should run");
    assert!(state.is_none());
}

#[tokio::test]
async fn fetch_now_playing_handles_silent_exit() {
    let script = fake_helper("exit 0");
    let runner = runner_for(&script);

    let state = runner.fetch_now_playing().await.expect("query should run");
    assert!(state.is_none());
}

//! Short-lived helper invocations: control commands and the one-shot query.

use crate::decode::{decode_record, Decoded};
use crate::framer::RecordFramer;
use nowlink_core::models::TrackEvent;
use nowlink_core::Config;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Positional argument selecting the helper's streaming mode.
pub(crate) const STREAM_MODE_ARG: &str = "loop";

/// Errors from helper invocation.
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("helper executable is not configured")]
    MissingHelper,
    #[error("helper binding path is not configured")]
    MissingBinding,
    #[error("failed to spawn helper {path}: {source}")]
    SpawnFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("helper process has no stdout")]
    NoStdout,
    #[error("failed to read helper output: {0}")]
    OutputRead(std::io::Error),
}

/// Everything needed to spawn the helper in any mode.
#[derive(Debug, Clone)]
pub struct HelperConfig {
    /// Helper executable.
    pub helper: PathBuf,
    /// Shared-library binding path, the helper's first positional argument.
    pub binding: PathBuf,
    /// Bundle identifier of the target player, applied to every invocation.
    pub target_id: Option<String>,
    /// Recycling policy for the streaming invocation.
    pub restart: RestartPolicy,
}

impl HelperConfig {
    pub fn new(helper: impl Into<PathBuf>, binding: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
            binding: binding.into(),
            target_id: None,
            restart: RestartPolicy::default(),
        }
    }

    pub fn with_target_id(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    /// Builds a helper config from the application config file.
    pub fn from_config(config: &Config) -> Result<Self, HelperError> {
        let helper = config.helper.path.clone().ok_or(HelperError::MissingHelper)?;
        let binding = config
            .helper
            .binding
            .clone()
            .ok_or(HelperError::MissingBinding)?;
        Ok(Self {
            helper,
            binding,
            target_id: config.helper.target_id.clone(),
            restart: RestartPolicy {
                event_threshold: config.listener.event_threshold,
                restart_delay: config.listener.restart_delay(),
            },
        })
    }

    /// Base invocation shared by every mode:
    /// `helper [--id <target>] <binding>`.
    pub(crate) fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.helper);
        if let Some(target) = &self.target_id {
            cmd.arg("--id").arg(target);
        }
        cmd.arg(&self.binding);
        cmd
    }
}

/// Proactive recycling policy for the long-running streaming helper.
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    /// Decoded track events after which the helper is recycled.
    pub event_threshold: u64,
    /// Grace period before the replacement process is spawned.
    pub restart_delay: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            event_threshold: 1000,
            restart_delay: Duration::from_millis(500),
        }
    }
}

/// Control commands understood by the helper.
#[derive(Debug, Clone, PartialEq)]
pub enum HelperCommand {
    Play,
    Pause,
    TogglePlayPause,
    NextTrack,
    PreviousTrack,
    Stop,
    SetTime(f64),
    Get,
}

impl HelperCommand {
    /// Wire arguments appended to the base invocation.
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Play => vec!["play".into()],
            Self::Pause => vec!["pause".into()],
            Self::TogglePlayPause => vec!["toggle_play_pause".into()],
            Self::NextTrack => vec!["next_track".into()],
            Self::PreviousTrack => vec!["previous_track".into()],
            Self::Stop => vec!["stop".into()],
            Self::SetTime(seconds) => vec!["set_time".into(), seconds.to_string()],
            Self::Get => vec!["get".into()],
        }
    }
}

/// Captured result of one helper invocation. A non-zero exit status is data
/// for the caller, not an error.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Spawns one short-lived helper process per command.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    config: HelperConfig,
}

impl CommandRunner {
    pub fn new(config: HelperConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HelperConfig {
        &self.config
    }

    /// Runs `command` to completion, capturing both output streams.
    pub async fn run(&self, command: HelperCommand) -> Result<CommandOutput, HelperError> {
        let mut cmd = self.config.base_command();
        cmd.args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd
            .output()
            .await
            .map_err(|source| HelperError::SpawnFailed {
                path: self.config.helper.clone(),
                source,
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            status: output.status,
        })
    }

    /// One-shot state query: spawns `get`, consumes output until the first
    /// valid record, then discards the process. `None` means no active
    /// player, or that the helper exited without producing a valid record.
    pub async fn fetch_now_playing(&self) -> Result<Option<TrackEvent>, HelperError> {
        let mut cmd = self.config.base_command();
        cmd.args(HelperCommand::Get.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| HelperError::SpawnFailed {
            path: self.config.helper.clone(),
            source,
        })?;
        let mut stdout = child.stdout.take().ok_or(HelperError::NoStdout)?;

        let mut framer = RecordFramer::new();
        let mut chunk = [0u8; 4096];
        let outcome = loop {
            let read = stdout
                .read(&mut chunk)
                .await
                .map_err(HelperError::OutputRead)?;
            if read == 0 {
                break None;
            }

            let mut found = None;
            for record in framer.feed(&chunk[..read]) {
                match decode_record(&record) {
                    Decoded::Track(event) => {
                        found = Some(Some(event));
                        break;
                    }
                    Decoded::NoPlayer => {
                        found = Some(None);
                        break;
                    }
                    Decoded::Malformed { source, .. } => {
                        tracing::debug!(error = %source, "skipping malformed record in query output");
                    }
                }
            }
            if let Some(outcome) = found {
                break outcome;
            }
        };

        let _ = child.kill().await;
        let _ = child.wait().await;
        Ok(outcome)
    }
}

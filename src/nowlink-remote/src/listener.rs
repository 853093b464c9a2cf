//! Supervision of the long-running streaming helper.
//!
//! One actor task owns the child process, the byte buffer, the event counter
//! and the playback clock. Consumer events leave through a single ordered
//! channel, so chunk arrival, clock ticks and facade calls can never
//! interleave their effects.

use crate::clock::{epoch_now, PlaybackClock, TICK_INTERVAL};
use crate::command::{CommandRunner, HelperCommand, HelperError, STREAM_MODE_ARG};
use crate::decode::{decode_record, Decoded};
use crate::framer::RecordFramer;
use nowlink_core::models::TrackEvent;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Debounce window for propagating seeks to the helper. Only the last seek
/// inside the window is dispatched.
pub(crate) const SEEK_DEBOUNCE: Duration = Duration::from_millis(50);

/// Events emitted to the consumer, in delivery order.
#[derive(Debug)]
pub enum RemoteEvent {
    /// A decoded track event, or `None` when no active player exists.
    Track(Option<TrackEvent>),
    /// Extrapolated or optimistic playback position, in seconds.
    PlaybackTime(f64),
    /// A record that failed decoding; `raw` preserves the exact bytes.
    DecodeError {
        source: serde_json::Error,
        raw: Vec<u8>,
    },
    /// The streaming helper went away without being asked to.
    ListenerTerminated,
}

/// Messages from the facade to the actor.
#[derive(Debug)]
pub(crate) enum ListenerMsg {
    Seek(f64),
    Shutdown,
}

/// Handle to a running listener actor.
pub(crate) struct ListenerHandle {
    pub(crate) tx: mpsc::UnboundedSender<ListenerMsg>,
    pub(crate) join: JoinHandle<()>,
}

pub(crate) fn spawn_listener(
    runner: CommandRunner,
    events: mpsc::UnboundedSender<RemoteEvent>,
) -> ListenerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = Listener {
        runner,
        events,
        rx,
        clock: PlaybackClock::new(),
        events_seen: 0,
        pending_seek: None,
        reset_tick: false,
    };
    let join = tokio::spawn(actor.run());
    ListenerHandle { tx, join }
}

/// How one streaming session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// The helper exited or its stream failed; nobody asked for it.
    Terminated,
    /// The event threshold was reached; recycle silently.
    Restart,
    /// The facade asked us to stop.
    Shutdown,
}

#[derive(Debug, PartialEq, Eq)]
enum RecordOutcome {
    Continue,
    Restart,
}

struct Listener {
    runner: CommandRunner,
    events: mpsc::UnboundedSender<RemoteEvent>,
    rx: mpsc::UnboundedReceiver<ListenerMsg>,
    clock: PlaybackClock,
    events_seen: u64,
    pending_seek: Option<f64>,
    reset_tick: bool,
}

impl Listener {
    async fn run(mut self) {
        loop {
            self.events_seen = 0;
            let mut child = match self.spawn_streaming() {
                Ok(child) => child,
                Err(err) => {
                    tracing::error!(error = %err, "failed to start streaming helper");
                    let _ = self.events.send(RemoteEvent::ListenerTerminated);
                    return;
                }
            };
            let Some(mut stdout) = child.stdout.take() else {
                tracing::error!("streaming helper has no stdout");
                let _ = self.events.send(RemoteEvent::ListenerTerminated);
                return;
            };
            tracing::info!(pid = ?child.id(), "streaming helper started");

            let end = self.stream(&mut stdout).await;
            shutdown_child(&mut child).await;

            match end {
                SessionEnd::Shutdown => return,
                SessionEnd::Terminated => {
                    tracing::warn!("streaming helper terminated unexpectedly");
                    let _ = self.events.send(RemoteEvent::ListenerTerminated);
                    return;
                }
                SessionEnd::Restart => {
                    tracing::debug!(
                        threshold = self.runner.config().restart.event_threshold,
                        "recycling streaming helper"
                    );
                    if !self.wait_restart_delay().await {
                        return;
                    }
                }
            }
        }
    }

    fn spawn_streaming(&self) -> Result<Child, HelperError> {
        let config = self.runner.config();
        let mut cmd = config.base_command();
        cmd.arg(STREAM_MODE_ARG)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd.spawn().map_err(|source| HelperError::SpawnFailed {
            path: config.helper.clone(),
            source,
        })
    }

    /// Drives one streaming session until it ends.
    async fn stream(&mut self, stdout: &mut ChildStdout) -> SessionEnd {
        let mut framer = RecordFramer::new();
        let mut chunk = [0u8; 4096];

        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let seek_timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(seek_timer);

        loop {
            tokio::select! {
                read = stdout.read(&mut chunk) => match read {
                    Ok(0) => return SessionEnd::Terminated,
                    Ok(n) => {
                        for record in framer.feed(&chunk[..n]) {
                            if self.handle_record(&record) == RecordOutcome::Restart {
                                return SessionEnd::Restart;
                            }
                        }
                        if std::mem::take(&mut self.reset_tick) {
                            tick.reset();
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to read helper output");
                        return SessionEnd::Terminated;
                    }
                },
                msg = self.rx.recv() => match msg {
                    Some(ListenerMsg::Shutdown) | None => return SessionEnd::Shutdown,
                    Some(ListenerMsg::Seek(seconds)) => {
                        self.apply_seek(seconds);
                        seek_timer.as_mut().reset(Instant::now() + SEEK_DEBOUNCE);
                        tick.reset();
                    }
                },
                _ = tick.tick(), if self.clock.is_ticking() => {
                    if let Some(elapsed) = self.clock.sample(epoch_now()) {
                        let _ = self.events.send(RemoteEvent::PlaybackTime(elapsed));
                    }
                },
                _ = &mut seek_timer, if self.pending_seek.is_some() => {
                    self.dispatch_pending_seek();
                },
            }
        }
    }

    /// Sits out the grace period between a planned kill and the respawn.
    /// Returns false when shutdown arrives first.
    async fn wait_restart_delay(&mut self) -> bool {
        let delay = tokio::time::sleep(self.runner.config().restart.restart_delay);
        tokio::pin!(delay);

        let seek_timer = tokio::time::sleep(SEEK_DEBOUNCE);
        tokio::pin!(seek_timer);

        loop {
            tokio::select! {
                _ = &mut delay => return true,
                msg = self.rx.recv() => match msg {
                    Some(ListenerMsg::Shutdown) | None => return false,
                    Some(ListenerMsg::Seek(seconds)) => {
                        self.apply_seek(seconds);
                        seek_timer.as_mut().reset(Instant::now() + SEEK_DEBOUNCE);
                    }
                },
                _ = &mut seek_timer, if self.pending_seek.is_some() => {
                    self.dispatch_pending_seek();
                },
            }
        }
    }

    fn handle_record(&mut self, record: &[u8]) -> RecordOutcome {
        match decode_record(record) {
            Decoded::NoPlayer => {
                self.clock.observe_no_player();
                let _ = self.events.send(RemoteEvent::Track(None));
                RecordOutcome::Continue
            }
            Decoded::Track(event) => {
                self.events_seen += 1;
                if self.events_seen >= self.runner.config().restart.event_threshold {
                    // The triggering event is consumed, not delivered.
                    return RecordOutcome::Restart;
                }

                let emissions = self.clock.observe(&event);
                if self.clock.is_ticking() {
                    self.reset_tick = true;
                }
                let _ = self.events.send(RemoteEvent::Track(Some(event)));
                for elapsed in emissions {
                    let _ = self.events.send(RemoteEvent::PlaybackTime(elapsed));
                }
                RecordOutcome::Continue
            }
            Decoded::Malformed { source, raw } => {
                tracing::debug!(error = %source, bytes = raw.len(), "malformed record");
                let _ = self.events.send(RemoteEvent::DecodeError { source, raw });
                RecordOutcome::Continue
            }
        }
    }

    /// Optimistically re-anchors and reports the new position; the external
    /// command is left pending for the debounce timer.
    fn apply_seek(&mut self, seconds: f64) {
        self.pending_seek = Some(seconds);
        let _ = self.events.send(RemoteEvent::PlaybackTime(seconds));
        self.clock.seek(seconds, epoch_now());
    }

    fn dispatch_pending_seek(&mut self) {
        if let Some(seconds) = self.pending_seek.take() {
            let runner = self.runner.clone();
            tokio::spawn(async move {
                if let Err(err) = runner.run(HelperCommand::SetTime(seconds)).await {
                    tracing::warn!(error = %err, "failed to dispatch seek command");
                }
            });
        }
    }
}

async fn shutdown_child(child: &mut Child) {
    if let Err(err) = child.kill().await {
        tracing::debug!(error = %err, "streaming helper was already gone");
    }
}

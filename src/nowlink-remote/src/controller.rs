//! Public facade over the listener, clock and command dispatcher.

use crate::command::{CommandOutput, CommandRunner, HelperCommand, HelperConfig, HelperError};
use crate::listener::{spawn_listener, ListenerHandle, ListenerMsg, RemoteEvent};
use nowlink_core::models::TrackEvent;
use tokio::sync::mpsc;

/// Owner-facing handle to the now-playing adapter.
///
/// All consumer-visible events arrive in order on the single channel returned
/// by [`RemoteController::new`]. Transport commands are fire-and-forget
/// short-lived helper invocations; only [`RemoteController::set_time`]
/// interacts with the listener, to keep scrubbing smooth.
pub struct RemoteController {
    runner: CommandRunner,
    events_tx: mpsc::UnboundedSender<RemoteEvent>,
    listener: Option<ListenerHandle>,
}

impl RemoteController {
    /// Creates the controller and the consumer's event stream.
    pub fn new(config: HelperConfig) -> (Self, mpsc::UnboundedReceiver<RemoteEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                runner: CommandRunner::new(config),
                events_tx,
                listener: None,
            },
            events_rx,
        )
    }

    /// Starts the streaming listener. No-op while one is already running.
    pub fn start_listening(&mut self) {
        if self.is_listening() {
            tracing::debug!("listener is already running");
            return;
        }
        self.listener = Some(spawn_listener(self.runner.clone(), self.events_tx.clone()));
    }

    /// Stops the streaming listener and waits for it to wind down. No events
    /// are emitted after this returns.
    pub async fn stop_listening(&mut self) {
        if let Some(handle) = self.listener.take() {
            let _ = handle.tx.send(ListenerMsg::Shutdown);
            let _ = handle.join.await;
        }
    }

    /// Whether the streaming listener is currently running.
    pub fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|handle| !handle.join.is_finished())
    }

    pub fn play(&self) {
        self.dispatch(HelperCommand::Play);
    }

    pub fn pause(&self) {
        self.dispatch(HelperCommand::Pause);
    }

    pub fn toggle_play_pause(&self) {
        self.dispatch(HelperCommand::TogglePlayPause);
    }

    pub fn next_track(&self) {
        self.dispatch(HelperCommand::NextTrack);
    }

    pub fn previous_track(&self) {
        self.dispatch(HelperCommand::PreviousTrack);
    }

    /// Stops playback in the target player. Unrelated to
    /// [`RemoteController::stop_listening`].
    pub fn stop(&self) {
        self.dispatch(HelperCommand::Stop);
    }

    /// Seeks to `seconds`. While listening, the new position is reported
    /// optimistically and the external command is debounced so rapid
    /// scrubbing coalesces into one dispatch; otherwise the command goes out
    /// directly.
    pub fn set_time(&mut self, seconds: f64) {
        if let Some(handle) = &self.listener {
            if handle.tx.send(ListenerMsg::Seek(seconds)).is_ok() {
                return;
            }
            // The actor is gone; forget the stale handle.
            self.listener = None;
        }
        self.dispatch(HelperCommand::SetTime(seconds));
    }

    /// One-shot "what is playing right now" query. `None` means no active
    /// player.
    pub async fn fetch_now_playing(&self) -> Result<Option<TrackEvent>, HelperError> {
        self.runner.fetch_now_playing().await
    }

    /// Runs one helper command to completion and returns its captured output.
    pub async fn run_command(&self, command: HelperCommand) -> Result<CommandOutput, HelperError> {
        self.runner.run(command).await
    }

    fn dispatch(&self, command: HelperCommand) {
        let runner = self.runner.clone();
        tokio::spawn(async move {
            match runner.run(command.clone()).await {
                Ok(output) if !output.success() => {
                    tracing::warn!(?command, stderr = %output.stderr, "helper command failed");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(?command, error = %err, "failed to run helper command");
                }
            }
        });
    }
}

impl Drop for RemoteController {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            let _ = handle.tx.send(ListenerMsg::Shutdown);
        }
    }
}

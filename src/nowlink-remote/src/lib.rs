//! Helper-process supervision and now-playing stream decoding.
//!
//! This crate provides:
//! - A framer and decoder for the helper's line-delimited stdout protocol
//! - A supervised long-running listener with a locally-extrapolated playback
//!   clock and proactive helper recycling
//! - A dispatcher for short-lived helper control invocations
//! - [`RemoteController`], the facade composing all of the above
//!
//! # Helper protocol
//!
//! The helper is spawned as `helper [--id <bundle-id>] <binding-path> <mode>`.
//! In `loop` mode it runs indefinitely and emits newline-terminated records
//! on stdout, each either the 3-byte sentinel `NIL` ("no active player") or a
//! JSON object:
//!
//! ```text
//! {"payload":{"title":"...","artist":"...","isPlaying":true,
//!             "elapsedTimeMicros":1000000,"timestampEpochMicros":...}}
//! ```
//!
//! In command mode the final arguments are one of `play`, `pause`,
//! `toggle_play_pause`, `next_track`, `previous_track`, `stop`,
//! `set_time <seconds>` or `get`; the process runs the command and exits.
//! `get` streams the same record format, of which only the first valid
//! record is consumed.
//!
//! # Usage
//!
//! ```rust,ignore
//! use nowlink_remote::{HelperConfig, RemoteController, RemoteEvent};
//!
//! let config = HelperConfig::new("/opt/nowlink/helper", "/opt/nowlink/binding.dylib");
//! let (mut controller, mut events) = RemoteController::new(config);
//! controller.start_listening();
//! while let Some(event) = events.recv().await {
//!     match event {
//!         RemoteEvent::Track(Some(event)) => { /* new state */ }
//!         RemoteEvent::Track(None) => { /* no active player */ }
//!         RemoteEvent::PlaybackTime(seconds) => { /* progress */ }
//!         _ => {}
//!     }
//! }
//! ```

pub mod clock;
pub mod command;
pub mod decode;
pub mod framer;

mod controller;
mod listener;

pub use clock::PlaybackClock;
pub use command::{
    CommandOutput, CommandRunner, HelperCommand, HelperConfig, HelperError, RestartPolicy,
};
pub use controller::RemoteController;
pub use decode::{decode_record, Decoded, NO_PLAYER_SENTINEL};
pub use framer::RecordFramer;
pub use listener::RemoteEvent;

//! Locally-extrapolated playback position between sparse helper updates.

use nowlink_core::models::TrackEvent;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Cadence of position updates while anchored and playing.
pub(crate) const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Seconds since the Unix epoch. Anchors compare local time against the
/// helper's `timestampEpochMicros`, so the wall clock is the common basis.
pub(crate) fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    elapsed: f64,
    wall: f64,
}

/// Two-state extrapolation clock: Idle (no anchor) or Anchored.
///
/// The clock itself is passive; the listener drives the periodic tick and
/// feeds observations in. All values are seconds.
#[derive(Debug, Default)]
pub struct PlaybackClock {
    anchor: Option<Anchor>,
    track_identity: Option<String>,
    playing: bool,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether periodic sampling should run.
    pub fn is_ticking(&self) -> bool {
        self.playing && self.anchor.is_some()
    }

    /// Last observed playing state; unknown counts as not playing.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Folds one track event into the clock and returns the elapsed-time
    /// values to emit, in order: `0.0` exactly once when the track identity
    /// changes, then a last-known snapshot when the event cannot anchor
    /// extrapolation.
    pub fn observe(&mut self, event: &TrackEvent) -> Vec<f64> {
        let mut emissions = Vec::new();

        let identity = event.unique_identifier();
        if self.track_identity.as_deref() != Some(identity.as_str()) {
            self.track_identity = Some(identity);
            emissions.push(0.0);
        }

        let payload = &event.payload;
        self.playing = payload.is_playing.unwrap_or(false);

        match (
            self.playing,
            payload.elapsed_time_micros,
            payload.timestamp_epoch_micros,
        ) {
            (true, Some(elapsed_micros), Some(timestamp_micros)) => {
                self.anchor = Some(Anchor {
                    elapsed: elapsed_micros / 1_000_000.0,
                    wall: timestamp_micros / 1_000_000.0,
                });
            }
            _ => {
                self.anchor = None;
                if let Some(elapsed_micros) = payload.elapsed_time_micros {
                    emissions.push(elapsed_micros / 1_000_000.0);
                }
            }
        }

        emissions
    }

    /// Clears extrapolation state when no active player exists.
    pub fn observe_no_player(&mut self) {
        self.playing = false;
        self.anchor = None;
    }

    /// Re-anchors at `seconds` as of `now_epoch`. The caller emits the
    /// optimistic position update itself.
    pub fn seek(&mut self, seconds: f64, now_epoch: f64) {
        self.anchor = Some(Anchor {
            elapsed: seconds,
            wall: now_epoch,
        });
    }

    /// Extrapolated position at `now_epoch`, while anchored. Purely additive;
    /// never re-queries the helper.
    pub fn sample(&self, now_epoch: f64) -> Option<f64> {
        self.anchor
            .map(|anchor| anchor.elapsed + (now_epoch - anchor.wall))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nowlink_core::models::TrackPayload;

    const T0: f64 = 1_700_000_000.0;

    fn event(title: &str, playing: Option<bool>, elapsed: Option<f64>, ts: Option<f64>) -> TrackEvent {
        TrackEvent {
            payload: TrackPayload {
                title: Some(title.to_string()),
                artist: Some("artist".to_string()),
                is_playing: playing,
                elapsed_time_micros: elapsed,
                timestamp_epoch_micros: ts,
                ..TrackPayload::default()
            },
        }
    }

    #[test]
    fn playing_event_anchors_and_extrapolates() {
        let mut clock = PlaybackClock::new();
        let emissions = clock.observe(&event(
            "one",
            Some(true),
            Some(10_000_000.0),
            Some(T0 * 1_000_000.0),
        ));

        assert_eq!(emissions, vec![0.0]);
        assert!(clock.is_ticking());

        let sample = clock.sample(T0 + 2.0).expect("should be anchored");
        assert!((sample - 12.0).abs() < 1e-6);
    }

    #[test]
    fn track_change_zero_emitted_exactly_once() {
        let mut clock = PlaybackClock::new();
        let playing = event("one", Some(true), Some(1_000_000.0), Some(T0 * 1e6));

        assert_eq!(clock.observe(&playing), vec![0.0]);
        assert_eq!(clock.observe(&playing), Vec::<f64>::new());

        let changed = event("two", Some(true), Some(0.0), Some(T0 * 1e6));
        assert_eq!(clock.observe(&changed), vec![0.0]);
    }

    #[test]
    fn zero_precedes_snapshot_for_new_paused_track() {
        let mut clock = PlaybackClock::new();
        let paused = event("one", Some(false), Some(30_000_000.0), None);

        assert_eq!(clock.observe(&paused), vec![0.0, 30.0]);
        assert!(!clock.is_ticking());
        assert!(clock.sample(T0).is_none());
    }

    #[test]
    fn pause_clears_anchor_and_snapshots_last_position() {
        let mut clock = PlaybackClock::new();
        clock.observe(&event("one", Some(true), Some(10e6), Some(T0 * 1e6)));
        assert!(clock.is_ticking());

        let emissions = clock.observe(&event("one", Some(false), Some(14e6), None));
        assert_eq!(emissions, vec![14.0]);
        assert!(!clock.is_ticking());
    }

    #[test]
    fn unknown_playing_state_is_not_playing() {
        let mut clock = PlaybackClock::new();
        let emissions = clock.observe(&event("one", None, Some(5e6), Some(T0 * 1e6)));

        assert_eq!(emissions, vec![0.0, 5.0]);
        assert!(!clock.is_playing());
        assert!(!clock.is_ticking());
    }

    #[test]
    fn missing_elapsed_time_emits_nothing() {
        let mut clock = PlaybackClock::new();
        let emissions = clock.observe(&event("one", Some(false), None, None));
        // Identity change still zeroes; no snapshot for an unknown position.
        assert_eq!(emissions, vec![0.0]);
    }

    #[test]
    fn playing_without_timestamp_cannot_anchor() {
        let mut clock = PlaybackClock::new();
        let emissions = clock.observe(&event("one", Some(true), Some(8e6), None));

        assert_eq!(emissions, vec![0.0, 8.0]);
        assert!(clock.is_playing());
        assert!(!clock.is_ticking());
    }

    #[test]
    fn seek_re_anchors_from_now() {
        let mut clock = PlaybackClock::new();
        clock.observe(&event("one", Some(true), Some(10e6), Some(T0 * 1e6)));

        clock.seek(30.0, T0 + 5.0);
        let sample = clock.sample(T0 + 6.0).expect("should stay anchored");
        assert!((sample - 31.0).abs() < 1e-6);
        assert!(clock.is_ticking());
    }

    #[test]
    fn seek_while_paused_does_not_tick() {
        let mut clock = PlaybackClock::new();
        clock.observe(&event("one", Some(false), Some(10e6), None));

        clock.seek(30.0, T0);
        assert!(!clock.is_ticking());
        assert_eq!(clock.sample(T0), Some(30.0));
    }

    #[test]
    fn no_player_goes_idle() {
        let mut clock = PlaybackClock::new();
        clock.observe(&event("one", Some(true), Some(10e6), Some(T0 * 1e6)));

        clock.observe_no_player();
        assert!(!clock.is_ticking());
        assert!(clock.sample(T0 + 1.0).is_none());
    }

    #[test]
    fn resuming_same_track_does_not_re_zero() {
        let mut clock = PlaybackClock::new();
        clock.observe(&event("one", Some(true), Some(10e6), Some(T0 * 1e6)));
        clock.observe_no_player();

        let emissions = clock.observe(&event("one", Some(true), Some(12e6), Some(T0 * 1e6)));
        assert_eq!(emissions, Vec::<f64>::new());
    }
}

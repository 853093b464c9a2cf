//! Decoding of framed records into typed events.

use nowlink_core::models::TrackEvent;

/// Exact bytes the helper emits when no active player exists.
pub const NO_PLAYER_SENTINEL: &[u8] = b"NIL";

/// Outcome of decoding one record. Decoding never fails past this boundary;
/// every record maps to exactly one variant.
#[derive(Debug)]
pub enum Decoded {
    /// The no-player sentinel.
    NoPlayer,
    /// A well-formed track event.
    Track(TrackEvent),
    /// A record that failed structured decoding. `raw` preserves the exact
    /// bytes for diagnosis.
    Malformed {
        source: serde_json::Error,
        raw: Vec<u8>,
    },
}

/// Decodes one record. The sentinel is matched byte-for-byte before any JSON
/// parsing is attempted.
pub fn decode_record(record: &[u8]) -> Decoded {
    if record == NO_PLAYER_SENTINEL {
        return Decoded::NoPlayer;
    }
    match serde_json::from_slice::<TrackEvent>(record) {
        Ok(event) => Decoded::Track(event),
        Err(source) => Decoded::Malformed {
            source,
            raw: record.to_vec(),
        },
    }
}

use serde::{Deserialize, Deserializer, Serialize};

/// One record from the helper's event stream.
///
/// Wire shape is `{"payload": {...}}`; every payload field is optional, and a
/// missing field means "unknown", never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub payload: TrackPayload,
}

impl TrackEvent {
    pub fn unique_identifier(&self) -> String {
        self.payload.unique_identifier()
    }
}

/// Player state as reported by the helper at one point in time.
///
/// Time quantities are microseconds; `timestamp_epoch_micros` is the helper's
/// wall clock at the moment `elapsed_time_micros` was observed. The artwork
/// payload stays base64-encoded here; decoding it is the consumer's business.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackPayload {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Playing state. The wire carries either a boolean or a 0/1 integer;
    /// anything else decodes to unknown rather than `false`.
    #[serde(deserialize_with = "bool_or_int")]
    pub is_playing: Option<bool>,
    pub duration_micros: Option<f64>,
    pub elapsed_time_micros: Option<f64>,
    pub timestamp_epoch_micros: Option<f64>,
    pub application_name: Option<String>,
    pub bundle_identifier: Option<String>,
    pub artwork_data_base64: Option<String>,
    pub artwork_mime_type: Option<String>,
}

impl TrackPayload {
    /// Identity key for track-change detection, built from title, artist and
    /// album. Two different tracks sharing all three collide; that is an
    /// accepted limitation, not a content hash.
    pub fn unique_identifier(&self) -> String {
        [
            self.title.as_deref().unwrap_or(""),
            self.artist.as_deref().unwrap_or(""),
            self.album.as_deref().unwrap_or(""),
        ]
        .join("|")
    }
}

fn bool_or_int<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Bool(flag)) => Some(flag),
        Some(Raw::Int(1)) => Some(true),
        Some(Raw::Int(0)) => Some(false),
        Some(Raw::Int(_)) | Some(Raw::Other(_)) | None => None,
    })
}

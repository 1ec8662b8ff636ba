use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Metadata;

/// An audio file known to the application.
///
/// `is_playing` is derived state owned by the audio file store; it is
/// recomputed whenever the playing pointer changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFileRecord {
    /// Unique file identifier.
    pub id: String,

    /// Display name, usually the file name.
    pub name: String,

    /// Location on disk, when the file came from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Size of the file in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// Playback length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    /// Tags and other descriptive fields; updated by partial merge.
    #[serde(default)]
    pub metadata: Metadata,

    /// Whether this file is the one currently playing.
    #[serde(default)]
    pub is_playing: bool,

    /// When the file was added to the collection.
    #[serde(with = "crate::utils::time")]
    pub added_at: OffsetDateTime,
}

impl AudioFileRecord {
    /// Create a record that is not playing and has no metadata.
    pub fn new(id: impl Into<String>, name: impl Into<String>, added_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: None,
            size_bytes: None,
            duration_seconds: None,
            metadata: Metadata::new(),
            is_playing: false,
            added_at,
        }
    }

    /// Set the path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the size in bytes.
    pub fn with_size_bytes(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    /// Set the duration in seconds.
    pub fn with_duration_seconds(mut self, duration_seconds: f64) -> Self {
        self.duration_seconds = Some(duration_seconds);
        self
    }

    /// Merge `partial` into the metadata, overwriting keys that exist in both.
    pub fn merge_metadata(&mut self, partial: Metadata) {
        for (key, value) in partial {
            self.metadata.insert(key, value);
        }
    }
}

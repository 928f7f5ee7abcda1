//! Core value types for the sequencing and transition engine
//!
//! Fixed, explicitly typed records shared between the optimizer, the batch
//! processor and the playback controller. Nothing here performs I/O.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audio feature vector for one track
///
/// Retrieved once per track from the feature provider and cached with a TTL.
/// `key` is a pitch class (0 = C .. 11 = B), `mode` is 0 for minor and 1 for
/// major, `energy` is normalized to [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Track tempo in beats per minute
    pub tempo_bpm: f64,
    /// Pitch class of the musical key (0..12)
    pub key: u8,
    /// Modality: 0 = minor, 1 = major
    pub mode: u8,
    /// Perceived intensity, normalized to [0.0, 1.0]
    pub energy: f64,
}

impl AudioFeatures {
    pub fn new(tempo_bpm: f64, key: u8, mode: u8, energy: f64) -> Self {
        Self {
            tempo_bpm,
            key: key % 12,
            mode: mode.min(1),
            energy: energy.clamp(0.0, 1.0),
        }
    }
}

/// Moderation status of an audience request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Submitted, awaiting selector review
    Pending,
    /// Accepted into the playback queue
    Approved,
    /// Declined by the selector
    Rejected,
    /// Already played back
    Played,
}

/// One accepted audience request bound to a playback slot
///
/// Owned by the external persistence layer. The engine only reads items and
/// rewrites `position` for approved ones; it never adds or drops entries.
/// Within an event the positions of non-played items form a contiguous,
/// zero-gap range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Request id, unique across events
    pub id: Uuid,
    /// Opaque catalog identifier of the requested track
    pub track_id: String,
    /// Live event this request belongs to
    pub event_id: Uuid,
    /// Dense zero-based play order within the event
    pub position: u32,
    /// Moderation status
    pub status: RequestStatus,
}

impl QueueItem {
    pub fn is_approved(&self) -> bool {
        self.status == RequestStatus::Approved
    }
}

/// How the controller hands off from the current track to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Stop current, start next immediately at full volume
    Cut,
    /// Timed crossfade between both decks
    Fade,
    /// Tempo/key aligned handoff; currently executes the fade algorithm,
    /// the distinct decision is kept observable for analytics
    Beatmatch,
}

impl TransitionKind {
    /// Stable lowercase name used in events and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Cut => "cut",
            TransitionKind::Fade => "fade",
            TransitionKind::Beatmatch => "beatmatch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_constructor_normalizes_fields() {
        let f = AudioFeatures::new(128.0, 14, 3, 1.7);
        assert_eq!(f.key, 2);
        assert_eq!(f.mode, 1);
        assert_eq!(f.energy, 1.0);
    }

    #[test]
    fn request_status_serializes_snake_case() {
        let json = serde_json::to_string(&RequestStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }

    #[test]
    fn transition_kind_names_are_stable() {
        assert_eq!(TransitionKind::Beatmatch.as_str(), "beatmatch");
        assert_eq!(TransitionKind::Cut.as_str(), "cut");
        assert_eq!(TransitionKind::Fade.as_str(), "fade");
    }
}

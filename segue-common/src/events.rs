//! Event types for the Segue engine
//!
//! Every observable engine action is described by one `EngineEvent` variant.
//! Events are handed to the analytics sink as they happen and can be
//! serialized for transmission; the engine never depends on anyone
//! listening.

use crate::types::TransitionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Playback transport state of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Playing,
    Paused,
}

/// Engine event types
///
/// Serialized with a `type` tag so sinks can dispatch on the event name and
/// treat the remaining fields as the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// Transport toggled between Playing and Paused
    PlaybackStateChanged {
        /// Session's live event id
        event_id: Uuid,
        /// State after the change
        state: PlaybackState,
        /// When the state changed
        timestamp: DateTime<Utc>,
    },

    /// Next track fetched, preloaded and ready to play
    TrackPrepared {
        event_id: Uuid,
        /// Queue item that was prepared
        item_id: Uuid,
        /// Catalog id of the prepared track
        track_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Handoff to the next track has begun
    TransitionStarted {
        event_id: Uuid,
        /// Chosen handoff strategy
        kind: TransitionKind,
        /// Compatibility score between the two tracks, if known
        score: Option<f64>,
        timestamp: DateTime<Utc>,
    },

    /// Handoff finished; the prepared track is now current
    TransitionCompleted {
        event_id: Uuid,
        /// Queue item now playing
        item_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A handoff failed and was replaced by a hard cut
    TransitionFellBack {
        event_id: Uuid,
        /// Description of the original failure
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A processing pass rewrote queue positions
    QueueReordered {
        event_id: Uuid,
        /// Items whose positions were written
        items: usize,
        /// Number of batches the pass was split into
        batches: usize,
        timestamp: DateTime<Utc>,
    },

    /// A second processing pass was rejected while one was in flight
    QueueCollision {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Position writes for these items failed after all retries
    BatchRetryExhausted {
        event_id: Uuid,
        /// Items that could not be persisted this pass
        item_ids: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// Session torn down and both decks released
    SessionClosed {
        event_id: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl EngineEvent {
    /// Stable event name, matching the serialized `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            EngineEvent::TrackPrepared { .. } => "TrackPrepared",
            EngineEvent::TransitionStarted { .. } => "TransitionStarted",
            EngineEvent::TransitionCompleted { .. } => "TransitionCompleted",
            EngineEvent::TransitionFellBack { .. } => "TransitionFellBack",
            EngineEvent::QueueReordered { .. } => "QueueReordered",
            EngineEvent::QueueCollision { .. } => "QueueCollision",
            EngineEvent::BatchRetryExhausted { .. } => "BatchRetryExhausted",
            EngineEvent::SessionClosed { .. } => "SessionClosed",
        }
    }

    /// Live event the event belongs to
    pub fn event_id(&self) -> Uuid {
        match self {
            EngineEvent::PlaybackStateChanged { event_id, .. }
            | EngineEvent::TrackPrepared { event_id, .. }
            | EngineEvent::TransitionStarted { event_id, .. }
            | EngineEvent::TransitionCompleted { event_id, .. }
            | EngineEvent::TransitionFellBack { event_id, .. }
            | EngineEvent::QueueReordered { event_id, .. }
            | EngineEvent::QueueCollision { event_id, .. }
            | EngineEvent::BatchRetryExhausted { event_id, .. }
            | EngineEvent::SessionClosed { event_id, .. } => *event_id,
        }
    }
}

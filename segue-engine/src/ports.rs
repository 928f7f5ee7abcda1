//! External ports consumed by the engine
//!
//! The engine performs no I/O of its own; feature analysis, queue
//! persistence, audio transport and analytics are all reached through the
//! trait objects defined here. Callers adapt whatever infrastructure they
//! have (HTTP services, document stores, platform audio APIs) into these
//! narrow interfaces.

use crate::error::Result;
use async_trait::async_trait;
use segue_common::events::EngineEvent;
use segue_common::types::AudioFeatures;
use uuid::Uuid;

/// Supplies the audio feature vector for a track
///
/// Implementations return [`Error::AnalysisUnavailable`](crate::Error) when
/// no vector can be produced. Results are cached by the engine; providers do
/// not need their own cache.
#[async_trait]
pub trait FeatureProvider: Send + Sync {
    async fn get_features(&self, track_id: &str) -> Result<AudioFeatures>;
}

/// Writes new queue positions for an event
///
/// Must be safe to call repeatedly with identical arguments; the engine
/// retries transient failures and may replay a whole batch. Transient
/// failures are reported as [`Error::TransientIo`](crate::Error).
#[async_trait]
pub trait QueuePersistence: Send + Sync {
    async fn write_positions(&self, event_id: Uuid, positions: &[(Uuid, u32)]) -> Result<()>;
}

/// A loaded, playable audio resource occupying one deck
///
/// Handles are created ready to play but not playing. Dropping a handle
/// releases the underlying resource.
#[async_trait]
pub trait AudioHandle: Send + Sync {
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;

    /// Set playback volume; callers clamp to [0.0, 1.0] before applying
    fn set_volume(&self, level: f64) -> Result<()>;

    /// Jump to a position in seconds
    fn seek(&self, time: f64) -> Result<()>;

    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Total duration in seconds
    fn duration(&self) -> f64;
}

/// Loads track audio into a playable handle
///
/// `preload` resolves once the resource is ready to start without further
/// buffering, or fails with
/// [`Error::PreparationFailed`](crate::Error).
#[async_trait]
pub trait AudioTransport: Send + Sync {
    async fn preload(&self, track_id: &str) -> Result<Box<dyn AudioHandle>>;
}

/// Fire-and-forget sink for engine events
///
/// Sinks must absorb their own failures; nothing in the engine inspects the
/// outcome of `record`.
pub trait AnalyticsSink: Send + Sync {
    fn record(&self, event: EngineEvent);
}

/// Sink that drops every event, for callers without analytics
#[derive(Debug, Default)]
pub struct NullAnalyticsSink;

impl AnalyticsSink for NullAnalyticsSink {
    fn record(&self, _event: EngineEvent) {}
}

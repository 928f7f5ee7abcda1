//! Engine facade
//!
//! Wires the feature cache, optimizer, batch processor and per-event
//! playback sessions behind one API surface. Callers construct an `Engine`
//! with their port implementations and drive everything through it; the
//! caches and metrics in here are the only state shared across events.

use crate::error::Result;
use crate::features::FeatureCache;
use crate::metrics::{MetricsSnapshot, RollingMetrics};
use crate::optimizer::SequenceOptimizer;
use crate::ports::{AnalyticsSink, AudioTransport, FeatureProvider, QueuePersistence};
use crate::processor::BatchQueueProcessor;
use crate::session::PlaybackSession;
use segue_common::config::EngineConfig;
use segue_common::types::QueueItem;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Top-level sequencing and transition engine
pub struct Engine {
    config: EngineConfig,
    features: FeatureCache,
    processor: BatchQueueProcessor,
    transport: Arc<dyn AudioTransport>,
    analytics: Arc<dyn AnalyticsSink>,
    sessions: Mutex<HashMap<Uuid, Arc<PlaybackSession>>>,
}

impl Engine {
    /// Build an engine from a validated configuration and the four ports
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn FeatureProvider>,
        persistence: Arc<dyn QueuePersistence>,
        transport: Arc<dyn AudioTransport>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Result<Self> {
        config.validate().map_err(crate::error::Error::Common)?;

        let features = FeatureCache::new(provider, &config);
        let metrics = Arc::new(RollingMetrics::new(&config.metrics_windows_secs));
        let optimizer = SequenceOptimizer::new(features.clone());
        let processor = BatchQueueProcessor::new(
            config.clone(),
            optimizer,
            persistence,
            Arc::clone(&analytics),
            metrics,
        );

        info!(
            batch_size = config.batch_size,
            crossfade_ms = config.crossfade_duration_ms,
            "Engine initialized"
        );

        Ok(Self {
            config,
            features,
            processor,
            transport,
            analytics,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Reorder and persist a queue snapshot for one event
    pub async fn process_queue_batch(&self, event_id: Uuid, items: Vec<QueueItem>) -> Result<()> {
        self.processor.process_queue_batch(event_id, items).await
    }

    /// Get or create the playback session for an event
    pub async fn session(&self, event_id: Uuid) -> Arc<PlaybackSession> {
        let mut sessions = self.sessions.lock().await;
        Arc::clone(sessions.entry(event_id).or_insert_with(|| {
            debug!(%event_id, "Creating playback session");
            Arc::new(PlaybackSession::new(
                event_id,
                self.config.clone(),
                self.features.clone(),
                Arc::clone(&self.transport),
                Arc::clone(&self.analytics),
            ))
        }))
    }

    /// Processing metrics over the configured windows
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.processor.get_metrics()
    }

    /// Tear down and unregister one event's session
    ///
    /// Safe to call for events that never started playback.
    pub async fn cleanup(&self, event_id: Uuid) {
        let session = self.sessions.lock().await.remove(&event_id);
        if let Some(session) = session {
            session.cleanup().await;
        }
    }

    /// Tear down every session, for engine shutdown
    pub async fn cleanup_all(&self) {
        let sessions: Vec<Arc<PlaybackSession>> =
            self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.cleanup().await;
        }
    }
}

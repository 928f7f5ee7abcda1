//! Cached access to the feature provider
//!
//! In-memory cache in front of the [`FeatureProvider`] port so each track is
//! analyzed at most once per TTL window. Bounded capacity with
//! least-recently-used eviction; one explicitly owned instance per engine,
//! shared by the optimizer and every playback session.

use crate::error::Result;
use crate::ports::FeatureProvider;
use moka::future::Cache as MokaCache;
use segue_common::config::EngineConfig;
use segue_common::types::AudioFeatures;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// TTL-bounded feature vector cache keyed by track id
#[derive(Clone)]
pub struct FeatureCache {
    provider: Arc<dyn FeatureProvider>,
    cache: MokaCache<String, AudioFeatures>,
}

impl FeatureCache {
    /// Create a cache sized from the engine configuration
    pub fn new(provider: Arc<dyn FeatureProvider>, config: &EngineConfig) -> Self {
        Self::with_bounds(
            provider,
            config.feature_cache_capacity,
            Duration::from_secs(config.feature_ttl_secs),
        )
    }

    /// Create a cache with explicit capacity and TTL
    pub fn with_bounds(
        provider: Arc<dyn FeatureProvider>,
        max_capacity: u64,
        ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache: MokaCache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Get the feature vector for a track, fetching on miss or expiry
    pub async fn get(&self, track_id: &str) -> Result<AudioFeatures> {
        if let Some(features) = self.cache.get(track_id).await {
            return Ok(features);
        }

        debug!(track_id, "Feature cache miss, fetching from provider");
        let features = self.provider.get_features(track_id).await?;
        self.cache.insert(track_id.to_string(), features).await;
        Ok(features)
    }

    /// Drop a cached entry so the next access refetches
    pub async fn invalidate(&self, track_id: &str) {
        self.cache.invalidate(track_id).await;
    }

    /// Entries currently held
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

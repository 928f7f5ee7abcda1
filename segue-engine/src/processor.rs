//! Batch queue processing
//!
//! Takes a queue snapshot for one event, splits the approved items into
//! bounded batches, reorders each batch for smooth transitions and persists
//! the new positions with retry and backoff. Completed batches are cached by
//! content so an unchanged snapshot costs no persistence work.
//!
//! At most one processing pass runs per event at a time: a concurrent call
//! for the same event is rejected immediately, recorded as a collision, and
//! is not queued. Item-level persistence failures never abort the remaining
//! items; partial success is expected under degraded infrastructure.

use crate::error::Result;
use crate::metrics::{MetricsSnapshot, RollingMetrics};
use crate::optimizer::SequenceOptimizer;
use crate::ports::{AnalyticsSink, QueuePersistence};
use chrono::Utc;
use moka::future::Cache as MokaCache;
use segue_common::config::EngineConfig;
use segue_common::events::EngineEvent;
use segue_common::types::QueueItem;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Releases the in-flight slot for an event when dropped
///
/// Dropping on every exit path is what guarantees the cooperative lock is
/// released even when a pass errors out.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<Uuid>>>,
    event_id: Uuid,
}

impl InFlightGuard {
    /// Claim the slot for `event_id`; `None` means a pass is already running
    fn try_acquire(set: &Arc<Mutex<HashSet<Uuid>>>, event_id: Uuid) -> Option<Self> {
        let mut guard = set.lock().unwrap();
        if !guard.insert(event_id) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            event_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.event_id);
    }
}

/// Reorders and persists queue snapshots in retryable batches
pub struct BatchQueueProcessor {
    config: EngineConfig,
    optimizer: SequenceOptimizer,
    persistence: Arc<dyn QueuePersistence>,
    analytics: Arc<dyn AnalyticsSink>,
    metrics: Arc<RollingMetrics>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    batch_cache: MokaCache<String, ()>,
}

impl BatchQueueProcessor {
    pub fn new(
        config: EngineConfig,
        optimizer: SequenceOptimizer,
        persistence: Arc<dyn QueuePersistence>,
        analytics: Arc<dyn AnalyticsSink>,
        metrics: Arc<RollingMetrics>,
    ) -> Self {
        let batch_cache = MokaCache::builder()
            .max_capacity(config.batch_cache_capacity)
            .time_to_live(Duration::from_secs(config.batch_cache_ttl_secs))
            .build();

        Self {
            config,
            optimizer,
            persistence,
            analytics,
            metrics,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            batch_cache,
        }
    }

    /// Process one queue snapshot for an event
    ///
    /// Reorders approved items batch by batch and writes their positions.
    /// A pass already running for the same event turns this call into a
    /// recorded no-op. The snapshot's set of positions is preserved; only
    /// the assignment of items to positions changes.
    pub async fn process_queue_batch(&self, event_id: Uuid, items: Vec<QueueItem>) -> Result<()> {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight, event_id) else {
            warn!(%event_id, "Processing pass already in flight, rejecting call");
            self.metrics.record_collision();
            self.analytics.record(EngineEvent::QueueCollision {
                event_id,
                timestamp: Utc::now(),
            });
            return Ok(());
        };

        let started = Instant::now();

        let mut approved: Vec<QueueItem> =
            items.into_iter().filter(|i| i.is_approved()).collect();
        approved.sort_by_key(|i| i.position);
        let slots: Vec<u32> = approved.iter().map(|i| i.position).collect();

        let mut items_written = 0u64;
        let mut errors = 0u64;
        let mut cache_hits = 0u64;
        let batch_count = approved.chunks(self.config.batch_size).count();

        for (batch_idx, batch) in approved.chunks(self.config.batch_size).enumerate() {
            let batch_slots = &slots[batch_idx * self.config.batch_size..][..batch.len()];
            let cache_key = Self::batch_cache_key(batch, batch_slots);

            if self.batch_cache.get(&cache_key).await.is_some() {
                debug!(%event_id, batch_idx, "Batch unchanged since last pass, skipping");
                cache_hits += 1;
                continue;
            }

            let ordered = self.order_batch(batch).await;
            let positions: Vec<(Uuid, u32)> = ordered
                .iter()
                .zip(batch_slots.iter())
                .map(|(item, slot)| (item.id, *slot))
                .collect();

            match self.write_with_retry(event_id, &positions).await {
                Ok(()) => {
                    items_written += positions.len() as u64;
                    self.batch_cache.insert(cache_key, ()).await;
                }
                Err(err) => {
                    warn!(%event_id, batch_idx, %err, "Batch write exhausted retries, decomposing");
                    let (written, failed) =
                        self.write_items_individually(event_id, &positions).await;
                    items_written += written;
                    errors += failed.len() as u64;
                    if !failed.is_empty() {
                        self.analytics.record(EngineEvent::BatchRetryExhausted {
                            event_id,
                            item_ids: failed,
                            timestamp: Utc::now(),
                        });
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        self.metrics
            .record_pass(elapsed, items_written, errors, cache_hits);
        self.analytics.record(EngineEvent::QueueReordered {
            event_id,
            items: items_written as usize,
            batches: batch_count,
            timestamp: Utc::now(),
        });
        info!(
            %event_id,
            items = items_written,
            batches = batch_count,
            cache_hits,
            errors,
            elapsed_ms = elapsed.as_millis() as u64,
            "Processing pass complete"
        );

        Ok(())
    }

    /// Current metrics snapshot
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Reorder one batch, keeping the snapshot order when analysis is down
    async fn order_batch(&self, batch: &[QueueItem]) -> Vec<QueueItem> {
        if !self.config.reorder_batches {
            return batch.to_vec();
        }

        match self.optimizer.optimal_order(batch.to_vec()).await {
            Ok(ordered) => ordered,
            Err(err) => {
                warn!(%err, "Optimization unavailable, keeping existing order");
                batch.to_vec()
            }
        }
    }

    /// Write positions, retrying transient failures with backoff
    ///
    /// Attempt n sleeps `base_delay × n` before the next try. Non-transient
    /// errors are returned immediately.
    async fn write_with_retry(&self, event_id: Uuid, positions: &[(Uuid, u32)]) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.persistence.write_positions(event_id, positions).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    if !err.is_transient() || attempt >= self.config.retry_attempts {
                        return Err(err);
                    }
                    let delay = Duration::from_millis(
                        self.config.retry_base_delay_ms * u64::from(attempt),
                    );
                    warn!(
                        %event_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %err,
                        "Position write failed, will retry after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Singleton fallback after a whole batch exhausted its retries
    ///
    /// Returns the number of items written and the ids that still failed.
    async fn write_items_individually(
        &self,
        event_id: Uuid,
        positions: &[(Uuid, u32)],
    ) -> (u64, Vec<Uuid>) {
        let mut written = 0u64;
        let mut failed = Vec::new();

        for pair in positions {
            match self.write_with_retry(event_id, std::slice::from_ref(pair)).await {
                Ok(()) => written += 1,
                Err(err) => {
                    warn!(%event_id, item_id = %pair.0, %err, "Item write failed after retries");
                    failed.push(pair.0);
                }
            }
        }

        (written, failed)
    }

    /// Content-derived batch key: item ids in snapshot order plus the
    /// positions they will occupy
    fn batch_cache_key(batch: &[QueueItem], slots: &[u32]) -> String {
        let mut key = String::with_capacity(batch.len() * 40);
        for (item, slot) in batch.iter().zip(slots.iter()) {
            key.push_str(&item.id.to_string());
            key.push('@');
            key.push_str(&slot.to_string());
            key.push('|');
        }
        key
    }
}

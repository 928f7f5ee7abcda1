//! Shared mock ports for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use segue_common::events::EngineEvent;
use segue_common::types::{AudioFeatures, QueueItem, RequestStatus};
use segue_engine::error::{Error, Result};
use segue_engine::ports::{
    AnalyticsSink, AudioHandle, AudioTransport, FeatureProvider, QueuePersistence,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Feature provider backed by a fixed map; unknown tracks fail
pub struct MockFeatureProvider {
    map: Mutex<HashMap<String, AudioFeatures>>,
    pub calls: AtomicUsize,
}

impl MockFeatureProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            map: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn insert(&self, track_id: &str, features: AudioFeatures) {
        self.map.lock().unwrap().insert(track_id.to_string(), features);
    }
}

#[async_trait]
impl FeatureProvider for MockFeatureProvider {
    async fn get_features(&self, track_id: &str) -> Result<AudioFeatures> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.map
            .lock()
            .unwrap()
            .get(track_id)
            .copied()
            .ok_or_else(|| Error::AnalysisUnavailable {
                track_id: track_id.to_string(),
                reason: "no analysis for track".into(),
            })
    }
}

/// Persistence recording every successful write, with failure injection
pub struct MockPersistence {
    pub writes: Mutex<Vec<(Uuid, Vec<(Uuid, u32)>)>>,
    pub calls: AtomicUsize,
    /// Fail every call carrying more than one position
    pub fail_multi: AtomicBool,
    /// Fail singleton writes for these item ids
    pub failing_items: Mutex<HashSet<Uuid>>,
    /// Artificial latency per call
    pub delay: Mutex<Option<Duration>>,
}

impl MockPersistence {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            writes: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_multi: AtomicBool::new(false),
            failing_items: Mutex::new(HashSet::new()),
            delay: Mutex::new(None),
        })
    }

    /// All successfully written (item, position) pairs, in write order
    pub fn written_pairs(&self) -> Vec<(Uuid, u32)> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, pairs)| pairs.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

#[async_trait]
impl QueuePersistence for MockPersistence {
    async fn write_positions(&self, event_id: Uuid, positions: &[(Uuid, u32)]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_multi.load(Ordering::SeqCst) && positions.len() > 1 {
            return Err(Error::TransientIo("simulated batch write failure".into()));
        }
        if positions.len() == 1
            && self.failing_items.lock().unwrap().contains(&positions[0].0)
        {
            return Err(Error::TransientIo("simulated item write failure".into()));
        }

        self.writes
            .lock()
            .unwrap()
            .push((event_id, positions.to_vec()));
        Ok(())
    }
}

/// Observable state of one mock audio handle
pub struct HandleState {
    pub track_id: String,
    pub playing: AtomicBool,
    pub play_calls: AtomicUsize,
    pub pause_calls: AtomicUsize,
    pub volumes: Mutex<Vec<f64>>,
    pub seeks: Mutex<Vec<f64>>,
    pub fail_play: bool,
    pub duration: f64,
}

impl HandleState {
    pub fn volume_history(&self) -> Vec<f64> {
        self.volumes.lock().unwrap().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

struct MockHandle(Arc<HandleState>);

#[async_trait]
impl AudioHandle for MockHandle {
    async fn play(&self) -> Result<()> {
        self.0.play_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_play {
            return Err(Error::TransitionFailed("transport rejected play".into()));
        }
        self.0.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.0.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.0.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_volume(&self, level: f64) -> Result<()> {
        self.0.volumes.lock().unwrap().push(level);
        Ok(())
    }

    fn seek(&self, time: f64) -> Result<()> {
        self.0.seeks.lock().unwrap().push(time);
        Ok(())
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn duration(&self) -> f64 {
        self.0.duration
    }
}

/// Transport handing out inspectable handles
pub struct MockTransport {
    pub handles: Mutex<Vec<Arc<HandleState>>>,
    /// Newly created handles reject `play`
    pub fail_play: AtomicBool,
    /// Reject `preload` itself
    pub fail_preload: AtomicBool,
    pub track_duration: f64,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handles: Mutex::new(Vec::new()),
            fail_play: AtomicBool::new(false),
            fail_preload: AtomicBool::new(false),
            track_duration: 180.0,
        })
    }

    /// State of the n-th preloaded handle
    pub fn handle(&self, index: usize) -> Arc<HandleState> {
        Arc::clone(&self.handles.lock().unwrap()[index])
    }

    pub fn handle_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

#[async_trait]
impl AudioTransport for MockTransport {
    async fn preload(&self, track_id: &str) -> Result<Box<dyn AudioHandle>> {
        if self.fail_preload.load(Ordering::SeqCst) {
            return Err(Error::PreparationFailed {
                track_id: track_id.to_string(),
                reason: "simulated preload failure".into(),
            });
        }

        let state = Arc::new(HandleState {
            track_id: track_id.to_string(),
            playing: AtomicBool::new(false),
            play_calls: AtomicUsize::new(0),
            pause_calls: AtomicUsize::new(0),
            volumes: Mutex::new(Vec::new()),
            seeks: Mutex::new(Vec::new()),
            fail_play: self.fail_play.load(Ordering::SeqCst),
            duration: self.track_duration,
        });
        self.handles.lock().unwrap().push(Arc::clone(&state));
        Ok(Box::new(MockHandle(state)))
    }
}

/// Analytics sink collecting every event for assertions
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn count_of(&self, name: &str) -> usize {
        self.names().iter().filter(|n| **n == name).count()
    }
}

impl AnalyticsSink for RecordingSink {
    fn record(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// An approved queue item for `event_id`
pub fn approved_item(event_id: Uuid, track_id: &str, position: u32) -> QueueItem {
    QueueItem {
        id: Uuid::new_v4(),
        track_id: track_id.to_string(),
        event_id,
        position,
        status: RequestStatus::Approved,
    }
}

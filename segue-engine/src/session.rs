//! Per-event playback session and transition controller
//!
//! One `PlaybackSession` runs per live event, holding a current and a next
//! deck. The controller prepares the next track while the current one plays,
//! picks a handoff strategy from the pair's compatibility breakdown and
//! executes it: an immediate cut, a timed crossfade, or a beatmatch-labelled
//! crossfade. Any execution failure degrades to a guaranteed hard cut so
//! playback never stalls silent or plays both decks at full volume.
//!
//! Sessions are independent; nothing here is shared across events.

use crate::error::{Error, Result};
use crate::features::FeatureCache;
use crate::ports::{AnalyticsSink, AudioHandle, AudioTransport};
use crate::scoring::{self, Mixability};
use chrono::Utc;
use segue_common::config::EngineConfig;
use segue_common::events::{EngineEvent, PlaybackState};
use segue_common::types::{AudioFeatures, QueueItem, TransitionKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tempo difference below which a beatmatch handoff is considered
const BEATMATCH_MAX_TEMPO_DIFF: f64 = 5.0;
/// Key compatibility above which a beatmatch handoff is considered
const BEATMATCH_MIN_KEY_COMPAT: f64 = 0.8;
/// Energy jump past which a crossfade would sound worse than a clean cut
const CUT_ENERGY_DELTA: f64 = 0.3;

/// Playback state machine position
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState {
    /// No track loaded
    Idle,
    /// Current deck playing, next slot empty
    Playing,
    /// Current deck playing, next deck loaded and ready
    Preparing,
    /// Handoff in progress
    Transitioning(TransitionKind),
    /// Unrecoverable playback failure
    Error,
}

/// Which deck a volume change addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckTarget {
    Current,
    Next,
}

/// Pick a handoff strategy from a compatibility breakdown
///
/// Near-identical tempo in a compatible key is labelled a beatmatch (the
/// execution currently degrades to the crossfade algorithm, but the decision
/// stays observable for analytics). A large energy jump gets a clean cut;
/// everything else crossfades.
pub fn decide_transition(mix: &Mixability) -> TransitionKind {
    if mix.tempo_diff < BEATMATCH_MAX_TEMPO_DIFF && mix.key_compat > BEATMATCH_MIN_KEY_COMPAT {
        TransitionKind::Beatmatch
    } else if mix.energy_delta.abs() > CUT_ENERGY_DELTA {
        TransitionKind::Cut
    } else {
        TransitionKind::Fade
    }
}

/// One loaded deck: the queue item, its features and the playable handle
struct Deck {
    item: QueueItem,
    features: AudioFeatures,
    handle: Box<dyn AudioHandle>,
}

#[derive(Default)]
struct DeckPair {
    current: Option<Deck>,
    next: Option<Deck>,
}

/// Playback state machine for one live event
pub struct PlaybackSession {
    event_id: Uuid,
    config: EngineConfig,
    features: FeatureCache,
    transport: Arc<dyn AudioTransport>,
    analytics: Arc<dyn AnalyticsSink>,

    state: RwLock<SessionState>,
    decks: Mutex<DeckPair>,

    /// Transport flag toggled by play/pause; not a state transition
    paused: AtomicBool,

    /// Set once by cleanup; a torn-down session never plays again
    torn_down: AtomicBool,

    /// Wakes an in-flight crossfade so teardown does not wait out the timer
    cancel: Notify,
}

impl PlaybackSession {
    pub fn new(
        event_id: Uuid,
        config: EngineConfig,
        features: FeatureCache,
        transport: Arc<dyn AudioTransport>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        Self {
            event_id,
            config,
            features,
            transport,
            analytics,
            state: RwLock::new(SessionState::Idle),
            decks: Mutex::new(DeckPair::default()),
            paused: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            cancel: Notify::new(),
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Current state machine position
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Whether the transport is paused
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Item loaded on the current deck, if any
    pub async fn current_item(&self) -> Option<QueueItem> {
        self.decks.lock().await.current.as_ref().map(|d| d.item.clone())
    }

    /// Item loaded on the next deck, if any
    pub async fn next_item(&self) -> Option<QueueItem> {
        self.decks.lock().await.next.as_ref().map(|d| d.item.clone())
    }

    /// Feature vector travelling with the current deck
    pub async fn current_features(&self) -> Option<AudioFeatures> {
        self.decks.lock().await.current.as_ref().map(|d| d.features)
    }

    /// Feature vector travelling with the next deck
    pub async fn next_features(&self) -> Option<AudioFeatures> {
        self.decks.lock().await.next.as_ref().map(|d| d.features)
    }

    /// Resume the current deck
    pub async fn play(&self) -> Result<()> {
        let decks = self.decks.lock().await;
        let current = decks
            .current
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no current track loaded".into()))?;

        current.handle.play().await?;
        self.paused.store(false, Ordering::SeqCst);
        self.analytics.record(EngineEvent::PlaybackStateChanged {
            event_id: self.event_id,
            state: PlaybackState::Playing,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Pause the current deck
    pub async fn pause(&self) -> Result<()> {
        let decks = self.decks.lock().await;
        let current = decks
            .current
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no current track loaded".into()))?;

        current.handle.pause().await?;
        self.paused.store(true, Ordering::SeqCst);
        self.analytics.record(EngineEvent::PlaybackStateChanged {
            event_id: self.event_id,
            state: PlaybackState::Paused,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Jump the current deck to `time` seconds, clamped to the track length
    pub async fn seek(&self, time: f64) -> Result<()> {
        let decks = self.decks.lock().await;
        let current = decks
            .current
            .as_ref()
            .ok_or_else(|| Error::InvalidState("no current track loaded".into()))?;

        let clamped = time.clamp(0.0, current.handle.duration());
        current.handle.seek(clamped)
    }

    /// Set one deck's volume, clamped to [0.0, 1.0]
    pub async fn set_volume(&self, level: f64, target: DeckTarget) -> Result<()> {
        let decks = self.decks.lock().await;
        let deck = match target {
            DeckTarget::Current => decks.current.as_ref(),
            DeckTarget::Next => decks.next.as_ref(),
        }
        .ok_or_else(|| {
            Error::InvalidState(format!("no track loaded on {target:?} deck"))
        })?;

        deck.handle.set_volume(level.clamp(0.0, 1.0))
    }

    /// Fetch features and preload audio for the upcoming track
    ///
    /// The next deck is ready to start the moment this returns. Failure
    /// surfaces as `PreparationFailed` and leaves the session untouched, so
    /// the caller can retry or skip to the following item.
    pub async fn prepare_next_track(&self, item: QueueItem) -> Result<()> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(Error::InvalidState("session is torn down".into()));
        }

        let features = self
            .features
            .get(&item.track_id)
            .await
            .map_err(|err| Error::PreparationFailed {
                track_id: item.track_id.clone(),
                reason: format!("feature fetch failed: {err}"),
            })?;

        let handle = self
            .transport
            .preload(&item.track_id)
            .await
            .map_err(|err| match err {
                prepared @ Error::PreparationFailed { .. } => prepared,
                other => Error::PreparationFailed {
                    track_id: item.track_id.clone(),
                    reason: other.to_string(),
                },
            })?;

        debug!(event_id = %self.event_id, track_id = %item.track_id, "Next track preloaded");

        let mut decks = self.decks.lock().await;
        let has_current = decks.current.is_some();
        decks.next = Some(Deck {
            features,
            handle,
            item: item.clone(),
        });
        drop(decks);

        if has_current {
            *self.state.write().await = SessionState::Preparing;
        }

        self.analytics.record(EngineEvent::TrackPrepared {
            event_id: self.event_id,
            item_id: item.id,
            track_id: item.track_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Hand playback off to `item`
    ///
    /// Prepares the item first if it is not already on the next deck. The
    /// handoff strategy comes from the pair's mixability; execution failures
    /// degrade to a hard cut and are reported, so the call ends with `item`
    /// playing unless the session was torn down mid-handoff.
    pub async fn transition_to_next(&self, item: QueueItem) -> Result<()> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(Error::InvalidState("session is torn down".into()));
        }

        let needs_prepare = {
            let decks = self.decks.lock().await;
            decks.next.as_ref().map(|d| d.item.id) != Some(item.id)
        };
        if needs_prepare {
            self.prepare_next_track(item.clone()).await?;
        }

        let (current, next) = {
            let mut decks = self.decks.lock().await;
            let next = decks
                .next
                .take()
                .ok_or_else(|| Error::InvalidState("no prepared next track".into()))?;
            (decks.current.take(), next)
        };

        let Some(current) = current else {
            return self.start_first(next).await;
        };

        let mix = scoring::mixability(
            &self.features,
            &current.item.track_id,
            &item.track_id,
        )
        .await;

        let kind = match &mix {
            Ok(mix) => decide_transition(mix),
            Err(err) => {
                // No compatibility data, degrade to the strategy that
                // cannot sound half-wrong
                warn!(event_id = %self.event_id, %err, "Mixability unavailable, degrading to cut");
                TransitionKind::Cut
            }
        };
        let score = mix.as_ref().ok().map(|m| m.score);

        *self.state.write().await = SessionState::Transitioning(kind);
        self.analytics.record(EngineEvent::TransitionStarted {
            event_id: self.event_id,
            kind,
            score,
            timestamp: Utc::now(),
        });
        info!(
            event_id = %self.event_id,
            from = %current.item.track_id,
            to = %item.track_id,
            kind = kind.as_str(),
            "Starting transition"
        );

        let outcome = match kind {
            TransitionKind::Cut => self.execute_cut(&current, &next).await,
            TransitionKind::Fade | TransitionKind::Beatmatch => {
                self.execute_fade(&current, &next).await
            }
        };

        if let Err(err) = outcome {
            if self.torn_down.load(Ordering::SeqCst) {
                // Teardown raced the handoff; go silent instead of cutting
                debug!(event_id = %self.event_id, "Session torn down mid-transition");
                let _ = current.handle.pause().await;
                let _ = next.handle.pause().await;
                return Ok(());
            }

            warn!(event_id = %self.event_id, %err, "Transition failed, falling back to hard cut");
            self.fallback_cut(&current, &next).await;
            self.analytics.record(EngineEvent::TransitionFellBack {
                event_id: self.event_id,
                reason: err.to_string(),
                timestamp: Utc::now(),
            });
        }

        // Outgoing deck is released here
        drop(current);
        self.promote(next).await
    }

    /// Tear the session down and release both decks
    ///
    /// Idempotent and callable from any state. A crossfade in flight is
    /// cancelled hard; the session goes silent rather than finishing the
    /// fade.
    pub async fn cleanup(&self) {
        let already = self.torn_down.swap(true, Ordering::SeqCst);
        self.cancel.notify_waiters();

        let mut decks = self.decks.lock().await;
        if let Some(deck) = decks.current.take() {
            let _ = deck.handle.pause().await;
        }
        if let Some(deck) = decks.next.take() {
            let _ = deck.handle.pause().await;
        }
        drop(decks);

        *self.state.write().await = SessionState::Idle;

        if !already {
            info!(event_id = %self.event_id, "Session cleaned up");
            self.analytics.record(EngineEvent::SessionClosed {
                event_id: self.event_id,
                timestamp: Utc::now(),
            });
        }
    }

    /// Start playback with no outgoing deck to hand off from
    async fn start_first(&self, next: Deck) -> Result<()> {
        let started = match next.handle.set_volume(1.0) {
            Ok(()) => next.handle.play().await,
            Err(err) => Err(err),
        };

        if let Err(err) = started {
            *self.state.write().await = SessionState::Error;
            return Err(Error::TransitionFailed(format!(
                "failed to start playback: {err}"
            )));
        }

        self.promote(next).await
    }

    /// Immediate handoff: stop outgoing, start incoming at full volume
    async fn execute_cut(&self, current: &Deck, next: &Deck) -> Result<()> {
        current.handle.pause().await?;
        next.handle.set_volume(1.0)?;
        next.handle.play().await?;
        Ok(())
    }

    /// Timed crossfade in discrete volume steps
    ///
    /// The incoming deck starts at volume zero before the loop. Each step
    /// applies both curve values, clamped, then waits one step duration.
    /// Teardown cancels between steps. After the loop the outgoing deck is
    /// stopped and the incoming volume forced to 1.0 to correct rounding
    /// drift.
    async fn execute_fade(&self, current: &Deck, next: &Deck) -> Result<()> {
        let steps = self.config.crossfade_steps;
        let step_duration = self.config.crossfade_step_duration();

        next.handle.set_volume(0.0)?;
        next.handle.play().await?;

        for step in 1..=steps {
            if self.torn_down.load(Ordering::SeqCst) {
                return Err(Error::TransitionFailed(
                    "session torn down during crossfade".into(),
                ));
            }

            let t = f64::from(step) / f64::from(steps);
            let outgoing = self.config.fade_out_curve.fade_out(t).clamp(0.0, 1.0);
            let incoming = self.config.fade_in_curve.fade_in(t).clamp(0.0, 1.0);
            current.handle.set_volume(outgoing)?;
            next.handle.set_volume(incoming)?;

            tokio::select! {
                _ = tokio::time::sleep(step_duration) => {}
                _ = self.cancel.notified() => {
                    return Err(Error::TransitionFailed(
                        "session torn down during crossfade".into(),
                    ));
                }
            }
        }

        current.handle.pause().await?;
        next.handle.set_volume(1.0)?;
        Ok(())
    }

    /// Best-effort hard cut used when a transition fails
    ///
    /// Must not fail: each step is attempted regardless of the others so
    /// the worst outcome is an abrupt handoff, never silence on both decks.
    async fn fallback_cut(&self, current: &Deck, next: &Deck) {
        if let Err(err) = current.handle.pause().await {
            warn!(event_id = %self.event_id, %err, "Fallback cut: pausing outgoing deck failed");
        }
        if let Err(err) = next.handle.set_volume(1.0) {
            warn!(event_id = %self.event_id, %err, "Fallback cut: restoring incoming volume failed");
        }
        if let Err(err) = next.handle.play().await {
            warn!(event_id = %self.event_id, %err, "Fallback cut: starting incoming deck failed");
        }
    }

    /// Incoming deck becomes current; features and item travel with it
    async fn promote(&self, next: Deck) -> Result<()> {
        let item_id = next.item.id;

        {
            let mut decks = self.decks.lock().await;
            if self.torn_down.load(Ordering::SeqCst) {
                let _ = next.handle.pause().await;
                return Ok(());
            }
            // The next slot is left alone: the caller may already have
            // prepared the track after this one
            decks.current = Some(next);
        }

        self.paused.store(false, Ordering::SeqCst);
        *self.state.write().await = SessionState::Playing;
        self.analytics.record(EngineEvent::TransitionCompleted {
            event_id: self.event_id,
            item_id,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mix(tempo_diff: f64, key_compat: f64, energy_delta: f64) -> Mixability {
        Mixability {
            score: 0.5,
            tempo_diff,
            key_compat,
            energy_delta,
        }
    }

    #[test]
    fn close_tempo_and_key_decide_beatmatch() {
        assert_eq!(
            decide_transition(&mix(2.0, 0.9, 0.1)),
            TransitionKind::Beatmatch
        );
        assert_eq!(
            decide_transition(&mix(4.9, 1.0, -0.2)),
            TransitionKind::Beatmatch
        );
    }

    #[test]
    fn energy_jump_decides_cut() {
        assert_eq!(decide_transition(&mix(10.0, 0.5, 0.5)), TransitionKind::Cut);
        assert_eq!(
            decide_transition(&mix(10.0, 0.5, -0.4)),
            TransitionKind::Cut
        );
    }

    #[test]
    fn everything_else_decides_fade() {
        assert_eq!(decide_transition(&mix(10.0, 0.5, 0.1)), TransitionKind::Fade);
        // Boundary values do not trip the strict comparisons
        assert_eq!(decide_transition(&mix(5.0, 1.0, 0.3)), TransitionKind::Fade);
        assert_eq!(decide_transition(&mix(2.0, 0.8, 0.0)), TransitionKind::Fade);
    }

    #[test]
    fn beatmatch_wins_over_cut_when_both_match() {
        // Tight tempo and key with a big energy jump: the beatmatch rule
        // is checked first
        assert_eq!(
            decide_transition(&mix(1.0, 0.95, 0.6)),
            TransitionKind::Beatmatch
        );
    }
}

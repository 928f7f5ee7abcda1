//! # Segue Sequencing & Transition Engine (segue-engine)
//!
//! Core engine for live request-driven events: orders a bounded queue of
//! approved track requests for maximal pairwise transition quality and
//! executes the audio handoff between consecutive tracks.
//!
//! **Purpose:** Score track-to-track compatibility (tempo, harmonic key,
//! energy), compute optimal play orders, persist position updates in
//! retryable batches, and drive per-event playback sessions with preloading,
//! crossfades and hard-cut fallback.
//!
//! **Architecture:** Pure scoring/ordering kernels wrapped by an async
//! processor and controller; all I/O goes through the ports in [`ports`].

pub mod engine;
pub mod error;
pub mod features;
pub mod metrics;
pub mod optimizer;
pub mod ports;
pub mod processor;
pub mod scoring;
pub mod session;

pub use engine::Engine;
pub use error::{Error, Result};
pub use metrics::MetricsSnapshot;
pub use session::{DeckTarget, PlaybackSession, SessionState};

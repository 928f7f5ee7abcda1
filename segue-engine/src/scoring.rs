//! Track-to-track transition scoring
//!
//! Pure compatibility scoring between two audio feature vectors. A score of
//! 1.0 means a seamless handoff (identical tempo, compatible key, matching
//! energy), 0.0 a maximally jarring one. The scoring functions perform no
//! I/O so they can be exhaustively unit tested; [`mixability`] is the impure
//! wrapper that resolves track ids through the feature cache first.

use crate::error::Result;
use crate::features::FeatureCache;
use once_cell::sync::Lazy;
use segue_common::types::AudioFeatures;
use serde::{Deserialize, Serialize};

/// Weight of the tempo term in the final score
pub const TEMPO_WEIGHT: f64 = 0.4;
/// Weight of the harmonic key term in the final score
pub const KEY_WEIGHT: f64 = 0.35;
/// Weight of the energy term in the final score
pub const ENERGY_WEIGHT: f64 = 0.25;

/// Tempo difference in BPM at and beyond which the tempo term scores zero
const TEMPO_RANGE_BPM: f64 = 20.0;

/// Energy delta at and beyond which the energy term scores zero
const ENERGY_RANGE: f64 = 0.3;

/// Harmonic affinity by circle-of-fifths distance (0 = same key signature)
const FIFTHS_AFFINITY: [f64; 7] = [1.0, 0.9, 0.6, 0.4, 0.25, 0.15, 0.1];

/// Fixed 12×12 harmonic-compatibility table, Camelot wheel model
///
/// Indexed by pitch class pair; symmetric, 1.0 on the diagonal, decaying
/// with distance around the circle of fifths down to 0.1 at the tritone.
static KEY_COMPATIBILITY: Lazy<[[f64; 12]; 12]> = Lazy::new(|| {
    let mut table = [[0.0; 12]; 12];
    for (a, row) in table.iter_mut().enumerate() {
        for (b, cell) in row.iter_mut().enumerate() {
            // Position of each pitch class on the circle of fifths
            let pa = (a * 7) % 12;
            let pb = (b * 7) % 12;
            let raw = pa.abs_diff(pb);
            let distance = raw.min(12 - raw);
            *cell = FIFTHS_AFFINITY[distance];
        }
    }
    table
});

/// Compatibility breakdown for an ordered track pair
///
/// Carries the final score plus the raw component deltas the playback
/// controller uses to pick a transition strategy. Derived on demand, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mixability {
    /// Weighted compatibility score in [0.0, 1.0]
    pub score: f64,
    /// Absolute tempo difference in BPM
    pub tempo_diff: f64,
    /// Harmonic key compatibility in [0.0, 1.0]
    pub key_compat: f64,
    /// Signed energy change, outgoing to incoming
    pub energy_delta: f64,
}

/// Score the handoff from track `a` to track `b`
///
/// Deterministic and side-effect free. Identical feature vectors score 1.0.
pub fn score(a: &AudioFeatures, b: &AudioFeatures) -> f64 {
    let tempo = tempo_score(a.tempo_bpm, b.tempo_bpm);
    let key = key_compatibility(a.key, b.key);
    let energy = energy_score(a.energy, b.energy);

    TEMPO_WEIGHT * tempo + KEY_WEIGHT * key + ENERGY_WEIGHT * energy
}

/// Tempo term: linear falloff, zero at 20 BPM apart or more
///
/// DJs generally avoid tempo jumps past this range without a tempo ramp, so
/// larger differences contribute nothing.
pub fn tempo_score(a_bpm: f64, b_bpm: f64) -> f64 {
    (1.0 - (a_bpm - b_bpm).abs() / TEMPO_RANGE_BPM).max(0.0)
}

/// Key term: table lookup by pitch class pair
pub fn key_compatibility(a_key: u8, b_key: u8) -> f64 {
    KEY_COMPATIBILITY[(a_key % 12) as usize][(b_key % 12) as usize]
}

/// Energy term: rewards deltas within ±0.3, zero beyond
pub fn energy_score(a_energy: f64, b_energy: f64) -> f64 {
    1.0 - ((b_energy - a_energy).abs() / ENERGY_RANGE).min(1.0)
}

/// Resolve both tracks through the feature cache and score the pair
///
/// Returns the component deltas alongside the score so the transition
/// decision does not have to refetch anything. A failed feature fetch
/// propagates as `AnalysisUnavailable`.
pub async fn mixability(
    cache: &FeatureCache,
    a_id: &str,
    b_id: &str,
) -> Result<Mixability> {
    let a = cache.get(a_id).await?;
    let b = cache.get(b_id).await?;
    Ok(mixability_of(&a, &b))
}

/// Pure form of [`mixability`] for callers that already hold both vectors
pub fn mixability_of(a: &AudioFeatures, b: &AudioFeatures) -> Mixability {
    Mixability {
        score: score(a, b),
        tempo_diff: (a.tempo_bpm - b.tempo_bpm).abs(),
        key_compat: key_compatibility(a.key, b.key),
        energy_delta: b.energy - a.energy,
    }
}

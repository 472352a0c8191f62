//! `SongAnalysis` (§3) — immutable per-track feature set produced by the
//! Audio Analyzer (C1).

use crate::harmonic::{to_camelot, Scale};
use crate::phrase::derive_phrase_model;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable feature set for one analyzed track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongAnalysis {
    pub path: PathBuf,
    /// Beats per minute, clamped to `[60, 200]`.
    pub bpm: f64,
    /// Detected tonic pitch class, e.g. `"C"`, `"F#"`.
    pub key_tonic: String,
    pub key_scale: Scale,
    /// Camelot label, e.g. `"8A"`.
    pub key_camelot: String,
    /// Confidence of the key detection, in `[0, 1]`.
    pub key_confidence: f64,
    /// Beat times, in seconds, ascending.
    pub beats: Vec<f64>,
    /// RMS-normalized mean energy, in `[0, 1]`.
    pub energy: f64,
    pub duration_sec: f64,
    /// Phrase starts, in seconds, on a 32-bar grid. `phrase_starts_sec[0] == 0`.
    pub phrase_starts_sec: Vec<f64>,
    /// Start of the track's outro window, in `[0, duration_sec]`.
    pub outro_start_sec: f64,
    pub genre: Option<String>,
    pub vibe: Option<String>,
}

impl SongAnalysis {
    /// Assemble a `SongAnalysis` from raw analyzer outputs, deriving the
    /// phrase model and clamping BPM/energy into their documented ranges.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: PathBuf,
        bpm: f64,
        key_tonic: String,
        key_scale: Scale,
        key_tonic_index: usize,
        key_confidence: f64,
        beats: Vec<f64>,
        energy: f64,
        duration_sec: f64,
        genre: Option<String>,
        vibe: Option<String>,
    ) -> Self {
        let bpm = bpm.clamp(60.0, 200.0);
        let energy = energy.clamp(0.0, 1.0);
        let key_camelot =
            to_camelot(key_tonic_index, key_scale).unwrap_or_else(|| "8A".to_string());
        let phrase_model = derive_phrase_model(bpm, duration_sec);

        Self {
            path,
            bpm,
            key_tonic,
            key_scale,
            key_camelot,
            key_confidence: key_confidence.clamp(0.0, 1.0),
            beats,
            energy,
            duration_sec,
            phrase_starts_sec: phrase_model.phrase_starts_sec,
            outro_start_sec: phrase_model.outro_start_sec,
            genre,
            vibe,
        }
    }

    /// Energy on the presentation 1–10 scale: `round(e * 9 + 1)`, clamped.
    pub fn energy_1_10(&self) -> i32 {
        ((self.energy * 9.0 + 1.0).round() as i32).clamp(1, 10)
    }

    /// Safe-default analysis for a track that failed analysis entirely:
    /// 120 BPM, C major, confidence 0.5, no beats, mid energy. Used by C1's
    /// total-failure fallback and by tests.
    pub fn fallback(path: impl AsRef<Path>, duration_sec: f64) -> Self {
        Self::new(
            path.as_ref().to_path_buf(),
            120.0,
            "C".to_string(),
            Scale::Major,
            0,
            0.5,
            Vec::new(),
            0.5,
            duration_sec,
            None,
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_is_clamped_to_documented_range() {
        let a = SongAnalysis::new(
            PathBuf::from("a.wav"),
            500.0,
            "C".into(),
            Scale::Major,
            0,
            0.9,
            vec![],
            0.5,
            180.0,
            None,
            None,
        );
        assert_eq!(a.bpm, 200.0);
    }

    #[test]
    fn phrase_starts_anchor_at_zero_and_within_duration() {
        let a = SongAnalysis::fallback("a.wav", 180.0);
        assert_eq!(a.phrase_starts_sec[0], 0.0);
        assert!(a.phrase_starts_sec.iter().all(|&s| s <= a.duration_sec));
        assert!(a.outro_start_sec <= a.duration_sec);
    }

    #[test]
    fn energy_scale_conversion_is_clamped() {
        let mut a = SongAnalysis::fallback("a.wav", 180.0);
        a.energy = 1.0;
        assert_eq!(a.energy_1_10(), 10);
        a.energy = 0.0;
        assert_eq!(a.energy_1_10(), 1);
    }
}

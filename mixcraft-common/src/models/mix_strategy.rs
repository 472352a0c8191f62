//! `MixStrategy` (§3) — the plan for one (A, B) transition.

use serde::{Deserialize, Serialize};

/// Allowed transition types (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    Crossfade,
    BeatMatchCrossfade,
    DropSwap,
    FilterFade,
}

impl Default for TransitionType {
    fn default() -> Self {
        TransitionType::BeatMatchCrossfade
    }
}

/// Renderer-facing descriptive style (§4.6 step 8), informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    LongAtmospheric,
    ShortRhythmic,
    WashOut,
}

/// The plan for one transition (A -> B), as decided by the Strategy Engine
/// and clamped to the invariants the Renderer relies on (§3, §4.6 step C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixStrategy {
    pub transition_type: TransitionType,
    /// One of `{4, 8, 16, 32, 64}`.
    pub transition_length_bars: u32,
    pub crossfade_sec: f64,
    pub bass_swap_sec: f64,
    pub song_a_stretch_ratio: f64,
    pub song_b_stretch_ratio: f64,
    pub song_a_pitch_semitones: f64,
    pub song_b_pitch_semitones: f64,
    pub song_a_transition_start_sec: f64,
    /// Hard-fixed to `0.0` by the clamp pass.
    pub song_b_transition_start_sec: f64,
    pub start_offset_bars: u32,
    /// Camelot-wheel harmonic distance, `0..=6`. Computed, never client-supplied.
    pub harmonic_distance: u8,
    pub overlay_instrument_url: Option<String>,
    pub overlay_vocal_url: Option<String>,
    /// Native BPM of the resolved instrument overlay sample, used by the
    /// Renderer to time-stretch it to the set's target BPM (§4.8). `None`
    /// whenever `overlay_instrument_url` is `None`.
    pub overlay_instrument_bpm: Option<f64>,
    /// Native BPM of the resolved vocal overlay sample; see `overlay_instrument_bpm`.
    pub overlay_vocal_bpm: Option<f64>,
    pub overlay_entry_sec: Option<f64>,
    pub transition_style: TransitionStyle,
    pub reasoning: String,
    pub dj_comment: String,
    pub fx_chain: String,
}

impl MixStrategy {
    /// A transition_type/bars combination and zeroed fields, used as the
    /// starting point before the clamp pass fills in real numbers.
    pub fn defaults() -> Self {
        Self {
            transition_type: TransitionType::default(),
            transition_length_bars: 8,
            crossfade_sec: 8.0,
            bass_swap_sec: 0.0,
            song_a_stretch_ratio: 1.0,
            song_b_stretch_ratio: 1.0,
            song_a_pitch_semitones: 0.0,
            song_b_pitch_semitones: 0.0,
            song_a_transition_start_sec: 0.0,
            song_b_transition_start_sec: 0.0,
            start_offset_bars: 0,
            harmonic_distance: 6,
            overlay_instrument_url: None,
            overlay_vocal_url: None,
            overlay_instrument_bpm: None,
            overlay_vocal_bpm: None,
            overlay_entry_sec: None,
            transition_style: TransitionStyle::ShortRhythmic,
            reasoning: String::new(),
            dj_comment: String::new(),
            fx_chain: String::new(),
        }
    }
}

//! Phrase Model (C2)
//!
//! Derives phrase-start offsets on a 32-bar grid and the outro-start offset
//! from BPM and track duration. Pure and infallible: invalid inputs fall
//! back to the documented safe defaults rather than panicking.

/// Seconds per bar at the given BPM (4/4 time). Zero for non-positive BPM.
pub fn bar_seconds(bpm: f64) -> f64 {
    if bpm <= 0.0 {
        0.0
    } else {
        4.0 * 60.0 / bpm
    }
}

/// Seconds per 32-bar phrase at the given BPM. Zero for non-positive BPM.
pub fn phrase_seconds(bpm: f64) -> f64 {
    32.0 * bar_seconds(bpm)
}

/// Convert a bar count to seconds at the given BPM. Zero when either input
/// is non-positive.
pub fn bars_to_seconds(bpm: f64, bars: f64) -> f64 {
    if bpm <= 0.0 || bars <= 0.0 {
        0.0
    } else {
        bars * 4.0 * 60.0 / bpm
    }
}

/// Phrase starts (seconds, ascending, `[0]`-anchored) and the outro start.
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseModel {
    pub phrase_starts_sec: Vec<f64>,
    pub outro_start_sec: f64,
}

/// Compute phrase starts and outro start for a track of the given BPM and
/// duration.
///
/// `bpm <= 0` or `duration_sec <= 0` degrades to a single phrase start at
/// `0` and an outro one minute before the end (clamped at zero), per §4.2.
pub fn derive_phrase_model(bpm: f64, duration_sec: f64) -> PhraseModel {
    if bpm <= 0.0 || duration_sec <= 0.0 {
        return PhraseModel {
            phrase_starts_sec: vec![0.0],
            outro_start_sec: (duration_sec - 60.0).max(0.0),
        };
    }

    let phrase_sec = phrase_seconds(bpm);
    let mut starts = Vec::new();
    let mut t = 0.0;
    while t <= duration_sec {
        starts.push(t);
        t += phrase_sec;
    }
    if starts.is_empty() {
        starts.push(0.0);
    }

    let outro_start_sec = (duration_sec - (2.0 * phrase_sec).min(0.25 * duration_sec)).max(0.0);

    PhraseModel {
        phrase_starts_sec: starts,
        outro_start_sec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bars_to_seconds_round_trip() {
        // bars_to_seconds(bpm, bars) * bpm / 240 == bars (exact, for positive inputs)
        for (bpm, bars) in [(120.0, 8.0), (128.0, 16.0), (90.0, 4.0)] {
            let sec = bars_to_seconds(bpm, bars);
            assert!((sec * bpm / 240.0 - bars).abs() < 1e-9);
        }
    }

    #[test]
    fn bars_to_seconds_non_positive_is_zero() {
        assert_eq!(bars_to_seconds(0.0, 8.0), 0.0);
        assert_eq!(bars_to_seconds(120.0, 0.0), 0.0);
        assert_eq!(bars_to_seconds(-1.0, 8.0), 0.0);
    }

    #[test]
    fn phrase_starts_anchor_at_zero() {
        let model = derive_phrase_model(120.0, 180.0);
        assert_eq!(model.phrase_starts_sec[0], 0.0);
        for &s in &model.phrase_starts_sec {
            assert!(s <= 180.0);
        }
    }

    #[test]
    fn invalid_inputs_fall_back_to_defaults() {
        let model = derive_phrase_model(0.0, 180.0);
        assert_eq!(model.phrase_starts_sec, vec![0.0]);
        assert_eq!(model.outro_start_sec, 120.0);

        let model = derive_phrase_model(120.0, -5.0);
        assert_eq!(model.phrase_starts_sec, vec![0.0]);
        assert_eq!(model.outro_start_sec, 0.0);
    }

    #[test]
    fn outro_start_matches_formula() {
        // 120 BPM, 32-bar phrase = 64s; duration 100s -> min(2*64, 25) = 25 -> outro = 75
        let model = derive_phrase_model(120.0, 100.0);
        assert!((model.outro_start_sec - 75.0).abs() < 1e-9);
    }
}

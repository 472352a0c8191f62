//! Harmonic Model (C3)
//!
//! Camelot-wheel key mapping and harmonic distance. The 24-position Camelot
//! wheel arranges keys so that harmonically compatible keys sit at adjacent
//! or identical numbers; distance 0 means "same key or relative major/minor",
//! distance 6 means "far, or unparseable".

use serde::{Deserialize, Serialize};

/// Musical scale (major or minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Major,
    Minor,
}

/// The 12 chromatic pitch classes, C through B.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Camelot number (1..=12) for each pitch class, major scale (the "A" suffix).
/// Index matches [`PITCH_CLASSES`].
const CAMELOT_MAJOR: [u8; 12] = [8, 3, 10, 5, 12, 7, 2, 9, 4, 11, 6, 1];

/// Camelot number (1..=12) for each pitch class, minor scale (the "B" suffix).
const CAMELOT_MINOR: [u8; 12] = [5, 12, 7, 2, 9, 4, 11, 6, 1, 8, 3, 10];

/// Map a tonic pitch class index (0..12) and scale to its Camelot label,
/// e.g. `(9, Scale::Minor) -> "8A"` is wrong notation-wise; real label is
/// number + letter, e.g. `"8A"`/`"8B"`.
pub fn to_camelot(tonic_index: usize, scale: Scale) -> Option<String> {
    if tonic_index >= 12 {
        return None;
    }
    let (num, letter) = match scale {
        Scale::Major => (CAMELOT_MAJOR[tonic_index], 'A'),
        Scale::Minor => (CAMELOT_MINOR[tonic_index], 'B'),
    };
    Some(format!("{num}{letter}"))
}

/// Parse a Camelot label like `"8A"` or `"12B"` into `(number, letter)`.
fn parse_camelot(label: &str) -> Option<(u8, char)> {
    let label = label.trim();
    if label.len() < 2 {
        return None;
    }
    let letter = label.chars().last()?;
    if letter != 'A' && letter != 'B' {
        return None;
    }
    let digits = &label[..label.len() - 1];
    let num: u8 = digits.parse().ok()?;
    if !(1..=12).contains(&num) {
        return None;
    }
    Some((num, letter))
}

/// Camelot-wheel distance between two key labels.
///
/// - Either side unparseable or missing -> 6 (deliberately "far" but finite).
/// - Same number (same key, or relative major/minor) -> 0.
/// - Otherwise, the modular distance around the 12-position wheel.
pub fn camelot_distance(a: Option<&str>, b: Option<&str>) -> u8 {
    let (Some(a), Some(b)) = (a, b) else {
        return 6;
    };
    let (Some((n1, _)), Some((n2, _))) = (parse_camelot(a), parse_camelot(b)) else {
        return 6;
    };
    if n1 == n2 {
        return 0;
    }
    let diff = (n1 as i16 - n2 as i16).unsigned_abs();
    diff.min(12 - diff) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(camelot_distance(Some("8A"), Some("8A")), 0);
    }

    #[test]
    fn distance_is_symmetric_and_bounded() {
        let pairs = [("8A", "3A"), ("1A", "12A"), ("5B", "9A"), ("8A", "8B")];
        for (a, b) in pairs {
            let d1 = camelot_distance(Some(a), Some(b));
            let d2 = camelot_distance(Some(b), Some(a));
            assert_eq!(d1, d2);
            assert!(d1 <= 6);
        }
    }

    #[test]
    fn wheel_wraps_around() {
        // 1 and 12 are adjacent on the wheel -> distance 1
        assert_eq!(camelot_distance(Some("1A"), Some("12A")), 1);
    }

    #[test]
    fn relative_major_minor_same_number_is_zero() {
        assert_eq!(camelot_distance(Some("8A"), Some("8B")), 0);
    }

    #[test]
    fn unparseable_or_missing_is_six() {
        assert_eq!(camelot_distance(None, Some("8A")), 6);
        assert_eq!(camelot_distance(Some("bogus"), Some("8A")), 6);
        assert_eq!(camelot_distance(Some("13A"), Some("8A")), 6);
    }

    #[test]
    fn camelot_mapping_round_trips_via_parse() {
        for tonic in 0..12 {
            for scale in [Scale::Major, Scale::Minor] {
                let label = to_camelot(tonic, scale).unwrap();
                assert!(parse_camelot(&label).is_some());
            }
        }
    }
}

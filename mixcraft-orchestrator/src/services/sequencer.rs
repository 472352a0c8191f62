//! Sequencer (C7)
//!
//! Orders N tracks by energy curve and Camelot affinity, and builds the
//! overlapping (A, B) roadmap (§4.7).

use crate::services::analyzer::AudioAnalyzer;
use mixcraft_common::harmonic::camelot_distance;
use mixcraft_common::models::{build_roadmap, Roadmap, SongAnalysis};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Analyze every path, skipping files that fail analysis entirely.
///
/// Since [`AudioAnalyzer::analyze`] itself never fails (C1 substitutes
/// documented defaults internally), "fails" here means the file could not
/// even be opened/read as a candidate path; callers needing that
/// distinction should filter before calling this.
pub async fn analyze_tracks(
    analyzer: &Arc<dyn AudioAnalyzer>,
    paths: &[PathBuf],
) -> Vec<(PathBuf, SongAnalysis)> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.exists() {
            warn!(?path, "Skipping unreadable track");
            continue;
        }
        let analysis = analyzer.analyze(path).await;
        out.push((path.clone(), analysis));
    }
    out
}

/// Order tracks by an initial BPM sort, then greedily refine by minimum
/// Camelot distance to the last-chosen track (ties broken by minimum BPM
/// delta), producing a sequence that climbs in energy while preferring
/// harmonically-adjacent neighbors (§4.7).
pub fn sort_playlist(
    tracks: &[(PathBuf, SongAnalysis)],
    ascending: bool,
) -> Vec<(PathBuf, SongAnalysis)> {
    let mut remaining: Vec<(PathBuf, SongAnalysis)> = tracks.to_vec();
    remaining.sort_by(|a, b| {
        let ord = a.1.bpm.partial_cmp(&b.1.bpm).unwrap_or(std::cmp::Ordering::Equal);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });

    if remaining.is_empty() {
        return remaining;
    }

    let mut ordered = vec![remaining.remove(0)];
    while !remaining.is_empty() {
        let last = &ordered.last().unwrap().1;
        let mut best_idx = 0;
        let mut best_dist = camelot_distance(Some(&last.key_camelot), Some(&remaining[0].1.key_camelot));
        let mut best_bpm_delta = (last.bpm - remaining[0].1.bpm).abs();

        for (i, (_, candidate)) in remaining.iter().enumerate().skip(1) {
            let dist = camelot_distance(Some(&last.key_camelot), Some(&candidate.key_camelot));
            let bpm_delta = (last.bpm - candidate.bpm).abs();
            if dist < best_dist || (dist == best_dist && bpm_delta < best_bpm_delta) {
                best_idx = i;
                best_dist = dist;
                best_bpm_delta = bpm_delta;
            }
        }

        ordered.push(remaining.remove(best_idx));
    }

    ordered
}

/// Build the overlapping roadmap from an ordered track list (§4.7, §3).
pub fn build_roadmap_from_order(ordered: &[(PathBuf, SongAnalysis)]) -> Roadmap {
    build_roadmap(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixcraft_common::harmonic::Scale;

    fn track(path: &str, bpm: f64, camelot: &str) -> (PathBuf, SongAnalysis) {
        let mut a = SongAnalysis::new(
            PathBuf::from(path),
            bpm,
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
        a.key_camelot = camelot.to_string();
        (PathBuf::from(path), a)
    }

    #[test]
    fn sequences_five_tracks_preferring_harmonic_neighbors() {
        let tracks = vec![
            track("a", 120.0, "8A"),
            track("b", 128.0, "8A"),
            track("c", 124.0, "5A"),
            track("d", 130.0, "9A"),
            track("e", 122.0, "8B"),
        ];
        let ordered = sort_playlist(&tracks, true);

        // Starts from the lowest-BPM track (the ascending energy anchor).
        assert_eq!(ordered[0].0, PathBuf::from("a"));
        // Every step greedily minimizes Camelot distance to its predecessor;
        // with this key layout every consecutive pair is within distance 3.
        for pair in ordered.windows(2) {
            let dist = camelot_distance(Some(&pair[0].1.key_camelot), Some(&pair[1].1.key_camelot));
            assert!(dist <= 3, "unexpectedly large jump: {dist}");
        }

        let roadmap = build_roadmap_from_order(&ordered);
        assert_eq!(roadmap.len(), 4);
    }

    #[test]
    fn roadmap_has_n_minus_one_entries() {
        let tracks: Vec<_> = (0..6).map(|i| track(&i.to_string(), 120.0 + i as f64, "8A")).collect();
        let ordered = sort_playlist(&tracks, true);
        let roadmap = build_roadmap_from_order(&ordered);
        assert_eq!(roadmap.len(), tracks.len() - 1);
    }
}

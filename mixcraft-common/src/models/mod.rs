//! Shared data model (§3)

mod admin_config;
mod mix_strategy;
mod session;
mod song_analysis;

pub use admin_config::{AdminConfig, Preset};
pub use mix_strategy::{MixStrategy, TransitionStyle, TransitionType};
pub use session::{Session, SessionPhase, SessionStatus};
pub use song_analysis::SongAnalysis;

use std::path::PathBuf;

/// One (A, B) transition pair in a multi-track set, carrying both tracks'
/// paths and analyses.
#[derive(Debug, Clone)]
pub struct RoadmapEntry {
    pub track_a: PathBuf,
    pub track_b: PathBuf,
    pub analysis_a: SongAnalysis,
    pub analysis_b: SongAnalysis,
}

/// Ordered, overlapping sequence of transition pairs spanning a multi-track
/// set. `roadmap[i].track_b == roadmap[i + 1].track_a` for every `i`.
pub type Roadmap = Vec<RoadmapEntry>;

/// Build the overlapping roadmap from an ordered track list.
///
/// `ordered.len()` must be >= 2 for a non-empty roadmap; fewer tracks yield
/// an empty roadmap.
pub fn build_roadmap(ordered: &[(PathBuf, SongAnalysis)]) -> Roadmap {
    ordered
        .windows(2)
        .map(|pair| RoadmapEntry {
            track_a: pair[0].0.clone(),
            track_b: pair[1].0.clone(),
            analysis_a: pair[0].1.clone(),
            analysis_b: pair[1].1.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_analysis() -> SongAnalysis {
        SongAnalysis::fallback(PathBuf::from("x.wav"), 180.0)
    }

    #[test]
    fn roadmap_overlap_invariant_holds() {
        let ordered: Vec<_> = (0..5)
            .map(|i| (PathBuf::from(format!("t{i}.wav")), stub_analysis()))
            .collect();
        let roadmap = build_roadmap(&ordered);
        assert_eq!(roadmap.len(), 4);
        for i in 0..roadmap.len() - 1 {
            assert_eq!(roadmap[i].track_b, roadmap[i + 1].track_a);
        }
    }
}

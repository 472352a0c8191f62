//! Audio Analyzer (C1) adapter
//!
//! Delegates low-level feature extraction (chroma, beat tracking, RMS) to
//! an external audio analysis toolchain, as DSP primitives are out of
//! scope for this subsystem (§1). The trait method is infallible: any
//! internal failure is caught and substituted with a documented default so
//! downstream code never observes a missing field (§4.1).

use async_trait::async_trait;
use mixcraft_common::harmonic::Scale;
use mixcraft_common::models::SongAnalysis;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Adapter boundary for the external audio analysis toolchain.
#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    /// Analyze one audio file. Never fails; internal errors degrade to the
    /// documented safe defaults (§4.1: BPM 120, key C major @ 0.5
    /// confidence, empty beats, energy 0.5).
    async fn analyze(&self, path: &Path) -> SongAnalysis;
}

/// Default adapter: shells out to an external analysis command that prints
/// a single JSON object with `bpm`, `key_tonic_index`, `key_scale`,
/// `key_confidence`, `beats`, `energy`, `duration_sec`, `genre`, `vibe`.
///
/// Mirrors the teacher's pattern of an optional external CLI tool (command
/// existence probed once, cached) with a best-effort subprocess call and a
/// safe-default fallback on any failure.
pub struct ExternalAnalyzer {
    command: String,
}

impl ExternalAnalyzer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    async fn run(&self, path: &Path) -> anyhow::Result<RawAnalysis> {
        let output = Command::new(&self.command)
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            anyhow::bail!("analyzer exited with status {}", output.status);
        }
        let raw: RawAnalysis = serde_json::from_slice(&output.stdout)?;
        Ok(raw)
    }
}

#[derive(Debug, serde::Deserialize)]
struct RawAnalysis {
    bpm: f64,
    key_tonic_index: usize,
    key_scale: String,
    key_confidence: f64,
    beats: Vec<f64>,
    energy: f64,
    duration_sec: f64,
    genre: Option<String>,
    vibe: Option<String>,
}

#[async_trait]
impl AudioAnalyzer for ExternalAnalyzer {
    async fn analyze(&self, path: &Path) -> SongAnalysis {
        match self.run(path).await {
            Ok(raw) => {
                let scale = if raw.key_scale.eq_ignore_ascii_case("minor") {
                    Scale::Minor
                } else {
                    Scale::Major
                };
                let pitch_idx = raw.key_tonic_index.min(11);
                let tonic = mixcraft_common::harmonic::PITCH_CLASSES[pitch_idx].to_string();
                debug!(?path, bpm = raw.bpm, "Audio analysis succeeded");
                SongAnalysis::new(
                    path.to_path_buf(),
                    raw.bpm,
                    tonic,
                    scale,
                    pitch_idx,
                    raw.key_confidence,
                    raw.beats,
                    raw.energy,
                    raw.duration_sec,
                    raw.genre,
                    raw.vibe,
                )
            }
            Err(err) => {
                warn!(?path, error = %err, "Audio analysis failed, substituting defaults");
                // Duration is unknowable without the toolchain; treat the
                // track as a typical 3.5-minute song rather than zero, so
                // downstream phrase/outro math stays meaningful.
                SongAnalysis::fallback(path, 210.0)
            }
        }
    }
}

/// Deterministic analyzer used by tests that don't need a real toolchain.
#[derive(Default)]
pub struct StubAnalyzer {
    pub bpm: Option<f64>,
    pub camelot: Option<String>,
    pub energy: Option<f64>,
    pub duration_sec: Option<f64>,
}

#[async_trait]
impl AudioAnalyzer for StubAnalyzer {
    async fn analyze(&self, path: &Path) -> SongAnalysis {
        let mut a = SongAnalysis::fallback(path, self.duration_sec.unwrap_or(180.0));
        if let Some(bpm) = self.bpm {
            a.bpm = bpm;
        }
        if let Some(camelot) = &self.camelot {
            a.key_camelot = camelot.clone();
        }
        if let Some(energy) = self.energy {
            a.energy = energy;
        }
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn external_analyzer_falls_back_on_missing_command() {
        let analyzer = ExternalAnalyzer::new("mixcraft-analyze-does-not-exist");
        let result = analyzer.analyze(Path::new("/tmp/track.wav")).await;
        assert_eq!(result.bpm, 120.0);
        assert_eq!(result.key_camelot, "8A");
        assert_eq!(result.key_confidence, 0.5);
    }

    #[tokio::test]
    async fn analyzing_same_file_twice_is_idempotent() {
        let analyzer = StubAnalyzer {
            bpm: Some(124.0),
            camelot: Some("5A".to_string()),
            ..Default::default()
        };
        let a1 = analyzer.analyze(Path::new("/tmp/track.wav")).await;
        let a2 = analyzer.analyze(Path::new("/tmp/track.wav")).await;
        assert_eq!(a1.bpm, a2.bpm);
        assert_eq!(a1.key_camelot, a2.key_camelot);
        assert_eq!(a1.duration_sec, a2.duration_sec);
    }
}

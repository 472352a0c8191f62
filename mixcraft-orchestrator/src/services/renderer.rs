//! Renderer (C8) adapter
//!
//! Produces one WAV segment for a clamped `(A, B, strategy)` triple. Actual
//! DSP (time-stretch, pitch-shift, filter graphs, loudness normalization,
//! concat) is delegated to an external audio toolchain (§1), mirroring how
//! the Audio Analyzer adapter shells out for feature extraction.

use async_trait::async_trait;
use mixcraft_common::models::{MixStrategy, SongAnalysis};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Adapter boundary for the external audio rendering toolchain.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render one (A, B) transition to `out_path`, honoring every rule in
    /// §4.8. Returns the actual crossfade duration used, post-20%-rule, so
    /// callers can log/report it.
    async fn render_segment(
        &self,
        a_path: &Path,
        b_path: &Path,
        a: &SongAnalysis,
        b: &SongAnalysis,
        strategy: &MixStrategy,
        out_path: &Path,
    ) -> anyhow::Result<f64>;

    /// Losslessly concatenate already-rendered segments into one output
    /// file, in roadmap order (§4.10 finalize phase).
    async fn concat_segments(&self, segments: &[PathBuf], out_path: &Path) -> anyhow::Result<()>;
}

/// Actual crossfade after the renderer's 20% rule (§4.8), given post-stretch
/// track durations. Can legitimately land below the 0.5s floor on very
/// short inputs; callers accept that rather than treating it as an error.
pub fn apply_twenty_percent_rule(requested_sec: f64, duration_a: f64, duration_b: f64) -> f64 {
    let ceiling = (0.2 * duration_a).min(0.2 * duration_b).min(120.0);
    requested_sec.clamp(0.0, ceiling.max(0.0))
}

/// Post-stretch duration of a track given its analyzed duration and stretch
/// ratio (a ratio > 1.0 lengthens playback).
fn stretched_duration(duration_sec: f64, stretch_ratio: f64) -> f64 {
    duration_sec * stretch_ratio
}

/// External-subprocess adapter: shells out to a configurable audio engine
/// command once per segment, then to a second command for the final
/// concat. Mirrors the Audio Analyzer's subprocess-adapter shape (§4.1).
pub struct ExternalRenderer {
    render_command: String,
    concat_command: String,
    http: reqwest::Client,
}

impl ExternalRenderer {
    pub fn new(render_command: impl Into<String>, concat_command: impl Into<String>) -> Self {
        Self {
            render_command: render_command.into(),
            concat_command: concat_command.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetch a cloud overlay URL to a temp file, verifying non-zero size
    /// before returning; the caller is responsible for removing the file
    /// regardless of what happens afterward (§4.8 cloud overlay rule).
    async fn fetch_overlay(&self, url: &str) -> anyhow::Result<PathBuf> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            anyhow::bail!("cloud overlay {url} fetched zero bytes");
        }
        let path = std::env::temp_dir().join(format!("mixcraft-overlay-{}.wav", Uuid::new_v4()));
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }

    /// Resolve a strategy's overlay references to local files, fetching
    /// cloud ones to temp locations. Local paths pass through unchanged.
    async fn resolve_overlay(&self, location: &str) -> anyhow::Result<(PathBuf, bool)> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let path = self.fetch_overlay(location).await?;
            Ok((path, true))
        } else {
            Ok((PathBuf::from(location), false))
        }
    }

    async fn run_engine(&self, args: &[String]) -> anyhow::Result<()> {
        let output = Command::new(&self.render_command)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !output.status.success() {
            anyhow::bail!(
                "render engine exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Renderer for ExternalRenderer {
    async fn render_segment(
        &self,
        a_path: &Path,
        b_path: &Path,
        a: &SongAnalysis,
        b: &SongAnalysis,
        strategy: &MixStrategy,
        out_path: &Path,
    ) -> anyhow::Result<f64> {
        let duration_a_post = stretched_duration(a.duration_sec, strategy.song_a_stretch_ratio);
        let duration_b_post = stretched_duration(b.duration_sec, strategy.song_b_stretch_ratio);
        let crossfade_used = apply_twenty_percent_rule(strategy.crossfade_sec, duration_a_post, duration_b_post);

        let apply_highpass_on_a = strategy.harmonic_distance > 1;

        let mut args = vec![
            "--in-a".to_string(),
            a_path.to_string_lossy().to_string(),
            "--in-b".to_string(),
            b_path.to_string_lossy().to_string(),
            "--out".to_string(),
            out_path.to_string_lossy().to_string(),
            "--crossfade-sec".to_string(),
            crossfade_used.to_string(),
            "--start-a-sec".to_string(),
            strategy.song_a_transition_start_sec.to_string(),
        ];

        if (strategy.song_a_stretch_ratio - 1.0).abs() > f64::EPSILON {
            args.push("--stretch-a".to_string());
            args.push(strategy.song_a_stretch_ratio.to_string());
        }
        if (strategy.song_b_stretch_ratio - 1.0).abs() > f64::EPSILON {
            args.push("--stretch-b".to_string());
            args.push(strategy.song_b_stretch_ratio.to_string());
        }
        if strategy.song_a_pitch_semitones != 0.0 {
            args.push("--pitch-a".to_string());
            args.push(strategy.song_a_pitch_semitones.to_string());
        }
        if strategy.song_b_pitch_semitones != 0.0 {
            args.push("--pitch-b".to_string());
            args.push(strategy.song_b_pitch_semitones.to_string());
        }
        if apply_highpass_on_a {
            args.push("--highpass-a".to_string());
        }

        let target_bpm = (a.bpm + b.bpm) / 2.0;
        let mut overlay_cleanup = Vec::new();
        for (flag, location, overlay_bpm) in [
            ("--overlay-instrument", &strategy.overlay_instrument_url, strategy.overlay_instrument_bpm),
            ("--overlay-vocal", &strategy.overlay_vocal_url, strategy.overlay_vocal_bpm),
        ] {
            if let Some(location) = location {
                match self.resolve_overlay(location).await {
                    Ok((path, is_temp)) => {
                        if is_temp {
                            overlay_cleanup.push(path.clone());
                        }
                        let overlay_ratio =
                            (target_bpm / overlay_bpm.unwrap_or(target_bpm).max(1.0)).clamp(0.5, 2.0);
                        args.push(flag.to_string());
                        args.push(path.to_string_lossy().to_string());
                        args.push(format!("{flag}-ratio"));
                        args.push(overlay_ratio.to_string());
                        if let Some(entry) = strategy.overlay_entry_sec {
                            args.push(format!("{flag}-delay"));
                            args.push(entry.to_string());
                        }
                    }
                    Err(err) => {
                        warn!(location, error = %err, "Overlay fetch failed, rendering without it");
                    }
                }
            }
        }

        args.push("--target-lufs".to_string());
        args.push("-16".to_string());

        let result = self.run_engine(&args).await;
        for path in &overlay_cleanup {
            if let Err(err) = tokio::fs::remove_file(path).await {
                warn!(?path, error = %err, "Failed to clean up temp overlay file");
            }
        }

        if let Err(err) = result {
            warn!(error = %err, "Render with loudness normalization failed, retrying without it");
            let args_without_norm: Vec<String> = args
                .iter()
                .take_while(|a| a.as_str() != "--target-lufs")
                .cloned()
                .collect();
            self.run_engine(&args_without_norm).await?;
        }

        debug!(?out_path, crossfade_used, apply_highpass_on_a, "Segment rendered");
        Ok(crossfade_used)
    }

    async fn concat_segments(&self, segments: &[PathBuf], out_path: &Path) -> anyhow::Result<()> {
        if segments.is_empty() {
            anyhow::bail!("cannot concat zero segments");
        }
        let mut args = vec!["--out".to_string(), out_path.to_string_lossy().to_string()];
        for seg in segments {
            args.push("--in".to_string());
            args.push(seg.to_string_lossy().to_string());
        }
        let output = Command::new(&self.concat_command)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;
        if !output.status.success() {
            anyhow::bail!(
                "concat engine exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        info!(segments = segments.len(), ?out_path, "Segments concatenated");
        Ok(())
    }
}

/// Deterministic renderer used by tests and local dev without an external
/// engine: writes a short silent WAV via `hound` honoring only the output
/// path/duration, so callers can exercise the orchestration around the
/// adapter boundary without a real DSP toolchain.
pub struct StubRenderer {
    pub sample_rate: u32,
}

impl Default for StubRenderer {
    fn default() -> Self {
        Self { sample_rate: 44_100 }
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render_segment(
        &self,
        _a_path: &Path,
        _b_path: &Path,
        a: &SongAnalysis,
        b: &SongAnalysis,
        strategy: &MixStrategy,
        out_path: &Path,
    ) -> anyhow::Result<f64> {
        let duration_a_post = stretched_duration(a.duration_sec, strategy.song_a_stretch_ratio);
        let duration_b_post = stretched_duration(b.duration_sec, strategy.song_b_stretch_ratio);
        let crossfade_used = apply_twenty_percent_rule(strategy.crossfade_sec, duration_a_post, duration_b_post);

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(out_path, spec)?;
        let frames = (crossfade_used.max(0.1) * self.sample_rate as f64) as u32;
        for _ in 0..frames {
            writer.write_sample(0i16)?;
            writer.write_sample(0i16)?;
        }
        writer.finalize()?;
        Ok(crossfade_used)
    }

    async fn concat_segments(&self, segments: &[PathBuf], out_path: &Path) -> anyhow::Result<()> {
        if segments.is_empty() {
            anyhow::bail!("cannot concat zero segments");
        }
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(out_path, spec)?;
        for seg in segments {
            let mut reader = hound::WavReader::open(seg)?;
            for sample in reader.samples::<i16>() {
                writer.write_sample(sample?)?;
            }
        }
        writer.finalize()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_percent_rule_caps_at_smaller_track() {
        let used = apply_twenty_percent_rule(50.0, 100.0, 40.0);
        assert!((used - 8.0).abs() < 1e-9);
    }

    #[test]
    fn twenty_percent_rule_never_exceeds_120() {
        let used = apply_twenty_percent_rule(200.0, 10_000.0, 10_000.0);
        assert!((used - 120.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stub_renderer_writes_a_wav_file_of_the_expected_rough_length() {
        use mixcraft_common::harmonic::Scale;

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("seg_0.wav");
        let renderer = StubRenderer::default();

        let a = SongAnalysis::new(
            "a.wav".into(), 120.0, "C".into(), Scale::Major, 0, 0.9, vec![], 0.5, 180.0, None, None,
        );
        let b = a.clone();
        let mut strategy = MixStrategy::defaults();
        strategy.crossfade_sec = 10.0;

        let used = renderer
            .render_segment(Path::new("a.wav"), Path::new("b.wav"), &a, &b, &strategy, &out)
            .await
            .unwrap();

        assert!(out.exists());
        assert!(used > 0.0 && used <= 10.0);
    }

    #[tokio::test]
    async fn concat_of_zero_segments_errors() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = StubRenderer::default();
        let result = renderer.concat_segments(&[], &dir.path().join("out.wav")).await;
        assert!(result.is_err());
    }
}

//! Job Orchestrator (C10)
//!
//! Two-phase pipeline with a fan-in finalizer (§4.10). Brain and audio
//! tasks are routed through distinct named `tokio::mpsc` queues, each
//! drained by its own fixed-size worker pool — the async analogue of the
//! teacher's OS-thread `DecoderPool` (priority queue + worker threads),
//! generalized here to two independently-sized named queues instead of one
//! priority queue, since brain and audio work have unrelated CPU profiles.

use crate::services::admin_store::AdminConfigStore;
use crate::services::analyzer::AudioAnalyzer;
use crate::services::renderer::Renderer;
use crate::services::job_store::JobStateStore;
use crate::services::progress_bus::ProgressBus;
use crate::services::sample_library::{SampleCategory, SampleLibrary};
use crate::services::sequencer;
use crate::services::session_manager::SessionManager;
use crate::services::strategy_engine::{self, LlmClient, OverlayCandidates};
use mixcraft_common::events::ProgressEvent;
use mixcraft_common::models::{MixStrategy, Session, SessionPhase, SessionStatus, SongAnalysis};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Services the orchestrator's workers need; handed to every task.
pub struct OrchestratorServices {
    pub analyzer: Arc<dyn AudioAnalyzer>,
    pub renderer: Arc<dyn Renderer>,
    pub admin_store: Arc<AdminConfigStore>,
    pub sample_library: Arc<SampleLibrary>,
    pub job_store: Arc<dyn JobStateStore>,
    pub progress_bus: Arc<ProgressBus>,
    pub session_manager: Arc<SessionManager>,
    pub llm_client: Option<Arc<dyn LlmClient>>,
}

/// Brain task input: a newly-uploaded or newly-created multi-track session
/// ready to be sequenced and planned (§4.10).
pub struct BrainTask {
    pub session_id: Uuid,
    pub session_dir: PathBuf,
    pub track_paths: Vec<PathBuf>,
    pub user_prompt: Option<String>,
}

enum BrainMsg {
    Plan(BrainTask),
    Finalize(Uuid),
}

struct AudioTask {
    session_id: Uuid,
    seg_index: usize,
    a_path: PathBuf,
    b_path: PathBuf,
    a: SongAnalysis,
    b: SongAnalysis,
    strategy: MixStrategy,
    out_path: PathBuf,
}

#[derive(Clone)]
struct TracklistRow {
    index: usize,
    a_name: String,
    b_name: String,
    a: SongAnalysis,
    b: SongAnalysis,
    strategy: MixStrategy,
}

struct FanInEntry {
    total: usize,
    completed: usize,
    failed: bool,
    segments: Vec<Option<PathBuf>>,
    rows: Vec<Option<TracklistRow>>,
}

impl FanInEntry {
    fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: false,
            segments: vec![None; total],
            rows: vec![None; total],
        }
    }
}

/// Job Orchestrator: owns the brain/audio queues, their worker pools, and
/// the fan-in state that gates the finalize phase (§4.10, §9 "task group").
pub struct JobOrchestrator {
    services: Arc<OrchestratorServices>,
    brain_tx: mpsc::Sender<BrainMsg>,
    fan_in: Arc<Mutex<HashMap<Uuid, FanInEntry>>>,
    cancelled: Arc<Mutex<HashSet<Uuid>>>,
}

impl JobOrchestrator {
    /// Spawn `brain_workers` brain-queue workers and `audio_workers`
    /// audio-queue workers, all sharing `services`.
    pub fn spawn(services: Arc<OrchestratorServices>, brain_workers: usize, audio_workers: usize) -> Self {
        let (brain_tx, brain_rx) = mpsc::channel::<BrainMsg>(256);
        let (audio_tx, audio_rx) = mpsc::channel::<AudioTask>(256);
        let fan_in: Arc<Mutex<HashMap<Uuid, FanInEntry>>> = Arc::new(Mutex::new(HashMap::new()));
        let cancelled: Arc<Mutex<HashSet<Uuid>>> = Arc::new(Mutex::new(HashSet::new()));

        let brain_rx = Arc::new(tokio::sync::Mutex::new(brain_rx));
        let audio_rx = Arc::new(tokio::sync::Mutex::new(audio_rx));

        for worker_id in 0..brain_workers.max(1) {
            let rx = brain_rx.clone();
            let services = services.clone();
            let audio_tx = audio_tx.clone();
            let fan_in = fan_in.clone();
            let cancelled = cancelled.clone();
            tokio::spawn(async move {
                brain_worker_loop(worker_id, rx, services, audio_tx, fan_in, cancelled).await;
            });
        }

        for worker_id in 0..audio_workers.max(1) {
            let rx = audio_rx.clone();
            let services = services.clone();
            let brain_tx = brain_tx.clone();
            let fan_in = fan_in.clone();
            let cancelled = cancelled.clone();
            tokio::spawn(async move {
                audio_worker_loop(worker_id, rx, services, brain_tx, fan_in, cancelled).await;
            });
        }

        Self { services, brain_tx, fan_in, cancelled }
    }

    /// Enqueue a brain task ("brain" queue, §4.10).
    pub async fn submit(&self, task: BrainTask) -> anyhow::Result<()> {
        self.brain_tx
            .send(BrainMsg::Plan(task))
            .await
            .map_err(|_| anyhow::anyhow!("brain queue closed"))
    }

    /// Cooperatively cancel a not-yet-finalized session (§"Per-session
    /// cancellation"). Marks the session failed, drops its fan-in state, and
    /// deletes its session directory immediately; any already-queued or
    /// in-flight task for it becomes a no-op when it next checks in.
    pub async fn cancel(&self, session_id: Uuid) -> anyhow::Result<()> {
        self.cancelled.lock().unwrap().insert(session_id);
        self.fan_in.lock().unwrap().remove(&session_id);
        fail_session(&self.services, session_id, "Cancelled").await;
        Ok(())
    }

    /// Number of sessions with in-flight fan-in state, for diagnostics.
    pub fn in_flight_sessions(&self) -> usize {
        self.fan_in.lock().unwrap().len()
    }
}

async fn brain_worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<BrainMsg>>>,
    services: Arc<OrchestratorServices>,
    audio_tx: mpsc::Sender<AudioTask>,
    fan_in: Arc<Mutex<HashMap<Uuid, FanInEntry>>>,
    cancelled: Arc<Mutex<HashSet<Uuid>>>,
) {
    loop {
        let msg = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(msg) = msg else {
            break;
        };
        match msg {
            BrainMsg::Plan(task) => {
                if cancelled.lock().unwrap().remove(&task.session_id) {
                    continue;
                }
                if let Err(err) = run_brain_task(task, &services, &audio_tx, &fan_in).await {
                    error!(worker_id, error = %err, "Brain task failed");
                }
            }
            BrainMsg::Finalize(session_id) => {
                if cancelled.lock().unwrap().remove(&session_id) {
                    continue;
                }
                if let Err(err) = run_finalize(session_id, &services, &fan_in).await {
                    error!(worker_id, %session_id, error = %err, "Finalize task failed");
                }
            }
        }
    }
}

async fn audio_worker_loop(
    worker_id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<AudioTask>>>,
    services: Arc<OrchestratorServices>,
    brain_tx: mpsc::Sender<BrainMsg>,
    fan_in: Arc<Mutex<HashMap<Uuid, FanInEntry>>>,
    cancelled: Arc<Mutex<HashSet<Uuid>>>,
) {
    loop {
        let task = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };
        let Some(task) = task else {
            break;
        };
        if cancelled.lock().unwrap().contains(&task.session_id) {
            continue;
        }
        run_audio_task(worker_id, task, &services, &brain_tx, &fan_in).await;
    }
}

async fn run_brain_task(
    task: BrainTask,
    services: &Arc<OrchestratorServices>,
    audio_tx: &mpsc::Sender<AudioTask>,
    fan_in: &Arc<Mutex<HashMap<Uuid, FanInEntry>>>,
) -> anyhow::Result<()> {
    let session_id = task.session_id;
    publish(services, session_id, SessionPhase::Analyzing, "Analyzing tracks");

    let analyzed = sequencer::analyze_tracks(&services.analyzer, &task.track_paths).await;
    if analyzed.len() < 2 {
        fail_session(services, session_id, "Could not analyze at least 2 tracks").await;
        return Ok(());
    }

    publish(services, session_id, SessionPhase::Sequencing, "Sequencing tracks");
    let ordered = sequencer::sort_playlist(&analyzed, true);
    let roadmap = sequencer::build_roadmap_from_order(&ordered);

    let admin = services.admin_store.get().await;
    let intent = strategy_engine::parse_intent(task.user_prompt.as_deref(), &admin);

    let mut entry = FanInEntry::new(roadmap.len());
    for (idx, pair) in roadmap.iter().enumerate() {
        let candidates = if admin.allow_instruments_ai || admin.allow_vocals_ai {
            gather_overlay_candidates(services, &pair.analysis_a, &pair.analysis_b, &admin).await
        } else {
            OverlayCandidates::default()
        };

        let raw = strategy_engine::heuristic_strategy(&pair.analysis_a, &pair.analysis_b, &intent, &admin);
        let strategy = strategy_engine::clamp_strategy(raw, &pair.analysis_a, &pair.analysis_b, &admin, &candidates, task.track_paths.len());

        entry.rows[idx] = Some(TracklistRow {
            index: idx,
            a_name: file_name(&pair.track_a),
            b_name: file_name(&pair.track_b),
            a: pair.analysis_a.clone(),
            b: pair.analysis_b.clone(),
            strategy: strategy.clone(),
        });

        let out_path = task.session_dir.join(format!("seg_{idx}.wav"));
        let audio_task = AudioTask {
            session_id,
            seg_index: idx,
            a_path: pair.track_a.clone(),
            b_path: pair.track_b.clone(),
            a: pair.analysis_a.clone(),
            b: pair.analysis_b.clone(),
            strategy,
            out_path,
        };
        if audio_tx.send(audio_task).await.is_err() {
            warn!(%session_id, "Audio queue closed while dispatching segment {idx}");
        }
    }

    fan_in.lock().unwrap().insert(session_id, entry);

    let mut session = services
        .job_store
        .get(session_id)
        .await?
        .unwrap_or_else(|| Session::new(session_id));
    session.session_dir = Some(task.session_dir.clone());
    session.status = SessionStatus::Processing;
    session.phase = Some(SessionPhase::Rendering);
    session.total_segments = Some(roadmap.len());
    session.current_segment = Some(0);
    services.job_store.put(session).await?;

    publish(services, session_id, SessionPhase::Rendering, "Rendering segments");
    Ok(())
}

async fn gather_overlay_candidates(
    services: &Arc<OrchestratorServices>,
    a: &SongAnalysis,
    b: &SongAnalysis,
    admin: &mixcraft_common::models::AdminConfig,
) -> OverlayCandidates {
    let avg_bpm = (a.bpm + b.bpm) / 2.0;
    let mut candidates = OverlayCandidates::default();
    if admin.allow_instruments_ai {
        candidates.instruments = services
            .sample_library
            .get_compatible(avg_bpm, &a.key_camelot, &[SampleCategory::Instrument], 5.0, 1)
            .await;
    }
    if admin.allow_vocals_ai {
        candidates.vocals = services
            .sample_library
            .get_compatible(avg_bpm, &a.key_camelot, &[SampleCategory::Vocal], 5.0, 1)
            .await;
    }
    candidates
}

async fn run_audio_task(
    worker_id: usize,
    task: AudioTask,
    services: &Arc<OrchestratorServices>,
    brain_tx: &mpsc::Sender<BrainMsg>,
    fan_in: &Arc<Mutex<HashMap<Uuid, FanInEntry>>>,
) {
    let session_id = task.session_id;
    let result = services
        .renderer
        .render_segment(&task.a_path, &task.b_path, &task.a, &task.b, &task.strategy, &task.out_path)
        .await;

    let (done, total) = {
        let mut guard = fan_in.lock().unwrap();
        let Some(entry) = guard.get_mut(&session_id) else {
            warn!(worker_id, %session_id, "Audio task completed with no fan-in entry");
            return;
        };
        match result {
            Ok(_) => {
                entry.segments[task.seg_index] = Some(task.out_path.clone());
            }
            Err(err) => {
                error!(worker_id, %session_id, seg = task.seg_index, error = %err, "Segment render failed");
                entry.failed = true;
            }
        }
        entry.completed += 1;
        (entry.completed, entry.total)
    };

    if let Ok(Some(mut session)) = services.job_store.get(session_id).await {
        session.current_segment = Some(done);
        let _ = services.job_store.put(session).await;
    }

    publish_with_segment(services, session_id, SessionPhase::Rendering, "Segment rendered", done, total);

    if done == total {
        let _ = brain_tx.send(BrainMsg::Finalize(session_id)).await;
    }
}

async fn run_finalize(
    session_id: Uuid,
    services: &Arc<OrchestratorServices>,
    fan_in: &Arc<Mutex<HashMap<Uuid, FanInEntry>>>,
) -> anyhow::Result<()> {
    publish(services, session_id, SessionPhase::Finalizing, "Finalizing");

    let entry = fan_in.lock().unwrap().remove(&session_id);
    let Some(entry) = entry else {
        return Ok(());
    };

    if entry.failed {
        fail_session(services, session_id, "One or more segments failed to render").await;
        return Ok(());
    }

    let segments: Vec<PathBuf> = entry.segments.into_iter().flatten().collect();
    let session = services.job_store.get(session_id).await?;
    let Some(mut session) = session else {
        return Ok(());
    };
    let session_dir = session
        .session_dir
        .clone()
        .unwrap_or_else(|| segments[0].parent().unwrap().to_path_buf());

    let artifact_path = session_dir.join("set.wav");
    services.renderer.concat_segments(&segments, &artifact_path).await?;

    let tracklist_path = session_dir.join("tracklist.txt");
    let tracklist_text = render_tracklist(&entry.rows);
    tokio::fs::write(&tracklist_path, tracklist_text).await?;

    session.status = SessionStatus::Ready;
    session.phase = None;
    session.artifact_path = Some(artifact_path);
    session.tracklist_path = Some(tracklist_path);
    services.job_store.put(session).await?;

    publish(services, session_id, SessionPhase::Finalizing, "Set ready");
    info!(%session_id, "Session finalized");
    Ok(())
}

async fn fail_session(services: &Arc<OrchestratorServices>, session_id: Uuid, message: &str) {
    if let Ok(Some(mut session)) = services.job_store.get(session_id).await {
        session.status = SessionStatus::Failed;
        session.error = Some(message.to_string());
        let _ = services.job_store.put(session).await;
    }
    if let Err(err) = services.session_manager.delete_session_dir(session_id).await {
        warn!(%session_id, error = %err, "Failed to delete session directory after failure");
    }
    publish(services, session_id, SessionPhase::Finalizing, message);
}

fn publish(services: &Arc<OrchestratorServices>, session_id: Uuid, phase: SessionPhase, message: &str) {
    services.progress_bus.publish(ProgressEvent::new(session_id, phase, message));
}

fn publish_with_segment(
    services: &Arc<OrchestratorServices>,
    session_id: Uuid,
    phase: SessionPhase,
    message: &str,
    current: usize,
    total: usize,
) {
    services
        .progress_bus
        .publish(ProgressEvent::new(session_id, phase, message).with_segment(current, total));
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Render the human-readable tracklist format from §6.
fn render_tracklist(rows: &[Option<TracklistRow>]) -> String {
    let mut out = String::new();
    out.push_str("OPUS AI — Tracklist (Set completo)\n");
    out.push_str(&"=".repeat(60));
    out.push('\n');
    for row in rows.iter().flatten() {
        out.push('\n');
        out.push_str(&format!(
            "#{}  A: {}  →  B: {}\n",
            row.index + 1,
            row.a_name,
            row.b_name
        ));
        out.push_str(&format!(
            "  BPM A={:.1}  B={:.1}  |  Key A={} {:?}  B={} {:?}\n",
            row.a.bpm, row.b.bpm, row.a.key_tonic, row.a.key_scale, row.b.key_tonic, row.b.key_scale
        ));
        out.push_str(&format!("  Razón: {}\n", row.strategy.reasoning));
        out.push_str(&format!("  DJ: {}\n", row.strategy.dj_comment));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixcraft_common::harmonic::Scale;

    fn analysis(bpm: f64) -> SongAnalysis {
        SongAnalysis::new(
            "t.wav".into(), bpm, "C".into(), Scale::Major, 0, 0.9, vec![], 0.5, 180.0, None, None,
        )
    }

    #[test]
    fn tracklist_renders_one_block_per_row() {
        let mut strategy = MixStrategy::defaults();
        strategy.reasoning = "because".to_string();
        strategy.dj_comment = "smooth".to_string();
        let row = TracklistRow {
            index: 0,
            a_name: "one.wav".to_string(),
            b_name: "two.wav".to_string(),
            a: analysis(120.0),
            b: analysis(124.0),
            strategy,
        };
        let text = render_tracklist(&[Some(row)]);
        assert!(text.contains("#1  A: one.wav  →  B: two.wav"));
        assert!(text.contains("Razón: because"));
        assert!(text.contains("DJ: smooth"));
    }

    #[test]
    fn fan_in_entry_tracks_completion() {
        let mut entry = FanInEntry::new(3);
        assert_eq!(entry.completed, 0);
        entry.completed += 1;
        entry.segments[0] = Some(PathBuf::from("seg_0.wav"));
        assert_eq!(entry.completed, 1);
        assert_eq!(entry.total, 3);
    }
}

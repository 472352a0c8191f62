//! mixcraft-orchestrator — DJ Pipeline Orchestrator
//!
//! Accepts two tracks or a folder of tracks, analyzes and sequences them,
//! decides a mix strategy per transition, renders each segment and
//! concatenates the result into one continuous mixed set (§1).

use mixcraft_common::config::Config;
use mixcraft_orchestrator::services::admin_store::AdminConfigStore;
use mixcraft_orchestrator::services::analyzer::{AudioAnalyzer, ExternalAnalyzer};
use mixcraft_orchestrator::services::job_store::{InProcessStore, JobStateStore, RedisStore};
use mixcraft_orchestrator::services::orchestrator::{JobOrchestrator, OrchestratorServices};
use mixcraft_orchestrator::services::progress_bus::ProgressBus;
use mixcraft_orchestrator::services::renderer::{ExternalRenderer, Renderer};
use mixcraft_orchestrator::services::sample_library::SampleLibrary;
use mixcraft_orchestrator::services::session_manager::SessionManager;
use mixcraft_orchestrator::services::strategy_engine::{HttpLlmClient, LlmClient};
use mixcraft_orchestrator::{api, AppState};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Background reaper cadence; independent of `SESSION_TTL`, just how often
/// we look for expired entries (§4.9, §4.12).
const REAP_INTERVAL: Duration = Duration::from_secs(600);

/// Sample library rescan cadence (§4.4 supplement: notices deleted files).
const SAMPLE_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

const BRAIN_WORKERS: usize = 2;
const AUDIO_WORKERS: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixcraft_orchestrator=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!("Starting mixcraft-orchestrator");
    let config = Arc::new(Config::from_env());
    info!(session_root = %config.session_root.display(), "Configuration loaded");

    tokio::fs::create_dir_all(&config.session_root).await?;
    tokio::fs::create_dir_all(&config.samples_dir).await?;

    let session_manager = Arc::new(SessionManager::new(
        config.session_root.clone(),
        config.max_upload_mb,
    ));
    let progress_bus = Arc::new(ProgressBus::new());

    let redis_conn = match &config.distributed_store_url {
        Some(url) => match connect_redis(url).await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, "Failed to connect to distributed store; running single-instance");
                None
            }
        },
        None => None,
    };

    let job_store: Arc<dyn JobStateStore> = match &redis_conn {
        Some(conn) => Arc::new(RedisStore::new(conn.clone())),
        None => Arc::new(InProcessStore::new()),
    };

    let admin_store = Arc::new(
        AdminConfigStore::load(config.base_dir.join("admin_config.json"), redis_conn.clone())
            .await?,
    );

    let analyzer: Arc<dyn AudioAnalyzer> = Arc::new(ExternalAnalyzer::new(
        std::env::var("MIXCRAFT_ANALYZER_CMD").unwrap_or_else(|_| "mixcraft-analyze".to_string()),
    ));
    let renderer: Arc<dyn Renderer> = Arc::new(ExternalRenderer::new(
        std::env::var("MIXCRAFT_RENDER_CMD").unwrap_or_else(|_| "mixcraft-render".to_string()),
        std::env::var("MIXCRAFT_CONCAT_CMD").unwrap_or_else(|_| "mixcraft-concat".to_string()),
    ));

    let sample_library = Arc::new(SampleLibrary::new(config.samples_dir.clone(), analyzer.clone()));
    sample_library.refresh().await;
    if let Some(index_path) = &config.cloud_sample_index {
        match sample_library.load_cloud_index(index_path).await {
            Ok(()) => info!(path = %index_path.display(), "Cloud sample index loaded"),
            Err(e) => warn!(error = %e, path = %index_path.display(), "Failed to load cloud sample index"),
        }
    }

    let llm_client: Option<Arc<dyn LlmClient>> = config
        .llm_endpoint
        .clone()
        .map(|endpoint| -> Arc<dyn LlmClient> {
            Arc::new(HttpLlmClient::new(endpoint, config.llm_api_key.clone()))
        });

    let services = Arc::new(OrchestratorServices {
        analyzer,
        renderer,
        admin_store: admin_store.clone(),
        sample_library: sample_library.clone(),
        job_store: job_store.clone(),
        progress_bus: progress_bus.clone(),
        session_manager: session_manager.clone(),
        llm_client,
    });
    let orchestrator = Arc::new(JobOrchestrator::spawn(
        services.clone(),
        BRAIN_WORKERS,
        AUDIO_WORKERS,
    ));

    let app_state = AppState {
        config: config.clone(),
        session_manager: session_manager.clone(),
        job_store: job_store.clone(),
        progress_bus: progress_bus.clone(),
        admin_store,
        sample_library: sample_library.clone(),
        analyzer: services.analyzer.clone(),
        renderer: services.renderer.clone(),
        orchestrator,
    };

    spawn_background_reaper(
        config.session_root.clone(),
        job_store.clone(),
        session_manager.clone(),
        progress_bus.clone(),
    );
    spawn_sample_refresh(sample_library);

    let app = api::router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = std::env::var("MIXCRAFT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}

async fn connect_redis(url: &str) -> anyhow::Result<redis::aio::ConnectionManager> {
    let client = redis::Client::open(url)?;
    let conn = redis::aio::ConnectionManager::new(client).await?;
    info!("Connected to distributed store");
    Ok(conn)
}

/// Periodic background sweep (§4.9 supplement): reaps sessions whose Job
/// State Store entry has expired or which have no state record at all,
/// without waiting for an operator to hit `POST /cleanup`.
fn spawn_background_reaper(
    session_root: std::path::PathBuf,
    job_store: Arc<dyn JobStateStore>,
    session_manager: Arc<SessionManager>,
    progress_bus: Arc<ProgressBus>,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = reap_once(&session_root, &job_store, &session_manager, &progress_bus).await {
                warn!(error = %e, "Background reaper sweep failed");
            }
        }
    });
}

async fn reap_once(
    session_root: &std::path::Path,
    job_store: &Arc<dyn JobStateStore>,
    session_manager: &Arc<SessionManager>,
    progress_bus: &Arc<ProgressBus>,
) -> mixcraft_common::Result<()> {
    let expired: std::collections::HashSet<_> = job_store.expired_ids().await?.into_iter().collect();
    for id in &expired {
        job_store.delete(*id).await.ok();
        progress_bus.retire(*id);
    }

    let mut live_ids = std::collections::HashSet::new();
    let mut entries = match tokio::fs::read_dir(session_root).await {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        let Ok(id) = entry.file_name().to_string_lossy().parse::<uuid::Uuid>() else {
            continue;
        };
        if !expired.contains(&id) && job_store.get(id).await?.is_some() {
            live_ids.insert(id);
        }
    }

    let removed = session_manager.reap_abandoned(&live_ids).await?;
    if removed > 0 {
        info!(removed, "Background reaper swept abandoned sessions");
    }
    Ok(())
}

fn spawn_sample_refresh(sample_library: Arc<SampleLibrary>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SAMPLE_REFRESH_INTERVAL);
        loop {
            ticker.tick().await;
            sample_library.refresh().await;
            info!("Sample library catalog refreshed");
        }
    });
}

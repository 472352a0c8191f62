//! HTTP surface integration tests, against an in-process router with stub
//! adapters (no external analysis/render toolchain required).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use mixcraft_common::config::Config;
use mixcraft_orchestrator::services::admin_store::AdminConfigStore;
use mixcraft_orchestrator::services::analyzer::{AudioAnalyzer, StubAnalyzer};
use mixcraft_orchestrator::services::job_store::{InProcessStore, JobStateStore};
use mixcraft_orchestrator::services::orchestrator::{JobOrchestrator, OrchestratorServices};
use mixcraft_orchestrator::services::progress_bus::ProgressBus;
use mixcraft_orchestrator::services::renderer::{Renderer, StubRenderer};
use mixcraft_orchestrator::services::sample_library::SampleLibrary;
use mixcraft_orchestrator::services::session_manager::SessionManager;
use mixcraft_orchestrator::{api, AppState};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

struct TestApp {
    state: AppState,
    _dir: TempDir,
}

async fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let session_root = dir.path().join("sessions");
    let samples_dir = dir.path().join("samples");

    let config = Arc::new(Config {
        base_dir: dir.path().to_path_buf(),
        session_root: session_root.clone(),
        samples_dir: samples_dir.clone(),
        distributed_store_url: None,
        llm_endpoint: None,
        llm_api_key: None,
        default_sample_rate: 44_100,
        max_upload_mb: 200,
        cloud_sample_index: None,
    });

    let session_manager = Arc::new(SessionManager::new(session_root, config.max_upload_mb));
    let progress_bus = Arc::new(ProgressBus::new());
    let job_store: Arc<dyn JobStateStore> = Arc::new(InProcessStore::new());
    let admin_store = Arc::new(
        AdminConfigStore::load(dir.path().join("admin_config.json"), None)
            .await
            .unwrap(),
    );
    let analyzer: Arc<dyn AudioAnalyzer> = Arc::new(StubAnalyzer::default());
    let renderer: Arc<dyn Renderer> = Arc::new(StubRenderer::default());
    let sample_library = Arc::new(SampleLibrary::new(samples_dir, analyzer.clone()));

    let services = Arc::new(OrchestratorServices {
        analyzer: analyzer.clone(),
        renderer: renderer.clone(),
        admin_store: admin_store.clone(),
        sample_library: sample_library.clone(),
        job_store: job_store.clone(),
        progress_bus: progress_bus.clone(),
        session_manager: session_manager.clone(),
        llm_client: None,
    });
    let orchestrator = Arc::new(JobOrchestrator::spawn(services, 1, 2));

    let state = AppState {
        config,
        session_manager,
        job_store,
        progress_bus,
        admin_store,
        sample_library,
        analyzer,
        renderer,
        orchestrator,
    };

    TestApp { state, _dir: dir }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_app().await;
    let router = api::router(app.state);

    let response = router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn unknown_session_status_is_404() {
    let app = test_app().await;
    let router = api::router(app.state);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/generate/{}/status", Uuid::nil()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn two_track_pipeline_reaches_ready() {
    let app = test_app().await;
    let router = api::router(app.state);

    let create_resp = router
        .clone()
        .oneshot(Request::builder().method("POST").uri("/session").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(create_resp.status(), StatusCode::OK);
    let session_id = body_json(create_resp).await["session_id"].as_str().unwrap().to_string();

    for label in ["a", "b"] {
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/upload/{session_id}/{label}"))
                    .body(Body::from(b"RIFFxxxxWAVEfmt ".to_vec()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "upload {label} should succeed");
    }

    let generate_resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/generate/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(generate_resp.status(), StatusCode::OK);

    let mut status = String::new();
    for _ in 0..50 {
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/generate/{session_id}/status"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(resp).await;
        status = json["status"].as_str().unwrap().to_string();
        if status == "ready" || status == "failed" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(status, "ready", "pipeline should reach Ready with stub adapters");
}

#[tokio::test]
async fn admin_config_get_and_patch_round_trip() {
    let app = test_app().await;
    let router = api::router(app.state);

    let get_resp = router
        .clone()
        .oneshot(Request::builder().uri("/admin/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(get_resp.status(), StatusCode::OK);
    let before = body_json(get_resp).await;
    assert_eq!(before["default_bars"], 32);

    let patch_resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/config")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"mix_sensitivity": 0.9}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(patch_resp.status(), StatusCode::OK);
    let after = body_json(patch_resp).await;
    assert_eq!(after["mix_sensitivity"], 0.9);
}

#[tokio::test]
async fn apply_unknown_preset_is_404() {
    let app = test_app().await;
    let router = api::router(app.state);

    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/config/presets/does-not-exist/apply")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

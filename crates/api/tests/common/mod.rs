//! Shared helpers for API integration tests.
//!
//! Builds a full application stack (artifact store in a temp directory,
//! cache, queue with a scripted stub producer, completion coordinator)
//! behind the same router and middleware the production binary uses.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use tower::ServiceExt;

use mediavault_api::config::ServerConfig;
use mediavault_api::router::build_app_router;
use mediavault_api::state::AppState;
use mediavault_cache::{ArtifactStore, CacheStore};
use mediavault_events::JobEventBus;
use mediavault_queue::{CompletionCoordinator, JobQueue, Producer, ProducerError, ResultTracker};

// ---------------------------------------------------------------------------
// Stub producer
// ---------------------------------------------------------------------------

/// What the stub producer does for one invocation.
#[derive(Clone)]
pub enum StubBehavior {
    /// Write `video.mp4` into the output directory and succeed.
    Succeed,
    /// Fail with an execution error carrying this stderr text.
    Fail(String),
    /// Exit successfully without writing anything.
    ProduceNothing,
}

/// In-process stand-in for the external downloader.
pub struct StubProducer {
    behavior: StubBehavior,
}

#[async_trait::async_trait]
impl Producer for StubProducer {
    async fn execute(
        &self,
        _identifier: &str,
        output_dir: &Path,
        _timeout: Duration,
    ) -> Result<(), ProducerError> {
        match &self.behavior {
            StubBehavior::Succeed => {
                std::fs::write(output_dir.join("video.mp4"), b"test-bytes")?;
                Ok(())
            }
            StubBehavior::Fail(stderr) => Err(ProducerError::ExecutionFailed {
                exit_code: 1,
                stderr: stderr.clone(),
            }),
            StubBehavior::ProduceNothing => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A fully wired application plus handles to its shared stores.
pub struct TestHarness {
    pub app: Router,
    pub state: AppState,
    _tmp: tempfile::TempDir,
}

/// Build a test `ServerConfig` rooted at `artifact_root`.
pub fn test_config(artifact_root: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        artifact_root,
        cache_ttl_secs: 3600,
        worker_concurrency: 2,
        producer_command: "unused".to_string(),
        producer_args: vec![],
        producer_timeout_secs: 5,
        result_retention_secs: 3600,
        public_base_url: "http://localhost:3000".to_string(),
        janitor_interval_secs: 60,
    }
}

/// Build the application with the given stub behavior.
///
/// Mirrors the wiring in `main.rs` (minus the janitor, which tests drive
/// directly) so integration tests exercise the same middleware stack and
/// completion path that production uses.
pub fn build_test_app(behavior: StubBehavior) -> TestHarness {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = test_config(tmp.path().join("artifacts"));

    let artifacts =
        Arc::new(ArtifactStore::new(&config.artifact_root).expect("artifact root"));
    let cache = Arc::new(CacheStore::new(Arc::clone(&artifacts)));
    let tracker = Arc::new(ResultTracker::new());
    let bus = Arc::new(JobEventBus::default());

    let coordinator = CompletionCoordinator::new(
        Arc::clone(&tracker),
        Arc::clone(&cache),
        Arc::clone(&artifacts),
        config.cache_ttl_secs,
    );
    tokio::spawn(coordinator.run(bus.subscribe()));

    let queue = JobQueue::start(
        config.worker_concurrency,
        config.producer_timeout(),
        Arc::clone(&artifacts),
        Arc::new(StubProducer { behavior }),
        Arc::clone(&bus),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        cache,
        artifacts,
        queue,
        tracker,
    };

    let app = build_app_router(state.clone(), &config);

    TestHarness {
        app,
        state,
        _tmp: tmp,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request and return the response.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a DELETE request and return the response.
pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll GET /jobs/{id} until the recorded outcome is visible.
///
/// Terminal state alone is not enough: the queue flips the job to
/// completed/failed before the coordinator records the outcome, so wait
/// for the detail fields (files or error) the outcome carries.
pub async fn await_terminal_status(harness: &TestHarness, job_id: &str) -> serde_json::Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let response = get(harness.app.clone(), &format!("/api/v1/jobs/{job_id}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            let status = json["data"]["status"].as_str().unwrap();
            let outcome_visible = match status {
                "completed" => !json["data"]["files"].is_null(),
                "failed" => !json["data"]["error"].is_null(),
                _ => false,
            };
            if outcome_visible {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job should reach a terminal state")
}

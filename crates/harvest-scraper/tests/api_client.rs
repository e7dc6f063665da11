//! `ApiClient` against a wiremock backend, plus one batch run end to end
//! through the real client.

mod support;

use std::sync::Arc;
use std::time::Duration;

use harvest_core::ProfileRecord;
use harvest_scraper::{
    ApiClient, ApiClientError, BatchJob, CancelFlag, CreateOutcome, Orchestrator, OutcomeKind,
    ProfileSink, TabController,
};
use serde_json::json;
use support::ScriptedBrowser;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri(), Duration::from_secs(5)).expect("failed to build test client")
}

fn record(slug: &str) -> ProfileRecord {
    ProfileRecord {
        name: format!("Person {slug}"),
        url: format!("https://linkedin.com/in/{slug}"),
        bio_line: Some("Engineer".to_string()),
        ..ProfileRecord::default()
    }
}

#[tokio::test]
async fn created_response_yields_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profiles"))
        .and(body_partial_json(json!({"name": "Person a", "bioLine": "Engineer"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": 17, "name": "Person a", "url": "https://linkedin.com/in/a"},
            "meta": {"request_id": "r1", "timestamp": "2026-01-01T00:00:00Z"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server).create_profile(&record("a")).await;
    assert_eq!(outcome, CreateOutcome::Created { id: 17 });
}

async fn mount_protected_backend(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/profiles"))
        .and(header("authorization", "Bearer scraper-key"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": 21},
            "meta": {"request_id": "r6", "timestamp": "2026-01-01T00:00:00Z"}
        })))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/profiles"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": "unauthorized", "message": "missing or invalid bearer token"},
            "meta": {"request_id": "r7", "timestamp": "2026-01-01T00:00:00Z"}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn configured_api_key_is_sent_as_bearer_token() {
    let server = MockServer::start().await;
    mount_protected_backend(&server).await;

    let outcome = client(&server)
        .with_api_key(Some("scraper-key"))
        .create_profile(&record("k"))
        .await;
    assert_eq!(outcome, CreateOutcome::Created { id: 21 });
}

#[tokio::test]
async fn missing_api_key_is_rejected_by_protected_backend() {
    let server = MockServer::start().await;
    mount_protected_backend(&server).await;

    for client in [client(&server), client(&server).with_api_key(Some("  "))] {
        let outcome = client.create_profile(&record("k")).await;
        assert_eq!(
            outcome,
            CreateOutcome::Error {
                message: "missing or invalid bearer token".to_string(),
                network: false,
            }
        );
    }
}

#[tokio::test]
async fn conflict_yields_duplicate_with_existing_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profiles"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "code": "conflict",
                "message": "a profile with this url already exists",
                "existing_id": 5
            },
            "meta": {"request_id": "r2", "timestamp": "2026-01-01T00:00:00Z"}
        })))
        .mount(&server)
        .await;

    let outcome = client(&server).create_profile(&record("b")).await;
    assert_eq!(
        outcome,
        CreateOutcome::Duplicate {
            existing_id: Some(5),
            message: "a profile with this url already exists".to_string(),
        }
    );
}

#[tokio::test]
async fn validation_error_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profiles"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "validation_error", "message": "name is required", "field": "name"},
            "meta": {"request_id": "r3", "timestamp": "2026-01-01T00:00:00Z"}
        })))
        .mount(&server)
        .await;

    let outcome = client(&server).create_profile(&record("c")).await;
    assert_eq!(
        outcome,
        CreateOutcome::Error {
            message: "name is required".to_string(),
            network: false,
        }
    );
}

#[tokio::test]
async fn server_error_without_body_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let outcome = client(&server).create_profile(&record("d")).await;
    assert_eq!(
        outcome,
        CreateOutcome::Error {
            message: "HTTP 502".to_string(),
            network: false,
        }
    );
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let client = ApiClient::new(&uri, Duration::from_secs(2)).unwrap();
    let outcome = client.create_profile(&record("e")).await;
    assert!(
        matches!(outcome, CreateOutcome::Error { network: true, .. }),
        "got {outcome:?}"
    );
    assert!(!client.check_connection().await.online);
}

#[tokio::test]
async fn health_reads_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"status": "ok", "version": "0.1.0", "uptime_secs": 12},
            "meta": {"request_id": "r4", "timestamp": "2026-01-01T00:00:00Z"}
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let report = client.health().await.unwrap();
    assert_eq!(report.status, "ok");
    assert_eq!(report.uptime_secs, Some(12));

    let connection = client.check_connection().await;
    assert!(connection.online);
    assert!(connection.message.contains("0.1.0"));
}

#[tokio::test]
async fn unhealthy_backend_is_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client(&server).health().await.unwrap_err();
    assert!(
        matches!(err, ApiClientError::UnexpectedStatus { status: 503, .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn batch_posts_each_profile_to_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profiles"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": 1},
            "meta": {"request_id": "r5", "timestamp": "2026-01-01T00:00:00Z"}
        })))
        .expect(3)
        .mount(&server)
        .await;

    let browser = Arc::new(ScriptedBrowser::new());
    let orchestrator = Orchestrator::new(
        TabController::new(Arc::clone(&browser), support::instant_timing()),
        Arc::new(client(&server)),
        support::instant_options(),
    );
    let job = BatchJob::new(&support::profile_urls(&["a", "b", "c"]), CancelFlag::default())
        .unwrap();

    let summary = orchestrator.run(job, |_| {}).await;
    assert_eq!(summary.success, 3);
    assert!(summary.outcomes.iter().all(|o| o.kind == OutcomeKind::Created));
}

mod support;

use pacer_common::TargetConfig;
use pacer_load::api::client::media_type;
use pacer_load::api::{ApiClient, ApiError, ApiRequest};
use pacer_load::suite::{HttpOperation, RequestTemplate};
use pacer_load::{PacedDispatcher, StepPlan};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn target(base_url: &str) -> TargetConfig {
    TargetConfig {
        base_url: base_url.to_string(),
        request_timeout_ms: Some(5_000),
        ..TargetConfig::default()
    }
}

#[test]
fn media_type_drops_parameters() {
    assert_eq!(media_type("application/json; charset=utf-8"), "application/json");
    assert_eq!(media_type(" Application/JSON "), "application/json");
    assert_eq!(media_type("text/plain"), "text/plain");
}

#[test]
fn base_url_must_be_http() {
    match ApiClient::new(&target("localhost:7170")) {
        Err(ApiError::InvalidBaseUrl(url)) => assert_eq!(url, "localhost:7170"),
        other => panic!("expected InvalidBaseUrl, got {:?}", other),
    }
}

#[test]
fn urls_join_without_double_slashes() {
    let client = ApiClient::new(&target("http://127.0.0.1:7170/")).unwrap();
    assert_eq!(client.base_url(), "http://127.0.0.1:7170");
    assert_eq!(client.url("/gamedata"), "http://127.0.0.1:7170/gamedata");
    assert_eq!(client.url("gamedata/1"), "http://127.0.0.1:7170/gamedata/1");
}

#[tokio::test]
async fn probe_accepts_available_api() {
    let base = support::spawn_game_api().await;
    let client = ApiClient::new(&target(&base)).unwrap();
    client.probe().await.expect("probe should pass");
}

#[tokio::test]
async fn probe_rejects_non_ok_status() {
    let base = support::spawn_game_api().await;
    let config = TargetConfig {
        probe_path: "/down".to_string(),
        ..target(&base)
    };
    let client = ApiClient::new(&config).unwrap();

    match client.probe().await {
        Err(ApiError::ProbeStatus { url, status }) => {
            assert_eq!(status, 503);
            assert!(url.ends_with("/down"));
        }
        other => panic!("expected ProbeStatus, got {:?}", other),
    }
}

#[tokio::test]
async fn probe_reports_unreachable_api() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ApiClient::new(&target(&format!("http://127.0.0.1:{}", port))).unwrap();

    let err = client.probe().await.unwrap_err();
    assert!(matches!(err, ApiError::ProbeTransport { .. }), "{:?}", err);
}

#[tokio::test]
async fn execute_captures_status_media_type_and_body() {
    let base = support::spawn_game_api().await;
    let client = ApiClient::new(&target(&base)).unwrap();

    let listed = client.execute(&ApiRequest::get("/gamedata")).await.unwrap();
    assert_eq!(listed.status, 200);
    assert_eq!(listed.content_type.as_deref(), Some("application/json"));
    assert!(listed.body.starts_with('['));

    let missing = client
        .execute(&ApiRequest::delete("/gamedata/000582cf-x-4855-9f5e-54d3be5443cb"))
        .await
        .unwrap();
    assert_eq!(missing.status, 404);
    assert_eq!(missing.content_type, None);

    let created = client
        .execute(&ApiRequest::post(
            "/gamedata",
            serde_json::json!({"gameName": "Chinchon", "category": "Card Game", "totalBets": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(created.status, 201);
    assert!(created.body.contains("Chinchon"));
}

#[tokio::test]
async fn send_gives_up_when_cancelled() {
    let base = support::spawn_game_api().await;
    let client = ApiClient::new(&target(&base)).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client
        .send(&ApiRequest::get("/slow"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "request cancelled");
}

#[tokio::test]
async fn http_operation_runs_through_the_dispatcher() {
    let base = support::spawn_game_api().await;
    let client = ApiClient::new(&target(&base)).unwrap();
    let ids = support::KNOWN_IDS.iter().map(|id| id.to_string()).collect();
    let op = HttpOperation::new(client, RequestTemplate::GetById(ids));

    let report = PacedDispatcher::new()
        .with_step_interval(Duration::from_millis(20))
        .run(&StepPlan::new(vec![3, 5]), op)
        .await;

    assert_eq!(report.len(), 8);
    assert_eq!(report.success_count(), 8);
    assert!(report.successes().all(|r| r.status == 200));
}

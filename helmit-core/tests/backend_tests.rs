//! Backend Integration Tests
//!
//! Each test starts a stub backend on an ephemeral port and drives the real
//! client and session against it.

use axum::extract::{Json, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use helmit_core::client::{ClientError, ClientOptions, Endpoint, EndpointLayout, RiskClient};
use helmit_core::classify::{render_analysis, Category, LabelSelection, PREDICTION_FAILED_TEXT};
use helmit_core::session::{Action, Sender, Session, SessionError, SessionSettings};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub backend");
    let addr = listener.local_addr().expect("stub backend has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub backend crashed");
    });
    format!("http://{}", addr)
}

fn client_for(base_url: &str, layout: EndpointLayout) -> RiskClient {
    RiskClient::new(ClientOptions {
        base_url: base_url.to_string(),
        layout,
        timeout: Duration::from_secs(5),
    })
    .expect("failed to build client")
}

fn session_for(base_url: &str) -> Session {
    Session::new(
        client_for(base_url, EndpointLayout::Api),
        SessionSettings::default(),
    )
}

async fn predict_handler(Json(body): Json<Value>) -> impl IntoResponse {
    let text = body["messages"][0]["text"].as_str().unwrap_or_default();
    let sender = body["messages"][0]["sender"].as_str().unwrap_or_default();
    assert_eq!(sender, "self", "client must mark messages as sent by self");

    if text.contains("hurt myself") {
        Json(json!({
            "id": 1,
            "summary": {
                "agg_label_scores": {"self_harm": 0.75, "harassment": 0.05},
                "risk": {"level": "high", "score": 0.82}
            },
            "per_message": [{"sender": "self", "text": text, "labels": {"self_harm": 0.75}}]
        }))
    } else {
        Json(json!({
            "summary": {
                "agg_label_scores": {"harassment": 0.02},
                "risk": {"level": "low", "score": 0.03}
            },
            "per_message": []
        }))
    }
}

async fn privacy_handler(Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default();
    if text.contains("password:") {
        Json(json!({"flagged": true, "type": "Password", "category": "privacy"}))
    } else {
        Json(json!({"flagged": false}))
    }
}

#[tokio::test]
async fn test_classify_high_risk_message() {
    let base = spawn_backend(Router::new().route("/api/predict", post(predict_handler))).await;
    let client = client_for(&base, EndpointLayout::Api);

    let summary = client
        .classify("I want to hurt myself")
        .await
        .expect("classify should succeed");
    assert_eq!(summary.level, "high");
    assert_eq!(summary.score_percent(), 82);

    let text = render_analysis(&summary, &LabelSelection::default());
    assert!(text.contains("RISK LEVEL HIGH (Score: 82%)"), "{}", text);
    assert!(text.contains("Self-Harm: 75%"), "{}", text);
    assert!(!text.contains("Harassment"), "{}", text);
}

#[tokio::test]
async fn test_legacy_layout_routes() {
    let router = Router::new()
        .route("/predict", post(predict_handler))
        .route("/privacy/scan", post(privacy_handler))
        .route(
            "/forecast",
            get(|| async { Json(json!({"forecast": [], "daily_risk_pct": []})) }),
        );
    let base = spawn_backend(router).await;
    let client = client_for(&base, EndpointLayout::Legacy);

    assert!(client.classify("hello").await.is_ok());
    assert!(client.check_privacy("hello").await.is_ok());
    assert!(client.forecast(3).await.is_ok());
}

#[tokio::test]
async fn test_forecast_sends_days_query() {
    let router = Router::new().route(
        "/api/forecast",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            let days: u32 = params
                .get("days")
                .and_then(|d| d.parse().ok())
                .unwrap_or(0);
            let forecast: Vec<Value> = (1..=days)
                .map(|step| json!({"step": step, "score": 0.5, "risk_level": "medium"}))
                .collect();
            let pct: Vec<u32> = (1..=days).map(|_| 50).collect();
            Json(json!({"forecast": forecast, "daily_risk_pct": pct}))
        }),
    );
    let base = spawn_backend(router).await;
    let client = client_for(&base, EndpointLayout::Api);

    let forecast = client.forecast(5).await.expect("forecast should succeed");
    assert_eq!(forecast.forecast.len(), 5);
    assert_eq!(forecast.daily_risk_pct, vec![50; 5]);
    let steps: Vec<u32> = forecast.forecast.iter().map(|f| f.step).collect();
    assert_eq!(steps, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_http_error_status() {
    let router = Router::new().route(
        "/api/stats",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = spawn_backend(router).await;
    let client = client_for(&base, EndpointLayout::Api);

    match client.stats().await {
        Err(ClientError::Http {
            endpoint,
            status,
            body,
        }) => {
            assert_eq!(endpoint, Endpoint::Stats);
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let router = Router::new().route(
        "/api/stats",
        get(|| async { (StatusCode::OK, "not json") }),
    );
    let base = spawn_backend(router).await;
    let client = client_for(&base, EndpointLayout::Api);

    assert!(matches!(
        client.stats().await,
        Err(ClientError::Parse {
            endpoint: Endpoint::Stats,
            ..
        })
    ));
}

#[tokio::test]
async fn test_wrong_shape_is_rejected() {
    let router = Router::new().route(
        "/api/stats",
        get(|| async { Json(json!({"risk_level_distribution": "lots"})) }),
    );
    let base = spawn_backend(router).await;
    let client = client_for(&base, EndpointLayout::Api);

    assert!(matches!(client.stats().await, Err(ClientError::Parse { .. })));
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}", addr), EndpointLayout::Api);
    assert!(matches!(
        client.stats().await,
        Err(ClientError::Network { .. })
    ));
}

#[tokio::test]
async fn test_request_timeout() {
    let router = Router::new().route(
        "/api/stats",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({}))
        }),
    );
    let base = spawn_backend(router).await;
    let client = RiskClient::new(ClientOptions {
        base_url: base,
        layout: EndpointLayout::Api,
        timeout: Duration::from_millis(200),
    })
    .unwrap();

    let err = client.stats().await.expect_err("request should time out");
    assert!(err.is_timeout(), "expected timeout, got {:?}", err);
}

#[tokio::test]
async fn test_failed_stats_keeps_previous_snapshot() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/stats",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    // Raw body: `json!` would sort the distribution keys
                    (
                        [(header::CONTENT_TYPE, "application/json")],
                        r#"{"total_predictions": 8,
                            "risk_level_distribution": {"low": 5, "medium": 2, "high": 1}}"#,
                    )
                        .into_response()
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "db down").into_response()
                }
            }),
        )
        .with_state(hits);
    let base = spawn_backend(router).await;
    let session = session_for(&base);

    session.refresh_stats().await.expect("first fetch should succeed");
    let before = session.stats().expect("stats should be stored");

    let err = session.refresh_stats().await.expect_err("second fetch should fail");
    assert!(matches!(
        err,
        SessionError::Client(ClientError::Http { status: 500, .. })
    ));
    assert_eq!(session.stats(), Some(before));

    let series = session.stats_series().unwrap();
    let names: Vec<&str> = series.distribution.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Low", "Medium", "High"]);
    assert!(!session.is_busy(Action::Stats));
}

#[tokio::test]
async fn test_send_message_appends_analysis() {
    let base = spawn_backend(Router::new().route("/api/predict", post(predict_handler))).await;
    let session = session_for(&base);

    let reply = session
        .send_message("I want to hurt myself")
        .await
        .expect("send should succeed");
    assert_eq!(reply.sender, Sender::Other);
    assert_eq!(reply.category, Some(Category::SelfHarm));

    let log = session.messages();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].sender, Sender::User);
    assert_eq!(log[0].text, "I want to hurt myself");
    assert_eq!(log[1], reply);
}

#[tokio::test]
async fn test_prediction_failure_becomes_chat_entry() {
    let router = Router::new().route(
        "/api/predict",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = spawn_backend(router).await;
    let session = session_for(&base);

    let reply = session.send_message("hello").await.expect("send never fails on backend errors");
    assert_eq!(reply.text, PREDICTION_FAILED_TEXT);
    assert!(reply.category.is_none());
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn test_privacy_alert_blocks_until_confirmed() {
    let router = Router::new()
        .route("/api/predict", post(predict_handler))
        .route("/api/privacy/check", post(privacy_handler));
    let base = spawn_backend(router).await;
    let session = session_for(&base);

    let draft = "my password: hunter2";
    let finding = session.check_draft(draft).await.unwrap();
    assert_eq!(finding.and_then(|f| f.kind).as_deref(), Some("Password"));

    match session.send_message(draft).await {
        Err(SessionError::PrivacyBlocked(kind)) => assert_eq!(kind, "Password"),
        other => panic!("expected privacy block, got {:?}", other),
    }
    assert!(session.messages().is_empty());

    session.confirm_privacy_alert();
    assert!(session.send_message(draft).await.is_ok());
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn test_clean_draft_clears_alert() {
    let router = Router::new().route("/api/privacy/check", post(privacy_handler));
    let base = spawn_backend(router).await;
    let session = session_for(&base);

    session.check_draft("password: x").await.unwrap();
    assert!(session.privacy_alert().is_some());
    assert!(session.check_draft("hi there").await.unwrap().is_none());
    assert!(session.privacy_alert().is_none());

    session.check_draft("password: x").await.unwrap();
    assert!(session.check_draft("   ").await.unwrap().is_none());
    assert!(session.privacy_alert().is_none());
}

#[tokio::test]
async fn test_concurrent_same_action_is_rejected() {
    let router = Router::new().route(
        "/api/forecast",
        get(|| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Json(json!({"forecast": [{"step": 1, "score": 0.1, "risk_level": "safe"}]}))
        }),
    );
    let base = spawn_backend(router).await;
    let session = session_for(&base);

    let (first, second) = tokio::join!(session.refresh_forecast(), session.refresh_forecast());
    assert!(first.is_ok());
    assert!(matches!(second, Err(SessionError::Busy(Action::Forecast))));
    assert!(session.forecast().is_some());

    // Guard released once the first request completed
    assert!(session.refresh_forecast().await.is_ok());
}

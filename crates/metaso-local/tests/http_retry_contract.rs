use axum::{
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use metaso_core::{Error, StatusClass};
use metaso_local::{MetasoHttpClient, Sleep};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KEY: &str = "mk-0123456789ABCDEFGHIJKLMNOPQRSTUV";

#[derive(Default)]
struct RecordingSleep(Mutex<Vec<Duration>>);

#[async_trait::async_trait]
impl Sleep for RecordingSleep {
    async fn sleep(&self, delay: Duration) {
        self.0.lock().unwrap().push(delay);
    }
}

impl RecordingSleep {
    fn delays(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

/// Answers with `statuses[n]` on the n-th call (200 once the script runs out).
#[derive(Default)]
struct Script {
    statuses: Vec<u16>,
    calls: AtomicUsize,
    last_headers: Mutex<Option<HeaderMap>>,
    last_body: Mutex<Option<String>>,
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn scripted(script: Arc<Script>, content_type: &'static str, ok_body: &'static str) -> Router {
    let handler = move |headers: HeaderMap, body: String| {
        let s = script.clone();
        async move {
            let n = s.calls.fetch_add(1, Ordering::SeqCst);
            *s.last_headers.lock().unwrap() = Some(headers);
            *s.last_body.lock().unwrap() = Some(body);
            let code = s.statuses.get(n).copied().unwrap_or(200);
            let status = StatusCode::from_u16(code).unwrap();
            let body = if status.is_success() { ok_body } else { "upstream says no" };
            (status, [(header::CONTENT_TYPE, content_type)], body)
        }
    };
    Router::new()
        .route("/api/v1/search", post(handler.clone()))
        .route("/api/v1/reader", post(handler))
}

fn client(addr: SocketAddr, sleep: Arc<RecordingSleep>) -> MetasoHttpClient {
    let cfg = metaso_core::Config::new(
        Some(KEY.to_string()),
        Some(format!("http://{addr}")),
        Some(5_000),
        true,
    )
    .unwrap();
    MetasoHttpClient::new(cfg).unwrap().with_sleep(sleep)
}

fn script(statuses: &[u16]) -> Arc<Script> {
    Arc::new(Script {
        statuses: statuses.to_vec(),
        ..Default::default()
    })
}

#[tokio::test]
async fn two_503s_then_success_waits_one_then_two_seconds() {
    let s = script(&[503, 503, 200]);
    let addr = serve(scripted(s.clone(), "application/json", r#"{"results":[]}"#)).await;
    let sleep = Arc::new(RecordingSleep::default());
    let c = client(addr, sleep.clone());

    let v = c
        .post("/api/v1/search", &json!({"q": "x"}), "application/json")
        .await
        .expect("third attempt succeeds");
    assert_eq!(v, json!({"results": []}));
    assert_eq!(s.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        sleep.delays(),
        vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
    );
}

#[tokio::test]
async fn not_found_fails_immediately() {
    let s = script(&[404]);
    let addr = serve(scripted(s.clone(), "application/json", "{}")).await;
    let sleep = Arc::new(RecordingSleep::default());
    let c = client(addr, sleep.clone());

    let err = c
        .post("/api/v1/search", &json!({"q": "x"}), "application/json")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.to_string(), "HTTP 404: Not Found");
    assert_eq!(s.calls.load(Ordering::SeqCst), 1);
    assert!(sleep.delays().is_empty());
}

#[tokio::test]
async fn unauthorized_is_classified_and_not_retried() {
    let s = script(&[401]);
    let addr = serve(scripted(s.clone(), "application/json", "{}")).await;
    let sleep = Arc::new(RecordingSleep::default());
    let c = client(addr, sleep.clone());

    let err = c
        .post("/api/v1/search", &json!({}), "application/json")
        .await
        .unwrap_err();
    match &err {
        Error::Status(se) => assert_eq!(se.class, StatusClass::Authentication),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(s.calls.load(Ordering::SeqCst), 1);
    assert!(sleep.delays().is_empty());
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let s = script(&[429]);
    let addr = serve(scripted(s.clone(), "application/json", r#"{"ok":true}"#)).await;
    let sleep = Arc::new(RecordingSleep::default());
    let c = client(addr, sleep.clone());

    let v = c
        .post("/api/v1/search", &json!({}), "application/json")
        .await
        .unwrap();
    assert_eq!(v, json!({"ok": true}));
    assert_eq!(sleep.delays(), vec![Duration::from_millis(1_000)]);
}

#[tokio::test]
async fn persistent_server_error_returns_last_error_after_three_attempts() {
    let s = script(&[500, 500, 500]);
    let addr = serve(scripted(s.clone(), "application/json", "{}")).await;
    let sleep = Arc::new(RecordingSleep::default());
    let c = client(addr, sleep.clone());

    let err = c
        .post("/api/v1/search", &json!({}), "application/json")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Internal server error. Please try again later.");
    assert_eq!(s.calls.load(Ordering::SeqCst), 3);
    assert_eq!(sleep.delays().len(), 2);
}

#[tokio::test]
async fn sends_bearer_auth_accept_and_json_body() {
    let s = script(&[]);
    let addr = serve(scripted(s.clone(), "text/plain", "# Page\n\ntext")).await;
    let sleep = Arc::new(RecordingSleep::default());
    let c = client(addr, sleep);

    let v = c
        .post(
            "/api/v1/reader",
            &json!({"url": "https://example.com"}),
            "text/plain",
        )
        .await
        .unwrap();
    assert_eq!(v, json!("# Page\n\ntext"));

    let headers = s.last_headers.lock().unwrap().clone().unwrap();
    assert_eq!(
        headers.get(header::AUTHORIZATION).unwrap().to_str().unwrap(),
        format!("Bearer {KEY}")
    );
    assert_eq!(headers.get(header::ACCEPT).unwrap(), "text/plain");
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    let body: serde_json::Value =
        serde_json::from_str(s.last_body.lock().unwrap().as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({"url": "https://example.com"}));
}

#[tokio::test]
async fn unreachable_upstream_is_a_network_error_and_is_retried() {
    // Grab a free port, then close it so connections are refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sleep = Arc::new(RecordingSleep::default());
    let c = client(addr, sleep.clone());
    let err = c
        .post("/api/v1/search", &json!({}), "application/json")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Network(_)), "{err:?}");
    assert_eq!(
        sleep.delays(),
        vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
    );
}

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use pushbullet_sdk::api::{
    ApiClient, ApiClientOptions, ApiError, Ephemeral, FileUpload, OctetStreamDetector,
    PushBuilder, PushQuery, PushTarget,
};
use pushbullet_sdk::stream::{StreamClient, StreamEvent, StreamSession};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;

const TEST_API_KEY: &str = "o.test-api-key";

#[derive(Clone, Default)]
struct Recorder {
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

impl Recorder {
    async fn record(&self, headers: HeaderMap, body: Value) {
        self.requests.lock().await.push((headers, body));
    }

    async fn take(&self) -> Vec<(HeaderMap, Value)> {
        std::mem::take(&mut *self.requests.lock().await)
    }
}

fn client_for(addr: SocketAddr) -> ApiClient {
    let options = ApiClientOptions {
        base_url: format!("http://{addr}/v2"),
        ..ApiClientOptions::default()
    };
    ApiClient::with_options(SecretString::new(TEST_API_KEY.to_string()), options)
        .expect("build api client")
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn create_push_sends_credential_and_typed_body() {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/v2/pushes", post(create_push_handler))
        .with_state(recorder.clone());
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let push = PushBuilder::note("Hi", "there")
        .email("friend@example.com")
        .build()
        .expect("valid note");
    let created = client_for(addr)
        .create_push(&push)
        .await
        .expect("create push");
    assert_eq!(created.iden, "ujpah72o0");
    assert!(created.is_created());

    let requests = recorder.take().await;
    assert_eq!(requests.len(), 1);
    let (headers, body) = &requests[0];
    assert_eq!(header(headers, "access-token"), Some(TEST_API_KEY));
    assert!(header(headers, "user-agent").is_some_and(|ua| ua.starts_with("pushbullet-sdk-rust/")));
    assert_eq!(
        body,
        &json!({"type": "note", "title": "Hi", "body": "there", "email": "friend@example.com"})
    );

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock http server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn list_pushes_follows_cursor_chain() {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/v2/pushes", get(paged_pushes_handler))
        .with_state(recorder.clone());
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let pushes = client_for(addr)
        .list_pushes(&PushQuery::modified_after(100.0))
        .await
        .expect("list pushes");
    let idens: Vec<&str> = pushes.iter().map(|push| push.iden.as_str()).collect();
    assert_eq!(idens, vec!["p3", "p2", "p1"]);

    let requests = recorder.take().await;
    assert_eq!(requests.len(), 2);
    for (_, query) in &requests {
        assert_eq!(query["modified_after"].as_str().map(str::parse::<f64>), Some(Ok(100.0)));
    }

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock http server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_success_statuses_map_to_error_variants() {
    let app = Router::new().route("/v2/devices/:iden", get(status_handler));
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;
    let client = client_for(addr);

    let err = client.get_device("auth").await.expect_err("401");
    assert!(matches!(err, ApiError::Auth { status, .. } if status == StatusCode::UNAUTHORIZED));
    assert!(err.to_string().contains("Access token is missing or invalid."));

    let err = client.get_device("missing").await.expect_err("404");
    assert!(matches!(err, ApiError::NotFound { .. }));

    let err = client.get_device("limited").await.expect_err("429");
    assert!(matches!(err, ApiError::RateLimited { reset: Some(1_700_000_000), .. }));
    assert!(err.is_retryable());

    let err = client.get_device("broken").await.expect_err("503");
    assert!(matches!(err, ApiError::Server { .. }));
    assert!(err.is_retryable());

    let err = client.get_device("teapot").await.expect_err("418");
    assert!(matches!(
        err,
        ApiError::HttpStatus { status, .. } if status == StatusCode::IM_A_TEAPOT
    ));
    assert!(!err.is_retryable());

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock http server task should join");
}

#[derive(Clone, Default)]
struct UploadState {
    fail_upload: bool,
    uploads: Arc<Mutex<Vec<(HeaderMap, Bytes)>>>,
    pushes: Recorder,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn file_push_uploads_without_credential_then_registers_push() {
    let state = UploadState::default();
    let (addr, shutdown_tx, server_task) = spawn_server(upload_router(state.clone())).await;

    let file = FileUpload::new("notes.txt", b"hello file".to_vec()).with_body("see attached");
    let push = client_for(addr)
        .push_file(
            file,
            Some(PushTarget::Device("ujdev1".to_string())),
            &OctetStreamDetector,
        )
        .await
        .expect("push file");
    assert_eq!(push.file_url.as_deref(), Some("https://dl.example/notes.txt"));

    let uploads = state.uploads.lock().await;
    assert_eq!(uploads.len(), 1);
    let (headers, body) = &uploads[0];
    assert!(headers.get("access-token").is_none());
    let body = String::from_utf8_lossy(body);
    assert!(body.contains("name=\"awsaccesskeyid\""));
    assert!(body.contains("filename=\"notes.txt\""));
    assert!(body.contains("hello file"));

    let pushes = state.pushes.take().await;
    assert_eq!(pushes.len(), 1);
    assert_eq!(
        pushes[0].1,
        json!({
            "type": "file",
            "file_name": "notes.txt",
            "file_type": "application/octet-stream",
            "file_url": "https://dl.example/notes.txt",
            "body": "see attached",
            "device_iden": "ujdev1"
        })
    );

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock http server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_upload_creates_no_push() {
    let state = UploadState {
        fail_upload: true,
        ..UploadState::default()
    };
    let (addr, shutdown_tx, server_task) = spawn_server(upload_router(state.clone())).await;

    let err = client_for(addr)
        .push_file(
            FileUpload::new("notes.txt", b"x".to_vec()).with_type("text/plain"),
            None,
            &OctetStreamDetector,
        )
        .await
        .expect_err("upload fails");
    assert!(matches!(
        err,
        ApiError::Upload { status: Some(status), .. } if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    assert!(state.pushes.take().await.is_empty());

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock http server task should join");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_session_refills_history_on_tickle() {
    let app = Router::new()
        .route("/v2/pushes", get(history_handler))
        .route("/websocket/:key", get(ws_handler));
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;

    let client = client_for(addr);
    let stream = StreamClient::from_api(&client).with_endpoint(format!("ws://{addr}/websocket/"));
    let mut session = StreamSession::new(client, stream);

    timeout(Duration::from_secs(2), session.connect())
        .await
        .expect("timed out connecting")
        .expect("connect session");
    assert_eq!(session.watermark(), Some(100.0));

    let event = timeout(Duration::from_secs(2), session.next_event())
        .await
        .expect("timed out waiting for push")
        .expect("push event");
    let push = match event {
        StreamEvent::Push(push) => push,
        other => panic!("expected push, got {other:?}"),
    };
    assert_eq!(push.iden, "ujx2");
    assert_eq!(session.watermark(), Some(105.0));

    let event = timeout(Duration::from_secs(2), session.next_event())
        .await
        .expect("timed out waiting for mirror")
        .expect("mirror event");
    let ephemeral = match event {
        StreamEvent::Ephemeral(ephemeral) => ephemeral,
        other => panic!("expected ephemeral, got {other:?}"),
    };
    assert_eq!(ephemeral.title.as_deref(), Some("Incoming call"));
    assert_eq!(session.watermark(), Some(105.0));

    session.close().await.expect("close session");
    let _ = shutdown_tx.send(());
    let _ = timeout(Duration::from_secs(2), server_task).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dismissing_a_mirror_posts_a_dismissal_ephemeral() {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/v2/ephemerals", post(ephemeral_handler))
        .with_state(recorder.clone());
    let (addr, shutdown_tx, server_task) = spawn_server(app).await;
    let client = client_for(addr);

    let mirror = Ephemeral {
        kind: Ephemeral::MIRROR.to_string(),
        package_name: Some("com.android.phone".to_string()),
        notification_id: Some("4".to_string()),
        source_user_iden: Some("ujuser".to_string()),
        title: Some("Incoming call".to_string()),
        ..Ephemeral::default()
    };
    client.dismiss_ephemeral(&mirror).await.expect("dismiss");

    let err = client
        .dismiss_ephemeral(&Ephemeral::default())
        .await
        .expect_err("incomplete mirror");
    assert!(matches!(err, ApiError::Validation(_)));

    let requests = recorder.take().await;
    assert_eq!(requests.len(), 1);
    let (headers, body) = &requests[0];
    assert_eq!(header(headers, "access-token"), Some(TEST_API_KEY));
    assert_eq!(
        body,
        &json!({
            "type": "push",
            "push": {
                "type": "dismissal",
                "package_name": "com.android.phone",
                "notification_id": "4",
                "source_user_iden": "ujuser",
                "dismissible": false
            }
        })
    );

    let _ = shutdown_tx.send(());
    server_task.await.expect("mock http server task should join");
}

async fn ephemeral_handler(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    recorder.record(headers, payload).await;
    Json(json!({}))
}

async fn create_push_handler(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let mut push = payload.clone();
    push["iden"] = json!("ujpah72o0");
    push["created"] = json!(1_700_000_000.5);
    push["modified"] = json!(1_700_000_000.5);
    push["active"] = json!(true);
    recorder.record(headers, payload).await;
    Json(push)
}

async fn paged_pushes_handler(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    recorder.record(headers, json!(params)).await;
    match params.get("cursor").map(String::as_str) {
        None => Json(json!({
            "pushes": [
                {"iden": "p3", "type": "note", "modified": 103.0, "title": "three"},
                {"iden": "p2", "type": "note", "modified": 102.0, "title": "two"}
            ],
            "cursor": "page2"
        })),
        Some(_) => Json(json!({
            "pushes": [
                {"iden": "p1", "type": "link", "modified": 101.0, "url": "https://example.com"}
            ]
        })),
    }
}

async fn status_handler(Path(iden): Path<String>) -> impl IntoResponse {
    let error = |message: &str| {
        Json(json!({"error": {"message": message, "type": "invalid_request"}}))
    };
    match iden.as_str() {
        "auth" => (
            StatusCode::UNAUTHORIZED,
            error("Access token is missing or invalid."),
        )
            .into_response(),
        "missing" => (StatusCode::NOT_FOUND, error("Object not found.")).into_response(),
        "limited" => (
            StatusCode::TOO_MANY_REQUESTS,
            [("x-ratelimit-reset", "1700000000")],
            error("Too many requests."),
        )
            .into_response(),
        "broken" => (StatusCode::SERVICE_UNAVAILABLE, "upstream down").into_response(),
        _ => (StatusCode::IM_A_TEAPOT, error("I'm a teapot.")).into_response(),
    }
}

fn upload_router(state: UploadState) -> Router {
    Router::new()
        .route("/v2/upload-request", post(upload_request_handler))
        .route("/upload", post(upload_handler))
        .route("/v2/pushes", post(file_push_handler))
        .with_state(state)
}

async fn upload_request_handler(
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    let host = header(&headers, "host").unwrap_or("127.0.0.1").to_string();
    let file_name = payload["file_name"].as_str().unwrap_or_default().to_string();
    Json(json!({
        "file_name": file_name,
        "file_type": payload["file_type"],
        "file_url": format!("https://dl.example/{file_name}"),
        "upload_url": format!("http://{host}/upload"),
        "data": {"awsaccesskeyid": "AKIAEXAMPLE", "acl": "public-read", "key": "abc/notes.txt"}
    }))
}

async fn upload_handler(
    State(state): State<UploadState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    state.uploads.lock().await.push((headers, body));
    if state.fail_upload {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn file_push_handler(
    State(state): State<UploadState>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    create_push_handler(State(state.pushes), headers, Json(payload)).await
}

async fn history_handler(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let modified_after = params
        .get("modified_after")
        .and_then(|value| value.parse::<f64>().ok());
    let pushes = match modified_after {
        None => json!([{"iden": "ujx1", "type": "note", "modified": 100.0, "created": 100.0}]),
        Some(after) if after < 105.0 => json!([
            {"iden": "ujx2", "type": "note", "modified": 105.0, "created": 105.0, "title": "new"}
        ]),
        Some(_) => json!([]),
    };
    Json(json!({ "pushes": pushes }))
}

async fn ws_handler(Path(key): Path<String>, ws: WebSocketUpgrade) -> impl IntoResponse {
    if key != TEST_API_KEY {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(|socket| async move {
        let _ = run_ws_script(socket).await;
    })
    .into_response()
}

async fn run_ws_script(mut socket: WebSocket) -> Result<(), axum::Error> {
    let frames = [
        json!({"type": "nop"}),
        json!({"type": "nop"}),
        json!({"type": "tickle", "subtype": "push"}),
        json!({"type": "push", "push": {
            "type": "mirror",
            "title": "Incoming call",
            "body": "555-0100",
            "application_name": "Phone",
            "package_name": "com.android.phone",
            "notification_id": "4"
        }}),
    ];
    socket.send(Message::Ping(b"hb".to_vec())).await?;
    for frame in frames {
        socket.send(Message::Text(frame.to_string())).await?;
    }
    while let Some(message) = socket.recv().await {
        if matches!(message?, Message::Close(_)) {
            break;
        }
    }
    Ok(())
}

async fn spawn_server(
    app: Router,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server listener");
    let addr = listener
        .local_addr()
        .expect("read mock server listener address");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("mock server should run");
    });
    (addr, shutdown_tx, task)
}

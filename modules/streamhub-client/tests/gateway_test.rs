//! Gateway tests against a loopback HTTP server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use streamhub_client::{ApiClient, ClientError, GateTicket, RefreshGate};
use streamhub_common::{Config, ErrorBody, JwtDto, UserSummary};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Loopback server
// ---------------------------------------------------------------------------

struct ServerState {
    refresh_calls: AtomicUsize,
    fail_refresh: AtomicBool,
    /// Authorization header of every request to the protected route, in order.
    auth_headers: Mutex<Vec<Option<String>>>,
    /// X-XSRF-TOKEN header of every POST to the echo route, in order.
    csrf_headers: Mutex<Vec<Option<String>>>,
}

impl ServerState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            refresh_calls: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            auth_headers: Mutex::new(Vec::new()),
            csrf_headers: Mutex::new(Vec::new()),
        })
    }
}

fn jwt(token: &str) -> JwtDto {
    JwtDto {
        access_token: token.to_string(),
        expires_at: Utc::now() + chrono::Duration::minutes(10),
        user: UserSummary {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            profile_image_url: None,
        },
    }
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn csrf_token() -> impl IntoResponse {
    ([(header::SET_COOKIE, "XSRF-TOKEN=csrf-123; Path=/")], "")
}

#[derive(Deserialize)]
struct SignInForm {
    username: String,
    #[allow(dead_code)]
    password: String,
}

async fn sign_in(Form(form): Form<SignInForm>) -> impl IntoResponse {
    assert_eq!(form.username, "alice");
    (
        [(header::SET_COOKIE, "refreshToken=r1; Path=/; HttpOnly")],
        Json(jwt("stale-token")),
    )
}

async fn refresh(State(state): State<Arc<ServerState>>) -> axum::response::Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Long enough for every concurrent 401 to reach the gate while the
    // leader's refresh is still in flight.
    tokio::time::sleep(Duration::from_millis(100)).await;
    if state.fail_refresh.load(Ordering::SeqCst) {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "exceptionName": "InvalidRefreshToken",
                "message": "refresh token expired",
                "details": {},
            })),
        )
            .into_response()
    } else {
        Json(jwt("fresh-token")).into_response()
    }
}

async fn widgets(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let auth = header_value(&headers, header::AUTHORIZATION);
    state.auth_headers.lock().unwrap().push(auth.clone());
    if auth.as_deref() == Some("Bearer fresh-token") {
        Json(vec!["w1".to_string(), "w2".to_string()]).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn auth_me() -> impl IntoResponse {
    StatusCode::UNAUTHORIZED
}

async fn missing() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            exception_name: "WidgetNotFound".to_string(),
            message: "no such widget".to_string(),
            details: serde_json::Value::Null,
        }),
    )
}

async fn echo_csrf(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let csrf = header_value(&headers, header::HeaderName::from_static("x-xsrf-token"));
    state.csrf_headers.lock().unwrap().push(csrf);
    Json(json!({ "ok": true }))
}

async fn spawn_server(state: Arc<ServerState>) -> String {
    let app = Router::new()
        .route("/api/auth/csrf-token", get(csrf_token))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/me", get(auth_me))
        .route("/api/widgets", get(widgets))
        .route("/api/missing", get(missing))
        .route("/api/echo-csrf", post(echo_csrf))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

async fn client_for(state: Arc<ServerState>) -> ApiClient {
    let base = spawn_server(state).await;
    ApiClient::new(&Config::new(base, "ws://unused")).expect("client")
}

// ---------------------------------------------------------------------------
// Sign-in and sign-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_in_populates_the_session() {
    let state = ServerState::new();
    let client = client_for(state).await;
    assert!(!client.session().is_authenticated());

    let jwt = client.sign_in("alice", "secret").await.unwrap();
    assert_eq!(jwt.access_token, "stale-token");
    assert!(client.session().is_authenticated());
    assert_eq!(client.session().user().unwrap().username, "alice");
}

// ---------------------------------------------------------------------------
// Refresh-and-retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expired_token_is_refreshed_and_the_request_retried_once() {
    let state = ServerState::new();
    let client = client_for(state.clone()).await;
    client.sign_in("alice", "secret").await.unwrap();

    let widgets: Vec<String> = client.get("/api/widgets").await.unwrap();
    assert_eq!(widgets, ["w1", "w2"]);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);

    let seen = state.auth_headers.lock().unwrap().clone();
    assert_eq!(
        seen,
        [
            Some("Bearer stale-token".to_string()),
            Some("Bearer fresh-token".to_string()),
        ]
    );
}

#[tokio::test]
async fn concurrent_failures_share_a_single_refresh() {
    let state = ServerState::new();
    let client = Arc::new(client_for(state.clone()).await);
    client.sign_in("alice", "secret").await.unwrap();

    let (a, b) = tokio::join!(
        {
            let client = client.clone();
            async move { client.get::<Vec<String>>("/api/widgets").await }
        },
        {
            let client = client.clone();
            async move { client.get::<Vec<String>>("/api/widgets").await }
        },
    );
    assert_eq!(a.unwrap(), ["w1", "w2"]);
    assert_eq!(b.unwrap(), ["w1", "w2"]);
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);

    // Both retries carried the credential minted by the one refresh.
    let seen = state.auth_headers.lock().unwrap().clone();
    let retried = seen
        .iter()
        .filter(|auth| auth.as_deref() == Some("Bearer fresh-token"))
        .count();
    assert_eq!(retried, 2);
}

#[tokio::test]
async fn failed_refresh_signs_the_session_out() {
    let state = ServerState::new();
    state.fail_refresh.store(true, Ordering::SeqCst);
    let client = client_for(state.clone()).await;
    client.sign_in("alice", "secret").await.unwrap();
    let authenticated = client.session().watch();

    let result = client.get::<Vec<String>>("/api/widgets").await;
    assert!(result.is_err());
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(!client.session().is_authenticated());
    assert!(!*authenticated.borrow());
}

#[tokio::test]
async fn abandoned_refresh_fails_waiters_and_reopens_the_gate() {
    let gate = RefreshGate::new();
    let lease = match gate.begin() {
        GateTicket::Leader(lease) => lease,
        GateTicket::Follower(_) => panic!("gate should be idle"),
    };
    let waiter = match gate.begin() {
        GateTicket::Follower(rx) => rx,
        GateTicket::Leader(_) => panic!("refresh already in flight"),
    };

    // The leader's future is dropped without resolving — a caller timeout.
    drop(lease);

    let outcome = tokio::time::timeout(Duration::from_millis(500), waiter)
        .await
        .expect("waiter must be resumed, not hang")
        .expect("gate keeps the sender alive");
    assert!(outcome.is_err());

    // The gate is idle again; the next failure elects a fresh leader.
    assert!(matches!(gate.begin(), GateTicket::Leader(_)));
}

#[tokio::test]
async fn auth_endpoints_never_enter_the_refresh_gate() {
    let state = ServerState::new();
    let client = client_for(state.clone()).await;
    client.sign_in("alice", "secret").await.unwrap();

    let result = client.get::<serde_json::Value>("/api/auth/me").await;
    match result {
        Err(ClientError::Api { status, .. }) => assert_eq!(status, 401),
        other => panic!("expected 401 api error, got {other:?}"),
    }
    assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// CSRF and error envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mutating_requests_carry_the_anti_forgery_header() {
    let state = ServerState::new();
    let client = client_for(state.clone()).await;
    client.fetch_csrf_token().await.unwrap();

    let _: serde_json::Value = client.post("/api/echo-csrf", &json!({})).await.unwrap();
    let seen = state.csrf_headers.lock().unwrap().clone();
    assert_eq!(seen, [Some("csrf-123".to_string())]);
}

#[tokio::test]
async fn error_envelope_message_is_surfaced() {
    let state = ServerState::new();
    let client = client_for(state).await;

    let result = client.get::<serde_json::Value>("/api/missing").await;
    match result {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "no such widget");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

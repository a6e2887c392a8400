//! Shared test harness: an in-process mock backend plus gateway builders.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use gateway_service::config::{BackendSettings, ServerSettings, Settings, TelemetrySettings};
use gateway_service::startup::build_router;
use gateway_service::AppState;
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_TENANT: &str = "tenant_test_001";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceMode {
    Ok,
    FailFirstWith401,
    Always401,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignInMode {
    Tokens,
    NotJson,
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UploadMode {
    Created,
    ServerError,
}

/// One request observed by the mock backend.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub tenant_header: Option<String>,
    pub body: Option<Value>,
}

pub struct MockBackend {
    pub auth_calls: AtomicUsize,
    pub resource_calls: AtomicUsize,
    pub resource_mode: ResourceMode,
    pub sign_in_mode: SignInMode,
    pub upload_mode: UploadMode,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::new_inner())
    }

    pub fn with_resource_mode(mode: ResourceMode) -> Arc<Self> {
        let mut mock = Self::new_inner();
        mock.resource_mode = mode;
        Arc::new(mock)
    }

    pub fn with_sign_in_mode(mode: SignInMode) -> Arc<Self> {
        let mut mock = Self::new_inner();
        mock.sign_in_mode = mode;
        Arc::new(mock)
    }

    pub fn with_upload_mode(mode: UploadMode) -> Arc<Self> {
        let mut mock = Self::new_inner();
        mock.upload_mode = mode;
        Arc::new(mock)
    }

    fn new_inner() -> Self {
        Self {
            auth_calls: AtomicUsize::new(0),
            resource_calls: AtomicUsize::new(0),
            resource_mode: ResourceMode::Ok,
            sign_in_mode: SignInMode::Tokens,
            upload_mode: UploadMode::Created,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls that hit a proxied resource (not issuance or auth).
    pub fn resource_requests(&self) -> Vec<RecordedCall> {
        self.recorded()
            .into_iter()
            .filter(|c| !c.path.starts_with("/api/auth") && c.path != "/api/authenticate")
            .collect()
    }
}

/// A JWT-shaped token with a real `exp` claim; the gateway only decodes the
/// payload, so the signature can be junk.
pub fn make_service_jwt(subject: &str, expires_in_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + expires_in_secs;
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS512","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&json!({ "sub": subject, "exp": exp })).unwrap(),
    );
    format!("{}.{}.testsig", header, payload)
}

async fn authenticate(State(mock): State<Arc<MockBackend>>) -> Response {
    let n = mock.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let token = make_service_jwt(&format!("svc-{}", n), 3600);
    Json(json!({ "id_token": token })).into_response()
}

fn tokens_payload() -> Value {
    json!({
        "accessToken": "access-token-1",
        "refreshToken": "refresh-token-1",
        "expiresIn": 900,
        "tokenType": "Bearer",
        "user": { "id": "user-1", "email": "user@example.com" },
    })
}

async fn catch_all(State(mock): State<Arc<MockBackend>>, req: Request) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, 8 * 1024 * 1024).await.unwrap();

    let call = RecordedCall {
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().unwrap_or("").to_string(),
        authorization: parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        content_type: parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        tenant_header: parts
            .headers
            .get("X-Tenant-ID")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&bytes).ok(),
    };
    let path = call.path.clone();
    mock.calls.lock().unwrap().push(call);

    if path == "/api/auth/sign-in/social" || path == "/api/auth/refresh-token" {
        return Json(tokens_payload()).into_response();
    }
    if path == "/api/auth/sign-in" || path == "/api/auth/sign-up" {
        return match mock.sign_in_mode {
            SignInMode::Tokens => Json(tokens_payload()).into_response(),
            SignInMode::NotJson => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html")],
                "<html>maintenance</html>",
            )
                .into_response(),
            SignInMode::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "type": "about:blank",
                    "title": "Unauthorized",
                    "status": 401,
                    "detail": "Bad credentials",
                    "message": "Bad credentials",
                })),
            )
                .into_response(),
        };
    }
    if path == "/api/auth/sign-out" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    if path.starts_with("/api/event-medias/upload") {
        return match mock.upload_mode {
            UploadMode::Created => {
                (StatusCode::CREATED, Json(json!({ "id": 7 }))).into_response()
            }
            // A failed upload can surface as a bare "null" body upstream
            UploadMode::ServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                "null",
            )
                .into_response(),
        };
    }

    // Generic proxied resource
    let n = mock.resource_calls.fetch_add(1, Ordering::SeqCst) + 1;
    let unauthorized = match mock.resource_mode {
        ResourceMode::Ok => false,
        ResourceMode::FailFirstWith401 => n == 1,
        ResourceMode::Always401 => true,
    };
    if unauthorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "expired" }))).into_response();
    }

    if parts.method == axum::http::Method::GET {
        return (
            StatusCode::OK,
            [("x-total-count", "42")],
            Json(json!([{ "id": 1, "tenantId": TEST_TENANT }])),
        )
            .into_response();
    }

    (StatusCode::OK, Json(json!({ "id": 1 }))).into_response()
}

/// Bind the mock backend on an ephemeral port and return its base URL.
pub async fn spawn_backend(mock: Arc<MockBackend>) -> String {
    let app = Router::new()
        .route("/api/authenticate", post(authenticate))
        .fallback(catch_all)
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock backend");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

pub fn test_settings(base_url: &str) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        backend: BackendSettings {
            base_url: base_url.to_string(),
            tenant_id: TEST_TENANT.to_string(),
            service_user: "gateway".to_string(),
            service_password: Secret::new("secret".to_string()),
            public_app_url: "http://localhost:3000".to_string(),
        },
        telemetry: TelemetrySettings::default(),
    }
}

/// Gateway router wired to the given backend URL. No metrics recorder is
/// installed; `/metrics` renders empty in tests.
pub fn test_app(base_url: &str) -> Router {
    build_router(AppState::new(test_settings(base_url), None))
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

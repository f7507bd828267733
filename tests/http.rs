use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{self, Body},
    extract::{Multipart, State},
    http::{header, HeaderMap, Request, StatusCode},
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use chrono::Utc;
use serde_json::{json, Value};
use tower::util::ServiceExt;
use url::Url;

use campuscrux_webapp::{
    api,
    app_state::AppState,
    auth::{password::hash_password, SessionClaims, SessionKeys},
    config::{AppConfig, StoreBackend},
    mailer::Mailer,
    models::User,
    store::{MemoryUserStore, UserStore},
};

const BOUNDARY: &str = "campuscrux-test-boundary";
const SESSION_SECRET: &str = "test-session-secret";

// --- Dobles de prueba ---

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    fn code_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .ok()?
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_verification(&self, email: &str, _full_name: &str, code: &str) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("mutex envenenado"))?
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

/// Cuenta cada acceso al almacén para comprobar que las peticiones sin sesión no lo tocan.
#[derive(Default)]
struct CountingStore {
    inner: MemoryUserStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for CountingStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_email(email).await
    }

    async fn insert(&self, user: &User) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(user).await
    }

    async fn save(&self, user: &User) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.save(user).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

struct TestApp {
    router: Router,
    store: Arc<CountingStore>,
    mailer: Arc<RecordingMailer>,
    upstream_hits: Arc<AtomicUsize>,
}

fn test_config(ai_backend_url: Url) -> AppConfig {
    AppConfig {
        store_backend: StoreBackend::Memory,
        neo4j_uri: String::new(),
        neo4j_user: String::new(),
        neo4j_password: String::new(),
        server_addr: "127.0.0.1:0".to_string(),
        session_secret: SESSION_SECRET.to_string(),
        session_ttl_secs: 3600,
        cookie_secure: false,
        google: None,
        ai_backend_url,
        max_upload_bytes: 1024 * 1024,
        resend_api_key: None,
        mail_from: "campuscrux <test@example.com>".to_string(),
    }
}

// --- Backend de IA simulado ---

async fn mock_ai_backend(
    State(hits): State<Arc<AtomicUsize>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);

    let mut fields = serde_json::Map::new();
    while let Some(field) = multipart.next_field().await.expect("multipart válido") {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let value = match file_name {
            Some(file_name) => {
                let bytes = field.bytes().await.expect("bytes");
                json!({ "fileName": file_name, "contentType": content_type, "size": bytes.len() })
            }
            None => json!(field.text().await.expect("texto")),
        };
        fields.insert(name, value);
    }

    if fields.get("question") == Some(&json!("fail")) {
        return (StatusCode::BAD_GATEWAY, Json(json!({ "detail": "model offline" })));
    }
    if fields.get("url") == Some(&json!("https://youtu.be/private")) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "token rejected" })));
    }

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    (
        StatusCode::OK,
        Json(json!({
            "fields": fields,
            "authorization": header_str("authorization"),
            "provider": header_str("x-user-provider"),
        })),
    )
}

async fn spawn_ai_backend(hits: Arc<AtomicUsize>) -> Url {
    let router = Router::new()
        .route("/vectorize", post(mock_ai_backend))
        .route("/query", post(mock_ai_backend))
        .with_state(hits);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    Url::parse(&format!("http://{addr}")).expect("url")
}

async fn test_app() -> TestApp {
    let upstream_hits = Arc::new(AtomicUsize::new(0));
    let ai_url = spawn_ai_backend(upstream_hits.clone()).await;

    let store = Arc::new(CountingStore::default());
    let mailer = Arc::new(RecordingMailer::default());
    let state = AppState::new(test_config(ai_url), store.clone(), mailer.clone())
        .expect("estado de prueba");

    TestApp {
        router: api::create_router(state),
        store,
        mailer,
        upstream_hits,
    }
}

// --- Utilidades HTTP ---

fn json_request(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_request(uri: &str, parts: &[Part<'_>], token: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).expect("request")
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.router.clone().oneshot(request).await.expect("respuesta");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("cuerpo");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

/// Crea un usuario verificado y devuelve `(token, _id)` tras iniciar sesión.
async fn signed_in(app: &TestApp, email: &str) -> (String, String) {
    let mut user = User::new_unverified(
        "Ada Lovelace".into(),
        email.into(),
        hash_password("analytical-engine").expect("hash"),
        "123456".into(),
        Utc::now(),
    );
    user.is_verified = true;
    app.store.inner.insert(&user).await.expect("insert");

    let (status, _, body) = send(
        app,
        json_request(
            "/api/auth/signIn",
            json!({ "identifier": email, "password": "analytical-engine" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    (
        body["token"].as_str().expect("token").to_string(),
        body["user"]["_id"].as_str().expect("_id").to_string(),
    )
}

// --- Cuentas y sesión ---

#[tokio::test]
async fn sign_up_verify_and_sign_in() {
    let app = test_app().await;
    let email = "grace@example.com";

    let (status, _, body) = send(
        &app,
        json_request(
            "/api/signUp",
            json!({ "fullName": "Grace Hopper", "email": email, "password": "cobol" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let signin = json!({ "email": email, "password": "cobol" });
    let (status, _, body) = send(&app, json_request("/api/auth/signIn", signin.clone(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect username or password");

    let code = app.mailer.code_for(email).expect("código enviado");
    let (status, _, body) = send(
        &app,
        json_request(
            "/api/verifyCode",
            json!({ "email": "grace%40example.com", "verifyCode": code }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User verified successfully");

    let (status, headers, body) = send(&app, json_request("/api/auth/signIn", signin, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], email);
    assert!(body["user"].get("password").is_none());
    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("cookie de sesión");
    assert!(cookie.starts_with("session_token="));
    assert!(cookie.contains("HttpOnly"));

    let session_cookie = cookie.split(';').next().expect("par clave=valor").to_string();
    let request = Request::builder()
        .uri("/api/auth/session")
        .header(header::COOKIE, session_cookie)
        .body(Body::empty())
        .expect("request");
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], email);
    assert_eq!(body["provider"], "credentials");
    assert_eq!(body["accessToken"], body["user"]["_id"]);
}

#[tokio::test]
async fn verified_email_cannot_sign_up_again() {
    let app = test_app().await;
    signed_in(&app, "ada@example.com").await;

    let (status, _, body) = send(
        &app,
        json_request(
            "/api/signUp",
            json!({ "fullName": "Impostor", "email": "ada@example.com", "password": "x" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User Already exist with this email");
}

#[tokio::test]
async fn wrong_verification_code_keeps_account_unverified() {
    let app = test_app().await;
    let email = "alan@example.com";
    send(
        &app,
        json_request(
            "/api/signUp",
            json!({ "fullName": "Alan Turing", "email": email, "password": "enigma" }),
            None,
        ),
    )
    .await;
    let code = app.mailer.code_for(email).expect("código");
    let wrong = if code == "100000" { "100001" } else { "100000" };

    let (status, _, _) = send(
        &app,
        json_request("/api/verifyCode", json!({ "email": email, "verifyCode": wrong }), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let user = app.store.inner.find_by_email(email).await.unwrap().unwrap();
    assert!(!user.is_verified);

    let (status, _, _) = send(
        &app,
        json_request("/api/resendCode", json!({ "email": email }), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.mailer.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/signUp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .expect("request");
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn sign_out_expires_the_cookie() {
    let app = test_app().await;
    let (status, headers, _) = send(&app, json_request("/api/auth/signOut", json!({}), None)).await;
    assert_eq!(status, StatusCode::OK);
    let raw = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("Set-Cookie");
    let cookie = Cookie::parse(raw).expect("cookie válida");
    assert_eq!(cookie.name(), "session_token");
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.path(), Some("/"));
    assert_eq!(cookie.max_age(), Some(time::Duration::ZERO));
}

#[tokio::test]
async fn google_sign_in_is_unavailable_without_credentials() {
    let app = test_app().await;
    let request = Request::builder()
        .uri("/api/auth/google")
        .body(Body::empty())
        .expect("request");
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn google_token(expires_in: i64, tweak: impl FnOnce(&mut SessionClaims)) -> String {
    let mut user = User::new_unverified(
        "Margaret Hamilton".into(),
        "margaret@example.com".into(),
        "hash".into(),
        "123456".into(),
        Utc::now(),
    );
    user.is_verified = true;

    let now = Utc::now().timestamp();
    let mut claims =
        SessionClaims::for_google(&user, "ya29.token".into(), Some(expires_in), now, 86_400);
    tweak(&mut claims);
    SessionKeys::new(SESSION_SECRET).sign(&claims).expect("firma")
}

fn session_request(token: &str) -> Request<Body> {
    Request::builder()
        .uri("/api/auth/session")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn google_session_near_expiry_carries_a_warning() {
    let app = test_app().await;
    let token = google_token(120, |_| {});

    let (status, _, body) = send(&app, session_request(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "google");
    assert_eq!(body["accessToken"], "ya29.token");
    assert_eq!(body["warning"], "Your Google session expires in 2 minute(s)");
    let sign_out_in = body["signOutIn"].as_i64().expect("signOutIn");
    assert!((1..=120).contains(&sign_out_in));

    let calm = google_token(3600, |_| {});
    let (status, _, body) = send(&app, session_request(&calm)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("warning").is_none());
    assert!(body.get("signOutIn").is_none());
}

#[tokio::test]
async fn expired_provider_token_ends_the_session() {
    let app = test_app().await;
    let token = google_token(3600, |claims| {
        claims.expires_at = Some(claims.iat - 10);
    });

    let (status, _, body) = send(&app, session_request(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Session expired");

    let (status, _, _) = send(&app, json_request("/api/fetchFolders", json!({}), Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.calls(), 0);
}

// --- Persistencia ---

#[tokio::test]
async fn persistence_routes_reject_missing_session_without_store_access() {
    let app = test_app().await;

    for (uri, body) in [
        ("/api/createFolder", json!({ "folderName": "Work" })),
        ("/api/fetchFolders", json!({})),
        ("/api/conversations", json!({ "conversationData": { "name": "c", "folderName": "Work" } })),
        ("/api/saveNote", json!({ "conversationId": "abc", "note": "n" })),
    ] {
        let (status, _, _) = send(&app, json_request(uri, body.clone(), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri} sin sesión");

        let (status, _, _) = send(&app, json_request(uri, body, Some("not.a.jwt"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri} con token inválido");
    }

    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn duplicate_folder_names_are_rejected_case_insensitively() {
    let app = test_app().await;
    let (token, _) = signed_in(&app, "ada@example.com").await;

    let (status, _, body) = send(
        &app,
        json_request("/api/createFolder", json!({ "folderName": "Work" }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["folder"]["folderName"], "Work");

    let (status, _, _) = send(
        &app,
        json_request("/api/createFolder", json!({ "folderName": "work" }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, body) = send(&app, json_request("/api/fetchFolders", json!({}), Some(&token))).await;
    assert_eq!(body["folders"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn saving_notes_appends_and_reports_the_last_one() {
    let app = test_app().await;
    let (token, _) = signed_in(&app, "ada@example.com").await;

    send(
        &app,
        json_request("/api/createFolder", json!({ "folderName": "Papers" }), Some(&token)),
    )
    .await;

    let (status, _, body) = send(
        &app,
        json_request(
            "/api/conversations",
            json!({ "conversationData": {
                "name": "Notes on the Analytical Engine",
                "folderName": "Papers",
                "messages": [
                    { "type": "user", "content": "Summarize it" },
                    { "type": "assistant", "content": { "mode": "briefDoc", "summary": ["Bernoulli numbers"] } }
                ]
            }}),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let conversation_id = body["conversation"]["_id"].as_str().expect("_id").to_string();
    assert_eq!(body["conversation"]["messages"].as_array().map(Vec::len), Some(2));

    for note in ["first thoughts", "final summary"] {
        let (status, _, _) = send(
            &app,
            json_request(
                "/api/saveNote",
                json!({ "conversationId": conversation_id, "note": note }),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, _, body) = send(
        &app,
        json_request(
            "/api/saveNote",
            json!({ "conversationId": conversation_id, "note": "third" }),
            Some(&token),
        ),
    )
    .await;
    let notes = body["notes"].as_array().expect("notas");
    assert_eq!(notes.len(), 3);
    assert_eq!(notes[0]["content"], "first thoughts");
    assert_eq!(body["currentNote"]["content"], "third");
    assert_eq!(body["currentNote"]["type"], "text");

    let (status, _, _) = send(
        &app,
        json_request(
            "/api/saveNote",
            json!({ "conversationId": conversation_id, "note": 42 }),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn conversation_in_unknown_folder_is_not_found() {
    let app = test_app().await;
    let (token, _) = signed_in(&app, "ada@example.com").await;

    let (status, _, body) = send(
        &app,
        json_request(
            "/api/conversations",
            json!({ "conversationData": { "name": "Orphan", "folderName": "Nowhere" } }),
            Some(&token),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Folder not found");
}

// --- Proxy al backend de IA ---

#[tokio::test]
async fn proxy_rejects_missing_session_before_calling_upstream() {
    let app = test_app().await;
    let parts = [Part::Text("mode", "sumTube"), Part::Text("url", "https://youtu.be/x")];

    let (status, _, _) = send(&app, multipart_request("/api/initialSearch", &parts, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let parts = [Part::Text("question", "why?"), Part::Text("session_id", "s1")];
    let (status, _, _) = send(&app, multipart_request("/api/questionSubmit", &parts, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(app.upstream_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn initial_search_forwards_fields_and_identity() {
    let app = test_app().await;
    let (token, user_id) = signed_in(&app, "ada@example.com").await;

    let parts = [
        Part::Text("mode", "briefDoc"),
        Part::Text("user_id", "spoofed"),
        Part::File("file", "engine.pdf", b"%PDF-1.7 notes"),
    ];
    let (status, _, body) =
        send(&app, multipart_request("/api/initialSearch", &parts, Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.upstream_hits.load(Ordering::SeqCst), 1);
    assert_eq!(body["fields"]["mode"], "briefDoc");
    assert_eq!(body["fields"]["user_id"], user_id.as_str());
    assert_eq!(body["fields"]["provider"], "credentials");
    assert_eq!(body["fields"]["file"]["fileName"], "engine.pdf");
    assert_eq!(body["fields"]["file"]["contentType"], "application/pdf");
    assert_eq!(body["authorization"], format!("Bearer {user_id}"));
    assert_eq!(body["provider"], "credentials");
}

#[tokio::test]
async fn invalid_proxy_payloads_never_reach_upstream() {
    let app = test_app().await;
    let (token, _) = signed_in(&app, "ada@example.com").await;

    let parts = [Part::Text("mode", "briefDoc")];
    let (status, _, body) =
        send(&app, multipart_request("/api/initialSearch", &parts, Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let parts = [Part::Text("question", "why?")];
    let (status, _, _) =
        send(&app, multipart_request("/api/questionSubmit", &parts, Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(app.upstream_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_rejection_of_initial_search_is_an_auth_failure() {
    let app = test_app().await;
    let (token, _) = signed_in(&app, "ada@example.com").await;

    let parts = [
        Part::Text("mode", "sumTube"),
        Part::Text("url", "https://youtu.be/private"),
    ];
    let (status, _, body) =
        send(&app, multipart_request("/api/initialSearch", &parts, Some(&token))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "Authentication failed" }));
    assert_eq!(app.upstream_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn non_multipart_proxy_body_gets_a_json_error() {
    let app = test_app().await;
    let (token, _) = signed_in(&app, "ada@example.com").await;

    for uri in ["/api/initialSearch", "/api/questionSubmit"] {
        let (status, _, body) =
            send(&app, json_request(uri, json!({ "mode": "briefDoc" }), Some(&token))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
    assert_eq!(app.upstream_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_failure_becomes_internal_error_with_details() {
    let app = test_app().await;
    let (token, _) = signed_in(&app, "ada@example.com").await;

    let parts = [Part::Text("question", "fail"), Part::Text("video_id", "v1")];
    let (status, _, body) =
        send(&app, multipart_request("/api/questionSubmit", &parts, Some(&token))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to process request");
    assert_eq!(body["details"]["detail"], "model offline");
}

#[tokio::test]
async fn health_reports_ok_with_memory_store() {
    let app = test_app().await;
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .expect("request");
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

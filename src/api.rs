use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        DefaultBodyLimit, Json, Multipart, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    accounts::{self, SignUpRequest},
    ai_backend::{validate_initial, validate_question, Endpoint, ForwardedForm, ProxyError},
    app_state::AppState,
    auth::{
        credentials,
        google::{check_state, complete_sign_in, OAuthState, OAUTH_STATE_COOKIE, OAUTH_STATE_TTL_SECS},
        session::{build_cookie, cookie_value, expired_cookie, SessionView, SESSION_COOKIE},
        AuthSession, SessionClaims,
    },
    error::AppError,
    library::{self, ConversationDraft},
};

// --- Payloads de la API ---

#[derive(Deserialize)]
pub struct SignInPayload {
    #[serde(default, alias = "identifier")]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodePayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    verify_code: String,
}

#[derive(Deserialize)]
pub struct EmailPayload {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderPayload {
    #[serde(default)]
    folder_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPayload {
    #[serde(default)]
    conversation_data: Option<ConversationDraft>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveNotePayload {
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    note: Option<Value>,
}

#[derive(Deserialize)]
pub struct OAuthCallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type ProxyResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    let max_upload = app_state.config.max_upload_bytes;

    let proxy = Router::new()
        .route("/api/initialSearch", post(initial_search_handler))
        .route("/api/questionSubmit", post(question_submit_handler))
        .layer(DefaultBodyLimit::max(max_upload));

    Router::new()
        .route("/api/signUp", post(sign_up_handler))
        .route("/api/verifyCode", post(verify_code_handler))
        .route("/api/resendCode", post(resend_code_handler))
        .route("/api/auth/signIn", post(sign_in_handler))
        .route("/api/auth/google", get(google_login_handler))
        .route("/api/auth/google/callback", get(google_callback_handler))
        .route("/api/auth/session", get(session_handler))
        .route("/api/auth/signOut", post(sign_out_handler))
        .route("/api/createFolder", post(create_folder_handler))
        .route("/api/fetchFolders", post(fetch_folders_handler))
        .route("/api/conversations", post(create_conversation_handler))
        .route("/api/saveNote", post(save_note_handler))
        .route("/api/health", get(health_handler))
        .merge(proxy)
        .with_state(app_state)
}

fn success(message: &str) -> Json<Value> {
    Json(json!({ "success": true, "message": message }))
}

// --- Handlers de cuenta ---

#[axum::debug_handler]
async fn sign_up_handler(
    State(state): State<AppState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    accounts::sign_up(state.store.as_ref(), state.mailer.as_ref(), request, Utc::now()).await?;
    Ok(success("User registered successfully.. Please verify your email"))
}

#[axum::debug_handler]
async fn verify_code_handler(
    State(state): State<AppState>,
    payload: Result<Json<VerifyCodePayload>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(p) = payload?;
    accounts::verify_code(state.store.as_ref(), &p.email, &p.verify_code, Utc::now()).await?;
    Ok(success("User verified successfully"))
}

#[axum::debug_handler]
async fn resend_code_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmailPayload>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(p) = payload?;
    accounts::resend_code(state.store.as_ref(), state.mailer.as_ref(), &p.email, Utc::now())
        .await?;
    Ok(success("Verification code resent successfully"))
}

// --- Handlers de sesión ---

#[axum::debug_handler]
async fn sign_in_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<SignInPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(p) = payload?;
    let user = credentials::authorize(state.store.as_ref(), &p.email, &p.password).await?;

    let now = Utc::now().timestamp();
    let claims = SessionClaims::for_credentials(&user, now, state.config.session_ttl_secs);
    let token = state.sessions.sign(&claims)?;
    let cookie = build_cookie(
        SESSION_COOKIE,
        token.clone(),
        claims.exp - now,
        state.config.cookie_secure,
    );
    info!(email = %user.email, "Inicio de sesión con credenciales");

    Ok((
        jar.add(cookie),
        Json(json!({
            "success": true,
            "message": "Signed in successfully",
            "token": token,
            "user": user.to_info(),
            "session": SessionView::hydrate(&claims, now),
        })),
    ))
}

#[axum::debug_handler]
async fn google_login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::not_found("Google sign-in is not configured"))?;

    let (auth_url, oauth_state) = google.authorization_request(Utc::now().timestamp());
    let signed_state = state.sessions.sign(&oauth_state)?;
    let cookie = build_cookie(
        OAUTH_STATE_COOKIE,
        signed_state,
        OAUTH_STATE_TTL_SECS,
        state.config.cookie_secure,
    );

    Ok((jar.add(cookie), Redirect::to(auth_url.as_str())).into_response())
}

#[axum::debug_handler]
async fn google_callback_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    let outcome = finish_google_sign_in(&state, &jar, params).await;
    let jar = jar.add(expired_cookie(OAUTH_STATE_COOKIE));

    match outcome {
        Ok((token, max_age)) => {
            let session =
                build_cookie(SESSION_COOKIE, token, max_age, state.config.cookie_secure);
            (jar.add(session), Redirect::to("/")).into_response()
        }
        Err(e) => {
            warn!("Acceso con Google fallido: {}", e);
            (jar, Redirect::to("/signIn?error=AccessDenied")).into_response()
        }
    }
}

/// Valida el `state`, canjea el código y firma la sesión. Devuelve el token y su vida en segundos.
async fn finish_google_sign_in(
    state: &AppState,
    jar: &CookieJar,
    params: OAuthCallbackParams,
) -> Result<(String, i64), AppError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::not_found("Google sign-in is not configured"))?;

    if let Some(provider_error) = params.error {
        return Err(AppError::Unauthorized(provider_error));
    }
    let code = params
        .code
        .ok_or_else(|| AppError::bad_request("Missing authorization code"))?;
    let returned_state = params
        .state
        .ok_or_else(|| AppError::bad_request("Missing OAuth state"))?;

    let expected: OAuthState = cookie_value(jar, OAUTH_STATE_COOKIE)
        .and_then(|raw| state.sessions.verify::<OAuthState>(&raw).ok())
        .ok_or_else(AppError::unauthorized)?;
    check_state(&expected, &returned_state)?;

    let grant = google.exchange_code(&code, &expected.pkce_verifier).await?;

    let now = Utc::now().timestamp();
    let claims =
        complete_sign_in(state.store.as_ref(), grant, now, state.config.session_ttl_secs).await?;
    let token = state.sessions.sign(&claims)?;
    Ok((token, claims.exp - now))
}

#[axum::debug_handler(state = AppState)]
async fn session_handler(AuthSession(claims): AuthSession) -> Json<SessionView> {
    Json(SessionView::hydrate(&claims, Utc::now().timestamp()))
}

#[axum::debug_handler]
async fn sign_out_handler(jar: CookieJar) -> impl IntoResponse {
    (jar.add(expired_cookie(SESSION_COOKIE)), success("Signed out"))
}

// --- Handlers de carpetas, conversaciones y notas ---

#[axum::debug_handler]
async fn create_folder_handler(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    payload: Result<Json<CreateFolderPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(p) = payload?;
    let folder = library::create_folder(
        state.store.as_ref(),
        &session.email,
        p.folder_name.as_deref(),
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Folder created successfully",
            "folder": folder,
        })),
    ))
}

#[axum::debug_handler]
async fn fetch_folders_handler(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Value>, AppError> {
    let folders = library::fetch_folders(state.store.as_ref(), &session.email).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Folders fetched successfully",
        "folders": folders,
    })))
}

#[axum::debug_handler]
async fn create_conversation_handler(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    payload: Result<Json<ConversationPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(p) = payload?;
    let draft = p
        .conversation_data
        .ok_or_else(|| AppError::bad_request("Invalid request data"))?;
    let conversation =
        library::create_conversation(state.store.as_ref(), &session.email, draft, Utc::now())
            .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Conversation created successfully",
            "conversation": conversation,
        })),
    ))
}

#[axum::debug_handler]
async fn save_note_handler(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    payload: Result<Json<SaveNotePayload>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(p) = payload?;
    let saved = library::save_note(
        state.store.as_ref(),
        &session.email,
        p.conversation_id.as_deref(),
        p.note.as_ref(),
        Utc::now(),
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "notes": saved.notes,
        "currentNote": saved.current_note,
    })))
}

// --- Proxy al backend de IA ---

fn proxy_error(err: ProxyError) -> (StatusCode, Json<Value>) {
    match err {
        ProxyError::Invalid(message) => (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))),
        ProxyError::Upstream { status, body } => {
            let details = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
            error!("El backend de IA respondió {}: {}", status, details);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to process request", "details": details })),
            )
        }
        ProxyError::Transport(e) => {
            error!("Error contactando con el backend de IA: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to process request", "details": e.to_string() })),
            )
        }
    }
}

fn multipart_body(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Multipart, (StatusCode, Json<Value>)> {
    multipart.map_err(|rejection| proxy_error(ProxyError::Invalid(rejection.body_text())))
}

#[axum::debug_handler]
async fn initial_search_handler(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    multipart: Result<Multipart, MultipartRejection>,
) -> ProxyResult {
    let form = ForwardedForm::from_multipart(multipart_body(multipart)?)
        .await
        .map_err(proxy_error)?;
    let mode = validate_initial(&form).map_err(proxy_error)?;
    info!(email = %session.email, ?mode, "Nueva petición de resumen");

    match state.ai_backend.forward(Endpoint::Vectorize, form, &session).await {
        Ok(result) => Ok(Json(result)),
        Err(ProxyError::Upstream { status: 401, .. }) => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authentication failed" })),
        )),
        Err(e) => Err(proxy_error(e)),
    }
}

#[axum::debug_handler]
async fn question_submit_handler(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    multipart: Result<Multipart, MultipartRejection>,
) -> ProxyResult {
    let form = ForwardedForm::from_multipart(multipart_body(multipart)?)
        .await
        .map_err(proxy_error)?;
    validate_question(&form).map_err(proxy_error)?;
    info!(email = %session.email, "Nueva pregunta de seguimiento");

    state
        .ai_backend
        .forward(Endpoint::Query, form, &session)
        .await
        .map(Json)
        .map_err(proxy_error)
}

// --- Salud ---

#[axum::debug_handler]
async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match state.store.ping().await {
        Ok(()) => Ok(Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!("Error en el health check del almacén: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

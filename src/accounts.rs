//! Alta de cuentas y flujo de verificación por código.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::{
        password::hash_password,
        verification::{
            check_code, expiry_in, generate_code, mark_verified, CodeCheck, CODE_TTL_MINUTES,
            RESIGNUP_CODE_TTL_MINUTES,
        },
    },
    error::AppError,
    mailer::Mailer,
    models::User,
    store::UserStore,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("la expresión regular de email es válida")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email)
}

/// El frontend envía el email tal y como aparece en la URL `/verify/[email]`.
pub fn decode_email(raw: &str) -> String {
    percent_decode_str(raw.trim()).decode_utf8_lossy().into_owned()
}

/// Registra una cuenta sin verificar y envía el código.
///
/// Si el email ya pertenece a una cuenta verificada se rechaza; si la cuenta
/// existe pero no está verificada, se sobrescribe la contraseña y se emite un
/// código nuevo.
pub async fn sign_up(
    store: &dyn UserStore,
    mailer: &dyn Mailer,
    req: SignUpRequest,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let full_name = req.full_name.trim();
    let email = req.email.trim();

    if full_name.is_empty() {
        return Err(AppError::bad_request("Full name is required"));
    }
    if !is_valid_email(email) {
        return Err(AppError::bad_request("Please use a valid email"));
    }
    if req.password.is_empty() {
        return Err(AppError::bad_request("Password is required"));
    }

    let code = generate_code();

    match store.find_by_email(email).await? {
        Some(existing) if existing.is_verified => {
            return Err(AppError::bad_request("User Already exist with this email"));
        }
        Some(mut existing) => {
            existing.password = hash_password(&req.password)?;
            existing.verify_code = Some(code.clone());
            existing.verify_code_expiry = Some(expiry_in(now, RESIGNUP_CODE_TTL_MINUTES));
            store.save(&existing).await?;
            info!(%email, "Alta repetida de cuenta sin verificar: credenciales sobrescritas");
        }
        None => {
            let user = User::new_unverified(
                full_name.to_string(),
                email.to_string(),
                hash_password(&req.password)?,
                code.clone(),
                expiry_in(now, CODE_TTL_MINUTES),
            );
            store.insert(&user).await?;
            info!(%email, "Usuario registrado, pendiente de verificación");
        }
    }

    mailer
        .send_verification(email, full_name, &code)
        .await
        .map_err(|e| AppError::internal("Failed to send verification email", e))
}

pub async fn verify_code(
    store: &dyn UserStore,
    raw_email: &str,
    submitted: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let email = decode_email(raw_email);
    let mut user = store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    match check_code(&user, submitted.trim(), now) {
        CodeCheck::Accepted => {
            mark_verified(&mut user);
            store.save(&user).await?;
            info!(%email, "Cuenta verificada");
            Ok(())
        }
        CodeCheck::Expired => Err(AppError::Gone(
            "Verification code has expired. Please sign up again to receive a new code."
                .to_string(),
        )),
        CodeCheck::Mismatch => Err(AppError::Forbidden("Invalid verification code".to_string())),
    }
}

pub async fn resend_code(
    store: &dyn UserStore,
    mailer: &dyn Mailer,
    raw_email: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let email = decode_email(raw_email);
    let mut user = store
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if user.is_verified {
        return Err(AppError::bad_request("User is already verified"));
    }

    let code = generate_code();
    user.verify_code = Some(code.clone());
    user.verify_code_expiry = Some(expiry_in(now, CODE_TTL_MINUTES));
    store.save(&user).await?;

    mailer
        .send_verification(&user.email, &user.full_name, &code)
        .await
        .map_err(|e| AppError::internal("Failed to send verification email", e))
}

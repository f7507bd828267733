//! Tokens de sesión (JWT HS256), extractor `AuthSession` y utilidades de cookies.
//!
//! Una sesión de Google caduca como muy tarde cuando caduca su access token:
//! con menos de 5 minutos restantes se avisa en los logs y en
//! `GET /api/auth/session`; una vez caducado, el token se rechaza con 401.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{error::AppError, models::User};

pub const SESSION_COOKIE: &str = "session_token";
/// Umbral a partir del cual se avisa de la caducidad inminente del token del proveedor.
pub const EXPIRY_WARNING_SECS: i64 = 5 * 60;
/// Vida asumida de un access token de Google cuando no indica `expires_in`.
pub const DEFAULT_GOOGLE_TOKEN_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Credentials,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Credentials => "credentials",
            Provider::Google => "google",
        }
    }
}

/// Contenido del JWT de sesión.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// `_id` del usuario.
    pub sub: String,
    pub email: String,
    pub full_name: String,
    pub is_verified: bool,
    pub provider: Provider,
    /// Token que se reenvía al backend de IA. Con credenciales es el propio `_id`.
    pub access_token: String,
    /// Caducidad (epoch, segundos) del token del proveedor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenHealth {
    Valid,
    ExpiringSoon { remaining_secs: i64 },
    Expired,
}

impl SessionClaims {
    pub fn for_credentials(user: &User, now: i64, ttl_secs: i64) -> Self {
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            is_verified: user.is_verified,
            provider: Provider::Credentials,
            access_token: user.id.clone(),
            expires_at: None,
            iat: now,
            exp: now + ttl_secs,
        }
    }

    pub fn for_google(
        user: &User,
        access_token: String,
        expires_in: Option<i64>,
        now: i64,
        ttl_secs: i64,
    ) -> Self {
        let expires_at = now + expires_in.unwrap_or(DEFAULT_GOOGLE_TOKEN_SECS);
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            is_verified: user.is_verified,
            provider: Provider::Google,
            access_token,
            expires_at: Some(expires_at),
            iat: now,
            exp: (now + ttl_secs).min(expires_at),
        }
    }

    pub fn token_health(&self, now: i64) -> TokenHealth {
        match (self.provider, self.expires_at) {
            (Provider::Google, Some(expires_at)) => {
                let remaining_secs = expires_at - now;
                if remaining_secs <= 0 {
                    TokenHealth::Expired
                } else if remaining_secs < EXPIRY_WARNING_SECS {
                    TokenHealth::ExpiringSoon { remaining_secs }
                } else {
                    TokenHealth::Valid
                }
            }
            _ => TokenHealth::Valid,
        }
    }
}

// --- Vista de sesión ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
}

/// Sesión hidratada tal y como la consume el frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user: SessionUser,
    pub access_token: String,
    pub provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub expires: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_out_in: Option<i64>,
}

impl SessionView {
    pub fn hydrate(claims: &SessionClaims, now: i64) -> Self {
        let (warning, sign_out_in) = match claims.token_health(now) {
            TokenHealth::ExpiringSoon { remaining_secs } => (
                Some(format!(
                    "Your Google session expires in {} minute(s)",
                    (remaining_secs + 59) / 60
                )),
                Some(remaining_secs),
            ),
            _ => (None, None),
        };

        Self {
            user: SessionUser {
                id: claims.sub.clone(),
                full_name: claims.full_name.clone(),
                email: claims.email.clone(),
            },
            access_token: claims.access_token.clone(),
            provider: claims.provider,
            expires_at: claims.expires_at,
            expires: DateTime::<Utc>::from_timestamp(claims.exp, 0).unwrap_or_default(),
            warning,
            sign_out_in,
        }
    }
}

// --- Firma y verificación ---

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

/// Claves HS256 compartidas por la sesión y la cookie de estado OAuth.
#[derive(Clone)]
pub struct SessionKeys {
    inner: Arc<Keys>,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            inner: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation,
            }),
        }
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.inner.encoding)?)
    }

    /// Verifica firma y `exp`.
    pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let data = decode::<T>(token, &self.inner.decoding, &self.inner.validation)?;
        Ok(data.claims)
    }
}

// --- Extractor ---

/// Sesión autenticada. Rechaza con 401 antes de ejecutar el handler.
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    SessionKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_value(&jar, SESSION_COOKIE))
            .ok_or_else(AppError::unauthorized)?;

        let claims: SessionClaims = keys.verify(&token).map_err(|e| {
            debug!("Token de sesión rechazado: {e}");
            AppError::unauthorized()
        })?;

        match claims.token_health(Utc::now().timestamp()) {
            // `for_google` acota `exp` al token del proveedor; esto cubre tokens antiguos o forjados.
            TokenHealth::Expired => {
                info!(email = %claims.email, "Token de Google caducado, forzando cierre de sesión");
                return Err(AppError::Unauthorized("Session expired".to_string()));
            }
            TokenHealth::ExpiringSoon { remaining_secs } => {
                warn!(
                    email = %claims.email,
                    remaining_secs,
                    "El token de Google caduca en menos de 5 minutos"
                );
            }
            TokenHealth::Valid => {}
        }

        Ok(AuthSession(claims))
    }
}

// --- Cookies y cabeceras ---

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Valor de una cookie, sin comillas envolventes.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value_trimmed().to_string())
        .filter(|v| !v.is_empty())
}

/// Cookie `HttpOnly; SameSite=Lax` con vida `max_age_secs`.
pub fn build_cookie(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

pub fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = build_cookie(name, String::new(), 0, false);
    cookie.make_removal();
    cookie
}

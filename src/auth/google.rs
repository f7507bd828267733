//! # Acceso con Google (OAuth 2.0, Authorization Code + PKCE)
//!
//! 1. [`GoogleOAuth::authorization_request`] construye la URL de autorización
//!    (scopes `openid email profile`) y devuelve el [`OAuthState`] que el
//!    handler guarda firmado en la cookie `oauth_state` durante 10 minutos.
//! 2. [`GoogleOAuth::exchange_code`] canjea el código (con el verificador
//!    PKCE) y lee el email del endpoint userinfo de Google.
//! 3. [`complete_sign_in`] sólo abre sesión si existe una cuenta local
//!    verificada con ese email; Google nunca crea cuentas nuevas.

use anyhow::{anyhow, Context, Result};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::{
    auth::session::SessionClaims, config::GoogleConfig, error::AppError, store::UserStore,
};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub const OAUTH_STATE_TTL_SECS: i64 = 10 * 60;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Estado CSRF + verificador PKCE, firmado como JWT en una cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuthState {
    pub csrf: String,
    pub pkce_verifier: String,
    pub exp: i64,
}

/// Resultado del canje del código con Google.
#[derive(Debug, Clone)]
pub struct GoogleGrant {
    pub email: String,
    pub access_token: String,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    email: String,
}

pub struct GoogleOAuth {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(cfg: &GoogleConfig) -> Result<Self> {
        // El canje de tokens no debe seguir redirecciones.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client_id: ClientId::new(cfg.client_id.clone()),
            client_secret: ClientSecret::new(cfg.client_secret.clone()),
            auth_url: AuthUrl::new(AUTH_URL.to_string())?,
            token_url: TokenUrl::new(TOKEN_URL.to_string())?,
            redirect_url: RedirectUrl::new(cfg.redirect_url.clone())
                .with_context(|| format!("GOOGLE_REDIRECT_URL inválida: {}", cfg.redirect_url))?,
            http,
        })
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
    }

    pub fn authorization_request(&self, now: i64) -> (Url, OAuthState) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf) = self
            .create_client()
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        let state = OAuthState {
            csrf: csrf.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
            exp: now + OAUTH_STATE_TTL_SECS,
        };
        (auth_url, state)
    }

    pub async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> Result<GoogleGrant> {
        let token = self
            .create_client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| anyhow!("Fallo en el canje del código de Google: {e}"))?;

        let access_token = token.access_token().secret().clone();
        let expires_in = token.expires_in().map(|d| d.as_secs() as i64);

        let profile: GoogleUser = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(GoogleGrant {
            email: profile.email,
            access_token,
            expires_in,
        })
    }
}

/// Comprueba que el `state` devuelto por Google coincide con el de la cookie.
pub fn check_state(expected: &OAuthState, returned: &str) -> Result<(), AppError> {
    if expected.csrf == returned {
        Ok(())
    } else {
        Err(AppError::Unauthorized("OAuth state mismatch".to_string()))
    }
}

/// Abre sesión de Google sólo para cuentas locales existentes y verificadas.
pub async fn complete_sign_in(
    store: &dyn UserStore,
    grant: GoogleGrant,
    now: i64,
    ttl_secs: i64,
) -> Result<SessionClaims, AppError> {
    let user = store.find_by_email(&grant.email).await?;
    match user {
        Some(user) if user.is_verified => {
            info!(email = %user.email, "Inicio de sesión con Google");
            Ok(SessionClaims::for_google(
                &user,
                grant.access_token,
                grant.expires_in,
                now,
                ttl_secs,
            ))
        }
        _ => {
            warn!(email = %grant.email, "Acceso con Google rechazado: no hay cuenta verificada");
            Err(AppError::Unauthorized("AccessDenied".to_string()))
        }
    }
}

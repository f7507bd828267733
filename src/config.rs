//! Carga y gestión de configuración de la aplicación (almacén, sesión,
//! Google OAuth, backend de IA y correo).

use std::env;
use anyhow::{anyhow, Context, Result};
use url::Url;

/// Backend de persistencia para los documentos de usuario.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Neo4j,
    Memory,
}

impl StoreBackend {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "neo4j" => Ok(Self::Neo4j),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow!("Backend de almacenamiento no soportado: {other}")),
        }
    }
}

/// Credenciales del cliente OAuth de Google.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub server_addr: String,

    pub session_secret: String,
    pub session_ttl_secs: i64,
    /// Añade `Secure` a las cookies (despliegues HTTPS).
    pub cookie_secure: bool,
    pub google: Option<GoogleConfig>,

    pub ai_backend_url: Url,
    pub max_upload_bytes: usize,

    pub resend_api_key: Option<String>,
    pub mail_from: String,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let store_backend =
            StoreBackend::from_str(&env::var("STORE_BACKEND").unwrap_or_else(|_| "neo4j".to_string()))?;

        let (neo4j_uri, neo4j_user, neo4j_password) = match store_backend {
            StoreBackend::Neo4j => (
                env::var("NEO4J_URI").map_err(|_| anyhow!("Falta NEO4J_URI en el entorno"))?,
                env::var("NEO4J_USER").map_err(|_| anyhow!("Falta NEO4J_USER en el entorno"))?,
                env::var("NEO4J_PASSWORD")
                    .map_err(|_| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?,
            ),
            StoreBackend::Memory => (String::new(), String::new(), String::new()),
        };

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());

        let session_secret = first_var(&["SESSION_SECRET", "NEXTAUTH_SECRET"])
            .ok_or_else(|| anyhow!("Falta SESSION_SECRET en el entorno"))?;
        let session_ttl_secs = parse_var("SESSION_TTL_SECS", 30 * 24 * 60 * 60)?;
        let cookie_secure = parse_var("COOKIE_SECURE", false)?;

        let google = match (env::var("GOOGLE_CLIENT_ID"), env::var("GOOGLE_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url: env::var("GOOGLE_REDIRECT_URL").unwrap_or_else(|_| {
                    format!("http://{server_addr}/api/auth/google/callback")
                }),
            }),
            _ => None,
        };

        let ai_backend_raw = first_var(&["AI_BACKEND_URL", "FASTAPI_BACKEND_URL"])
            .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());
        let ai_backend_url = Url::parse(&ai_backend_raw)
            .with_context(|| format!("AI_BACKEND_URL inválida: {ai_backend_raw}"))?;

        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?;

        let resend_api_key = env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty());
        let mail_from = env::var("MAIL_FROM")
            .unwrap_or_else(|_| "Acme <onboarding@resend.dev>".to_string());

        Ok(Self {
            store_backend,
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            server_addr,
            session_secret,
            session_ttl_secs,
            cookie_secure,
            google,
            ai_backend_url,
            max_upload_bytes,
            resend_api_key,
            mail_from,
        })
    }
}

fn first_var(keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()))
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow!("Valor inválido para {key}: {e}")),
        Err(_) => Ok(default),
    }
}

//! Envío de códigos de verificación.
//!
//! En producción se usa la API HTTP de Resend. Sin `RESEND_API_KEY` el
//! código sólo se escribe en los logs (útil en desarrollo).

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::config::AppConfig;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const SUBJECT: &str = "campuscrux | Verification code";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification(&self, email: &str, full_name: &str, code: &str) -> Result<()>;
}

pub fn from_config(cfg: &AppConfig) -> Arc<dyn Mailer> {
    match &cfg.resend_api_key {
        Some(api_key) => Arc::new(ResendMailer::new(api_key.clone(), cfg.mail_from.clone())),
        None => {
            warn!("RESEND_API_KEY no configurada: los códigos de verificación sólo se registrarán en el log");
            Arc::new(LogMailer)
        }
    }
}

pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_verification(&self, email: &str, full_name: &str, code: &str) -> Result<()> {
        let body = json!({
            "from": self.from,
            "to": [email],
            "subject": SUBJECT,
            "html": verification_html(full_name, code),
        });

        self.client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        info!(%email, "Email de verificación enviado");
        Ok(())
    }
}

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, email: &str, full_name: &str, code: &str) -> Result<()> {
        info!(%email, %full_name, %code, "Código de verificación (sin envío real)");
        Ok(())
    }
}

fn verification_html(full_name: &str, code: &str) -> String {
    let full_name = escape_html(full_name);
    format!(
        "<p>Hello {full_name},</p>\
         <p>Thank you for registering. Please use the following verification code to complete your registration:</p>\
         <h2>{code}</h2>\
         <p>If you did not request this code, please ignore this email.</p>"
    )
}

fn escape_html(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            other => other.to_string(),
        })
        .collect()
}

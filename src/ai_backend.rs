//! Cliente del backend de IA (vectorización, resúmenes y preguntas).
//!
//! El servicio es opaco: reenviamos el formulario multipart recibido, le
//! añadimos la identidad del usuario y devolvemos su JSON tal cual.

use std::str::FromStr;

use axum::{body::Bytes, extract::Multipart};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::auth::SessionClaims;

pub const PROVIDER_HEADER: &str = "X-User-Provider";

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("{0}")]
    Invalid(String),

    #[error("AI backend responded with status {status}")]
    Upstream { status: u16, body: String },

    #[error("AI backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Vectorize,
    Query,
}

impl Endpoint {
    fn path(&self) -> &'static str {
        match self {
            Endpoint::Vectorize => "vectorize",
            Endpoint::Query => "query",
        }
    }
}

/// Modos de resumen aceptados por `/api/initialSearch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    BriefDoc,
    DetailDoc,
    SumTube,
    VisuaLens,
}

impl FromStr for SummaryMode {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "briefDoc" => Ok(Self::BriefDoc),
            "detailDoc" => Ok(Self::DetailDoc),
            "sumTube" => Ok(Self::SumTube),
            "visuaLens" => Ok(Self::VisuaLens),
            other => Err(ProxyError::Invalid(format!("Unsupported mode: {other}"))),
        }
    }
}

// --- Formulario reenviado ---

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        content_type: String,
        bytes: Bytes,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

/// Campos multipart en el orden en que llegaron.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardedForm {
    fields: Vec<FormField>,
}

impl ForwardedForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ProxyError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ProxyError::Invalid(format!("Multipart error: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            let value = match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .map(str::to_string)
                        .unwrap_or_else(|| {
                            mime_guess::from_path(&file_name)
                                .first_or_octet_stream()
                                .to_string()
                        });
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| ProxyError::Invalid(format!("Read error: {e}")))?;
                    FormValue::File {
                        file_name,
                        content_type,
                        bytes,
                    }
                }
                None => FormValue::Text(
                    field
                        .text()
                        .await
                        .map_err(|e| ProxyError::Invalid(format!("Read error: {e}")))?,
                ),
            };

            form.fields.push(FormField { name, value });
        }

        Ok(form)
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.iter().find_map(|f| match &f.value {
            FormValue::Text(v) if f.name == name => Some(v.as_str()),
            _ => None,
        })
    }

    fn non_empty_text(&self, name: &str) -> Option<&str> {
        self.text(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.fields
            .iter()
            .any(|f| f.name == name && matches!(f.value, FormValue::File { .. }))
    }

    /// Fija un campo de texto, descartando cualquier valor previo con ese nombre.
    pub fn set_text(&mut self, name: &str, value: &str) {
        self.fields.retain(|f| f.name != name);
        self.fields.push(FormField {
            name: name.to_string(),
            value: FormValue::Text(value.to_string()),
        });
    }

    fn into_multipart(self) -> Result<reqwest::multipart::Form, ProxyError> {
        let mut form = reqwest::multipart::Form::new();
        for field in self.fields {
            form = match field.value {
                FormValue::Text(text) => form.text(field.name, text),
                FormValue::File {
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let part = reqwest::multipart::Part::bytes(bytes.to_vec())
                        .file_name(file_name)
                        .mime_str(&content_type)?;
                    form.part(field.name, part)
                }
            };
        }
        Ok(form)
    }
}

// --- Validación ---

/// `sumTube` necesita `url`; el resto de modos, un fichero en `file`.
pub fn validate_initial(form: &ForwardedForm) -> Result<SummaryMode, ProxyError> {
    let mode: SummaryMode = form
        .non_empty_text("mode")
        .ok_or_else(|| ProxyError::Invalid("Missing mode".to_string()))?
        .parse()?;

    match mode {
        SummaryMode::SumTube if form.non_empty_text("url").is_none() => {
            Err(ProxyError::Invalid("A video url is required".to_string()))
        }
        SummaryMode::SumTube => Ok(mode),
        _ if !form.has_file("file") => Err(ProxyError::Invalid("A file is required".to_string())),
        _ => Ok(mode),
    }
}

pub fn validate_question(form: &ForwardedForm) -> Result<(), ProxyError> {
    if form.non_empty_text("question").is_none() {
        return Err(ProxyError::Invalid("Question is required".to_string()));
    }
    if form.non_empty_text("session_id").is_none() && form.non_empty_text("video_id").is_none() {
        return Err(ProxyError::Invalid(
            "A session_id or video_id is required".to_string(),
        ));
    }
    Ok(())
}

// --- Cliente ---

#[derive(Clone)]
pub struct AiBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl AiBackend {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            endpoint.path()
        )
    }

    /// Reenvía el formulario con `user_id` y `provider` de la sesión.
    pub async fn forward(
        &self,
        endpoint: Endpoint,
        mut form: ForwardedForm,
        session: &SessionClaims,
    ) -> Result<Value, ProxyError> {
        let provider = session.provider.as_str();
        form.set_text("user_id", &session.sub);
        form.set_text("provider", provider);

        let url = self.endpoint_url(endpoint);
        debug!(%url, fields = form.fields.len(), "Reenviando petición al backend de IA");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .header(PROVIDER_HEADER, provider)
            .multipart(form.into_multipart()?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%url, %status, "El backend de IA devolvió un error");
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

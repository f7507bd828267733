use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    ai_backend::AiBackend, auth::google::GoogleOAuth, auth::SessionKeys, config::AppConfig,
    mailer::Mailer, store::UserStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn UserStore>,
    pub mailer: Arc<dyn Mailer>,
    pub sessions: SessionKeys,
    pub ai_backend: AiBackend,
    /// `None` cuando no hay credenciales de Google configuradas.
    pub google: Option<Arc<GoogleOAuth>>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn UserStore>, mailer: Arc<dyn Mailer>) -> anyhow::Result<Self> {
        let google = match &config.google {
            Some(google_cfg) => Some(Arc::new(GoogleOAuth::new(google_cfg)?)),
            None => None,
        };

        Ok(Self {
            sessions: SessionKeys::new(&config.session_secret),
            ai_backend: AiBackend::new(config.ai_backend_url.clone()),
            config,
            store,
            mailer,
            google,
        })
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

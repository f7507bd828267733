use std::sync::Arc;

use anyhow::{Context, Result};
use campuscrux_webapp::{
    api,
    app_state::AppState,
    config::{AppConfig, StoreBackend},
    mailer, neo4j_client,
    store::{MemoryUserStore, UserStore},
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Elegir almacén de usuarios (Neo4j con esquema asegurado, o memoria)
    let store: Arc<dyn UserStore> = match cfg.store_backend {
        StoreBackend::Neo4j => {
            let graph = neo4j_client::connect_from_config(&cfg)
                .await
                .context("Error conectando a Neo4j")?;
            neo4j_client::ensure_schema(&graph)
                .await
                .context("Error asegurando el esquema de Neo4j")?;
            Arc::new(neo4j_client::Neo4jUserStore::new(Arc::new(graph)))
        }
        StoreBackend::Memory => {
            warn!("Usando almacén en memoria: los datos se perderán al reiniciar");
            Arc::new(MemoryUserStore::new())
        }
    };

    // 4. Estado compartido
    let mailer = mailer::from_config(&cfg);
    let app_state = AppState::new(cfg.clone(), store, mailer)
        .context("Error inicializando el estado de la aplicación")?;
    if app_state.google.is_none() {
        info!("GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET no configurados: acceso con Google desactivado");
    }

    // 5. Router con CORS y trazas HTTP
    let app = api::create_router(app_state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // 6. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(&cfg.server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {}", cfg.server_addr))?;
    info!("🚀 Servidor escuchando en http://{}", cfg.server_addr);
    info!("Backend de IA en {}", cfg.ai_backend_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("No se pudo instalar el manejador de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl+C recibido, iniciando cierre del servidor.");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("SIGTERM recibido, iniciando cierre del servidor.");
            }
            Err(e) => {
                warn!("No se pudo instalar el manejador de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

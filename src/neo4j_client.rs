//! Conexión a Neo4j y almacén de usuarios sobre nodos `:User`.
//!
//! Cada usuario es un nodo `(:User {id, email, document, updated_at})` donde
//! `document` guarda el JSON completo (carpetas, conversaciones, notas).

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

use crate::{config::AppConfig, models::User, store::UserStore};

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea los constraints de unicidad para :User (email e id).
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        "CREATE CONSTRAINT user_email IF NOT EXISTS
         FOR (u:User)
         REQUIRE u.email IS UNIQUE",
        "CREATE CONSTRAINT user_id IF NOT EXISTS
         FOR (u:User)
         REQUIRE u.id IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraints de :User creados).");
    Ok(())
}

pub struct Neo4jUserStore {
    graph: Arc<Graph>,
}

impl Neo4jUserStore {
    pub fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl UserStore for Neo4jUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut cursor = self
            .graph
            .execute(
                query("MATCH (u:User {email: $email}) RETURN u.document AS document")
                    .param("email", email),
            )
            .await?;

        match cursor.next().await? {
            Some(row) => {
                let document: String = row
                    .get("document")
                    .ok_or_else(|| anyhow!("Falta campo 'document' en el nodo :User"))?;
                let user = serde_json::from_str(&document)
                    .with_context(|| format!("Documento de usuario corrupto para {email}"))?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, user: &User) -> Result<()> {
        let document = serde_json::to_string(user)?;
        self.graph
            .run(
                query(
                    "CREATE (u:User {id: $id, email: $email, document: $document,
                                     updated_at: datetime($updated_at)})",
                )
                .param("id", user.id.clone())
                .param("email", user.email.clone())
                .param("document", document)
                .param("updated_at", Utc::now().to_rfc3339()),
            )
            .await
            .with_context(|| format!("No se pudo crear el usuario {}", user.email))?;
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<()> {
        let document = serde_json::to_string(user)?;
        let mut cursor = self
            .graph
            .execute(
                query(
                    "MATCH (u:User {email: $email})
                     SET u.document = $document, u.updated_at = datetime($updated_at)
                     RETURN u.id AS id",
                )
                .param("email", user.email.clone())
                .param("document", document)
                .param("updated_at", Utc::now().to_rfc3339()),
            )
            .await?;

        if cursor.next().await?.is_none() {
            return Err(anyhow!("No existe ningún usuario con el email {}", user.email));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }
}

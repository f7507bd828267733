//! Abstracción del almacén de documentos de usuario.
//!
//! Cada operación de la API lee el documento completo, modifica una
//! colección anidada y vuelve a guardar el documento entero. No hay
//! bloqueos: dos escrituras concurrentes sobre el mismo usuario se
//! resuelven con "gana la última".

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::User;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Inserta un usuario nuevo. Falla si el email ya existe.
    async fn insert(&self, user: &User) -> Result<()>;

    /// Sustituye el documento completo de un usuario existente.
    async fn save(&self, user: &User) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

/// Almacén en memoria, usado en tests y con `STORE_BACKEND=memory`.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn insert(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Err(anyhow!("Ya existe un usuario con el email {}", user.email));
        }
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.email) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(anyhow!("No existe ningún usuario con el email {}", user.email)),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

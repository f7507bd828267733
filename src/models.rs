//! Modelos de dominio: el documento `User` y sus colecciones anidadas
//! (carpetas → conversaciones → mensajes y notas).
//!
//! Los nombres de campo siguen el formato JSON del frontend (camelCase,
//! identificadores en `_id`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Genera un identificador de 24 caracteres hexadecimales (forma ObjectId),
/// que es el formato que espera el backend de IA para sesiones con credenciales.
pub fn new_object_id() -> String {
    let bytes: [u8; 12] = rand::random();
    hex::encode(bytes)
}

/// Documento completo de un usuario tal y como se persiste.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    /// Hash Argon2 en formato PHC.
    pub password: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_code_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub folders: Vec<Folder>,
}

impl User {
    pub fn new_unverified(
        full_name: String,
        email: String,
        password_hash: String,
        verify_code: String,
        verify_code_expiry: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_object_id(),
            full_name,
            email,
            password: password_hash,
            is_verified: false,
            verify_code: Some(verify_code),
            verify_code_expiry: Some(verify_code_expiry),
            folders: Vec::new(),
        }
    }

    pub fn folder_by_name_mut(&mut self, folder_name: &str) -> Option<&mut Folder> {
        self.folders
            .iter_mut()
            .find(|f| f.folder_name == folder_name)
    }

    /// Comprueba si ya existe una carpeta con ese nombre, sin distinguir mayúsculas.
    pub fn has_folder_named(&self, folder_name: &str) -> bool {
        let wanted = folder_name.to_lowercase();
        self.folders
            .iter()
            .any(|f| f.folder_name.to_lowercase() == wanted)
    }

    /// Los nombres de conversación son únicos en todas las carpetas del usuario.
    pub fn has_conversation_named(&self, name: &str) -> bool {
        self.folders
            .iter()
            .flat_map(|f| f.conversations.iter())
            .any(|c| c.name == name)
    }

    /// Busca una conversación por `_id` en todas las carpetas.
    pub fn conversation_mut(&mut self, conversation_id: &str) -> Option<&mut Conversation> {
        self.folders
            .iter_mut()
            .flat_map(|f| f.conversations.iter_mut())
            .find(|c| c.id == conversation_id)
    }

    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            is_verified: self.is_verified,
        }
    }
}

/// Proyección segura para enviar al cliente (sin hash ni código).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    #[serde(rename = "_id")]
    pub id: String,
    pub folder_name: String,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn new(folder_name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_object_id(),
            folder_name,
            conversations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub notes: Vec<Note>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// La nota vigente es siempre la última añadida.
    pub fn current_note(&self) -> Option<&Note> {
        self.notes.last()
    }

    pub fn append_note(&mut self, note: Note) {
        self.updated_at = note.timestamp;
        self.notes.push(note);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Mensaje de chat. El contenido es libre: texto plano o un objeto con
/// `mode`, `summary`, `answer`, `sources`...
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(rename = "type")]
    pub role: MessageRole,
    pub content: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Note {
    pub fn text(content: &str, now: DateTime<Utc>) -> Self {
        Self {
            kind: "text".to_string(),
            content: Value::String(content.to_string()),
            timestamp: now,
        }
    }
}

//! Carpetas, conversaciones y notas del usuario.
//!
//! Todas las operaciones siguen el mismo ciclo: cargar el documento completo
//! por email, mutar un único elemento anidado y guardar el documento entero.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{
    error::AppError,
    models::{new_object_id, Conversation, Folder, Message, Note, User},
    store::UserStore,
};

/// Conversación tal y como la envía el cliente al guardarla.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub folder_name: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Resultado de guardar una nota: historial completo y nota vigente.
#[derive(Debug, Clone)]
pub struct SavedNote {
    pub notes: Vec<Note>,
    pub current_note: Option<Note>,
}

async fn load_user(store: &dyn UserStore, email: &str) -> Result<User, AppError> {
    store
        .find_by_email(email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

fn required(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub async fn create_folder(
    store: &dyn UserStore,
    email: &str,
    folder_name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Folder, AppError> {
    let folder_name =
        required(folder_name).ok_or_else(|| AppError::bad_request("Folder name is required"))?;

    let mut user = load_user(store, email).await?;
    if user.has_folder_named(folder_name) {
        return Err(AppError::bad_request("A folder with this name already exists"));
    }

    let folder = Folder::new(folder_name.to_string(), now);
    user.folders.push(folder.clone());
    store.save(&user).await?;

    info!(%email, folder = %folder.folder_name, "Carpeta creada");
    Ok(folder)
}

pub async fn fetch_folders(store: &dyn UserStore, email: &str) -> Result<Vec<Folder>, AppError> {
    Ok(load_user(store, email).await?.folders)
}

pub async fn create_conversation(
    store: &dyn UserStore,
    email: &str,
    draft: ConversationDraft,
    now: DateTime<Utc>,
) -> Result<Conversation, AppError> {
    let name = required(draft.name.as_deref())
        .ok_or_else(|| AppError::bad_request("Conversation name is required"))?
        .to_string();
    let folder_name = required(draft.folder_name.as_deref())
        .ok_or_else(|| AppError::bad_request("Folder name is required"))?
        .to_string();

    let mut user = load_user(store, email).await?;
    if user.has_conversation_named(&name) {
        return Err(AppError::bad_request(
            "A conversation with this name already exists",
        ));
    }

    let folder = user
        .folder_by_name_mut(&folder_name)
        .ok_or_else(|| AppError::not_found("Folder not found"))?;

    let conversation = Conversation {
        id: new_object_id(),
        name,
        messages: draft.messages,
        notes: Vec::new(),
        created_at: draft.created_at.unwrap_or(now),
        updated_at: draft.updated_at.unwrap_or(now),
    };
    folder.conversations.push(conversation.clone());
    folder.updated_at = now;
    store.save(&user).await?;

    info!(%email, %folder_name, conversation = %conversation.name, "Conversación guardada");
    Ok(conversation)
}

/// Añade una nota de texto a la conversación. Las notas nunca se sobrescriben.
pub async fn save_note(
    store: &dyn UserStore,
    email: &str,
    conversation_id: Option<&str>,
    note: Option<&Value>,
    now: DateTime<Utc>,
) -> Result<SavedNote, AppError> {
    let (conversation_id, text) = match (required(conversation_id), note.and_then(Value::as_str)) {
        (Some(id), Some(text)) => (id, text),
        _ => return Err(AppError::bad_request("Invalid request data")),
    };

    let mut user = load_user(store, email).await?;
    let conversation = user
        .conversation_mut(conversation_id)
        .ok_or_else(|| AppError::not_found("Conversation not found"))?;

    conversation.append_note(Note::text(text, now));
    let saved = SavedNote {
        notes: conversation.notes.clone(),
        current_note: conversation.current_note().cloned(),
    };
    store.save(&user).await?;

    info!(%email, %conversation_id, total = saved.notes.len(), "Nota guardada");
    Ok(saved)
}

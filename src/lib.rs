//! API web de campuscrux: autenticación, carpetas/conversaciones/notas y
//! proxy hacia el backend de IA.

pub mod accounts;
pub mod ai_backend;
pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod error;
pub mod library;
pub mod mailer;
pub mod models;
pub mod neo4j_client;
pub mod store;

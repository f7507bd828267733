//! Autenticación: contraseñas, códigos de verificación, tokens de sesión
//! y acceso con Google.

pub mod credentials;
pub mod google;
pub mod password;
pub mod session;
pub mod verification;

pub use session::{AuthSession, Provider, SessionClaims, SessionKeys};

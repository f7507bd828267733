//! Acceso con email y contraseña.

use tracing::warn;

use crate::{
    auth::password::verify_password, error::AppError, models::User, store::UserStore,
};

const INVALID_CREDENTIALS: &str = "Incorrect username or password";

/// Devuelve el usuario si existe, está verificado y la contraseña coincide.
/// Cualquier otro caso es un 401 genérico, sin revelar cuál falló.
pub async fn authorize(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = store
        .find_by_email(email.trim())
        .await?
        .filter(|u| u.is_verified)
        .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    match verify_password(password, &user.password) {
        Ok(true) => Ok(user),
        Ok(false) => Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string())),
        Err(e) => {
            warn!(email = %user.email, "Hash de contraseña ilegible: {:#}", e);
            Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))
        }
    }
}

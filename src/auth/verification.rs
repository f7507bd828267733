//! Códigos de verificación de cuenta (6 dígitos, caducidad corta).

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::models::User;

/// Validez de un código emitido en el alta o en un reenvío.
pub const CODE_TTL_MINUTES: i64 = 10;
/// Validez del código cuando se repite el alta de una cuenta sin verificar.
pub const RESIGNUP_CODE_TTL_MINUTES: i64 = 60;

pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

pub fn expiry_in(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    now + Duration::minutes(minutes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Accepted,
    Expired,
    Mismatch,
}

/// Acepta el código sólo si coincide y su caducidad es posterior a `now`.
pub fn check_code(user: &User, submitted: &str, now: DateTime<Utc>) -> CodeCheck {
    if user.verify_code.as_deref() != Some(submitted) {
        return CodeCheck::Mismatch;
    }
    match user.verify_code_expiry {
        Some(expiry) if expiry > now => CodeCheck::Accepted,
        _ => CodeCheck::Expired,
    }
}

/// Marca la cuenta como verificada y descarta el código.
pub fn mark_verified(user: &mut User) {
    user.is_verified = true;
    user.verify_code = None;
    user.verify_code_expiry = None;
}

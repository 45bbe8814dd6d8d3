//! Autenticación de las peticiones HTTP.
//!
//! El [`IdentityResolver`] se registra como `app_data`; estos helpers leen
//! el header `Authorization: Bearer <token>` y devuelven la [`Identity`]
//! del llamante o el [`AppError`] correspondiente (401/403).

use actix_web::{web, HttpRequest};

use super::{AppError, AppResult};
use crate::auth::{AuthError, Identity, IdentityResolver, Role};

/// Extrae el token Bearer del header Authorization
///
/// # Retorna
/// - `Ok(None)` si la petición no trae header
/// - `Ok(Some(token))` sin el prefijo "Bearer "
///
/// # Errores
/// - `Unauthorized`: si el header no es texto o no tiene el formato `Bearer <token>`
fn extract_token(req: &HttpRequest) -> AppResult<Option<String>> {
    let Some(auth_header) = req.headers().get("authorization") else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::from(AuthError::MalformedHeader))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        _ => Err(AuthError::MalformedHeader.into()),
    }
}

fn resolver(req: &HttpRequest) -> AppResult<&IdentityResolver> {
    req.app_data::<web::Data<IdentityResolver>>()
        .map(|data| data.get_ref())
        .ok_or_else(|| AppError::internal_trace("IdentityResolver no registrado en la aplicación", None))
}

/// Identidad del llamante si envió token. Un token presente pero inválido
/// o expirado es un 401, nunca una petición anónima.
pub fn optional_identity(req: &HttpRequest) -> AppResult<Option<Identity>> {
    match extract_token(req)? {
        Some(token) => Ok(Some(resolver(req)?.authenticate(&token)?)),
        None => Ok(None),
    }
}

/// Exige un token válido
pub fn require_identity(req: &HttpRequest) -> AppResult<Identity> {
    optional_identity(req)?.ok_or_else(|| AuthError::MissingToken.into())
}

/// Exige un token válido con rol `required` o superior
pub fn require_role(req: &HttpRequest, required: Role) -> AppResult<Identity> {
    let token = extract_token(req)?.ok_or(AuthError::MissingToken)?;
    Ok(resolver(req)?.authorize(&token, required)?)
}

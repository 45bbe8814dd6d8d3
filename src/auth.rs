//! # Identidad y roles
//!
//! Decodifica los JWT emitidos por el servicio de autenticación (HS256,
//! clave compartida) y los convierte en una [`Identity`] con un [`Role`]
//! cerrado y ordenado. La clave se inyecta al construir el
//! [`IdentityResolver`].

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Roles de la cadena hotelera, de menor a mayor privilegio
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Client,
    Employee,
    Manager,
    Admin,
}

impl Role {
    /// `EMPLOYEE` o superior
    pub fn is_staff(self) -> bool {
        self >= Role::Employee
    }

    /// Un rol cumple un requisito "X o superior" si es al menos X
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "CLIENT",
            Role::Employee => "EMPLOYEE",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(Role::Client),
            "EMPLOYEE" => Ok(Role::Employee),
            "MANAGER" => Ok(Role::Manager),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("rol desconocido: '{}'", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Payload del JWT
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
}

/// Usuario autenticado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub role: Role,
    pub email: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Tokens antiguos solo traen `sub`; `user_id`, `email` y `username`
    /// caen sobre él cuando faltan.
    fn from_claims(claims: Claims) -> Self {
        let subject_id = claims.user_id.unwrap_or_else(|| claims.sub.clone());
        let email = claims.email.unwrap_or_else(|| claims.sub.clone());
        let username = claims.username.unwrap_or_else(|| email.clone());
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp as i64, 0).unwrap_or_default();

        Identity {
            subject_id,
            role: claims.role,
            email,
            username,
            expires_at,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Falta el header Authorization")]
    MissingToken,

    #[error("Header Authorization inválido")]
    MalformedHeader,

    #[error("Token expirado")]
    Expired,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Se requiere rol {required} o superior")]
    InsufficientRole { required: Role },
}

/// Verifica tokens con la clave compartida del servicio de autenticación
#[derive(Clone)]
pub struct IdentityResolver {
    key: DecodingKey,
    validation: Validation,
}

impl IdentityResolver {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::warn!("Token has expired");
                    AuthError::Expired
                }
                other => {
                    tracing::warn!(reason = ?other, "Invalid token");
                    AuthError::InvalidToken
                }
            }
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let identity = Identity::from_claims(data.claims);
        tracing::debug!(
            user = %identity.username,
            role = %identity.role,
            "User authenticated"
        );
        Ok(identity)
    }

    /// Autentica y exige un rol mínimo
    pub fn authorize(&self, token: &str, required: Role) -> Result<Identity, AuthError> {
        let identity = self.authenticate(token)?;
        if !identity.role.satisfies(required) {
            tracing::warn!(
                user = %identity.username,
                role = %identity.role,
                required = %required,
                "Access denied"
            );
            return Err(AuthError::InsufficientRole { required });
        }
        Ok(identity)
    }
}

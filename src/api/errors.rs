//! # Errores del API
//!
//! [`AppError`] es el único tipo de error que devuelven los handlers. Los
//! errores de las capas inferiores (`ReservationError`, `AuthError`,
//! `StoreError`) se convierten con `From`, de modo que `?` basta en los
//! handlers. Cada variante se registra con su nivel antes de responder.

use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use super::middleware::error_chain;
use crate::auth::AuthError;
use crate::db::StoreError;
use crate::engine::ReservationError;

/// Tipos de error de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    /// Error de validación con campo específico
    #[error("Error de validación en campo '{field}': {message}")]
    ValidationWithField { field: String, message: String },

    /// Error de validación general
    #[error("Error de validación: {0}")]
    Validation(String),

    /// Falta el token o no es válido
    #[error("No autorizado: {0}")]
    Unauthorized(String),

    /// Token válido pero sin permiso para la operación
    #[error("Prohibido: {0}")]
    Forbidden(String),

    #[error("No encontrado: {resource_type} con ID '{id}'")]
    NotFoundWithId { resource_type: String, id: String },

    #[error("Conflicto: {0}")]
    Conflict(String),

    /// Fallo del almacén; nunca se expone al cliente
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Error interno con código de rastreo
    #[error("Error interno (trace: {trace_id}): {message}")]
    InternalWithTrace { trace_id: String, message: String },
}

impl AppError {
    pub fn validation_field(field: &str, message: &str) -> Self {
        Self::ValidationWithField {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_found_id(resource_type: &str, id: &str) -> Self {
        Self::NotFoundWithId {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Crea un error interno con trace ID
    pub fn internal_trace(message: &str, trace_id: Option<String>) -> Self {
        Self::InternalWithTrace {
            trace_id: trace_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            message: message.to_string(),
        }
    }
}

impl From<ReservationError> for AppError {
    fn from(error: ReservationError) -> Self {
        match error {
            ReservationError::InvalidDateRange | ReservationError::DateInPast => {
                Self::Validation(error.to_string())
            }
            // En el alta, habitación inexistente u ocupada son errores de la petición
            ReservationError::RoomNotFound(_) => Self::validation_field("room_id", &error.to_string()),
            ReservationError::RoomUnavailable(_) => Self::Validation(error.to_string()),
            ReservationError::ReservationNotFound(id) => Self::not_found_id("Reserva", &id.to_string()),
            ReservationError::InvalidTransition { .. } | ReservationError::ConcurrentModification(_) => {
                Self::Conflict(error.to_string())
            }
            ReservationError::Storage(source) => Self::Storage(source),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InsufficientRole { .. } => Self::Forbidden(error.to_string()),
            other => Self::Unauthorized(other.to_string()),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationWithField { .. } | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFoundWithId { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::InternalWithTrace { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();

        match self {
            Self::ValidationWithField { field, message } => {
                tracing::warn!(field = %field, message = %message, "Validation error");
                HttpResponse::build(status).json(ErrorResponse::new(
                    "Error de validación",
                    format!("Campo '{}': {}", field, message),
                ))
            }
            Self::Validation(message) => {
                tracing::warn!(message = %message, "Validation error");
                HttpResponse::build(status).json(ErrorResponse::new("Error de validación", message.clone()))
            }
            Self::Unauthorized(reason) => {
                tracing::warn!(reason = %reason, "Unauthorized access attempt");
                HttpResponse::build(status)
                    .insert_header((header::WWW_AUTHENTICATE, "Bearer"))
                    .json(ErrorResponse::new("No autorizado", reason.clone()))
            }
            Self::Forbidden(reason) => {
                tracing::warn!(reason = %reason, "Forbidden");
                HttpResponse::build(status).json(ErrorResponse::new("Prohibido", reason.clone()))
            }
            Self::NotFoundWithId { resource_type, id } => {
                tracing::info!(resource_type = %resource_type, id = %id, "Resource not found");
                HttpResponse::build(status).json(ErrorResponse::new(
                    "No encontrado",
                    format!("{} con ID '{}' no encontrado", resource_type, id),
                ))
            }
            Self::Conflict(message) => {
                tracing::info!(message = %message, "Conflict");
                HttpResponse::build(status).json(ErrorResponse::new("Conflicto", message.clone()))
            }
            Self::Storage(source) => {
                let trace_id = uuid::Uuid::new_v4().to_string();
                tracing::error!(
                    trace_id = %trace_id,
                    error_chain = ?error_chain(source),
                    "Storage error occurred"
                );
                HttpResponse::build(status).json(ErrorResponse::new(
                    "Error interno",
                    format!("Error interno del servidor (trace: {})", trace_id),
                ))
            }
            Self::InternalWithTrace { trace_id, message } => {
                tracing::error!(trace_id = %trace_id, message = %message, "Internal error with trace");
                HttpResponse::build(status).json(ErrorResponse::new(
                    "Error interno",
                    format!("Error interno del servidor (trace: {})", trace_id),
                ))
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

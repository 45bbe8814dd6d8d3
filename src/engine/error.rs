use thiserror::Error;
use uuid::Uuid;

use crate::db::{ReservationStatus, StoreError};

#[derive(Error, Debug)]
pub enum ReservationError {
    #[error("La fecha de entrada debe ser anterior a la de salida")]
    InvalidDateRange,

    #[error("La fecha de entrada no puede estar en el pasado")]
    DateInPast,

    #[error("Habitación '{0}' no encontrada")]
    RoomNotFound(String),

    #[error("La habitación '{0}' no está disponible en las fechas seleccionadas")]
    RoomUnavailable(String),

    #[error("Reserva '{0}' no encontrada")]
    ReservationNotFound(Uuid),

    #[error("No se puede {action} la reserva '{id}' en estado '{from}'")]
    InvalidTransition {
        id: Uuid,
        from: ReservationStatus,
        action: &'static str,
    },

    /// Se agotaron los reintentos de compare-and-set
    #[error("La reserva '{0}' se modificó concurrentemente, inténtelo de nuevo")]
    ConcurrentModification(Uuid),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type EngineResult<T> = Result<T, ReservationError>;

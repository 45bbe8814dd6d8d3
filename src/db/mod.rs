//! # Persistencia
//!
//! Define los puertos de almacenamiento que usa el motor de reservas
//! ([`ReservationStore`] y [`RoomCatalog`]) y sus dos implementaciones:
//!
//! - [`mongodb`] - MongoDB, usada en producción
//! - [`memory`] - en memoria, para tests y ejecución local

pub mod memory;
pub mod models;
pub mod mongodb;

pub use memory::{InMemoryRoomCatalog, InMemoryStore};
pub use models::{
    ClientIdentity, NewReservation, Reservation, ReservationStatus, Room, StayRange,
    ACTIVE_STATUSES,
};
pub use self::mongodb::{MongoRepo, MongoReservationStore, MongoRoomCatalog};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errores de la capa de almacenamiento
#[derive(Error, Debug)]
pub enum StoreError {
    /// Otra reserva activa ocupa alguna noche del rango pedido
    #[error("La habitación '{room_id}' ya tiene una reserva activa en esas fechas")]
    Overlap { room_id: String },

    #[error("Reserva '{0}' no encontrada")]
    NotFound(Uuid),

    #[error("Error de base de datos en operación '{operation}': {source}")]
    Database {
        operation: String,
        #[source]
        source: ::mongodb::error::Error,
    },

    /// Documento que no se puede convertir al modelo de dominio
    #[error("Documento inválido en '{collection}': {message}")]
    Corrupt { collection: String, message: String },
}

impl StoreError {
    pub fn database(operation: &str, source: ::mongodb::error::Error) -> Self {
        Self::Database {
            operation: operation.to_string(),
            source,
        }
    }
}

/// Almacén de reservas
///
/// Las implementaciones deben garantizar que `create` compruebe el solape y
/// escriba como una sola unidad atómica, y que `update_if_unchanged` sea un
/// compare-and-set sobre `version`.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Inserta una reserva nueva asignándole id y marcas de tiempo.
    ///
    /// Si la reserva está activa y otra reserva activa de la misma habitación
    /// se solapa, falla con [`StoreError::Overlap`] sin escribir nada.
    async fn create(&self, new: NewReservation) -> StoreResult<Reservation>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Reservation>>;

    /// Reemplaza los campos mutables (estado, notas, empleado), refresca
    /// `updated_at` e incrementa `version`
    async fn update(&self, reservation: Reservation) -> StoreResult<Reservation>;

    /// Como [`update`](Self::update), pero solo si la versión guardada sigue
    /// siendo `reservation.version`. Devuelve `None` si no existe o si otra
    /// escritura llegó antes.
    async fn update_if_unchanged(&self, reservation: Reservation) -> StoreResult<Option<Reservation>>;

    async fn list_by_client(&self, client_id: &str) -> StoreResult<Vec<Reservation>>;

    async fn list_by_room(&self, room_id: &str) -> StoreResult<Vec<Reservation>>;

    async fn list(&self, skip: u64, limit: u64) -> StoreResult<Vec<Reservation>>;

    /// Predicado de disponibilidad con semántica de intervalo semiabierto
    async fn has_overlap(
        &self,
        room_id: &str,
        stay: StayRange,
        statuses: &[ReservationStatus],
    ) -> StoreResult<bool>;

    /// Borrado físico, sin pasar por la máquina de estados
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
}

/// Catálogo de habitaciones (propiedad del servicio de hoteles)
#[async_trait]
pub trait RoomCatalog: Send + Sync {
    async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>>;
}

//! # Motor de reservas
//!
//! Única autoridad sobre el alta de reservas, las transiciones de estado y
//! la disponibilidad de habitaciones. No guarda estado propio: cada operación
//! relee el registro del almacén antes de escribir.

mod error;

pub use error::{EngineResult, ReservationError};

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::db::{
    ClientIdentity, NewReservation, Reservation, ReservationStatus, ReservationStore,
    RoomCatalog, StayRange, StoreError, ACTIVE_STATUSES,
};

/// Reintentos de compare-and-set antes de rendirse con
/// [`ReservationError::ConcurrentModification`]
const MAX_WRITE_ATTEMPTS: usize = 3;

/// Datos de una reserva nueva tal como llegan del API
#[derive(Debug, Clone)]
pub struct CreateReservation {
    pub room_id: String,
    pub client: ClientIdentity,
    pub client_email: String,
    pub client_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub notes: Option<String>,
}

/// Operaciones que modifican una reserva existente
#[derive(Debug, Clone, Copy)]
enum Action {
    Confirm,
    Cancel,
    Complete,
    /// Volver a `PENDING`; la máquina de estados nunca lo permite
    Reopen,
    /// Solo notas, sin cambio de estado
    Annotate,
}

impl Action {
    fn for_target(status: ReservationStatus) -> Self {
        match status {
            ReservationStatus::Pending => Action::Reopen,
            ReservationStatus::Confirmed => Action::Confirm,
            ReservationStatus::Cancelled => Action::Cancel,
            ReservationStatus::Completed => Action::Complete,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Action::Confirm => "confirmar",
            Action::Cancel => "cancelar",
            Action::Complete => "completar",
            Action::Reopen => "reabrir",
            Action::Annotate => "anotar",
        }
    }

    /// Estado resultante, o `None` si la máquina de estados no lo permite
    fn target(self, from: ReservationStatus) -> Option<ReservationStatus> {
        let next = match self {
            Action::Confirm => ReservationStatus::Confirmed,
            Action::Cancel => ReservationStatus::Cancelled,
            Action::Complete => ReservationStatus::Completed,
            Action::Reopen => ReservationStatus::Pending,
            Action::Annotate => return Some(from),
        };
        from.can_transition_to(next).then_some(next)
    }
}

#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn ReservationStore>,
    rooms: Arc<dyn RoomCatalog>,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn ReservationStore>, rooms: Arc<dyn RoomCatalog>) -> Self {
        Self { store, rooms }
    }

    /// Crea una reserva `PENDING`.
    ///
    /// Valida, en este orden: rango de fechas, fecha de entrada no pasada
    /// (comparada con la fecha UTC del servidor, no la local), existencia de
    /// la habitación y disponibilidad. La disponibilidad se
    /// vuelve a comprobar dentro de la inserción del almacén, que es quien
    /// decide en caso de carrera.
    pub async fn create_reservation(&self, request: CreateReservation) -> EngineResult<Reservation> {
        let stay = StayRange::new(request.check_in, request.check_out)
            .ok_or(ReservationError::InvalidDateRange)?;

        if stay.check_in < Utc::now().date_naive() {
            return Err(ReservationError::DateInPast);
        }

        let room = self
            .rooms
            .get_room(&request.room_id)
            .await?
            .ok_or_else(|| ReservationError::RoomNotFound(request.room_id.clone()))?;

        if self
            .store
            .has_overlap(&room.id, stay, &ACTIVE_STATUSES)
            .await?
        {
            return Err(ReservationError::RoomUnavailable(room.id));
        }

        let total_price = room.price_per_night * stay.nights() as f64;

        let new = NewReservation {
            room_id: room.id.clone(),
            client: request.client,
            client_email: request.client_email,
            client_name: request.client_name,
            stay,
            total_price,
            notes: request.notes,
        };

        let reservation = self.store.create(new).await.map_err(|e| match e {
            StoreError::Overlap { room_id } => ReservationError::RoomUnavailable(room_id),
            other => ReservationError::Storage(other),
        })?;

        tracing::info!(
            id = %reservation.id,
            room_id = %reservation.room_id,
            client_id = %reservation.client.id(),
            guest = reservation.client.is_guest(),
            nights = stay.nights(),
            total_price = reservation.total_price,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// `true` si ninguna reserva activa se solapa con el rango en esa habitación
    pub async fn check_room_availability(
        &self,
        room_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> EngineResult<bool> {
        let stay = StayRange::new(check_in, check_out).ok_or(ReservationError::InvalidDateRange)?;
        let busy = self.store.has_overlap(room_id, stay, &ACTIVE_STATUSES).await?;
        Ok(!busy)
    }

    pub async fn confirm(&self, id: Uuid, employee_id: &str) -> EngineResult<Reservation> {
        self.apply(id, Action::Confirm, Some(employee_id), None).await
    }

    pub async fn cancel(&self, id: Uuid, employee_id: Option<&str>) -> EngineResult<Reservation> {
        self.apply(id, Action::Cancel, employee_id, None).await
    }

    pub async fn complete(&self, id: Uuid, employee_id: &str) -> EngineResult<Reservation> {
        self.apply(id, Action::Complete, Some(employee_id), None).await
    }

    pub async fn update_notes(
        &self,
        id: Uuid,
        notes: String,
        employee_id: &str,
    ) -> EngineResult<Reservation> {
        self.apply(id, Action::Annotate, Some(employee_id), Some(notes)).await
    }

    /// Transición a `status` y, si se indican, notas nuevas, en una sola
    /// escritura: o se aplican ambas o ninguna.
    pub async fn set_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        employee_id: &str,
        notes: Option<String>,
    ) -> EngineResult<Reservation> {
        self.apply(id, Action::for_target(status), Some(employee_id), notes).await
    }

    /// Lee, valida y escribe con compare-and-set. Si otra escritura gana la
    /// carrera se relee y se vuelve a validar contra el estado nuevo.
    async fn apply(
        &self,
        id: Uuid,
        action: Action,
        employee_id: Option<&str>,
        notes: Option<String>,
    ) -> EngineResult<Reservation> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let current = self
                .store
                .get(id)
                .await?
                .ok_or(ReservationError::ReservationNotFound(id))?;

            let from = current.status;
            let next_status = action
                .target(from)
                .ok_or(ReservationError::InvalidTransition {
                    id,
                    from,
                    action: action.verb(),
                })?;

            let mut next = current;
            next.status = next_status;
            if let Some(notes) = &notes {
                next.notes = Some(notes.clone());
            }
            if let Some(employee_id) = employee_id {
                next.employee_id = Some(employee_id.to_string());
            }

            if let Some(saved) = self.store.update_if_unchanged(next).await? {
                tracing::info!(
                    id = %id,
                    from = %from,
                    to = %saved.status,
                    employee_id = ?saved.employee_id,
                    action = action.verb(),
                    "Reservation updated"
                );
                return Ok(saved);
            }

            tracing::debug!(id = %id, attempt, "Concurrent write detected, re-reading reservation");
        }

        Err(ReservationError::ConcurrentModification(id))
    }

    pub async fn get_by_id(&self, id: Uuid) -> EngineResult<Option<Reservation>> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_by_client(&self, client_id: &str) -> EngineResult<Vec<Reservation>> {
        Ok(self.store.list_by_client(client_id).await?)
    }

    pub async fn list_by_room(&self, room_id: &str) -> EngineResult<Vec<Reservation>> {
        Ok(self.store.list_by_room(room_id).await?)
    }

    pub async fn list_all(&self, skip: u64, limit: u64) -> EngineResult<Vec<Reservation>> {
        Ok(self.store.list(skip, limit).await?)
    }

    /// Borrado administrativo: elimina el registro sin pasar por la máquina de estados
    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        if !self.store.delete(id).await? {
            return Err(ReservationError::ReservationNotFound(id));
        }
        tracing::warn!(id = %id, "Reservation hard-deleted");
        Ok(())
    }
}

//! Almacenes en memoria.
//!
//! Cada habitación tiene su propio mutex: la comprobación de solape y la
//! inserción de `create` ocurren con él tomado, así que dos altas
//! concurrentes sobre la misma habitación se serializan. Las transiciones
//! solo necesitan el bloqueo de la entrada del `DashMap`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    NewReservation, Reservation, ReservationStatus, ReservationStore, Room, RoomCatalog,
    StayRange, StoreError, StoreResult,
};

#[derive(Default)]
pub struct InMemoryStore {
    records: DashMap<Uuid, Reservation>,
    room_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn overlapping(&self, room_id: &str, stay: &StayRange, statuses: &[ReservationStatus]) -> bool {
        self.records.iter().any(|entry| {
            let r = entry.value();
            r.room_id == room_id && statuses.contains(&r.status) && r.stay().overlaps(stay)
        })
    }

    fn collect_sorted<F>(&self, keep: F) -> Vec<Reservation>
    where
        F: Fn(&Reservation) -> bool,
    {
        let mut out: Vec<Reservation> = self
            .records
            .iter()
            .filter(|e| keep(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }
}

fn apply_mutable_fields(stored: &mut Reservation, incoming: Reservation) {
    stored.status = incoming.status;
    stored.notes = incoming.notes;
    stored.employee_id = incoming.employee_id;
    stored.updated_at = Utc::now();
    stored.version += 1;
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn create(&self, new: NewReservation) -> StoreResult<Reservation> {
        let lock = self.room_lock(&new.room_id);
        let _guard = lock.lock().await;

        if self.overlapping(&new.room_id, &new.stay, &super::ACTIVE_STATUSES) {
            return Err(StoreError::Overlap { room_id: new.room_id });
        }

        let reservation = new.into_reservation(Uuid::new_v4(), Utc::now());
        self.records.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        Ok(self.records.get(&id).map(|e| e.value().clone()))
    }

    async fn update(&self, reservation: Reservation) -> StoreResult<Reservation> {
        let id = reservation.id;
        let mut entry = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply_mutable_fields(entry.value_mut(), reservation);
        Ok(entry.value().clone())
    }

    async fn update_if_unchanged(&self, reservation: Reservation) -> StoreResult<Option<Reservation>> {
        match self.records.get_mut(&reservation.id) {
            Some(mut entry) if entry.version == reservation.version => {
                apply_mutable_fields(entry.value_mut(), reservation);
                Ok(Some(entry.value().clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_by_client(&self, client_id: &str) -> StoreResult<Vec<Reservation>> {
        Ok(self.collect_sorted(|r| r.client.id() == client_id))
    }

    async fn list_by_room(&self, room_id: &str) -> StoreResult<Vec<Reservation>> {
        Ok(self.collect_sorted(|r| r.room_id == room_id))
    }

    async fn list(&self, skip: u64, limit: u64) -> StoreResult<Vec<Reservation>> {
        Ok(self
            .collect_sorted(|_| true)
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect())
    }

    async fn has_overlap(
        &self,
        room_id: &str,
        stay: StayRange,
        statuses: &[ReservationStatus],
    ) -> StoreResult<bool> {
        Ok(self.overlapping(room_id, &stay, statuses))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.records.remove(&id).is_some())
    }
}

/// Catálogo de habitaciones en memoria
#[derive(Default)]
pub struct InMemoryRoomCatalog {
    rooms: DashMap<String, Room>,
}

impl InMemoryRoomCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    /// Carga un array JSON con el mismo formato que la colección `rooms`
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let rooms: Vec<Room> = serde_json::from_str(raw)?;
        let catalog = Self::new();
        for room in rooms {
            catalog.insert(room);
        }
        Ok(catalog)
    }
}

#[async_trait]
impl RoomCatalog for InMemoryRoomCatalog {
    async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>> {
        Ok(self.rooms.get(room_id).map(|e| e.value().clone()))
    }
}

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, Cursor, Database};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use async_trait::async_trait;

use super::{
    ClientIdentity, NewReservation, Reservation, ReservationStatus, ReservationStore, Room,
    RoomCatalog, StayRange, StoreError, StoreResult,
};
use crate::api::middleware::ErrorLogExt;
use crate::config::Config;

/// Código de error de MongoDB para violación de índice único
const DUPLICATE_KEY: i32 = 11000;

/// Una noche cuya reserva aún no existe no se reclama antes de este margen:
/// el alta guarda las noches antes que el documento de la reserva.
const STALE_CLAIM_GRACE_MS: i64 = 60_000;

/// Documento de la colección `reservations`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReservationDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub room_id: String,
    pub client_id: String,
    pub guest: bool,
    pub client_email: String,
    pub client_name: String,
    pub employee_id: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub total_price: f64,
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub created_at: i64, // timestamp unix en milisegundos
    pub updated_at: i64, // timestamp unix en milisegundos
    #[serde(default)]
    pub version: i64,
}

/// Noche ocupada de una habitación.
///
/// El `_id` es `"{room_id}:{fecha}"`, así que MongoDB rechaza una segunda
/// reserva activa sobre la misma noche aunque lleguen a la vez desde
/// instancias distintas del servicio.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NightClaim {
    #[serde(rename = "_id")]
    pub id: String,
    pub room_id: String,
    pub night: NaiveDate,
    pub reservation_id: String,
    #[serde(default)]
    pub claimed_at: i64, // timestamp unix en milisegundos
}

impl NightClaim {
    fn new(room_id: &str, night: NaiveDate, reservation_id: Uuid, claimed_at: i64) -> Self {
        Self {
            id: format!("{}:{}", room_id, night),
            room_id: room_id.to_string(),
            night,
            reservation_id: reservation_id.to_string(),
            claimed_at,
        }
    }
}

/// Una noche tomada por una reserva que ya no está activa, o por una que
/// nunca llegó a guardarse, se puede volver a reservar.
fn claim_is_stale(claim: &NightClaim, owner: Option<ReservationStatus>, now_ms: i64) -> bool {
    match owner {
        Some(status) => !status.is_active(),
        None => now_ms.saturating_sub(claim.claimed_at) > STALE_CLAIM_GRACE_MS,
    }
}

impl From<&Reservation> for ReservationDocument {
    fn from(r: &Reservation) -> Self {
        ReservationDocument {
            id: r.id.to_string(),
            room_id: r.room_id.clone(),
            client_id: r.client.id().to_string(),
            guest: r.client.is_guest(),
            client_email: r.client_email.clone(),
            client_name: r.client_name.clone(),
            employee_id: r.employee_id.clone(),
            check_in_date: r.check_in_date,
            check_out_date: r.check_out_date,
            total_price: r.total_price,
            status: r.status,
            notes: r.notes.clone(),
            created_at: r.created_at.timestamp_millis(),
            updated_at: r.updated_at.timestamp_millis(),
            version: r.version as i64,
        }
    }
}

impl TryFrom<ReservationDocument> for Reservation {
    type Error = StoreError;

    fn try_from(d: ReservationDocument) -> StoreResult<Self> {
        let corrupt = |message: String| StoreError::Corrupt {
            collection: "reservations".to_string(),
            message,
        };
        let id = Uuid::parse_str(&d.id).map_err(|e| corrupt(format!("_id '{}': {}", d.id, e)))?;
        let timestamp = |ms: i64| {
            DateTime::<Utc>::from_timestamp_millis(ms)
                .ok_or_else(|| corrupt(format!("timestamp fuera de rango: {}", ms)))
        };
        let client = if d.guest {
            ClientIdentity::Guest(d.client_id)
        } else {
            ClientIdentity::Authenticated(d.client_id)
        };

        Ok(Reservation {
            id,
            room_id: d.room_id,
            client,
            client_email: d.client_email,
            client_name: d.client_name,
            employee_id: d.employee_id,
            check_in_date: d.check_in_date,
            check_out_date: d.check_out_date,
            total_price: d.total_price,
            status: d.status,
            notes: d.notes,
            created_at: timestamp(d.created_at)?,
            updated_at: timestamp(d.updated_at)?,
            version: d.version.max(0) as u64,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MongoRepo {
    pub client: Client,
    pub database: Database,
}

impl MongoRepo {
    pub async fn init(config: &Config) -> StoreResult<MongoRepo> {
        let client = Client::with_uri_str(&config.mongodb_uri)
            .await
            .map_err(|e| StoreError::database("connect", e))?;

        let database = client.database(&config.mongodb_database);

        // Test connection
        database
            .run_command(doc! {"ping": 1})
            .await
            .map_err(|e| StoreError::database("ping", e))?;

        tracing::info!(database = %config.mongodb_database, "Conexión a MongoDB establecida exitosamente");

        Ok(MongoRepo { client, database })
    }

    pub fn reservations(&self) -> Collection<ReservationDocument> {
        self.database.collection("reservations")
    }

    pub fn room_nights(&self) -> Collection<NightClaim> {
        self.database.collection("room_nights")
    }

    pub fn rooms(&self) -> Collection<Room> {
        self.database.collection("rooms")
    }

    pub async fn create_indexes(&self) -> StoreResult<()> {
        use mongodb::IndexModel;

        let reservation_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "room_id": 1, "check_in_date": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "client_id": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "status": 1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "created_at": 1 })
                .build(),
        ];

        self.reservations()
            .create_indexes(reservation_indexes)
            .await
            .map_err(|e| StoreError::database("create_indexes_reservations", e))?;

        self.room_nights()
            .create_index(IndexModel::builder().keys(doc! { "reservation_id": 1 }).build())
            .await
            .map_err(|e| StoreError::database("create_indexes_room_nights", e))?;

        tracing::info!("Índices MongoDB creados exitosamente");
        Ok(())
    }

    pub fn current_timestamp() -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Posición del documento rechazado por clave duplicada, tanto en
/// `insert_one` (siempre 0) como en `insert_many` ordenado
fn duplicate_index(error: &mongodb::error::Error) -> Option<usize> {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY => Some(0),
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()?
            .iter()
            .find(|w| w.code == DUPLICATE_KEY)
            .map(|w| w.index),
        _ => None,
    }
}

/// Filtro de escritura; con `check_version` solo casa si nadie ha escrito
/// desde que se leyó `reservation`
fn version_filter(reservation: &Reservation, check_version: bool) -> Document {
    let mut filter = doc! { "_id": reservation.id.to_string() };
    if check_version {
        if reservation.version == 0 {
            // documentos anteriores al contador no tienen el campo
            filter.insert(
                "$or",
                vec![doc! { "version": 0_i64 }, doc! { "version": { "$exists": false } }],
            );
        } else {
            filter.insert("version", reservation.version as i64);
        }
    }
    filter
}

async fn collect_reservations(
    mut cursor: Cursor<ReservationDocument>,
    operation: &str,
) -> StoreResult<Vec<Reservation>> {
    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| StoreError::database(operation, e))?
    {
        let document = cursor
            .deserialize_current()
            .map_err(|e| StoreError::database(operation, e))?;
        results.push(Reservation::try_from(document)?);
    }
    Ok(results)
}

/// [`ReservationStore`] sobre MongoDB
#[derive(Debug, Clone)]
pub struct MongoReservationStore {
    repo: MongoRepo,
}

impl MongoReservationStore {
    pub fn new(repo: MongoRepo) -> Self {
        Self { repo }
    }

    /// Reserva cada noche de la estancia; si alguna ya está tomada deshace
    /// las anteriores y devuelve [`StoreError::Overlap`].
    async fn claim_nights(&self, reservation: &Reservation) -> StoreResult<()> {
        let result = self.insert_claims(reservation).await;
        if result.is_err() {
            self.discard_claims(reservation.id).await;
        }
        result
    }

    async fn insert_claims(&self, reservation: &Reservation) -> StoreResult<()> {
        let claimed_at = MongoRepo::current_timestamp();
        let claims: Vec<NightClaim> = reservation
            .stay()
            .each_night()
            .map(|night| NightClaim::new(&reservation.room_id, night, reservation.id, claimed_at))
            .collect();

        let mut reclaimed = HashSet::new();
        let mut start = 0;
        while start < claims.len() {
            let error = match self
                .repo
                .room_nights()
                .insert_many(&claims[start..])
                .ordered(true)
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => e,
            };

            let Some(offset) = duplicate_index(&error) else {
                return Err(StoreError::database("claim_room_nights", error));
            };

            // Las anteriores a `offset` ya están guardadas
            let taken = &claims[start + offset];
            if reclaimed.insert(taken.id.clone()) && self.reclaim_if_stale(&taken.id).await? {
                start += offset;
                continue;
            }

            tracing::debug!(
                room_id = %reservation.room_id,
                night = %taken.night,
                "Room night already claimed"
            );
            return Err(StoreError::Overlap {
                room_id: reservation.room_id.clone(),
            });
        }
        Ok(())
    }

    /// Borra la noche `claim_id` si su reserva ya no la retiene. Devuelve
    /// `true` si la noche queda libre para reintentar.
    async fn reclaim_if_stale(&self, claim_id: &str) -> StoreResult<bool> {
        let claim = self
            .repo
            .room_nights()
            .find_one(doc! { "_id": claim_id })
            .await
            .map_err(|e| StoreError::database("get_room_night", e))?;
        let Some(claim) = claim else {
            return Ok(true);
        };

        let owner = self
            .repo
            .reservations()
            .find_one(doc! { "_id": claim.reservation_id.as_str() })
            .await
            .map_err(|e| StoreError::database("get_room_night_owner", e))?
            .map(|document| document.status);

        if !claim_is_stale(&claim, owner, MongoRepo::current_timestamp()) {
            return Ok(false);
        }

        // Solo si sigue siendo del mismo dueño
        self.repo
            .room_nights()
            .delete_one(doc! { "_id": claim.id.as_str(), "reservation_id": claim.reservation_id.as_str() })
            .await
            .log_error_context("reclaiming room night")
            .map_err(|e| StoreError::database("reclaim_room_night", e))?;

        tracing::warn!(
            night = %claim.id,
            reservation_id = %claim.reservation_id,
            owner_status = ?owner,
            "Reclaimed stale room night"
        );
        Ok(true)
    }

    /// Libera las noches de una reserva que deja de estar activa
    async fn release_nights(&self, reservation_id: Uuid) -> StoreResult<()> {
        self.repo
            .room_nights()
            .delete_many(doc! { "reservation_id": reservation_id.to_string() })
            .await
            .log_error_context("releasing room nights")
            .map_err(|e| StoreError::database("release_room_nights", e))?;
        Ok(())
    }

    /// Deshace las noches de un alta fallida. El error del alta es el que se
    /// devuelve; lo que quede huérfano se reclama en la siguiente reserva.
    async fn discard_claims(&self, reservation_id: Uuid) {
        if let Err(e) = self.release_nights(reservation_id).await {
            tracing::warn!(
                reservation_id = %reservation_id,
                error = %e,
                "Could not roll back room night claims"
            );
        }
    }

    async fn write_mutable_fields(
        &self,
        reservation: &Reservation,
        check_version: bool,
        operation: &str,
    ) -> StoreResult<Option<Reservation>> {
        let filter = version_filter(reservation, check_version);
        let update = doc! {
            "$set": {
                "status": reservation.status.as_str(),
                "notes": reservation.notes.clone(),
                "employee_id": reservation.employee_id.clone(),
                "updated_at": MongoRepo::current_timestamp(),
            },
            "$inc": { "version": 1_i64 }
        };

        let saved = self
            .repo
            .reservations()
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .log_error_context(operation)
            .map_err(|e| StoreError::database(operation, e))?;

        match saved {
            Some(document) => {
                let saved = Reservation::try_from(document)?;
                if !saved.status.is_active() {
                    self.release_nights(saved.id).await?;
                }
                Ok(Some(saved))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReservationStore for MongoReservationStore {
    async fn create(&self, new: NewReservation) -> StoreResult<Reservation> {
        let reservation = new.into_reservation(Uuid::new_v4(), Utc::now());

        if reservation.status.is_active() {
            self.claim_nights(&reservation).await?;
        }

        if let Err(e) = self
            .repo
            .reservations()
            .insert_one(ReservationDocument::from(&reservation))
            .await
            .log_error_context("inserting reservation")
        {
            self.discard_claims(reservation.id).await;
            return Err(StoreError::database("insert_reservation", e));
        }

        Ok(reservation)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        let found = self
            .repo
            .reservations()
            .find_one(doc! { "_id": id.to_string() })
            .await
            .map_err(|e| StoreError::database("get_reservation", e))?;

        found.map(Reservation::try_from).transpose()
    }

    async fn update(&self, reservation: Reservation) -> StoreResult<Reservation> {
        let id = reservation.id;
        self.write_mutable_fields(&reservation, false, "update_reservation")
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_if_unchanged(&self, reservation: Reservation) -> StoreResult<Option<Reservation>> {
        self.write_mutable_fields(&reservation, true, "update_reservation_if_unchanged")
            .await
    }

    async fn list_by_client(&self, client_id: &str) -> StoreResult<Vec<Reservation>> {
        let cursor = self
            .repo
            .reservations()
            .find(doc! { "client_id": client_id })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await
            .map_err(|e| StoreError::database("list_by_client", e))?;

        collect_reservations(cursor, "list_by_client").await
    }

    async fn list_by_room(&self, room_id: &str) -> StoreResult<Vec<Reservation>> {
        let cursor = self
            .repo
            .reservations()
            .find(doc! { "room_id": room_id })
            .sort(doc! { "created_at": 1, "_id": 1 })
            .await
            .map_err(|e| StoreError::database("list_by_room", e))?;

        collect_reservations(cursor, "list_by_room").await
    }

    async fn list(&self, skip: u64, limit: u64) -> StoreResult<Vec<Reservation>> {
        let cursor = self
            .repo
            .reservations()
            .find(doc! {})
            .sort(doc! { "created_at": 1, "_id": 1 })
            .skip(skip)
            .limit(limit as i64)
            .await
            .map_err(|e| StoreError::database("list_reservations", e))?;

        collect_reservations(cursor, "list_reservations").await
    }

    async fn has_overlap(
        &self,
        room_id: &str,
        stay: StayRange,
        statuses: &[ReservationStatus],
    ) -> StoreResult<bool> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

        // Fechas guardadas como YYYY-MM-DD: el orden lexicográfico es el cronológico
        let existing = self
            .repo
            .reservations()
            .find_one(doc! {
                "room_id": room_id,
                "status": { "$in": statuses },
                "check_in_date": { "$lt": stay.check_out.to_string() },
                "check_out_date": { "$gt": stay.check_in.to_string() },
            })
            .await
            .map_err(|e| StoreError::database("has_overlap", e))?;

        Ok(existing.is_some())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let result = self
            .repo
            .reservations()
            .delete_one(doc! { "_id": id.to_string() })
            .await
            .log_error_context("deleting reservation")
            .map_err(|e| StoreError::database("delete_reservation", e))?;

        self.release_nights(id).await?;
        Ok(result.deleted_count > 0)
    }
}

/// [`RoomCatalog`] que lee la colección `rooms` del servicio de hoteles
#[derive(Debug, Clone)]
pub struct MongoRoomCatalog {
    repo: MongoRepo,
}

impl MongoRoomCatalog {
    pub fn new(repo: MongoRepo) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RoomCatalog for MongoRoomCatalog {
    async fn get_room(&self, room_id: &str) -> StoreResult<Option<Room>> {
        self.repo
            .rooms()
            .find_one(doc! { "_id": room_id })
            .await
            .map_err(|e| StoreError::database("get_room", e))
    }
}

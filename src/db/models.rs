//! # Modelos de dominio
//!
//! Tipos compartidos por el motor de reservas y los almacenes:
//! [`Reservation`], su estado ([`ReservationStatus`]), la identidad del
//! cliente ([`ClientIdentity`]) y la habitación del catálogo ([`Room`]).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Estados por los que pasa una reserva
///
/// ```text
/// PENDING ──► CONFIRMED ──► COMPLETED
///    │            │
///    └────────────┴──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

/// Estados que bloquean la disponibilidad de una habitación
pub const ACTIVE_STATUSES: [ReservationStatus; 2] =
    [ReservationStatus::Pending, ReservationStatus::Confirmed];

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    /// `true` para `PENDING` y `CONFIRMED`
    pub fn is_active(self) -> bool {
        ACTIVE_STATUSES.contains(&self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed)
    }

    /// Indica si la máquina de estados permite pasar de `self` a `next`
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Cancelled) | (Confirmed, Completed)
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(format!("estado de reserva desconocido: '{}'", other)),
        }
    }
}

/// Quién hizo la reserva
///
/// Un cliente autenticado se identifica por su id de usuario; un invitado,
/// por el email que dejó en la reserva.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientIdentity {
    Authenticated(String),
    Guest(String),
}

impl ClientIdentity {
    /// Id efectivo usado para búsquedas y comprobaciones de propiedad
    pub fn id(&self) -> &str {
        match self {
            Self::Authenticated(id) | Self::Guest(id) => id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

/// Rango de fechas semiabierto `[check_in, check_out)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl StayRange {
    /// Construye el rango si `check_in < check_out`
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Option<Self> {
        (check_in < check_out).then_some(Self { check_in, check_out })
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// Dos estancias se solapan si cada una empieza antes de que acabe la otra.
    /// Salir el día X no choca con entrar el día X.
    pub fn overlaps(&self, other: &StayRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }

    /// Cada noche ocupada, desde `check_in` hasta la víspera de `check_out`
    pub fn each_night(&self) -> impl Iterator<Item = NaiveDate> {
        let check_out = self.check_out;
        self.check_in.iter_days().take_while(move |d| *d < check_out)
    }
}

/// Reserva persistida
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub room_id: String,
    pub client: ClientIdentity,
    pub client_email: String,
    pub client_name: String,
    pub employee_id: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub total_price: f64,
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Contador de escrituras, usado como compare-and-set
    pub version: u64,
}

impl Reservation {
    pub fn stay(&self) -> StayRange {
        StayRange {
            check_in: self.check_in_date,
            check_out: self.check_out_date,
        }
    }
}

/// Reserva validada y aún sin id; el almacén asigna id y marcas de tiempo
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub room_id: String,
    pub client: ClientIdentity,
    pub client_email: String,
    pub client_name: String,
    pub stay: StayRange,
    pub total_price: f64,
    pub notes: Option<String>,
}

impl NewReservation {
    pub fn into_reservation(self, id: Uuid, now: DateTime<Utc>) -> Reservation {
        Reservation {
            id,
            room_id: self.room_id,
            client: self.client,
            client_email: self.client_email,
            client_name: self.client_name,
            employee_id: None,
            check_in_date: self.stay.check_in,
            check_out_date: self.stay.check_out,
            total_price: self.total_price,
            status: ReservationStatus::Pending,
            notes: self.notes,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

/// Habitación del catálogo de hoteles (colección `rooms`, propiedad del servicio de hoteles)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    #[serde(rename = "_id")]
    pub id: String,
    pub hotel_id: String,
    pub room_number: String,
    pub room_type: String,
    #[serde(rename = "price")]
    pub price_per_night: f64,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

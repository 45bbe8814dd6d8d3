//! # API de Reservas (clientes)
//!
//! Rutas abiertas a clientes e invitados:
//! - Crear reservas (con o sin token)
//! - Consultar una reserva o las reservas propias
//! - Cancelar una reserva
//! - Consultar disponibilidad de una habitación
//!
//! Las rutas de personal del hotel están en [`super::employee`].

use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::session::{optional_identity, require_identity};
use super::{AppError, AppResult};
use crate::auth::Role;
use crate::db::{ClientIdentity, Reservation, ReservationStatus};
use crate::engine::{CreateReservation, ReservationEngine};

/// Datos para crear una reserva
#[derive(Deserialize)]
struct MakeReservation {
    room_id: String,
    client_email: String,
    client_name: String,
    /// Fecha de entrada (YYYY-MM-DD o fecha-hora ISO)
    check_in_date: String,
    /// Fecha de salida (YYYY-MM-DD o fecha-hora ISO)
    check_out_date: String,
    /// Solo se tiene en cuenta el id del token; este campo se ignora
    client_id: Option<String>,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct AvailabilityQuery {
    room_id: String,
    check_in_date: String,
    check_out_date: String,
}

#[derive(Serialize)]
struct AvailabilityResponse {
    room_id: String,
    check_in_date: NaiveDate,
    check_out_date: NaiveDate,
    is_available: bool,
}

/// Reserva tal como la ve el API
#[derive(Serialize, Deserialize, Debug)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub room_id: String,
    /// Id de usuario, o el email si la reserva es de un invitado
    pub client_id: String,
    pub is_guest: bool,
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
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        ReservationResponse {
            id: r.id,
            room_id: r.room_id,
            client_id: r.client.id().to_string(),
            is_guest: r.client.is_guest(),
            client_email: r.client_email,
            client_name: r.client_name,
            employee_id: r.employee_id,
            check_in_date: r.check_in_date,
            check_out_date: r.check_out_date,
            total_price: r.total_price,
            status: r.status,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Validación básica de email
fn validate_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((user, domain)) => !user.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// Último año cuya fecha ISO tiene cuatro cifras
const MAX_YEAR: i32 = 9999;

/// Parsea una fecha `YYYY-MM-DD` o una fecha-hora ISO 8601, descartando la hora
///
/// # Errores
/// - `ValidationWithField`: si no encaja en ninguno de los formatos o el año
///   pasa de 9999
pub(crate) fn parse_date(field: &str, raw: &str) -> AppResult<NaiveDate> {
    let raw = raw.trim();
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.date()))
        .map_err(|_| AppError::validation_field(field, "Formato de fecha inválido, use YYYY-MM-DD"))?;

    // Las fechas se guardan y comparan como texto YYYY-MM-DD
    if date.year() > MAX_YEAR {
        return Err(AppError::validation_field(field, "El año no puede ser posterior a 9999"));
    }
    Ok(date)
}

/// Parsea el id de reserva de la URL
pub(crate) fn parse_reservation_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation("ID de reserva inválido".to_string()))
}

/// Crea una reserva en estado `pending`
///
/// # Autenticación
/// Opcional. Con token, la reserva queda a nombre del usuario; sin token se
/// registra como invitado y se identifica por `client_email`.
///
/// # Respuesta
/// `201 Created` con la reserva.
///
/// # Errores
/// - `400 Bad Request`: datos inválidos, fechas incorrectas o en el pasado,
///   habitación inexistente u ocupada
/// - `401 Unauthorized`: token presente pero inválido o expirado
/// - `500 Internal Server Error`: error de almacenamiento
#[post("/reservations")]
async fn make_reservation(
    engine: web::Data<ReservationEngine>,
    data: web::Json<MakeReservation>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = optional_identity(&req)?;
    let data = data.into_inner();

    if data.room_id.trim().is_empty() {
        return Err(AppError::validation_field("room_id", "es obligatorio"));
    }
    if data.client_name.trim().is_empty() {
        return Err(AppError::validation_field("client_name", "es obligatorio"));
    }
    if !validate_email(data.client_email.trim()) {
        return Err(AppError::validation_field("client_email", "Email inválido"));
    }

    let check_in = parse_date("check_in_date", &data.check_in_date)?;
    let check_out = parse_date("check_out_date", &data.check_out_date)?;

    let client = match identity {
        Some(identity) => ClientIdentity::Authenticated(identity.subject_id),
        None => {
            if data.client_id.is_some() {
                tracing::debug!("Ignoring client_id sent without a token, booking as guest");
            }
            ClientIdentity::Guest(data.client_email.trim().to_string())
        }
    };

    let reservation = engine
        .create_reservation(CreateReservation {
            room_id: data.room_id.trim().to_string(),
            client,
            client_email: data.client_email.trim().to_string(),
            client_name: data.client_name.trim().to_string(),
            check_in,
            check_out,
            notes: data.notes,
        })
        .await?;

    Ok(HttpResponse::Created().json(ReservationResponse::from(reservation)))
}

/// Reservas del usuario autenticado
///
/// # Errores
/// - `401 Unauthorized`: sin token o token inválido
#[get("/reservations/my")]
async fn my_reservations(engine: web::Data<ReservationEngine>, req: HttpRequest) -> AppResult<impl Responder> {
    let identity = require_identity(&req)?;

    let reservations: Vec<ReservationResponse> = engine
        .list_by_client(&identity.subject_id)
        .await?
        .into_iter()
        .map(ReservationResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(reservations))
}

/// Consulta una reserva por id
///
/// Un cliente autenticado solo puede ver las suyas; el personal ve todas.
///
/// # Errores
/// - `400 Bad Request`: id con formato inválido
/// - `403 Forbidden`: la reserva es de otro cliente
/// - `404 Not Found`: reserva inexistente
#[get("/reservations/{id}")]
async fn get_reservation(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = optional_identity(&req)?;
    let id = parse_reservation_id(&path.into_inner())?;

    let reservation = engine
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Reserva", &id.to_string()))?;

    if let Some(identity) = identity {
        if identity.role == Role::Client && reservation.client.id() != identity.subject_id {
            return Err(AppError::Forbidden("No tienes permiso para ver esta reserva".to_string()));
        }
    }

    Ok(HttpResponse::Ok().json(ReservationResponse::from(reservation)))
}

/// Cancela una reserva
///
/// # Autenticación
/// Obligatoria. Un cliente solo puede cancelar las suyas; si cancela el
/// personal, queda registrado como `employee_id`.
///
/// # Respuesta
/// `204 No Content`
///
/// # Errores
/// - `401 Unauthorized`: sin token o token inválido
/// - `403 Forbidden`: la reserva es de otro cliente
/// - `404 Not Found`: reserva inexistente
/// - `409 Conflict`: la reserva ya está cancelada o completada
#[delete("/reservations/{id}")]
async fn cancel_reservation(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let identity = require_identity(&req)?;
    let id = parse_reservation_id(&path.into_inner())?;

    let reservation = engine
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found_id("Reserva", &id.to_string()))?;

    let is_staff = identity.role.is_staff();
    if !is_staff && reservation.client.id() != identity.subject_id {
        return Err(AppError::Forbidden("No tienes permiso para cancelar esta reserva".to_string()));
    }

    let employee_id = is_staff.then_some(identity.subject_id.as_str());
    engine.cancel(id, employee_id).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Comprueba si una habitación está libre en un rango de fechas
///
/// # Respuesta
/// ```json
/// {
///   "room_id": "room-101",
///   "check_in_date": "2030-06-01",
///   "check_out_date": "2030-06-03",
///   "is_available": true
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: fechas con formato inválido o entrada no anterior a salida
#[post("/reservations/check-availability")]
async fn check_availability(
    engine: web::Data<ReservationEngine>,
    query: web::Json<AvailabilityQuery>,
) -> AppResult<impl Responder> {
    let query = query.into_inner();
    let check_in = parse_date("check_in_date", &query.check_in_date)?;
    let check_out = parse_date("check_out_date", &query.check_out_date)?;

    let is_available = engine
        .check_room_availability(&query.room_id, check_in, check_out)
        .await?;

    Ok(HttpResponse::Ok().json(AvailabilityResponse {
        room_id: query.room_id,
        check_in_date: check_in,
        check_out_date: check_out,
        is_available,
    }))
}

/// Configura las rutas de reservas para clientes.
///
/// `/reservations/my` se registra antes que `/reservations/{id}`.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(make_reservation);
    cfg.service(check_availability);
    cfg.service(my_reservations);
    cfg.service(get_reservation);
    cfg.service(cancel_reservation);
}

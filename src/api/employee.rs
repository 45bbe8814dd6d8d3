//! # API de Reservas (personal del hotel)
//!
//! Todas las rutas exigen rol `EMPLOYEE` o superior, salvo el borrado
//! administrativo, que exige `ADMIN`. El id del empleado que actúa queda
//! registrado en la reserva.

use actix_web::{delete, get, patch, post, web, HttpRequest, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use super::reservation::{parse_reservation_id, ReservationResponse};
use super::session::require_role;
use super::{AppError, AppResult};
use crate::auth::Role;
use crate::db::{Reservation, ReservationStatus};
use crate::engine::ReservationEngine;

const DEFAULT_PAGE_SIZE: u64 = 100;
const MAX_PAGE_SIZE: u64 = 1000;

#[derive(Deserialize)]
struct StatusUpdate {
    status: String,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct NotesUpdate {
    notes: String,
}

#[derive(Deserialize)]
struct PageQuery {
    skip: Option<u64>,
    limit: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ReservationListResponse {
    pub reservations: Vec<ReservationResponse>,
    pub total: usize,
    pub skip: u64,
    pub limit: u64,
}

fn to_responses(reservations: Vec<Reservation>) -> Vec<ReservationResponse> {
    reservations.into_iter().map(ReservationResponse::from).collect()
}

/// Cambia el estado de una reserva
///
/// Acepta `confirmed`, `cancelled` y `completed` (sin distinguir
/// mayúsculas). Si se envían `notes`, se guardan después de la transición.
///
/// # Errores
/// - `400 Bad Request`: estado desconocido o `pending`
/// - `401`/`403`: sin token o sin rol de empleado
/// - `404 Not Found`: reserva inexistente
/// - `409 Conflict`: transición no permitida desde el estado actual
#[patch("/reservations/{id}/status")]
async fn update_status(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    data: web::Json<StatusUpdate>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let employee = require_role(&req, Role::Employee)?;
    let id = parse_reservation_id(&path.into_inner())?;
    let data = data.into_inner();

    let status: ReservationStatus = data
        .status
        .parse()
        .map_err(|e: String| AppError::validation_field("status", &e))?;

    if status == ReservationStatus::Pending {
        return Err(AppError::validation_field(
            "status",
            "una reserva no puede volver a 'pending'",
        ));
    }

    // Unas notas vacías no sustituyen a las existentes
    let notes = data.notes.filter(|notes| !notes.is_empty());
    let reservation = engine
        .set_status(id, status, employee.subject_id.as_str(), notes)
        .await?;

    Ok(HttpResponse::Ok().json(ReservationResponse::from(reservation)))
}

/// Sustituye las notas de una reserva, en cualquier estado
#[patch("/reservations/{id}/notes")]
async fn update_notes(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    data: web::Json<NotesUpdate>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let employee = require_role(&req, Role::Employee)?;
    let id = parse_reservation_id(&path.into_inner())?;

    let reservation = engine
        .update_notes(id, data.into_inner().notes, &employee.subject_id)
        .await?;

    Ok(HttpResponse::Ok().json(ReservationResponse::from(reservation)))
}

/// Confirma una reserva `pending`
///
/// # Errores
/// - `404 Not Found`: reserva inexistente
/// - `409 Conflict`: la reserva no está `pending`
#[post("/reservations/{id}/confirm")]
async fn confirm_reservation(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let employee = require_role(&req, Role::Employee)?;
    let id = parse_reservation_id(&path.into_inner())?;

    let reservation = engine.confirm(id, &employee.subject_id).await?;
    Ok(HttpResponse::Ok().json(ReservationResponse::from(reservation)))
}

/// Marca como completada una reserva `confirmed`
///
/// # Errores
/// - `404 Not Found`: reserva inexistente
/// - `409 Conflict`: la reserva no está `confirmed`
#[post("/reservations/{id}/complete")]
async fn complete_reservation(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let employee = require_role(&req, Role::Employee)?;
    let id = parse_reservation_id(&path.into_inner())?;

    let reservation = engine.complete(id, &employee.subject_id).await?;
    Ok(HttpResponse::Ok().json(ReservationResponse::from(reservation)))
}

/// Lista paginada de todas las reservas, por orden de creación
///
/// # Parámetros de consulta
/// - `skip`: reservas a saltar (default 0)
/// - `limit`: tamaño de página, entre 1 y 1000 (default 100)
///
/// `total` es el número de reservas devueltas en esta página.
#[get("/reservations")]
async fn list_reservations(
    engine: web::Data<ReservationEngine>,
    query: web::Query<PageQuery>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    require_role(&req, Role::Employee)?;

    let skip = query.skip.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::validation_field(
            "limit",
            &format!("debe estar entre 1 y {}", MAX_PAGE_SIZE),
        ));
    }

    let reservations = to_responses(engine.list_all(skip, limit).await?);

    Ok(HttpResponse::Ok().json(ReservationListResponse {
        total: reservations.len(),
        reservations,
        skip,
        limit,
    }))
}

#[get("/reservations/room/{room_id}")]
async fn room_reservations(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    require_role(&req, Role::Employee)?;
    let reservations = engine.list_by_room(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(to_responses(reservations)))
}

#[get("/reservations/client/{client_id}")]
async fn client_reservations(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    require_role(&req, Role::Employee)?;
    let reservations = engine.list_by_client(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(to_responses(reservations)))
}

/// Borrado físico de una reserva, sin pasar por la máquina de estados.
/// Solo `ADMIN`.
#[delete("/admin/reservations/{id}")]
async fn delete_reservation(
    engine: web::Data<ReservationEngine>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    let admin = require_role(&req, Role::Admin)?;
    let id = parse_reservation_id(&path.into_inner())?;

    engine.delete(id).await?;
    tracing::info!(id = %id, admin = %admin.subject_id, "Reservation deleted by admin");

    Ok(HttpResponse::NoContent().finish())
}

/// Configura las rutas del personal
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_reservations);
    cfg.service(room_reservations);
    cfg.service(client_reservations);
    cfg.service(update_status);
    cfg.service(update_notes);
    cfg.service(confirm_reservation);
    cfg.service(complete_reservation);
    cfg.service(delete_reservation);
}

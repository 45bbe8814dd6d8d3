//! # Módulo API
//!
//! Rutas HTTP y su traducción a operaciones del motor de reservas.
//!
//! ## Módulos principales
//!
//! - [`reservation`] - Rutas de clientes e invitados (crear, consultar, cancelar, disponibilidad)
//! - [`employee`] - Rutas del personal (estados, notas, listados, borrado administrativo)
//! - [`errors`] - Manejo de errores de la aplicación
//! - [`session`] - Autenticación Bearer de las peticiones

pub mod employee;
pub mod errors;
pub mod middleware;
pub mod reservation;
pub mod session;

pub use errors::{AppError, AppResult, ErrorResponse};

use actix_web::{get, web, HttpResponse, Responder};

/// Comprobación de vida para balanceadores y orquestadores
#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
}

/// Configura todas las rutas de la API
///
/// ## Rutas configuradas
///
/// - `/health`
/// - `/reservations/*` - Ver [`reservation::routes`] y [`employee::routes`]
/// - `/admin/reservations/{id}` - Ver [`employee::routes`]
///
/// Un cuerpo JSON mal formado responde `400` con el mismo formato que el
/// resto de errores.
///
/// # Ejemplo
///
/// ```no_run
/// use actix_web::{web, App};
/// use hotel_reservations::api;
///
/// let app = App::new()
///     .configure(api::init_routes);
/// ```
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Cuerpo JSON inválido: {}", err)).into()
    }));

    cfg.service(health);
    reservation::routes(cfg);
    employee::routes(cfg);
}

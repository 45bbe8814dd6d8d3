//! # Hotel Reservations Server
//!
//! Servidor HTTP del servicio de reservas, construido con Actix Web y MongoDB.
//!
//! ## Configuración
//!
//! El servidor se configura mediante variables de entorno (archivo `.env`):
//!
//! ```env
//! # Base de datos MongoDB
//! MONGODB_URI=mongodb://localhost:27017
//! MONGODB_DATABASE=hotel_service
//!
//! # Almacén de reservas: mongodb (default) o memory
//! RESERVATION_STORE=mongodb
//!
//! # Clave compartida con el servicio de autenticación (obligatoria)
//! JWT_SECRET_KEY=cambia-esto
//!
//! # Servidor
//! BIND_ADDRESS=0.0.0.0:8002
//!
//! # Logging
//! RUST_LOG=debug,mongodb=info
//! ```
//!
//! ## Ejecución
//!
//! ```bash
//! # Con MongoDB local
//! docker run -d --name mongo -p 27017:27017 mongo:latest
//! cargo run
//!
//! # Sin base de datos (las reservas se pierden al parar)
//! RESERVATION_STORE=memory ROOMS_FILE=rooms.json JWT_SECRET_KEY=dev cargo run
//! ```

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::EnvFilter;

use hotel_reservations::api;
use hotel_reservations::auth::IdentityResolver;
use hotel_reservations::config::{Config, StoreBackend};
use hotel_reservations::db::{
    InMemoryRoomCatalog, InMemoryStore, MongoRepo, MongoReservationStore, MongoRoomCatalog,
    ReservationStore, RoomCatalog,
};
use hotel_reservations::engine::ReservationEngine;

fn io_error(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, message)
}

/// Construye los almacenes según `RESERVATION_STORE`
///
/// Con MongoDB, un fallo creando índices no es fatal.
async fn build_stores(
    config: &Config,
) -> std::io::Result<(Arc<dyn ReservationStore>, Arc<dyn RoomCatalog>)> {
    match config.store {
        StoreBackend::Mongo => {
            let repo = MongoRepo::init(config).await.map_err(|e| {
                tracing::error!(error = %e, "Error conectando a MongoDB");
                io_error(format!("Error de MongoDB: {}", e))
            })?;

            if let Err(e) = repo.create_indexes().await {
                tracing::warn!(error = %e, "Advertencia creando índices");
            }

            let store: Arc<dyn ReservationStore> = Arc::new(MongoReservationStore::new(repo.clone()));
            let rooms: Arc<dyn RoomCatalog> = Arc::new(MongoRoomCatalog::new(repo));
            Ok((store, rooms))
        }
        StoreBackend::Memory => {
            tracing::warn!("Usando almacén en memoria: las reservas no se persisten");
            let rooms = match &config.rooms_file {
                Some(path) => {
                    let raw = std::fs::read_to_string(path)
                        .map_err(|e| io_error(format!("No se pudo leer '{}': {}", path, e)))?;
                    let catalog = InMemoryRoomCatalog::from_json(&raw)
                        .map_err(|e| io_error(format!("Habitaciones inválidas en '{}': {}", path, e)))?;
                    tracing::info!(path = %path, "Habitaciones cargadas");
                    catalog
                }
                None => {
                    tracing::warn!("Sin ROOMS_FILE: el catálogo de habitaciones está vacío");
                    InMemoryRoomCatalog::new()
                }
            };
            let store: Arc<dyn ReservationStore> = Arc::new(InMemoryStore::new());
            let rooms: Arc<dyn RoomCatalog> = Arc::new(rooms);
            Ok((store, rooms))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(|e| io_error(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hotel_reservations=debug,mongodb=info,actix_web=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(store = ?config.store, "Iniciando Hotel Reservations Server");

    let (store, rooms) = build_stores(&config).await?;
    let engine = web::Data::new(ReservationEngine::new(store, rooms));
    let resolver = web::Data::new(IdentityResolver::new(config.jwt_secret.as_bytes()));

    tracing::info!(address = %config.bind_address, "Servidor iniciando");

    HttpServer::new(move || {
        App::new()
            .app_data(engine.clone())
            .app_data(resolver.clone())
            .wrap(Logger::default())
            .configure(api::init_routes)
    })
    .bind(&config.bind_address)?
    .run()
    .await
}

//! # Hotel Reservations
//!
//! Servicio de reservas de una cadena hotelera: alta de reservas sin
//! dobles reservas bajo concurrencia, máquina de estados con permisos por
//! rol y cálculo de precio y disponibilidad.
//!
//! ## Arquitectura
//!
//! ```text
//! API REST (Actix Web) ── auth (JWT)
//!     ↓
//! ReservationEngine
//!     ↓
//! ReservationStore / RoomCatalog (MongoDB o memoria)
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod engine;

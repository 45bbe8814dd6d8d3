#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};

use hotel_reservations::auth::{Claims, Role};
use hotel_reservations::db::{InMemoryRoomCatalog, InMemoryStore, Room};
use hotel_reservations::engine::ReservationEngine;

pub const JWT_SECRET: &[u8] = b"test_secret_key";
pub const ROOM: &str = "room-101";
pub const PRICE: f64 = 100.0;

/// Levanta la app completa sobre un motor dado
#[allow(unused_macros)]
macro_rules! test_app {
    ($engine:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($engine))
                .app_data(actix_web::web::Data::new(
                    hotel_reservations::auth::IdentityResolver::new(common::JWT_SECRET),
                ))
                .configure(hotel_reservations::api::init_routes),
        )
        .await
    };
}

pub fn engine() -> ReservationEngine {
    let rooms = InMemoryRoomCatalog::new();
    rooms.insert(Room {
        id: ROOM.to_string(),
        hotel_id: "hotel-1".to_string(),
        room_number: "101".to_string(),
        room_type: "double".to_string(),
        price_per_night: PRICE,
        is_available: true,
    });
    ReservationEngine::new(Arc::new(InMemoryStore::new()), Arc::new(rooms))
}

pub fn day(offset: i64) -> NaiveDate {
    Utc::now().date_naive() + Duration::days(offset)
}

fn sign(claims: &Claims) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(JWT_SECRET)).unwrap()
}

pub fn token(sub: &str, role: Role) -> String {
    sign(&Claims {
        sub: sub.to_string(),
        role,
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        user_id: None,
        email: Some(format!("{}@example.com", sub)),
        username: None,
        iat: None,
    })
}

pub fn expired_token(sub: &str, role: Role) -> String {
    sign(&Claims {
        sub: sub.to_string(),
        role,
        exp: (Utc::now() - Duration::hours(1)).timestamp() as usize,
        user_id: None,
        email: None,
        username: None,
        iat: None,
    })
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

#[macro_use]
mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use serde_json::{json, Value};

use common::{bearer, day, engine, expired_token, token, PRICE, ROOM};
use hotel_reservations::api::employee::ReservationListResponse;
use hotel_reservations::api::reservation::ReservationResponse;
use hotel_reservations::api::ErrorResponse;
use hotel_reservations::auth::Role;
use hotel_reservations::db::ReservationStatus;

fn booking(check_in: i64, check_out: i64, email: &str) -> Value {
    json!({
        "room_id": ROOM,
        "client_email": email,
        "client_name": "Ana García",
        "check_in_date": day(check_in).to_string(),
        "check_out_date": day(check_out).to_string(),
    })
}

#[actix_web::test]
async fn health_reports_healthy() {
    let app = test_app!(engine());

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "status": "healthy" }));
}

#[actix_web::test]
async fn guest_booking_is_created_pending_and_priced() {
    let app = test_app!(engine());

    let req = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(10, 13, "ana@example.com"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let created: ReservationResponse = test::read_body_json(resp).await;
    assert_eq!(created.status, ReservationStatus::Pending);
    assert_eq!(created.total_price, 3.0 * PRICE);
    assert!(created.is_guest);
    assert_eq!(created.client_id, "ana@example.com");
    assert_eq!(created.employee_id, None);
}

#[actix_web::test]
async fn authenticated_booking_uses_token_subject() {
    let app = test_app!(engine());

    let mut body = booking(5, 6, "ana@example.com");
    body["client_id"] = json!("someone-else");
    body["check_in_date"] = json!(format!("{}T14:00:00Z", day(5)));

    let req = test::TestRequest::post()
        .uri("/reservations")
        .insert_header(bearer(&token("client-1", Role::Client)))
        .set_json(body)
        .to_request();
    let created: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(created.client_id, "client-1");
    assert!(!created.is_guest);
    assert_eq!(created.check_in_date, day(5));
}

#[actix_web::test]
async fn invalid_token_on_booking_is_401_with_challenge() {
    let app = test_app!(engine());

    for header_value in [
        format!("Bearer {}", expired_token("client-1", Role::Client)),
        "Bearer not-a-jwt".to_string(),
        "Basic dXNlcjpwYXNz".to_string(),
    ] {
        let req = test::TestRequest::post()
            .uri("/reservations")
            .insert_header(("Authorization", header_value))
            .set_json(booking(5, 6, "ana@example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()),
            Some("Bearer")
        );
    }
}

#[actix_web::test]
async fn overlapping_booking_is_rejected_but_back_to_back_is_not() {
    let app = test_app!(engine());

    let first = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(20, 22, "a@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, first).await.status(), StatusCode::CREATED);

    let clash = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(21, 23, "b@example.com"))
        .to_request();
    let resp = test::call_service(&app, clash).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = test::read_body_json(resp).await;
    assert!(error.message.contains("no está disponible"));

    let next = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(22, 24, "b@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, next).await.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn bad_booking_requests_are_400() {
    let app = test_app!(engine());

    let mut unknown_room = booking(3, 4, "a@example.com");
    unknown_room["room_id"] = json!("room-999");
    let mut bad_date = booking(3, 4, "a@example.com");
    bad_date["check_in_date"] = json!("03/04/2030");

    let cases = [
        booking(-1, 2, "a@example.com"), // entrada ayer
        booking(4, 4, "a@example.com"),  // cero noches
        booking(6, 4, "a@example.com"),  // invertido
        booking(3, 4, "not-an-email"),
        unknown_room,
        bad_date,
    ];

    for body in cases {
        let req = test::TestRequest::post().uri("/reservations").set_json(body.clone()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }

    let malformed = test::TestRequest::post()
        .uri("/reservations")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{\"room_id\": ")
        .to_request();
    let resp = test::call_service(&app, malformed).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(error.error, "Error de validación");
}

#[actix_web::test]
async fn my_reservations_requires_token_and_filters_by_owner() {
    let app = test_app!(engine());
    let ana = token("ana", Role::Client);
    let luis = token("luis", Role::Client);

    for (who, offset) in [(&ana, 1), (&luis, 3), (&ana, 5)] {
        let req = test::TestRequest::post()
            .uri("/reservations")
            .insert_header(bearer(who))
            .set_json(booking(offset, offset + 1, "x@example.com"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let anonymous = test::TestRequest::get().uri("/reservations/my").to_request();
    assert_eq!(test::call_service(&app, anonymous).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/reservations/my")
        .insert_header(bearer(&ana))
        .to_request();
    let mine: Vec<ReservationResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|r| r.client_id == "ana"));
}

#[actix_web::test]
async fn reading_a_reservation_respects_ownership() {
    let app = test_app!(engine());

    let req = test::TestRequest::post()
        .uri("/reservations")
        .insert_header(bearer(&token("ana", Role::Client)))
        .set_json(booking(2, 4, "ana@example.com"))
        .to_request();
    let created: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    let uri = format!("/reservations/{}", created.id);

    let cases = [
        (Some(token("ana", Role::Client)), StatusCode::OK),
        (Some(token("luis", Role::Client)), StatusCode::FORBIDDEN),
        (Some(token("emp-1", Role::Employee)), StatusCode::OK),
        (None, StatusCode::OK),
    ];
    for (caller, expected) in cases {
        let mut req = test::TestRequest::get().uri(&uri);
        if let Some(t) = &caller {
            req = req.insert_header(bearer(t));
        }
        assert_eq!(test::call_service(&app, req.to_request()).await.status(), expected);
    }

    let missing = test::TestRequest::get()
        .uri(&format!("/reservations/{}", uuid::Uuid::new_v4()))
        .to_request();
    assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::NOT_FOUND);

    let malformed = test::TestRequest::get().uri("/reservations/abc").to_request();
    assert_eq!(test::call_service(&app, malformed).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn client_cancels_own_reservation_once() {
    let app = test_app!(engine());
    let ana = token("ana", Role::Client);

    let req = test::TestRequest::post()
        .uri("/reservations")
        .insert_header(bearer(&ana))
        .set_json(booking(7, 9, "ana@example.com"))
        .to_request();
    let created: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    let uri = format!("/reservations/{}", created.id);

    let anonymous = test::TestRequest::delete().uri(&uri).to_request();
    assert_eq!(test::call_service(&app, anonymous).await.status(), StatusCode::UNAUTHORIZED);

    let stranger = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&token("luis", Role::Client)))
        .to_request();
    assert_eq!(test::call_service(&app, stranger).await.status(), StatusCode::FORBIDDEN);

    let owner = test::TestRequest::delete().uri(&uri).insert_header(bearer(&ana)).to_request();
    assert_eq!(test::call_service(&app, owner).await.status(), StatusCode::NO_CONTENT);

    let again = test::TestRequest::delete().uri(&uri).insert_header(bearer(&ana)).to_request();
    assert_eq!(test::call_service(&app, again).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&ana)).to_request();
    let cancelled: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(cancelled.employee_id, None);

    // las fechas vuelven a estar libres
    let rebook = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(7, 9, "otra@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, rebook).await.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn availability_check_reports_range() {
    let app = test_app!(engine());

    let req = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(10, 12, "a@example.com"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let check = |from: i64, to: i64| {
        test::TestRequest::post()
            .uri("/reservations/check-availability")
            .set_json(json!({
                "room_id": ROOM,
                "check_in_date": day(from).to_string(),
                "check_out_date": day(to).to_string(),
            }))
            .to_request()
    };

    let busy: Value = test::call_and_read_body_json(&app, check(11, 13)).await;
    assert_eq!(busy["is_available"], json!(false));
    assert_eq!(busy["room_id"], json!(ROOM));
    assert_eq!(busy["check_in_date"], json!(day(11).to_string()));

    let free: Value = test::call_and_read_body_json(&app, check(12, 14)).await;
    assert_eq!(free["is_available"], json!(true));

    let resp = test::call_service(&app, check(14, 12)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn staff_routes_reject_clients_and_anonymous_callers() {
    let app = test_app!(engine());
    let client = token("ana", Role::Client);
    let id = uuid::Uuid::new_v4();

    let routes = [
        test::TestRequest::get().uri("/reservations"),
        test::TestRequest::get().uri("/reservations/room/room-101"),
        test::TestRequest::get().uri("/reservations/client/ana"),
        test::TestRequest::post().uri(&format!("/reservations/{}/confirm", id)),
        test::TestRequest::post().uri(&format!("/reservations/{}/complete", id)),
    ];

    for route in routes {
        let resp = test::call_service(&app, route.insert_header(bearer(&client)).to_request()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    let anonymous = test::TestRequest::get().uri("/reservations").to_request();
    assert_eq!(test::call_service(&app, anonymous).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn employee_drives_the_state_machine() {
    let app = test_app!(engine());
    let employee = token("emp-1", Role::Employee);

    let req = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(15, 17, "a@example.com"))
        .to_request();
    let created: ReservationResponse = test::call_and_read_body_json(&app, req).await;

    // completar una pendiente no está permitido
    let complete = |id: uuid::Uuid| {
        test::TestRequest::post()
            .uri(&format!("/reservations/{}/complete", id))
            .insert_header(bearer(&employee))
            .to_request()
    };
    assert_eq!(test::call_service(&app, complete(created.id)).await.status(), StatusCode::CONFLICT);

    let confirm = test::TestRequest::post()
        .uri(&format!("/reservations/{}/confirm", created.id))
        .insert_header(bearer(&employee))
        .to_request();
    let confirmed: ReservationResponse = test::call_and_read_body_json(&app, confirm).await;
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert_eq!(confirmed.employee_id.as_deref(), Some("emp-1"));

    let done: ReservationResponse = test::call_and_read_body_json(&app, complete(created.id)).await;
    assert_eq!(done.status, ReservationStatus::Completed);

    let reconfirm = test::TestRequest::post()
        .uri(&format!("/reservations/{}/confirm", created.id))
        .insert_header(bearer(&employee))
        .to_request();
    assert_eq!(test::call_service(&app, reconfirm).await.status(), StatusCode::CONFLICT);

    let unknown = complete(uuid::Uuid::new_v4());
    assert_eq!(test::call_service(&app, unknown).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn status_patch_applies_transition_and_notes() {
    let app = test_app!(engine());
    let manager = token("mgr-1", Role::Manager);

    let req = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(30, 31, "a@example.com"))
        .to_request();
    let created: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    let uri = format!("/reservations/{}/status", created.id);

    for status in ["pending", "archived"] {
        let req = test::TestRequest::patch()
            .uri(&uri)
            .insert_header(bearer(&manager))
            .set_json(json!({ "status": status }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(&manager))
        .set_json(json!({ "status": "CANCELLED", "notes": "cliente avisó por teléfono" }))
        .to_request();
    let cancelled: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    assert_eq!(cancelled.notes.as_deref(), Some("cliente avisó por teléfono"));
    assert_eq!(cancelled.employee_id.as_deref(), Some("mgr-1"));

    // las notas se pueden editar incluso en estado terminal
    let req = test::TestRequest::patch()
        .uri(&format!("/reservations/{}/notes", created.id))
        .insert_header(bearer(&manager))
        .set_json(json!({ "notes": "reembolso emitido" }))
        .to_request();
    let annotated: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(annotated.status, ReservationStatus::Cancelled);
    assert_eq!(annotated.notes.as_deref(), Some("reembolso emitido"));
}

#[actix_web::test]
async fn status_patch_ignores_empty_notes() {
    let app = test_app!(engine());
    let manager = token("mgr-1", Role::Manager);

    let req = test::TestRequest::post()
        .uri("/reservations")
        .set_json(json!({
            "room_id": ROOM,
            "client_email": "a@example.com",
            "client_name": "Ana García",
            "check_in_date": day(32).to_string(),
            "check_out_date": day(33).to_string(),
            "notes": "llegada tarde",
        }))
        .to_request();
    let created: ReservationResponse = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::patch()
        .uri(&format!("/reservations/{}/status", created.id))
        .insert_header(bearer(&manager))
        .set_json(json!({ "status": "confirmed", "notes": "" }))
        .to_request();
    let confirmed: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);
    assert_eq!(confirmed.notes.as_deref(), Some("llegada tarde"));
}

#[actix_web::test]
async fn staff_listings_paginate_and_filter() {
    let app = test_app!(engine());
    let employee = token("emp-1", Role::Employee);
    let ana = token("ana", Role::Client);

    for offset in [1, 3, 5] {
        let req = test::TestRequest::post()
            .uri("/reservations")
            .insert_header(bearer(&ana))
            .set_json(booking(offset, offset + 1, "ana@example.com"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/reservations?skip=1&limit=1")
        .insert_header(bearer(&employee))
        .to_request();
    let page: ReservationListResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!((page.total, page.skip, page.limit), (1, 1, 1));
    assert_eq!(page.reservations[0].check_in_date, day(3));

    let req = test::TestRequest::get()
        .uri("/reservations")
        .insert_header(bearer(&employee))
        .to_request();
    let all: ReservationListResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!((all.total, all.skip, all.limit), (3, 0, 100));

    for bad in ["/reservations?limit=0", "/reservations?limit=1001"] {
        let req = test::TestRequest::get().uri(bad).insert_header(bearer(&employee)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    let req = test::TestRequest::get()
        .uri(&format!("/reservations/room/{}", ROOM))
        .insert_header(bearer(&employee))
        .to_request();
    let by_room: Vec<ReservationResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(by_room.len(), 3);

    let req = test::TestRequest::get()
        .uri("/reservations/client/luis")
        .insert_header(bearer(&employee))
        .to_request();
    let by_client: Vec<ReservationResponse> = test::call_and_read_body_json(&app, req).await;
    assert!(by_client.is_empty());
}

#[actix_web::test]
async fn hard_delete_is_admin_only() {
    let app = test_app!(engine());

    let req = test::TestRequest::post()
        .uri("/reservations")
        .set_json(booking(40, 41, "a@example.com"))
        .to_request();
    let created: ReservationResponse = test::call_and_read_body_json(&app, req).await;
    let uri = format!("/admin/reservations/{}", created.id);

    let manager = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&token("mgr-1", Role::Manager)))
        .to_request();
    assert_eq!(test::call_service(&app, manager).await.status(), StatusCode::FORBIDDEN);

    let admin = token("root", Role::Admin);
    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&admin)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(&admin)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get()
        .uri(&format!("/reservations/{}", created.id))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

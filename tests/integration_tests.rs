use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use tower::ServiceExt;

use bookwise::config::{AppConfig, WizardConfig};
use bookwise::db;
use bookwise::db::queries;
use bookwise::handlers;
use bookwise::models::{AssignmentMode, ContactDetails, CreateBookingRequest, Service};
use bookwise::services::booking_api::http::HttpBookingApi;
use bookwise::services::booking_api::{ApiError, BookingApi};
use bookwise::services::wizard::{BookingWizard, WizardAction, WizardStep};
use bookwise::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        demo_subdomain: Some("acme".to_string()),
        booking_rate_limit: 0,
    }
}

fn test_state() -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    queries::seed_demo_business(&conn, "acme").unwrap();
    Arc::new(AppState::new(conn, &test_config()))
}

fn set_assignment_mode(state: &AppState, mode: AssignmentMode) {
    let db = state.db.lock().unwrap();
    let business = queries::get_business_by_subdomain(&db, "acme").unwrap().unwrap();
    let mut settings = queries::get_calendar_settings(&db, business.id).unwrap();
    settings.assignment_mode = mode;
    queries::save_calendar_settings(&db, business.id, &settings).unwrap();
}

fn appointment_count(state: &AppState) -> i64 {
    let db = state.db.lock().unwrap();
    db.query_row("SELECT COUNT(*) FROM appointments", [], |row| row.get(0))
        .unwrap()
}

fn add_service(state: &AppState, id: &str, duration: u32, buffer: Option<u32>) {
    let db = state.db.lock().unwrap();
    let business = queries::get_business_by_subdomain(&db, "acme").unwrap().unwrap();
    let service = Service {
        id: id.to_string(),
        name: "Deep Treatment".to_string(),
        description: None,
        price_cents: 12000,
        duration_minutes: Some(duration),
        category: Some("Treatments".to_string()),
        buffer_minutes: buffer,
    };
    queries::insert_service(&db, business.id, &service).unwrap();
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_booking(body: serde_json::Value, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/public/bookings")
        .header("Content-Type", "application/json");
    if let Some(key) = key {
        builder = builder.header("Idempotency-Key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn booking_body(date: &str, time: &str) -> serde_json::Value {
    serde_json::json!({
        "subdomain": "acme",
        "name": "Jane Doe",
        "email": "jane@x.com",
        "date": date,
        "time": time,
        "serviceId": "demo_consultation"
    })
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

// 2025-03-10 is a Monday, 2025-03-09 a Sunday, 2025-03-08 a Saturday

// ── Health & Catalog ──

#[tokio::test]
async fn test_health() {
    let app = test_app(test_state());
    let res = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_services_listed_in_camel_case() {
    let app = test_app(test_state());
    let (status, json) = send(&app, get("/api/public/services?subdomain=acme")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let services = json["services"].as_array().unwrap();
    assert_eq!(services.len(), 5);
    let consultation = services
        .iter()
        .find(|s| s["id"] == "demo_consultation")
        .unwrap();
    assert_eq!(consultation["priceCents"], 7500);
    assert_eq!(consultation["durationMinutes"], 60);
}

#[tokio::test]
async fn test_services_unknown_business() {
    let app = test_app(test_state());
    let (status, json) = send(&app, get("/api/public/services?subdomain=nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Business not found");

    let (status, _) = send(&app, get("/api/public/services")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Availability ──

#[tokio::test]
async fn test_availability_requires_params() {
    let app = test_app(test_state());
    let (status, _) = send(&app, get("/api/public/bookings/availability?subdomain=acme")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        get("/api/public/bookings/availability?subdomain=acme&date=03/10/2025"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid date format. Use YYYY-MM-DD");
}

#[tokio::test]
async fn test_availability_closed_day() {
    let app = test_app(test_state());
    let (status, json) = send(
        &app,
        get("/api/public/bookings/availability?subdomain=acme&date=2025-03-09"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["closed"], true);
    assert_eq!(json["takenSlots"], serde_json::json!([]));
}

#[tokio::test]
async fn test_availability_reports_taken_slots() {
    let state = test_state();
    let app = test_app(state.clone());

    let (status, _) = send(&app, post_booking(booking_body("2025-03-10", "09:00"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(
        &app,
        get("/api/public/bookings/availability?subdomain=acme&date=2025-03-10&serviceId=demo_consultation"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["closed"], false);
    assert_eq!(json["businessHours"]["start"], "09:00");
    assert_eq!(json["businessHours"]["end"], "17:00");
    assert_eq!(json["slotDuration"], 60);
    assert_eq!(json["takenSlots"], serde_json::json!(["09:00"]));
    assert_eq!(json["assignmentMode"], "manual");
    assert!(json.get("staff").is_none());
}

#[tokio::test]
async fn test_availability_uses_service_duration() {
    let app = test_app(test_state());
    let (_, json) = send(
        &app,
        get("/api/public/bookings/availability?subdomain=acme&date=2025-03-08&serviceId=demo_full_session"),
    )
    .await;
    assert_eq!(json["slotDuration"], 90);
    assert_eq!(json["businessHours"]["start"], "10:00");
}

#[tokio::test]
async fn test_availability_lists_staff_in_direct_mode() {
    let state = test_state();
    set_assignment_mode(&state, AssignmentMode::Direct);
    let app = test_app(state);

    let (_, json) = send(
        &app,
        get("/api/public/bookings/availability?subdomain=acme&date=2025-03-10"),
    )
    .await;
    assert_eq!(json["assignmentMode"], "direct");
    let staff = json["staff"].as_array().unwrap();
    assert_eq!(staff.len(), 2);
    assert_eq!(staff[0]["name"], "Alex");
}

// ── Booking Creation ──

#[tokio::test]
async fn test_valid_booking_succeeds() {
    let state = test_state();
    let app = test_app(state.clone());

    let (status, json) = send(&app, post_booking(booking_body("2025-03-10", "10:00"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["refNumber"].as_str().unwrap().starts_with("BK-"));
    assert_eq!(json["startTime"], "2025-03-10T10:00:00");
    assert_eq!(json["businessName"], "Demo Studio");
    assert_eq!(appointment_count(&state), 1);
}

#[tokio::test]
async fn test_twelve_hour_time_accepted() {
    let app = test_app(test_state());
    let (status, json) = send(&app, post_booking(booking_body("2025-03-10", "2:00 PM"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["startTime"], "2025-03-10T14:00:00");
}

#[tokio::test]
async fn test_conflicting_booking_rejected() {
    let state = test_state();
    let app = test_app(state.clone());

    let (status, _) = send(&app, post_booking(booking_body("2025-03-10", "09:00"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let mut other = booking_body("2025-03-10", "09:00");
    other["name"] = "Someone Else".into();
    other["email"] = "else@x.com".into();
    let (status, json) = send(&app, post_booking(other, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"],
        "This time slot is no longer available. Please choose another time."
    );
    assert_eq!(appointment_count(&state), 1);
}

#[tokio::test]
async fn test_repeated_idempotency_key_replays_original() {
    let state = test_state();
    let app = test_app(state.clone());

    let (status, first) = send(
        &app,
        post_booking(booking_body("2025-03-10", "11:00"), Some("key-123")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) = send(
        &app,
        post_booking(booking_body("2025-03-10", "11:00"), Some("key-123")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["refNumber"], second["refNumber"]);
    assert_eq!(appointment_count(&state), 1);
}

#[tokio::test]
async fn test_invalid_bookings_rejected() {
    let state = test_state();
    let app = test_app(state.clone());

    let cases = [
        (serde_json::json!({"subdomain": "acme", "name": "Jane"}), "Missing required fields: subdomain, name, email, date, time"),
        ({
            let mut b = booking_body("2025-03-10", "10:00");
            b["email"] = "not-an-email".into();
            b
        }, "Invalid email address"),
        (booking_body("2025-03-10", "quarter past"), "Invalid date or time format"),
        (booking_body("2025-03-09", "10:00"), "We're closed on that day. Please choose another date."),
    ];

    for (body, message) in cases {
        let (status, json) = send(&app, post_booking(body, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], message);
    }

    // 16:30 + 60 min runs past closing
    let (status, json) = send(&app, post_booking(booking_body("2025-03-10", "16:30"), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("outside our business hours"));

    let mut unknown = booking_body("2025-03-10", "10:00");
    unknown["subdomain"] = "nobody".into();
    let (status, _) = send(&app, post_booking(unknown, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(appointment_count(&state), 0);
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let app = test_app(test_state());
    let req = Request::builder()
        .method("POST")
        .uri("/api/public/bookings")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid request body");
}

#[tokio::test]
async fn test_service_buffer_blocks_adjacent_slot() {
    let state = test_state();
    add_service(&state, "svc_deep", 60, Some(30));
    let app = test_app(state.clone());

    let (status, _) = send(&app, post_booking(booking_body("2025-03-10", "10:00"), None)).await;
    assert_eq!(status, StatusCode::OK);

    let mut body = booking_body("2025-03-10", "11:00");
    body["serviceId"] = "svc_deep".into();
    let (status, _) = send(&app, post_booking(body, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Without the service buffer the same start is free
    let (status, _) = send(&app, post_booking(booking_body("2025-03-10", "11:00"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(appointment_count(&state), 2);
}

#[tokio::test]
async fn test_booking_rate_limited_per_client() {
    let conn = db::init_db(":memory:").unwrap();
    queries::seed_demo_business(&conn, "acme").unwrap();
    let config = AppConfig {
        booking_rate_limit: 2,
        ..test_config()
    };
    let app = test_app(Arc::new(AppState::new(conn, &config)));

    let from = |ip: &str, time: &str| {
        let mut req = post_booking(booking_body("2025-03-10", time), None);
        req.headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        req
    };

    assert_eq!(send(&app, from("203.0.113.7", "09:00")).await.0, StatusCode::OK);
    assert_eq!(send(&app, from("203.0.113.7", "10:00")).await.0, StatusCode::OK);
    let (status, json) = send(&app, from("203.0.113.7", "11:00")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["error"], "Too many booking requests. Please try again later.");

    assert_eq!(send(&app, from("198.51.100.4", "11:00")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_round_robin_assigns_staff_in_turn() {
    let state = test_state();
    set_assignment_mode(&state, AssignmentMode::RoundRobin);
    let app = test_app(state.clone());

    for _ in 0..2 {
        let (status, _) = send(&app, post_booking(booking_body("2025-03-10", "09:00"), None)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, json) = send(&app, post_booking(booking_body("2025-03-10", "09:00"), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"],
        "No staff available at this time. Please choose another time."
    );

    let db = state.db.lock().unwrap();
    let mut stmt = db
        .prepare("SELECT staff_id FROM appointments ORDER BY created_at, rowid")
        .unwrap();
    let staff: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(staff, vec!["acme_st_alex", "acme_st_robin"]);
}

#[tokio::test]
async fn test_direct_mode_rejects_unlisted_staff() {
    let state = test_state();
    set_assignment_mode(&state, AssignmentMode::Direct);
    let app = test_app(state);

    let mut body = booking_body("2025-03-10", "10:00");
    body["staffId"] = "st_ghost".into();
    let (status, _) = send(&app, post_booking(body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = booking_body("2025-03-10", "10:00");
    body["staffId"] = "acme_st_robin".into();
    let (status, _) = send(&app, post_booking(body, None)).await;
    assert_eq!(status, StatusCode::OK);
}

// ── Calendar ──

#[tokio::test]
async fn test_calendar_not_found() {
    let app = test_app(test_state());
    let res = app
        .oneshot(get("/api/public/bookings/BK-NOPE0000/ics"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_calendar_download() {
    let app = test_app(test_state());
    let (_, json) = send(&app, post_booking(booking_body("2025-03-10", "14:00"), None)).await;
    let reference = json["refNumber"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(get(&format!("/api/public/bookings/{reference}/ics")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/calendar; charset=utf-8"
    );

    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("BEGIN:VEVENT"));
    assert!(text.contains("DTSTART:20250310T140000"));
    assert!(text.contains("DTEND:20250310T150000"));
    assert!(text.contains("SUMMARY:Consultation - Jane Doe at Demo Studio"));
}

// ── Wizard Against a Live Server ──

async fn serve(state: Arc<AppState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, test_app(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_wizard_recovers_from_conflict() {
    let state = test_state();
    let base_url = serve(state.clone()).await;

    let config = WizardConfig::live(base_url.clone(), "acme");
    let mut wizard = BookingWizard::new(&config, date("2025-03-05"));
    wizard.start().await.unwrap();
    assert_eq!(wizard.state().step(), WizardStep::CatalogSelect);

    let consultation = wizard
        .state()
        .catalog()
        .iter()
        .find(|s| s.name == "Consultation")
        .cloned()
        .unwrap();
    wizard
        .dispatch(WizardAction::SelectService(consultation))
        .await
        .unwrap();
    wizard
        .dispatch(WizardAction::SelectDate(date("2025-03-10")))
        .await
        .unwrap();
    let slots = wizard.state().slots();
    assert_eq!(slots.len(), 8);
    assert!(slots.iter().all(|s| s.available));

    wizard
        .dispatch(WizardAction::SelectSlot("09:00".to_string()))
        .await
        .unwrap();
    wizard
        .dispatch(WizardAction::UpdateContact(ContactDetails {
            name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            phone: None,
            notes: None,
        }))
        .await
        .unwrap();

    // Another customer takes 09:00 first.
    let rival = HttpBookingApi::new(base_url, "acme");
    rival
        .create_booking(
            &CreateBookingRequest {
                subdomain: "acme".to_string(),
                name: "Rival".to_string(),
                email: "rival@x.com".to_string(),
                phone: None,
                date: "2025-03-10".to_string(),
                time: "09:00".to_string(),
                notes: None,
                service_id: None,
                staff_id: None,
            },
            "rival-key",
        )
        .await
        .unwrap();

    wizard.dispatch(WizardAction::Submit).await.unwrap();
    assert_eq!(wizard.state().step(), WizardStep::TimeSelect);
    assert_eq!(wizard.state().draft().time, None);
    assert!(wizard.state().error().is_some());
    let nine = wizard
        .state()
        .slots()
        .iter()
        .find(|s| s.time == "09:00")
        .unwrap();
    assert!(!nine.available);

    wizard
        .dispatch(WizardAction::SelectSlot("10:00".to_string()))
        .await
        .unwrap();
    wizard.dispatch(WizardAction::Submit).await.unwrap();

    assert_eq!(wizard.state().step(), WizardStep::Confirmation);
    let result = wizard.state().result().unwrap();
    assert!(result.reference_code.starts_with("BK-"));
    assert_eq!(result.time, "10:00");
    assert_eq!(appointment_count(&state), 2);
}

#[tokio::test]
async fn test_http_api_maps_conflict() {
    let state = test_state();
    let base_url = serve(state).await;
    let api = HttpBookingApi::new(base_url, "acme");

    let request = CreateBookingRequest {
        subdomain: "acme".to_string(),
        name: "Jane".to_string(),
        email: "jane@x.com".to_string(),
        phone: None,
        date: "2025-03-10".to_string(),
        time: "13:00".to_string(),
        notes: None,
        service_id: None,
        staff_id: None,
    };
    api.create_booking(&request, "k1").await.unwrap();

    let err = api.create_booking(&request, "k2").await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let mut bad = request.clone();
    bad.email = "nope".to_string();
    let err = api.create_booking(&bad, "k3").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Rejected {
            status: 400,
            message: "Invalid email address".to_string()
        }
    );
}

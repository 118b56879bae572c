use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::slot::minutes_from_hhmm;
use crate::models::{
    Appointment, AssignmentMode, AvailabilityResponse, BookingStatus, CreateBookingRequest,
    CreateBookingResponse, DayStatus,
};
use crate::services::booking_api::http::IDEMPOTENCY_HEADER;
use crate::services::scheduling;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    subdomain: Option<String>,
    date: Option<String>,
    #[serde(alias = "service_id")]
    service_id: Option<String>,
}

// GET /api/public/bookings/availability?subdomain=X&date=YYYY-MM-DD
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let (Some(subdomain), Some(date_str)) = (non_blank(query.subdomain), non_blank(query.date))
    else {
        return Err(AppError::BadRequest(
            "Missing required params: subdomain, date".to_string(),
        ));
    };
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest("Invalid date format. Use YYYY-MM-DD".to_string())
    })?;

    let db = state.db()?;
    let business = queries::get_business_by_subdomain(&db, &subdomain)?
        .ok_or_else(|| AppError::NotFound("Business not found".to_string()))?;
    let settings = queries::get_calendar_settings(&db, business.id)?;

    let mut slot_duration = settings.slot_duration_minutes;
    if let Some(service_id) = non_blank(query.service_id) {
        if let Some(minutes) = queries::get_service(&db, business.id, &service_id)?
            .and_then(|s| s.duration_minutes)
            .filter(|m| *m > 0)
        {
            slot_duration = minutes;
        }
    }

    let hours = match settings.schedule.day_status(date) {
        DayStatus::Closed => {
            return Ok(Json(AvailabilityResponse {
                success: true,
                date: Some(date_str),
                closed: true,
                slot_duration: Some(slot_duration),
                taken_slots: Some(vec![]),
                ..Default::default()
            }));
        }
        DayStatus::Open(hours) => Some(hours),
        DayStatus::Unconfigured => None,
    };

    let taken = scheduling::taken_slots(
        &db,
        business.id,
        date,
        hours.as_ref(),
        slot_duration,
        settings.buffer_minutes,
    )?;

    let staff = match settings.assignment_mode {
        AssignmentMode::Direct => {
            let staff = queries::list_staff(&db, business.id)?;
            (!staff.is_empty()).then_some(staff)
        }
        _ => None,
    };

    tracing::debug!(
        subdomain = %subdomain,
        %date,
        taken = taken.len(),
        "availability computed"
    );

    Ok(Json(AvailabilityResponse {
        success: true,
        date: Some(date_str),
        closed: false,
        business_hours: hours,
        slot_duration: Some(slot_duration),
        taken_slots: Some(taken),
        assignment_mode: Some(settings.assignment_mode),
        staff,
    }))
}

// POST /api/public/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<Json<CreateBookingResponse>, AppError> {
    if !state.booking_limiter.check(&client_id(&headers)) {
        return Err(AppError::TooManyRequests(
            "Too many booking requests. Please try again later.".to_string(),
        ));
    }

    let Json(req) =
        payload.map_err(|_| AppError::BadRequest("Invalid request body".to_string()))?;

    let subdomain = req.subdomain.trim();
    let name = req.name.trim();
    let email = req.email.trim();
    if [subdomain, name, email, req.date.trim(), req.time.trim()]
        .iter()
        .any(|v| v.is_empty())
    {
        return Err(AppError::BadRequest(
            "Missing required fields: subdomain, name, email, date, time".to_string(),
        ));
    }
    if !is_valid_email(email) {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }

    let date = NaiveDate::parse_from_str(req.date.trim(), "%Y-%m-%d").ok();
    let minutes = parse_time_of_day(&req.time);
    let Some(start) = date
        .zip(minutes)
        .and_then(|(d, m)| d.and_hms_opt(m / 60, m % 60, 0))
    else {
        return Err(AppError::BadRequest("Invalid date or time format".to_string()));
    };

    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    let mut db = state.db()?;
    let business = queries::get_business_by_subdomain(&db, subdomain)?
        .ok_or_else(|| AppError::NotFound("Business not found".to_string()))?;

    if let Some(key) = idempotency_key.as_deref() {
        if let Some(existing) = queries::find_by_idempotency_key(&db, business.id, key)? {
            tracing::info!(reference = %existing.ref_number, "replaying booking for repeated idempotency key");
            return Ok(Json(confirmation(&existing, business.name)));
        }
    }

    let mut settings = queries::get_calendar_settings(&db, business.id)?;
    let service = match req.service_id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => queries::get_service(&db, business.id, id)?,
        None => None,
    };
    let duration = service
        .as_ref()
        .and_then(|s| s.duration_minutes)
        .filter(|m| *m > 0)
        .unwrap_or(settings.slot_duration_minutes);
    if let Some(buffer) = service.as_ref().and_then(|s| s.buffer_minutes).filter(|b| *b > 0) {
        settings.buffer_minutes = buffer;
    }
    let staff = queries::list_staff(&db, business.id)?;

    let tx = db.transaction()?;

    let assignment = scheduling::check_and_assign(
        &tx,
        business.id,
        &start,
        duration,
        &settings,
        &staff,
        req.staff_id.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    )
    .inspect_err(|e| tracing::info!(%start, reason = %e, "booking refused"))?;

    if let Some(index) = assignment.rotation_index {
        queries::set_last_assigned_index(&tx, business.id, index)?;
    }

    let title = match &service {
        Some(s) => format!("{} - {name}", s.name),
        None => format!("Booking: {name}"),
    };
    let appointment = Appointment {
        id: uuid::Uuid::new_v4().to_string(),
        business_id: business.id,
        ref_number: generate_ref_number(),
        customer_name: name.to_string(),
        customer_email: email.to_string(),
        customer_phone: non_blank(req.phone.clone()),
        service_id: service.as_ref().map(|s| s.id.clone()),
        staff_id: assignment.staff_id,
        title,
        start_time: start,
        end_time: start + Duration::minutes(duration as i64),
        status: BookingStatus::Scheduled,
        notes: non_blank(req.notes.clone()),
        idempotency_key,
        created_at: Utc::now().naive_utc(),
    };
    queries::create_appointment(&tx, &appointment)?;
    tx.commit()?;

    tracing::info!(
        reference = %appointment.ref_number,
        subdomain = %business.subdomain,
        %start,
        staff = appointment.staff_id.as_deref().unwrap_or("-"),
        "booking created"
    );

    Ok(Json(confirmation(&appointment, business.name)))
}

fn confirmation(appointment: &Appointment, business_name: String) -> CreateBookingResponse {
    CreateBookingResponse {
        success: true,
        ref_number: appointment.ref_number.clone(),
        start_time: Some(appointment.start_time.format("%Y-%m-%dT%H:%M:%S").to_string()),
        business_name: Some(business_name),
    }
}

/// `BK-` followed by eight uppercase hex characters.
fn generate_ref_number() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("BK-{}", id[..8].to_uppercase())
}

/// First forwarded address, else the real-ip header.
fn client_id(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// Minutes since midnight for `HH:MM` or `H:MM AM/PM`.
fn parse_time_of_day(s: &str) -> Option<u32> {
    let s = s.trim();
    let upper = s.to_ascii_uppercase();
    let (clock, pm) = if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(true))
    } else if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(false))
    } else {
        (upper.as_str(), None)
    };

    let mins = minutes_from_hhmm(clock)?;
    let Some(pm) = pm else {
        return Some(mins);
    };

    let (hour, minute) = (mins / 60, mins % 60);
    if hour == 0 || hour > 12 {
        return None;
    }
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    };
    Some(hour * 60 + minute)
}

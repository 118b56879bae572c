use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

// GET /api/public/bookings/:ref_number/ics
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_ref): Path<String>,
) -> Result<Response, AppError> {
    let ref_number = raw_ref.strip_suffix(".ics").unwrap_or(&raw_ref);

    let (appointment, business_name) = {
        let db = state.db()?;
        let appointment = queries::get_appointment_by_ref(&db, ref_number)?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;
        let business_name = queries::get_business(&db, appointment.business_id)?
            .map(|b| b.name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Booking".to_string());
        (appointment, business_name)
    };

    let ics = generate_ics(&appointment, &business_name);
    let filename = format!("booking-{ref_number}.ics");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}

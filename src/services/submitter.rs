use std::sync::Arc;

use crate::models::{BookingDraft, BookingResult};
use crate::services::booking_api::{ApiError, BookingApi};

pub const CONFLICT_MESSAGE: &str = "This time slot was just taken. Please choose another time.";
pub const TRANSPORT_MESSAGE: &str = "Something went wrong. Please try again.";

/// Why a submission did not produce a booking. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Someone else got the slot first. The customer picks another time.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Transport(String),
}

/// Sends a completed draft to the backend.
pub struct BookingSubmitter {
    api: Arc<dyn BookingApi>,
    subdomain: String,
}

impl BookingSubmitter {
    pub fn new(api: Arc<dyn BookingApi>, subdomain: impl Into<String>) -> Self {
        Self {
            api,
            subdomain: subdomain.into(),
        }
    }

    pub async fn submit(
        &self,
        draft: &BookingDraft,
        idempotency_key: &str,
    ) -> Result<BookingResult, SubmitError> {
        let request = draft.to_request(&self.subdomain).map_err(|missing| {
            SubmitError::Validation(format!("Please fill in: {}", missing.join(", ")))
        })?;

        let resp = match self.api.create_booking(&request, idempotency_key).await {
            Ok(resp) => resp,
            Err(ApiError::Conflict(detail)) => {
                tracing::info!(date = %request.date, time = %request.time, %detail, "slot taken before submission");
                return Err(SubmitError::Conflict(CONFLICT_MESSAGE.to_string()));
            }
            Err(ApiError::Rejected { status, message }) => {
                tracing::warn!(status, %message, "booking rejected");
                return Err(SubmitError::Validation(message));
            }
            Err(ApiError::Transport(detail)) => {
                tracing::warn!(%detail, "booking request failed");
                return Err(SubmitError::Transport(TRANSPORT_MESSAGE.to_string()));
            }
        };

        if resp.ref_number.trim().is_empty() {
            tracing::warn!("backend accepted booking without a reference");
            return Err(SubmitError::Transport(TRANSPORT_MESSAGE.to_string()));
        }

        tracing::info!(reference = %resp.ref_number, "booking confirmed");

        Ok(BookingResult {
            reference_code: resp.ref_number,
            service: draft.service.clone(),
            date: draft.date.unwrap_or_default(),
            time: request.time,
            staff_id: request.staff_id,
            name: request.name,
            email: request.email,
        })
    }
}

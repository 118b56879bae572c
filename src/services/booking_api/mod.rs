pub mod http;
pub mod preview;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{AvailabilityResponse, CreateBookingRequest, CreateBookingResponse, Service};

/// Outcome of a failed collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The slot was taken by someone else (HTTP 409).
    #[error("{0}")]
    Conflict(String),

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

/// The backend endpoints the booking wizard consumes.
#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn list_services(&self) -> Result<Vec<Service>, ApiError>;

    async fn availability(
        &self,
        date: NaiveDate,
        service_id: Option<&str>,
    ) -> Result<AvailabilityResponse, ApiError>;

    /// Reserves the requested slot. Must fail with [`ApiError::Conflict`]
    /// when the slot is no longer free.
    async fn create_booking(
        &self,
        request: &CreateBookingRequest,
        idempotency_key: &str,
    ) -> Result<CreateBookingResponse, ApiError>;
}

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{ApiError, BookingApi};
use crate::models::service::demo_catalog;
use crate::models::{
    AssignmentMode, AvailabilityResponse, BusinessHours, CreateBookingRequest,
    CreateBookingResponse, Service,
};
use crate::services::slots::{DEFAULT_CLOSE, DEFAULT_OPEN, DEFAULT_SLOT_MINUTES};

/// Stand-in backend for preview mode: demo catalog, an always-open default
/// day and locally issued `DEMO-` references. Nothing here is authoritative.
pub struct PreviewBookingApi {
    catalog: Vec<Service>,
    issued: Mutex<HashMap<String, String>>,
}

impl PreviewBookingApi {
    pub fn new() -> Self {
        Self::with_catalog(demo_catalog())
    }

    pub fn with_catalog(catalog: Vec<Service>) -> Self {
        Self {
            catalog,
            issued: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for PreviewBookingApi {
    fn default() -> Self {
        Self::new()
    }
}

pub fn demo_reference() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("DEMO-{}", &id[..6])
}

#[async_trait]
impl BookingApi for PreviewBookingApi {
    async fn list_services(&self) -> Result<Vec<Service>, ApiError> {
        Ok(self.catalog.clone())
    }

    async fn availability(
        &self,
        date: NaiveDate,
        _service_id: Option<&str>,
    ) -> Result<AvailabilityResponse, ApiError> {
        Ok(AvailabilityResponse {
            success: true,
            date: Some(date.format("%Y-%m-%d").to_string()),
            closed: false,
            business_hours: Some(BusinessHours {
                start: DEFAULT_OPEN.to_string(),
                end: DEFAULT_CLOSE.to_string(),
            }),
            slot_duration: Some(DEFAULT_SLOT_MINUTES),
            taken_slots: Some(vec![]),
            assignment_mode: Some(AssignmentMode::Manual),
            staff: None,
        })
    }

    async fn create_booking(
        &self,
        request: &CreateBookingRequest,
        idempotency_key: &str,
    ) -> Result<CreateBookingResponse, ApiError> {
        if !request.email.contains('@') {
            return Err(ApiError::Rejected {
                status: 400,
                message: "Invalid email address".to_string(),
            });
        }

        let ref_number = {
            let mut issued = self
                .issued
                .lock()
                .map_err(|_| ApiError::Transport("preview state poisoned".to_string()))?;
            issued
                .entry(idempotency_key.to_string())
                .or_insert_with(demo_reference)
                .clone()
        };

        Ok(CreateBookingResponse {
            success: true,
            ref_number,
            start_time: None,
            business_name: None,
        })
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{ApiError, BookingApi};
use crate::models::{AvailabilityResponse, CreateBookingRequest, CreateBookingResponse, Service};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Talks to a live backend over HTTP.
pub struct HttpBookingApi {
    base_url: String,
    subdomain: String,
    client: reqwest::Client,
}

impl HttpBookingApi {
    pub fn new(base_url: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            subdomain: subdomain.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[derive(Deserialize)]
struct ServicesResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    services: Vec<Service>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

async fn error_message(resp: reqwest::Response, fallback: &str) -> String {
    resp.json::<ErrorBody>()
        .await
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn transport(e: reqwest::Error) -> ApiError {
    ApiError::Transport(e.to_string())
}

#[async_trait]
impl BookingApi for HttpBookingApi {
    async fn list_services(&self) -> Result<Vec<Service>, ApiError> {
        let resp = self
            .client
            .get(self.url("/api/public/services"))
            .query(&[("subdomain", self.subdomain.as_str())])
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp, "failed to load services").await;
            return Err(ApiError::Rejected { status: status.as_u16(), message });
        }

        let data: ServicesResponse = resp.json().await.map_err(transport)?;
        if !data.success {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: "service catalog unavailable".to_string(),
            });
        }
        Ok(data.services)
    }

    async fn availability(
        &self,
        date: NaiveDate,
        service_id: Option<&str>,
    ) -> Result<AvailabilityResponse, ApiError> {
        let date = date.format("%Y-%m-%d").to_string();
        let mut query = vec![("subdomain", self.subdomain.as_str()), ("date", date.as_str())];
        if let Some(id) = service_id {
            query.push(("serviceId", id));
        }

        let resp = self
            .client
            .get(self.url("/api/public/bookings/availability"))
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp, "failed to load availability").await;
            return Err(ApiError::Rejected { status: status.as_u16(), message });
        }

        let data: AvailabilityResponse = resp.json().await.map_err(transport)?;
        if !data.success {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: "availability unavailable".to_string(),
            });
        }
        Ok(data)
    }

    async fn create_booking(
        &self,
        request: &CreateBookingRequest,
        idempotency_key: &str,
    ) -> Result<CreateBookingResponse, ApiError> {
        let resp = self
            .client
            .post(self.url("/api/public/bookings"))
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            let message = error_message(
                resp,
                "This time slot is no longer available. Please choose another time.",
            )
            .await;
            return Err(ApiError::Conflict(message));
        }
        if !status.is_success() {
            let message =
                error_message(resp, "Failed to create booking. Please try again.").await;
            return Err(ApiError::Rejected { status: status.as_u16(), message });
        }

        let data: CreateBookingResponse = resp.json().await.map_err(transport)?;
        if !data.success {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: "Failed to create booking. Please try again.".to_string(),
            });
        }
        Ok(data)
    }
}

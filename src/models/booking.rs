use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::service::Service;

/// A stored reservation on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub business_id: i64,
    pub ref_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub service_id: Option<String>,
    pub staff_id: Option<String>,
    pub title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub idempotency_key: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Scheduled,
        }
    }
}

/// Body of the booking creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, alias = "service_id", skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, alias = "staff_id", skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingResponse {
    #[serde(default)]
    pub success: bool,
    pub ref_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Working state of one wizard session, built up step by step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingDraft {
    pub service: Option<Service>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub staff_id: Option<String>,
    pub contact: ContactDetails,
}

impl BookingDraft {
    pub fn is_empty(&self) -> bool {
        *self == BookingDraft::default()
    }

    /// The creation request for this draft, or the names of the fields still missing.
    pub fn to_request(&self, subdomain: &str) -> Result<CreateBookingRequest, Vec<&'static str>> {
        let mut missing = vec![];
        if self.date.is_none() {
            missing.push("date");
        }
        if self.time.is_none() {
            missing.push("time");
        }
        if self.contact.name.trim().is_empty() {
            missing.push("name");
        }
        if self.contact.email.trim().is_empty() {
            missing.push("email");
        }
        let (Some(date), Some(time)) = (self.date, self.time.as_ref()) else {
            return Err(missing);
        };
        if !missing.is_empty() {
            return Err(missing);
        }

        Ok(CreateBookingRequest {
            subdomain: subdomain.to_string(),
            name: self.contact.name.trim().to_string(),
            email: self.contact.email.trim().to_string(),
            phone: non_empty(self.contact.phone.as_deref()),
            date: date.format("%Y-%m-%d").to_string(),
            time: time.clone(),
            notes: non_empty(self.contact.notes.as_deref()),
            service_id: self.service.as_ref().map(|s| s.id.clone()),
            staff_id: self.staff_id.clone(),
        })
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// A confirmed reservation as shown on the confirmation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingResult {
    pub reference_code: String,
    pub service: Option<Service>,
    pub date: NaiveDate,
    pub time: String,
    pub staff_id: Option<String>,
    pub name: String,
    pub email: String,
}

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::BookingMode;
use crate::models::{AssignmentMode, AvailabilityResponse, BusinessHours, Slot, StaffOption};
use crate::services::booking_api::BookingApi;
use crate::services::slots::{
    generate_slots, DEFAULT_CLOSE, DEFAULT_OPEN, DEFAULT_SLOT_MINUTES,
};

const DEFAULT_CONFIGURED_SLOT_MINUTES: u32 = 60;

pub const UNREACHABLE_MESSAGE: &str = "We couldn't load available times. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilitySource {
    Backend,
    /// Demo data in preview mode.
    Preview,
    /// Synthetic grid after a failed fetch.
    Fallback,
}

impl AvailabilitySource {
    pub fn is_authoritative(&self) -> bool {
        matches!(self, AvailabilitySource::Backend)
    }
}

/// What the time step shows for a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Closed,
    Open(OpenDay),
    /// Backend unreachable in live mode without offline degradation.
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDay {
    pub hours: BusinessHours,
    pub slot_duration_minutes: u32,
    pub taken: Vec<String>,
    pub assignment_mode: AssignmentMode,
    pub staff: Vec<StaffOption>,
    pub source: AvailabilitySource,
}

impl OpenDay {
    pub fn slots(&self) -> Vec<Slot> {
        let taken: HashSet<String> = self.taken.iter().cloned().collect();
        generate_slots(&self.hours.start, &self.hours.end, self.slot_duration_minutes, &taken)
    }

    /// Customers pick a provider only in direct mode with someone to pick.
    pub fn offers_staff_choice(&self) -> bool {
        self.assignment_mode == AssignmentMode::Direct && !self.staff.is_empty()
    }

    fn fallback() -> Self {
        Self {
            hours: default_hours(),
            slot_duration_minutes: DEFAULT_SLOT_MINUTES,
            taken: vec![],
            assignment_mode: AssignmentMode::Manual,
            staff: vec![],
            source: AvailabilitySource::Fallback,
        }
    }
}

fn default_hours() -> BusinessHours {
    BusinessHours {
        start: DEFAULT_OPEN.to_string(),
        end: DEFAULT_CLOSE.to_string(),
    }
}

/// Turns an availability response into what the time step displays.
pub fn interpret(resp: AvailabilityResponse, source: AvailabilitySource) -> Resolution {
    if resp.closed {
        return Resolution::Closed;
    }

    let taken = resp.taken_slots.unwrap_or_default();
    let (hours, slot_duration_minutes) = match resp.business_hours {
        Some(hours) => (
            hours,
            resp.slot_duration
                .filter(|d| *d > 0)
                .unwrap_or(DEFAULT_CONFIGURED_SLOT_MINUTES),
        ),
        None => (default_hours(), DEFAULT_SLOT_MINUTES),
    };

    Resolution::Open(OpenDay {
        hours,
        slot_duration_minutes,
        taken,
        assignment_mode: resp.assignment_mode.unwrap_or_default(),
        staff: resp.staff.unwrap_or_default(),
        source,
    })
}

/// Fetches day availability. Called fresh every time the time step is entered.
pub struct AvailabilityResolver {
    api: Arc<dyn BookingApi>,
    mode: BookingMode,
}

impl AvailabilityResolver {
    pub fn new(api: Arc<dyn BookingApi>, mode: BookingMode) -> Self {
        Self { api, mode }
    }

    pub async fn resolve(&self, date: NaiveDate, service_id: Option<&str>) -> Resolution {
        let source = match self.mode {
            BookingMode::Preview => AvailabilitySource::Preview,
            BookingMode::Live { .. } => AvailabilitySource::Backend,
        };

        match self.api.availability(date, service_id).await {
            Ok(resp) => {
                let resolution = interpret(resp, source);
                let closed = resolution == Resolution::Closed;
                tracing::debug!(%date, closed, "availability resolved");
                resolution
            }
            Err(e) => match self.mode {
                BookingMode::Live {
                    degrade_offline: false,
                } => {
                    tracing::warn!(%date, error = %e, "availability fetch failed");
                    Resolution::Unreachable(UNREACHABLE_MESSAGE.to_string())
                }
                _ => {
                    tracing::warn!(%date, error = %e, "availability fetch failed, using fallback slots");
                    Resolution::Open(OpenDay::fallback())
                }
            },
        }
    }
}

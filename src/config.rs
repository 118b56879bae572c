use std::collections::BTreeSet;
use std::env;

use chrono::NaiveDate;

/// Settings of the reference backend server.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub demo_subdomain: Option<String>,
    /// Bookings accepted per client per minute; `0` turns the limit off.
    pub booking_rate_limit: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "bookwise.db".to_string()),
            demo_subdomain: env::var("DEMO_SUBDOMAIN").ok().filter(|s| !s.trim().is_empty()),
            booking_rate_limit: env::var("BOOKING_RATE_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }
}

/// Where the wizard's data comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingMode {
    /// Demo catalog and synthetic slots, no backend involved.
    Preview,
    /// A real backend. With `degrade_offline`, an unreachable availability
    /// endpoint falls back to the default slot grid instead of blocking the
    /// time step.
    Live { degrade_offline: bool },
}

/// Explicit configuration handed to the wizard at construction.
#[derive(Clone, Debug)]
pub struct WizardConfig {
    pub subdomain: Option<String>,
    pub base_url: String,
    pub mode: BookingMode,
    /// Earliest selectable date; tomorrow when unset.
    pub min_bookable_date: Option<NaiveDate>,
    /// Days the business is open. Every future day counts as open when unset.
    pub available_days: Option<BTreeSet<NaiveDate>>,
}

impl WizardConfig {
    pub fn preview() -> Self {
        Self {
            subdomain: None,
            base_url: String::new(),
            mode: BookingMode::Preview,
            min_bookable_date: None,
            available_days: None,
        }
    }

    pub fn live(base_url: impl Into<String>, subdomain: impl Into<String>) -> Self {
        Self {
            subdomain: Some(subdomain.into()),
            base_url: base_url.into(),
            mode: BookingMode::Live {
                degrade_offline: true,
            },
            min_bookable_date: None,
            available_days: None,
        }
    }

    /// Live mode needs a business to talk about; without one the wizard runs as a preview.
    pub fn effective_mode(&self) -> BookingMode {
        match (self.mode, self.subdomain.as_deref().map(str::trim)) {
            (BookingMode::Live { .. }, None | Some("")) => BookingMode::Preview,
            (mode, _) => mode,
        }
    }
}

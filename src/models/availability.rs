use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::slot::minutes_from_hhmm;

/// Opening hours for one weekday. A disabled day means the business is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayHours {
    pub day: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub start: String,
    pub end: String,
}

fn default_enabled() -> bool {
    true
}

/// Weekly opening hours of a business. Weekdays without an entry are unconfigured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessSchedule {
    pub days: Vec<DayHours>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayStatus {
    Closed,
    Open(BusinessHours),
    Unconfigured,
}

impl BusinessSchedule {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let schedule: BusinessSchedule = serde_json::from_str(s)?;
        for day in &schedule.days {
            parse_weekday(&day.day)?;
            let start = parse_time(&day.start)?;
            let end = parse_time(&day.end)?;
            if day.enabled && end <= start {
                anyhow::bail!("closing time must be after opening time for {}", day.day);
            }
        }
        Ok(schedule)
    }

    pub fn day_status(&self, date: NaiveDate) -> DayStatus {
        let weekday = date.format("%a").to_string().to_lowercase();
        match self.days.iter().find(|d| d.day.to_lowercase() == weekday) {
            Some(d) if !d.enabled => DayStatus::Closed,
            Some(d) => DayStatus::Open(BusinessHours {
                start: d.start.clone(),
                end: d.end.clone(),
            }),
            None => DayStatus::Unconfigured,
        }
    }

    /// True when `[start, start + duration)` lies inside the opening hours of its day.
    /// Unconfigured days place no restriction.
    pub fn fits(&self, start: &NaiveDateTime, duration_minutes: u32) -> bool {
        match self.day_status(start.date()) {
            DayStatus::Closed => false,
            DayStatus::Unconfigured => true,
            DayStatus::Open(hours) => {
                let end = *start + Duration::minutes(duration_minutes as i64);
                if end.date() != start.date() {
                    return false;
                }
                let (Some(open), Some(close)) =
                    (minutes_from_hhmm(&hours.start), minutes_from_hhmm(&hours.end))
                else {
                    return false;
                };
                let s = minutes_from_hhmm(&start.format("%H:%M").to_string()).unwrap_or(0);
                let e = minutes_from_hhmm(&end.format("%H:%M").to_string()).unwrap_or(0);
                s >= open && e <= close
            }
        }
    }

    pub fn to_human_readable(&self) -> String {
        let day_order = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

        let mut open_days: Vec<&DayHours> = self.days.iter().filter(|d| d.enabled).collect();
        open_days.sort_by_key(|d| {
            day_order
                .iter()
                .position(|o| *o == d.day.to_lowercase())
                .unwrap_or(7)
        });

        open_days
            .iter()
            .map(|d| format!("{}: {}-{}", capitalize(&d.day), d.start, d.end))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessHours {
    pub start: String,
    pub end: String,
}

/// How staff get attached to a booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMode {
    /// Customer picks a provider.
    #[serde(alias = "direct_booking")]
    Direct,
    RoundRobin,
    #[default]
    #[serde(other)]
    Manual,
}

impl AssignmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentMode::Direct => "direct",
            AssignmentMode::RoundRobin => "round_robin",
            AssignmentMode::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "direct" | "direct_booking" => AssignmentMode::Direct,
            "round_robin" => AssignmentMode::RoundRobin,
            _ => AssignmentMode::Manual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffOption {
    pub id: String,
    pub name: String,
}

/// Body of the availability query endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub business_hours: Option<BusinessHours>,
    #[serde(default)]
    pub slot_duration: Option<u32>,
    #[serde(default)]
    pub taken_slots: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_mode: Option<AssignmentMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff: Option<Vec<StaffOption>>,
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    match s.to_lowercase().as_str() {
        "mon" | "tue" | "wed" | "thu" | "fri" | "sat" | "sun" => Ok(()),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

fn parse_time(s: &str) -> anyhow::Result<u32> {
    minutes_from_hhmm(s).ok_or_else(|| anyhow::anyhow!("invalid time: {s}"))
}

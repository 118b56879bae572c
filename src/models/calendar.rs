use chrono::NaiveDate;
use serde::Serialize;

/// Render state of one calendar grid cell. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_today: bool,
    pub is_past: bool,
    pub is_other_month: bool,
    pub is_unavailable: bool,
    pub is_selected: bool,
    pub is_clickable: bool,
}

use serde::{Deserialize, Serialize};

use super::availability::{AssignmentMode, BusinessSchedule};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: i64,
    pub subdomain: String,
    pub name: String,
}

/// Booking rules of one business.
#[derive(Debug, Clone)]
pub struct CalendarSettings {
    pub schedule: BusinessSchedule,
    pub slot_duration_minutes: u32,
    pub buffer_minutes: u32,
    pub assignment_mode: AssignmentMode,
    /// Position in the staff list of the last round-robin assignment, -1 before the first.
    pub last_assigned_index: i64,
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            schedule: BusinessSchedule::default(),
            slot_duration_minutes: 60,
            buffer_minutes: 0,
            assignment_mode: AssignmentMode::Manual,
            last_assigned_index: -1,
        }
    }
}

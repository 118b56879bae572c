use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::models::slot::{hhmm_from_minutes, minutes_from_hhmm};
use crate::models::{AssignmentMode, BusinessHours, CalendarSettings, DayStatus, StaffOption};
use crate::services::slots::{DEFAULT_CLOSE, DEFAULT_OPEN, DEFAULT_SLOT_MINUTES};

#[derive(Debug)]
pub enum SchedulingError {
    Closed,
    OutsideBusinessHours { hours: String },
    Conflict,
    NoStaffAvailable,
    UnknownStaff,
    Storage(anyhow::Error),
}

impl std::fmt::Display for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingError::Closed => {
                write!(f, "We're closed on that day. Please choose another date.")
            }
            SchedulingError::OutsideBusinessHours { hours } => {
                write!(
                    f,
                    "That time is outside our business hours. We're available: {hours}"
                )
            }
            SchedulingError::Conflict => {
                write!(
                    f,
                    "This time slot is no longer available. Please choose another time."
                )
            }
            SchedulingError::NoStaffAvailable => {
                write!(
                    f,
                    "No staff available at this time. Please choose another time."
                )
            }
            SchedulingError::UnknownStaff => {
                write!(f, "Please choose one of the listed staff members.")
            }
            SchedulingError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for SchedulingError {}

impl From<anyhow::Error> for SchedulingError {
    fn from(e: anyhow::Error) -> Self {
        SchedulingError::Storage(e)
    }
}

/// Staff attached to a new appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub staff_id: Option<String>,
    /// New round-robin position to persist.
    pub rotation_index: Option<i64>,
}

/// Grid times of `date` (as `HH:MM`) whose `[slot, slot + duration)` overlaps
/// an appointment's `[start, end + buffer)`.
///
/// Without configured hours the default grid is used, so the result lines up
/// with the slots a client shows for such a day.
pub fn taken_slots(
    conn: &Connection,
    business_id: i64,
    date: NaiveDate,
    hours: Option<&BusinessHours>,
    duration_minutes: u32,
    buffer_minutes: u32,
) -> anyhow::Result<Vec<String>> {
    let (open, close, step) = match hours {
        Some(h) => (h.start.as_str(), h.end.as_str(), duration_minutes),
        None => (DEFAULT_OPEN, DEFAULT_CLOSE, DEFAULT_SLOT_MINUTES),
    };
    let (Some(open), Some(close)) = (minutes_from_hhmm(open), minutes_from_hhmm(close)) else {
        return Ok(vec![]);
    };
    if step == 0 {
        return Ok(vec![]);
    }

    let day_start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let buffer = Duration::minutes(buffer_minutes as i64);
    let appointments = queries::get_appointments_in_range(
        conn,
        business_id,
        &(day_start - buffer),
        &(day_start + Duration::days(1)),
    )?;

    let mut taken = vec![];
    let mut mins = open;
    while let Some(next) = mins.checked_add(step) {
        if next > close {
            break;
        }
        let slot_start = day_start + Duration::minutes(mins as i64);
        let slot_end = slot_start + Duration::minutes(duration_minutes as i64);
        if appointments
            .iter()
            .any(|a| a.start_time < slot_end && a.end_time + buffer > slot_start)
        {
            taken.push(hhmm_from_minutes(mins));
        }
        mins = next;
    }
    Ok(taken)
}

/// Validates a requested appointment against opening hours and existing
/// appointments, and picks the staff member it goes to.
///
/// Round-robin checks conflicts per staff member starting after the last one
/// assigned. Every other mode treats the business as a single resource.
pub fn check_and_assign(
    conn: &Connection,
    business_id: i64,
    start: &NaiveDateTime,
    duration_minutes: u32,
    settings: &CalendarSettings,
    staff: &[StaffOption],
    requested_staff: Option<&str>,
) -> Result<Assignment, SchedulingError> {
    match settings.schedule.day_status(start.date()) {
        DayStatus::Closed => return Err(SchedulingError::Closed),
        _ if !settings.schedule.fits(start, duration_minutes) => {
            return Err(SchedulingError::OutsideBusinessHours {
                hours: settings.schedule.to_human_readable(),
            });
        }
        _ => {}
    }

    let end = *start + Duration::minutes(duration_minutes as i64);
    let buffer = settings.buffer_minutes;

    match settings.assignment_mode {
        AssignmentMode::RoundRobin if !staff.is_empty() => {
            let n = staff.len() as i64;
            let next = (settings.last_assigned_index + 1).rem_euclid(n);
            for i in 0..n {
                let idx = (next + i) % n;
                let candidate = &staff[idx as usize];
                if !has_conflict(conn, business_id, start, &end, buffer, Some(&candidate.id))? {
                    return Ok(Assignment {
                        staff_id: Some(candidate.id.clone()),
                        rotation_index: Some(idx),
                    });
                }
            }
            Err(SchedulingError::NoStaffAvailable)
        }
        AssignmentMode::Direct => {
            if let Some(id) = requested_staff {
                if !staff.iter().any(|s| s.id == id) {
                    return Err(SchedulingError::UnknownStaff);
                }
            }
            if has_conflict(conn, business_id, start, &end, buffer, None)? {
                return Err(SchedulingError::Conflict);
            }
            Ok(Assignment {
                staff_id: requested_staff.map(str::to_string),
                rotation_index: None,
            })
        }
        _ => {
            if has_conflict(conn, business_id, start, &end, buffer, None)? {
                return Err(SchedulingError::Conflict);
            }
            Ok(Assignment {
                staff_id: None,
                rotation_index: None,
            })
        }
    }
}

fn has_conflict(
    conn: &Connection,
    business_id: i64,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
    buffer_minutes: u32,
    staff_id: Option<&str>,
) -> anyhow::Result<bool> {
    let buffer = Duration::minutes(buffer_minutes as i64);
    let appointments = queries::get_appointments_in_range(conn, business_id, &(*start - buffer), end)?;

    // Overlap: existing starts before proposed ends AND existing (plus buffer) ends after proposed starts
    Ok(appointments.iter().any(|a| {
        staff_id.map_or(true, |id| a.staff_id.as_deref() == Some(id))
            && a.start_time < *end
            && a.end_time + buffer > *start
    }))
}

use std::collections::HashSet;

use crate::models::slot::{hhmm_from_minutes, minutes_from_hhmm};
use crate::models::Slot;

/// Grid used when a business has no configured hours, or availability
/// could not be fetched.
pub const DEFAULT_OPEN: &str = "09:00";
pub const DEFAULT_CLOSE: &str = "17:00";
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// One slot per `duration_minutes` step from `open` while the slot still
/// ends by `close`. A slot is unavailable exactly when its time is in `taken`.
///
/// Unparseable bounds or a zero duration produce no slots.
pub fn generate_slots(
    open: &str,
    close: &str,
    duration_minutes: u32,
    taken: &HashSet<String>,
) -> Vec<Slot> {
    let (Some(start), Some(end)) = (minutes_from_hhmm(open), minutes_from_hhmm(close)) else {
        return vec![];
    };
    if duration_minutes == 0 {
        return vec![];
    }

    let taken: HashSet<u32> = taken.iter().filter_map(|t| minutes_from_hhmm(t)).collect();

    let mut slots = vec![];
    let mut mins = start;
    while let Some(slot_end) = mins.checked_add(duration_minutes) {
        if slot_end > end {
            break;
        }
        slots.push(Slot {
            time: hhmm_from_minutes(mins),
            available: !taken.contains(&mins),
        });
        mins = slot_end;
    }
    slots
}

/// The default grid with the given times taken.
pub fn default_grid(taken: &HashSet<String>) -> Vec<Slot> {
    generate_slots(DEFAULT_OPEN, DEFAULT_CLOSE, DEFAULT_SLOT_MINUTES, taken)
}

/// Synthetic, all-available slots for offline or preview use. Never authoritative.
pub fn fallback_slots() -> Vec<Slot> {
    default_grid(&HashSet::new())
}

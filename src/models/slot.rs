use serde::{Deserialize, Serialize};

/// One candidate start time on a given day. `time` is `HH:MM`, 24h.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub time: String,
    pub available: bool,
}

impl Slot {
    /// `"13:30"` -> `"1:30 PM"`
    pub fn label_12h(&self) -> String {
        match minutes_from_hhmm(&self.time) {
            Some(mins) => label_12h(mins),
            None => self.time.clone(),
        }
    }
}

/// Minutes since midnight for an `HH:MM` string.
pub fn minutes_from_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

pub fn hhmm_from_minutes(mins: u32) -> String {
    format!("{:02}:{:02}", mins / 60, mins % 60)
}

fn label_12h(mins: u32) -> String {
    let hour = mins / 60;
    let minute = mins % 60;
    let h = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        _ => hour,
    };
    let ampm = if hour >= 12 { "PM" } else { "AM" };
    format!("{h}:{minute:02} {ampm}")
}

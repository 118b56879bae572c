//! Calendar grid and per-day bookability.
//!
//! Everything here is a pure function of its inputs so the grid can be
//! re-derived on every render.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::CalendarDay;

const GRID_CELLS: i64 = 42;

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Earliest bookable date when none is configured: tomorrow.
pub fn default_min_bookable(today: NaiveDate) -> NaiveDate {
    today.succ_opt().unwrap_or(today)
}

/// A displayed calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthView {
    year: i32,
    month: u32,
}

impl MonthView {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// e.g. `"March 2025"`
    pub fn title(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }

    /// Six Sunday-first weeks covering the month, padded with the
    /// neighbouring months' days.
    pub fn grid(&self) -> Vec<GridCell> {
        let first = self.first_day();
        let leading = first.weekday().num_days_from_sunday() as i64;
        let start = first - Duration::days(leading);

        (0..GRID_CELLS)
            .map(|i| {
                let date = start + Duration::days(i);
                GridCell {
                    date,
                    is_current_month: self.contains(date),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub date: NaiveDate,
    pub is_current_month: bool,
}

/// Render state for one cell.
///
/// A day is past when it falls strictly before `min_bookable`. It is
/// unavailable only when `available_days` is given and lacks it; without a set
/// every non-past day of the displayed month is bookable.
pub fn compute_day_state(
    cell: GridCell,
    today: NaiveDate,
    min_bookable: NaiveDate,
    selected: Option<NaiveDate>,
    available_days: Option<&BTreeSet<NaiveDate>>,
) -> CalendarDay {
    let is_past = cell.date < min_bookable;
    let is_other_month = !cell.is_current_month;

    let is_unavailable = match available_days {
        Some(days) if !is_past && !is_other_month => !days.contains(&cell.date),
        _ => false,
    };

    CalendarDay {
        date: cell.date,
        is_today: cell.date == today,
        is_past,
        is_other_month,
        is_unavailable,
        is_selected: selected == Some(cell.date),
        is_clickable: cell.is_current_month && !is_past && !is_unavailable,
    }
}

/// The month calendar shown on the date step.
#[derive(Debug, Clone)]
pub struct CalendarModel {
    today: NaiveDate,
    min_bookable: NaiveDate,
    available_days: Option<BTreeSet<NaiveDate>>,
    displayed: MonthView,
}

impl CalendarModel {
    pub fn new(
        today: NaiveDate,
        min_bookable: Option<NaiveDate>,
        available_days: Option<BTreeSet<NaiveDate>>,
    ) -> Self {
        Self {
            today,
            min_bookable: min_bookable.unwrap_or_else(|| default_min_bookable(today)),
            available_days,
            displayed: MonthView::containing(today),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn min_bookable(&self) -> NaiveDate {
        self.min_bookable
    }

    pub fn displayed(&self) -> MonthView {
        self.displayed
    }

    pub fn can_go_previous(&self) -> bool {
        self.displayed > MonthView::containing(self.today)
    }

    /// Returns false when already showing the month containing today.
    pub fn go_previous(&mut self) -> bool {
        if !self.can_go_previous() {
            return false;
        }
        self.displayed = self.displayed.previous();
        true
    }

    pub fn go_next(&mut self) {
        self.displayed = self.displayed.next();
    }

    /// Shows the month containing `date`, never earlier than today's month.
    pub fn show(&mut self, date: NaiveDate) {
        self.displayed = MonthView::containing(date).max(MonthView::containing(self.today));
    }

    pub fn reset(&mut self) {
        self.displayed = MonthView::containing(self.today);
    }

    pub fn days(&self, selected: Option<NaiveDate>) -> Vec<CalendarDay> {
        self.displayed
            .grid()
            .into_iter()
            .map(|cell| self.state_of(cell, selected))
            .collect()
    }

    pub fn day_state(&self, date: NaiveDate, selected: Option<NaiveDate>) -> CalendarDay {
        let cell = GridCell {
            date,
            is_current_month: self.displayed.contains(date),
        };
        self.state_of(cell, selected)
    }

    pub fn is_clickable(&self, date: NaiveDate) -> bool {
        self.day_state(date, None).is_clickable
    }

    fn state_of(&self, cell: GridCell, selected: Option<NaiveDate>) -> CalendarDay {
        compute_day_state(
            cell,
            self.today,
            self.min_bookable,
            selected,
            self.available_days.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn current(s: &str) -> GridCell {
        GridCell {
            date: date(s),
            is_current_month: true,
        }
    }

    #[test]
    fn test_default_min_bookable_is_tomorrow() {
        assert_eq!(default_min_bookable(date("2025-03-31")), date("2025-04-01"));
    }

    #[test]
    fn test_grid_shape() {
        // March 2025 starts on a Saturday
        let grid = MonthView::containing(date("2025-03-15")).grid();
        assert_eq!(grid.len(), 42);
        assert_eq!(grid[0].date, date("2025-02-23"));
        assert!(!grid[0].is_current_month);
        assert_eq!(grid[6].date, date("2025-03-01"));
        assert!(grid[6].is_current_month);
        assert_eq!(grid[41].date, date("2025-04-05"));
        assert_eq!(grid.iter().filter(|c| c.is_current_month).count(), 31);
    }

    #[test]
    fn test_grid_month_starting_sunday() {
        // June 2025 starts on a Sunday
        let grid = MonthView::containing(date("2025-06-10")).grid();
        assert_eq!(grid[0].date, date("2025-06-01"));
    }

    #[test]
    fn test_month_navigation_wraps_years() {
        let dec = MonthView::containing(date("2025-12-05"));
        assert_eq!(dec.next().first_day(), date("2026-01-01"));
        assert_eq!(dec.next().previous(), dec);
        assert_eq!(dec.title(), "December 2025");
    }

    #[test]
    fn test_days_before_min_never_clickable() {
        let today = date("2025-03-10");
        let min = default_min_bookable(today);
        let all: BTreeSet<NaiveDate> = (1..=31)
            .map(|d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap())
            .collect();

        for d in 1..=10 {
            let cell = current(&format!("2025-03-{d:02}"));
            for set in [None, Some(&all)] {
                let state = compute_day_state(cell, today, min, None, set);
                assert!(state.is_past);
                assert!(!state.is_clickable);
            }
        }
    }

    #[test]
    fn test_min_bookable_day_itself_is_not_past() {
        let today = date("2025-03-10");
        let state = compute_day_state(current("2025-03-11"), today, date("2025-03-11"), None, None);
        assert!(!state.is_past);
        assert!(state.is_clickable);
    }

    #[test]
    fn test_future_days_clickable_without_available_set() {
        let today = date("2025-03-10");
        let min = default_min_bookable(today);
        for d in 11..=31 {
            let state = compute_day_state(current(&format!("2025-03-{d:02}")), today, min, None, None);
            assert!(state.is_clickable, "day {d} should be clickable");
            assert!(!state.is_unavailable);
        }
    }

    #[test]
    fn test_absent_from_available_set_is_unavailable() {
        let today = date("2025-03-10");
        let min = default_min_bookable(today);
        let open: BTreeSet<NaiveDate> = [date("2025-03-12")].into_iter().collect();

        let open_day = compute_day_state(current("2025-03-12"), today, min, None, Some(&open));
        assert!(open_day.is_clickable);

        let closed_day = compute_day_state(current("2025-03-13"), today, min, None, Some(&open));
        assert!(closed_day.is_unavailable);
        assert!(!closed_day.is_clickable);
    }

    #[test]
    fn test_other_month_cells_not_clickable() {
        let today = date("2025-03-10");
        let cell = GridCell {
            date: date("2025-04-02"),
            is_current_month: false,
        };
        let state = compute_day_state(cell, today, default_min_bookable(today), None, None);
        assert!(state.is_other_month);
        assert!(!state.is_clickable);
    }

    #[test]
    fn test_today_and_selected_flags() {
        let today = date("2025-03-10");
        let selected = Some(date("2025-03-20"));
        let min = default_min_bookable(today);
        assert!(compute_day_state(current("2025-03-10"), today, min, selected, None).is_today);
        assert!(compute_day_state(current("2025-03-20"), today, min, selected, None).is_selected);
    }

    #[test]
    fn test_cannot_navigate_before_todays_month() {
        let mut calendar = CalendarModel::new(date("2025-03-10"), None, None);
        assert!(!calendar.can_go_previous());
        assert!(!calendar.go_previous());
        assert_eq!(calendar.displayed(), MonthView::containing(date("2025-03-10")));

        calendar.go_next();
        assert!(calendar.can_go_previous());
        assert!(calendar.go_previous());
        assert!(!calendar.go_previous());
    }

    #[test]
    fn test_tomorrow_on_month_end_needs_navigation() {
        let mut calendar = CalendarModel::new(date("2025-03-31"), None, None);
        assert!(!calendar.is_clickable(date("2025-04-01")));
        calendar.go_next();
        assert!(calendar.is_clickable(date("2025-04-01")));
    }

    #[test]
    fn test_days_reflect_selection() {
        let calendar = CalendarModel::new(date("2025-03-10"), None, None);
        let days = calendar.days(Some(date("2025-03-20")));
        assert_eq!(days.len(), 42);
        assert_eq!(days.iter().filter(|d| d.is_selected).count(), 1);
    }
}

//! Week and clock helpers.
//!
//! Weeks are identified by their Monday. All instants are treated as UTC;
//! these helpers only deal in dates and wall-clock times.

use chrono::{Datelike, Days, NaiveDate, NaiveTime};

/// Number of weekdays shown in a schedule (Monday through Friday).
pub const WEEKDAY_COUNT: usize = 5;

/// Short day names for the displayed weekdays.
pub const WEEKDAY_SHORT_NAMES: [&str; WEEKDAY_COUNT] = ["Mon", "Tue", "Wed", "Thu", "Fri"];

/// Returns the Monday on or before `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

/// Returns the Monday following `week_start`, which is also the exclusive
/// end of the week's time range.
pub fn next_week(week_start: NaiveDate) -> NaiveDate {
    week_start + Days::new(7)
}

/// Returns the Monday before `week_start`.
pub fn previous_week(week_start: NaiveDate) -> NaiveDate {
    week_start - Days::new(7)
}

/// Returns the dates of the displayed weekdays, Monday first.
pub fn weekday_dates(week_start: NaiveDate) -> Vec<NaiveDate> {
    (0..WEEKDAY_COUNT as u64)
        .map(|offset| week_start + Days::new(offset))
        .collect()
}

/// Formats a time for display, without a leading zero on the hour
/// (`9:30`, `14:00`).
pub fn format_display_time(time: NaiveTime) -> String {
    time.format("%-H:%M").to_string()
}

/// Formats a time as zero-padded `HH:mm`, as used in slot keys.
pub fn format_slot_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

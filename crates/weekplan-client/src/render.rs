//! Terminal and JSON output.
//!
//! The week grid shows one character per 30-minute slot, one block of
//! characters per weekday:
//!
//! ```text
//! Alice    | ....#................... ........................ ...
//! All free | oooo-ooooooooooooooooooo oooooooooooooooooooooooo ...
//! ```

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::Serialize;
use weekplan_caldav::Calendar;
use weekplan_core::schedule::css;
use weekplan_core::time::{WEEKDAY_SHORT_NAMES, format_slot_time};
use weekplan_core::{ScheduleRow, SlotInfo, User, WEEKDAY_COUNT, generate_time_slots, slot_key, weekday_dates};

use crate::error::ClientResult;

/// Row name of the synthetic all-free row.
const SUMMARY_NAME: &str = "All free";

const FREE: char = '.';

/// Slots between two hour marks in the header.
const SLOTS_PER_MARK: usize = 4;

const LEGEND: &str = "Legend: . free  # busy  = busy (free/busy only)  ~ tentative  \
                      ! unavailable  ? not loaded  o all free  - not all free";

fn slot_char(slot: &SlotInfo) -> char {
    match slot.css_class.as_str() {
        css::BUSY => '#',
        css::BUSY_FREE_BUSY => '=',
        css::BUSY_TENTATIVE => '~',
        css::BUSY_UNAVAILABLE => '!',
        css::ERROR => '?',
        css::ALL_FREE => 'o',
        css::NOT_ALL_FREE => '-',
        _ => FREE,
    }
}

fn row_name(row: &ScheduleRow) -> &str {
    row.user
        .as_ref()
        .map_or(SUMMARY_NAME, |user| user.display_name.as_str())
}

fn grid_line(name: &str, width: usize, blocks: &[String]) -> String {
    format!("{:<width$} | {}", name, blocks.join(" "), width = width)
        .trim_end()
        .to_string()
}

fn hour_marks(time_slots: &[NaiveTime]) -> String {
    time_slots
        .chunks(SLOTS_PER_MARK)
        .filter_map(|chunk| {
            let first = chunk.first()?;
            Some(format!("{:<width$}", first.hour(), width = chunk.len()))
        })
        .collect()
}

/// Renders the grid, a legend, and per-user event details.
pub fn render_grid(rows: &[ScheduleRow], week_start: NaiveDate) -> String {
    let time_slots = generate_time_slots();
    let width = rows
        .iter()
        .map(|row| row_name(row).chars().count())
        .max()
        .unwrap_or(0);

    let mut lines = vec![format!("Week of {}", week_start)];

    let day_labels: Vec<String> = weekday_dates(week_start)
        .iter()
        .zip(WEEKDAY_SHORT_NAMES)
        .map(|(date, name)| {
            let label = format!("{} {}", name, date.format("%-d %b"));
            format!("{:<block$}", label, block = time_slots.len())
        })
        .collect();
    lines.push(grid_line("", width, &day_labels));
    lines.push(grid_line("", width, &vec![hour_marks(&time_slots); WEEKDAY_COUNT]));

    for row in rows {
        let blocks: Vec<String> = (0..WEEKDAY_COUNT)
            .map(|day| {
                time_slots
                    .iter()
                    .map(|&time| row.slots.get(&slot_key(day, time)).map_or(FREE, slot_char))
                    .collect()
            })
            .collect();
        lines.push(grid_line(row_name(row), width, &blocks));
    }

    lines.push(String::new());
    lines.push(LEGEND.to_string());

    let details = render_details(rows, &time_slots);
    if !details.is_empty() {
        lines.push(String::new());
        lines.extend(details);
    }

    lines.join("\n")
}

/// Lists each user's events per day, taken from the slot tooltips.
fn render_details(rows: &[ScheduleRow], time_slots: &[NaiveTime]) -> Vec<String> {
    let mut lines = Vec::new();
    for row in rows {
        let Some(user) = &row.user else { continue };

        let mut user_lines = Vec::new();
        for (day, day_name) in WEEKDAY_SHORT_NAMES.iter().enumerate() {
            let mut entries: Vec<&str> = Vec::new();
            for &time in time_slots {
                let Some(slot) = row.slots.get(&slot_key(day, time)) else {
                    continue;
                };
                if slot.css_class == css::ERROR {
                    continue;
                }
                for entry in slot.tooltip.iter().flat_map(|tooltip| tooltip.lines()) {
                    if !entries.contains(&entry) {
                        entries.push(entry);
                    }
                }
            }
            user_lines.extend(entries.into_iter().map(|entry| format!("  {}  {}", day_name, entry)));
        }

        if !user_lines.is_empty() {
            lines.push(user.display_name.clone());
            lines.extend(user_lines);
        }
    }
    lines
}

#[derive(Serialize)]
struct WeekView<'a> {
    week_start: NaiveDate,
    days: Vec<NaiveDate>,
    slot_times: Vec<String>,
    rows: &'a [ScheduleRow],
}

/// Renders the rows as pretty-printed JSON, with the week's days and slot
/// start times alongside.
pub fn render_json(rows: &[ScheduleRow], week_start: NaiveDate) -> ClientResult<String> {
    let view = WeekView {
        week_start,
        days: weekday_dates(week_start),
        slot_times: generate_time_slots().into_iter().map(format_slot_time).collect(),
        rows,
    };
    Ok(serde_json::to_string_pretty(&view)?)
}

/// One line per user: display name, then href.
pub fn render_users(users: &[User]) -> String {
    let width = users
        .iter()
        .map(|user| user.display_name.chars().count())
        .max()
        .unwrap_or(0);
    users
        .iter()
        .map(|user| format!("{:<width$}  {}", user.display_name, user.href, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per calendar, with owner and access markers when known.
pub fn render_calendars(calendars: &[Calendar]) -> String {
    calendars
        .iter()
        .map(|calendar| {
            let mut line = format!("{}  {}", calendar.display_name, calendar.href);
            if let Some(ref owner) = calendar.owner {
                line.push_str(&format!("  [{}]", owner));
            }
            if !calendar.accessible {
                line.push_str("  (no access)");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

//! Weekly availability grid.
//!
//! Maps per-user event lists onto a fixed grid of 30-minute slots between
//! 07:00 and 19:00, Monday through Friday. Each user gets one
//! [`ScheduleRow`]; a final synthetic row (with no user) marks the slots in
//! which every selected user is free.
//!
//! Slots are keyed `<dayIndex>-<HH:mm>`, e.g. `0-07:00` for Monday 7am and
//! `4-18:30` for the last slot on Friday.
//!
//! Everything here is pure and synchronous.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Days, NaiveDate, NaiveTime, TimeDelta};
use serde::Serialize;

use crate::event::{CalendarEvent, FBTYPE_BUSY, FBTYPE_BUSY_TENTATIVE, FBTYPE_BUSY_UNAVAILABLE, User};
use crate::time::{WEEKDAY_COUNT, format_display_time, format_slot_time};

/// First slot start, in minutes after midnight (07:00).
pub const SCHEDULE_START_MINUTES: u32 = 7 * 60;
/// Exclusive end of the grid, in minutes after midnight (19:00).
pub const SCHEDULE_END_MINUTES: u32 = 19 * 60;
/// Length of one slot.
pub const SLOT_MINUTES: u32 = 30;

/// Number of characters kept before an over-long label is cut.
const LABEL_KEEP_CHARS: usize = 7;
/// Labels longer than this are truncated.
const LABEL_MAX_CHARS: usize = 8;

/// CSS classes assigned to slots.
pub mod css {
    /// A readable event occupies the slot.
    pub const BUSY: &str = "slot-busy";
    /// Free-busy only: busy.
    pub const BUSY_FREE_BUSY: &str = "slot-busy-fb";
    /// Free-busy only: tentative.
    pub const BUSY_TENTATIVE: &str = "slot-busy-tentative";
    /// Free-busy only: unavailable.
    pub const BUSY_UNAVAILABLE: &str = "slot-busy-unavailable";
    /// Events for the user could not be loaded.
    pub const ERROR: &str = "schedule-error-cell";
    /// Summary row: nobody is busy.
    pub const ALL_FREE: &str = "slot-all-free";
    /// Summary row: at least one user is busy.
    pub const NOT_ALL_FREE: &str = "slot-not-all-free";
}

/// Display state of one slot for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotInfo {
    /// CSS class for the cell; empty for a free slot.
    pub css_class: String,
    /// Short text shown in the cell.
    pub label: Option<String>,
    /// Hover text, one line per overlapping event.
    pub tooltip: Option<String>,
    /// Whether the slot counts as busy for the all-free row.
    pub busy: bool,
}

impl SlotInfo {
    /// A slot with nothing in it.
    pub fn free() -> Self {
        Self {
            css_class: String::new(),
            label: None,
            tooltip: None,
            busy: false,
        }
    }

    /// A slot for a user whose events failed to load.
    pub fn error() -> Self {
        Self {
            css_class: css::ERROR.to_string(),
            label: Some("?".to_string()),
            tooltip: Some("Failed to load".to_string()),
            busy: true,
        }
    }

    fn all_free() -> Self {
        Self {
            css_class: css::ALL_FREE.to_string(),
            label: None,
            tooltip: Some("All users are free".to_string()),
            busy: false,
        }
    }

    fn not_all_free() -> Self {
        Self {
            css_class: css::NOT_ALL_FREE.to_string(),
            label: None,
            tooltip: None,
            busy: true,
        }
    }
}

/// One row of the grid. `user` is `None` only for the all-free row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub user: Option<User>,
    pub slots: BTreeMap<String, SlotInfo>,
}

impl ScheduleRow {
    /// Returns true for the synthetic all-free row.
    pub fn is_summary(&self) -> bool {
        self.user.is_none()
    }
}

/// Returns the start times of all slots in a day: 07:00, 07:30, ..., 18:30.
pub fn generate_time_slots() -> Vec<NaiveTime> {
    (SCHEDULE_START_MINUTES..SCHEDULE_END_MINUTES)
        .step_by(SLOT_MINUTES as usize)
        .filter_map(|minutes| NaiveTime::from_num_seconds_from_midnight_opt(minutes * 60, 0))
        .collect()
}

/// Builds the key for a slot: `<dayIndex>-<HH:mm>`.
pub fn slot_key(day_index: usize, slot_start: NaiveTime) -> String {
    format!("{}-{}", day_index, format_slot_time(slot_start))
}

/// Returns every slot key of the week, day by day: `0-07:00` ... `4-18:30`.
pub fn generate_slot_keys() -> Vec<String> {
    let slots = generate_time_slots();
    (0..WEEKDAY_COUNT)
        .flat_map(|day| slots.iter().map(move |&time| slot_key(day, time)))
        .collect()
}

/// Computes the slot states for one user.
///
/// When `has_fetch_failed` is set every slot is an error slot, whatever the
/// events say.
pub fn compute_user_slots(
    events: &[CalendarEvent],
    week_start: NaiveDate,
    has_fetch_failed: bool,
) -> BTreeMap<String, SlotInfo> {
    let time_slots = generate_time_slots();
    let slot_length = TimeDelta::minutes(i64::from(SLOT_MINUTES));
    let mut slots = BTreeMap::new();

    for day_index in 0..WEEKDAY_COUNT {
        let day = week_start + Days::new(day_index as u64);
        let day_events: Vec<&CalendarEvent> =
            events.iter().filter(|event| event.date() == day).collect();

        for &slot_start in &time_slots {
            let key = slot_key(day_index, slot_start);

            if has_fetch_failed {
                slots.insert(key, SlotInfo::error());
                continue;
            }

            let slot_end = slot_start + slot_length;
            let overlapping: Vec<&CalendarEvent> = day_events
                .iter()
                .copied()
                .filter(|event| overlaps(event, slot_start, slot_end))
                .collect();

            let info = match select_primary_event(&overlapping) {
                None => SlotInfo::free(),
                Some(primary) => SlotInfo {
                    css_class: css_class_for(primary).to_string(),
                    label: slot_label(primary),
                    tooltip: build_tooltip(&overlapping),
                    busy: true,
                },
            };
            slots.insert(key, info);
        }
    }

    slots
}

/// Computes the all-free row from the user rows.
///
/// A slot is all free when no row is busy there; a row missing the key
/// counts as free.
pub fn compute_all_free_slots(user_rows: &[ScheduleRow]) -> BTreeMap<String, SlotInfo> {
    generate_slot_keys()
        .into_iter()
        .map(|key| {
            let anyone_busy = user_rows
                .iter()
                .any(|row| row.slots.get(&key).is_some_and(|slot| slot.busy));
            let info = if anyone_busy {
                SlotInfo::not_all_free()
            } else {
                SlotInfo::all_free()
            };
            (key, info)
        })
        .collect()
}

/// Builds the full grid: one row per user in the given order, then the
/// all-free row.
///
/// `events_by_href` and `failed_hrefs` are keyed by user href. Users with no
/// entry in either are shown as free.
pub fn build_schedule_rows(
    users: &[User],
    events_by_href: &HashMap<String, Vec<CalendarEvent>>,
    failed_hrefs: &HashSet<String>,
    week_start: NaiveDate,
) -> Vec<ScheduleRow> {
    let mut rows: Vec<ScheduleRow> = users
        .iter()
        .map(|user| {
            let events = events_by_href
                .get(&user.href)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let failed = failed_hrefs.contains(&user.href);
            ScheduleRow {
                user: Some(user.clone()),
                slots: compute_user_slots(events, week_start, failed),
            }
        })
        .collect();

    let summary = compute_all_free_slots(&rows);
    rows.push(ScheduleRow {
        user: None,
        slots: summary,
    });
    rows
}

/// Half-open overlap test against `[slot_start, slot_end)`. All-day events
/// overlap every slot.
fn overlaps(event: &CalendarEvent, slot_start: NaiveTime, slot_end: NaiveTime) -> bool {
    match (event.start_time(), event.end_time()) {
        (Some(start), Some(end)) => start < slot_end && end > slot_start,
        _ => true,
    }
}

/// Ranks an event status. Anything that is not a known free-busy type
/// (CLASS values such as PUBLIC, or unknown FBTYPEs) ranks as BUSY.
fn priority(status: &str) -> u8 {
    match status {
        FBTYPE_BUSY_UNAVAILABLE => 3,
        FBTYPE_BUSY => 2,
        FBTYPE_BUSY_TENTATIVE => 1,
        _ => 2,
    }
}

/// Picks the event that decides how a slot looks: highest priority first,
/// then accessible over not, then first seen.
fn select_primary_event<'a>(events: &[&'a CalendarEvent]) -> Option<&'a CalendarEvent> {
    let (&first, rest) = events.split_first()?;
    let mut best = first;
    for &event in rest {
        let (candidate, current) = (priority(event.status()), priority(best.status()));
        if candidate > current || (candidate == current && event.accessible() && !best.accessible()) {
            best = event;
        }
    }
    Some(best)
}

fn css_class_for(event: &CalendarEvent) -> &'static str {
    if event.accessible() {
        return css::BUSY;
    }
    match event.status() {
        FBTYPE_BUSY_TENTATIVE => css::BUSY_TENTATIVE,
        FBTYPE_BUSY_UNAVAILABLE => css::BUSY_UNAVAILABLE,
        _ => css::BUSY_FREE_BUSY,
    }
}

fn slot_label(event: &CalendarEvent) -> Option<String> {
    if !event.accessible() {
        return None;
    }
    let summary = event.summary()?;
    if summary.chars().count() > LABEL_MAX_CHARS {
        let kept: String = summary.chars().take(LABEL_KEEP_CHARS).collect();
        Some(format!("{kept}\u{2026}"))
    } else {
        Some(summary.to_string())
    }
}

fn build_tooltip(events: &[&CalendarEvent]) -> Option<String> {
    if events.is_empty() {
        return None;
    }
    let lines: Vec<String> = events
        .iter()
        .map(|event| {
            let title = match event.summary() {
                Some(summary) if event.accessible() => summary,
                _ => event.status(),
            };
            match (event.start_time(), event.end_time()) {
                (Some(start), Some(end)) => format!(
                    "{} ({} - {})",
                    title,
                    format_display_time(start),
                    format_display_time(end)
                ),
                _ => title.to_string(),
            }
        })
        .collect();
    Some(lines.join("\n"))
}

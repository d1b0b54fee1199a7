//! Users and calendar events.
//!
//! - [`User`]: a calendar owner (CalDAV principal), identified by its href
//! - [`CalendarEvent`]: one appointment or busy period on a single date
//!
//! Events are rebuilt from scratch on every fetch; nothing here is mutated
//! after construction.

use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Free-busy type for a busy period.
pub const FBTYPE_BUSY: &str = "BUSY";
/// Free-busy type for a tentatively busy period.
pub const FBTYPE_BUSY_TENTATIVE: &str = "BUSY-TENTATIVE";
/// Free-busy type for an unavailable period.
pub const FBTYPE_BUSY_UNAVAILABLE: &str = "BUSY-UNAVAILABLE";

/// CLASS value assumed when a VEVENT carries none.
pub const DEFAULT_CLASS: &str = "PUBLIC";

/// Summary used for readable events that have no SUMMARY property.
pub const NO_TITLE: &str = "(No title)";

/// A user (principal) discovered on a CalDAV server.
///
/// Two users are the same user when their hrefs match; the display name is
/// presentation only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Human-readable name, falling back to the href.
    pub display_name: String,
    /// Path or URL of the principal collection.
    pub href: String,
}

impl User {
    /// Creates a user from a display name and principal href.
    pub fn new(display_name: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            href: href.into(),
        }
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.href == other.href
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.href.hash(state);
    }
}

/// An appointment or busy period on a single date.
///
/// Invariants upheld by [`CalendarEvent::new`]:
/// - a summary is only ever present on accessible events
/// - start and end time are either both present or both absent (all-day)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    summary: Option<String>,
    date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    status: String,
    accessible: bool,
}

impl CalendarEvent {
    /// Creates an event.
    ///
    /// `times` is `None` for all-day events. When `accessible` is false the
    /// summary is dropped whatever the caller passed.
    pub fn new(
        summary: Option<String>,
        date: NaiveDate,
        times: Option<(NaiveTime, NaiveTime)>,
        status: impl Into<String>,
        accessible: bool,
    ) -> Self {
        Self {
            summary: if accessible { summary } else { None },
            date,
            start_time: times.map(|(start, _)| start),
            end_time: times.map(|(_, end)| end),
            status: status.into(),
            accessible,
        }
    }

    /// Creates a free-busy period: no summary, not accessible.
    pub fn busy_period(
        date: NaiveDate,
        times: Option<(NaiveTime, NaiveTime)>,
        fb_type: impl Into<String>,
    ) -> Self {
        Self::new(None, date, times, fb_type, false)
    }

    /// The event title, only ever present for accessible events.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// The date the event takes place on.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Start time, `None` for all-day events.
    pub fn start_time(&self) -> Option<NaiveTime> {
        self.start_time
    }

    /// End time, `None` for all-day events.
    pub fn end_time(&self) -> Option<NaiveTime> {
        self.end_time
    }

    /// CLASS for calendar-query events, FBTYPE for free-busy periods.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether the event details are visible to the current user.
    pub fn accessible(&self) -> bool {
        self.accessible
    }

    /// Returns true for events without a time component.
    pub fn is_all_day(&self) -> bool {
        self.start_time.is_none()
    }
}

/// Sorts events by date, then start time. All-day events come first on
/// their date.
pub fn sort_chronologically(events: &mut [CalendarEvent]) {
    // `None < Some(_)` puts all-day events before timed ones.
    events.sort_by_key(|event| (event.date, event.start_time));
}

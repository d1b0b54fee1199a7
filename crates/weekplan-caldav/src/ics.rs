//! Minimal iCalendar (RFC 5545) scanner.
//!
//! Servers expand recurring events before answering a time-ranged query, so
//! each VEVENT is a single instance and a first-match property scan is
//! enough. Free-busy answers carry one VFREEBUSY with any number of FREEBUSY
//! lines. Malformed pieces are logged and skipped; nothing here fails the
//! whole document.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{CalDavError, CalDavResult};
use weekplan_core::event::{DEFAULT_CLASS, FBTYPE_BUSY, NO_TITLE};
use weekplan_core::CalendarEvent;

/// A line break followed by a space or tab continues the previous line.
static FOLD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n[ \t]").expect("Invalid fold regex"));

static VEVENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)BEGIN:VEVENT\r?\n(.*?)END:VEVENT").expect("Invalid VEVENT regex"));

static VFREEBUSY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)BEGIN:VFREEBUSY\r?\n(.*?)END:VFREEBUSY").expect("Invalid VFREEBUSY regex")
});

/// `PT` followed by optional hours, minutes and seconds, in that order.
static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("Invalid duration regex")
});

static FBTYPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|;)FBTYPE=([^;]+)").expect("Invalid FBTYPE regex"));

/// End of a timed event that runs past midnight.
fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

/// A content line split into its parameters and value.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Property<'a> {
    /// Everything between the name and the value separator, without the
    /// leading `;`. Empty when there are no parameters.
    params: &'a str,
    value: &'a str,
}

/// A DATE or DATE-TIME value. `time` is `None` for a plain date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IcsDateTime {
    date: NaiveDate,
    time: Option<NaiveTime>,
}

impl IcsDateTime {
    fn to_naive(self) -> Option<NaiveDateTime> {
        self.time.map(|time| self.date.and_time(time))
    }
}

/// Joins folded lines back together.
pub fn unfold(ics: &str) -> String {
    FOLD_REGEX.replace_all(ics, "").into_owned()
}

/// Parses every VEVENT in `ics`.
///
/// `accessible` is false when the caller only has free-busy rights; the
/// resulting events then carry no summary.
pub fn parse_events(ics: &str, accessible: bool) -> Vec<CalendarEvent> {
    let unfolded = unfold(ics);
    let mut events = Vec::new();

    for block in VEVENT_REGEX.captures_iter(&unfolded) {
        let body = block.get(1).map_or("", |m| m.as_str());
        match parse_vevent(body, accessible) {
            Ok(event) => events.push(event),
            Err(e) => warn!(error = %e, "Skipping VEVENT"),
        }
    }

    debug!(count = events.len(), accessible, "Parsed VEVENT blocks");
    events
}

/// Parses the FREEBUSY periods of the first VFREEBUSY in `ics`.
///
/// Each period becomes one inaccessible event whose status is the period's
/// FBTYPE (`BUSY` when absent). Periods that cannot be read are skipped.
pub fn parse_free_busy(ics: &str) -> Vec<CalendarEvent> {
    let unfolded = unfold(ics);
    let Some(block) = VFREEBUSY_REGEX.captures(&unfolded).and_then(|c| c.get(1)) else {
        debug!("No VFREEBUSY block in free-busy response");
        return Vec::new();
    };

    let mut events = Vec::new();
    for property in properties(block.as_str(), "FREEBUSY") {
        let fb_type = FBTYPE_REGEX
            .captures(property.params)
            .and_then(|c| c.get(1))
            .map_or_else(|| FBTYPE_BUSY.to_string(), |m| m.as_str().trim().to_ascii_uppercase());

        for period in property.value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match parse_period(period, &fb_type) {
                Ok(event) => events.push(event),
                Err(e) => warn!(period, error = %e, "Skipping FREEBUSY period"),
            }
        }
    }

    debug!(count = events.len(), "Parsed free-busy periods");
    events
}

fn parse_vevent(body: &str, accessible: bool) -> CalDavResult<CalendarEvent> {
    let dtstart = property(body, "DTSTART")
        .ok_or_else(|| CalDavError::parse("VEVENT has no DTSTART"))?;
    let start = parse_date_time(dtstart.value)
        .ok_or_else(|| CalDavError::parse(format!("Unreadable DTSTART '{}'", dtstart.value)))?;

    let times = start.time.and_then(|start_time| {
        let end = match property(body, "DTEND") {
            Some(dtend) => parse_date_time(dtend.value).and_then(IcsDateTime::to_naive),
            None => property(body, "DURATION")
                .and_then(|duration| parse_duration(duration.value))
                .and_then(|duration| start.date.and_time(start_time).checked_add_signed(duration)),
        };
        end_time_on(start.date, start_time, end).map(|end_time| (start_time, end_time))
    });

    let summary = property(body, "SUMMARY")
        .map(|p| unescape_text(p.value))
        .filter(|s| !s.trim().is_empty())
        .or_else(|| Some(NO_TITLE.to_string()));
    let class = property(body, "CLASS")
        .map(|p| p.value.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CLASS);

    Ok(CalendarEvent::new(summary, start.date, times, class, accessible))
}

fn parse_period(period: &str, fb_type: &str) -> CalDavResult<CalendarEvent> {
    let (start_text, end_text) = period
        .split_once('/')
        .ok_or_else(|| CalDavError::parse("period has no '/'"))?;
    let start = parse_date_time(start_text)
        .ok_or_else(|| CalDavError::parse(format!("unreadable period start '{}'", start_text)))?;

    let times = start.time.and_then(|start_time| {
        let end = if end_text.starts_with('P') {
            parse_duration(end_text)
                .and_then(|duration| start.date.and_time(start_time).checked_add_signed(duration))
        } else {
            parse_date_time(end_text).and_then(IcsDateTime::to_naive)
        };
        end_time_on(start.date, start_time, end).map(|end_time| (start_time, end_time))
    });

    Ok(CalendarEvent::busy_period(start.date, times, fb_type))
}

/// Clock time at which an event starting on `date` at `start` ends.
///
/// Events running into the next day end at 23:59:59. An unknown end, or one
/// before the start, gives `None`: the event then counts as all-day, so it
/// blocks the whole date rather than vanishing from the grid.
fn end_time_on(date: NaiveDate, start: NaiveTime, end: Option<NaiveDateTime>) -> Option<NaiveTime> {
    match end? {
        end if end.date() > date => Some(end_of_day()),
        end if end.date() == date && end.time() >= start => Some(end.time()),
        _ => None,
    }
}

/// Reads `yyyyMMdd` or `yyyyMMddTHHmmss`, with or without a trailing `Z`.
/// An unreadable time part keeps the date and drops the time.
fn parse_date_time(value: &str) -> Option<IcsDateTime> {
    let value = value.trim();
    let value = value.strip_suffix('Z').unwrap_or(value);
    let date = NaiveDate::parse_from_str(value.get(..8)?, "%Y%m%d").ok()?;
    let time = if value.contains('T') && value.len() >= 15 {
        value
            .get(9..15)
            .and_then(|clock| NaiveTime::parse_from_str(clock, "%H%M%S").ok())
    } else {
        None
    };
    Some(IcsDateTime { date, time })
}

/// Reads a `PT#H#M#S` duration. Anything else (day or week durations,
/// negative or empty ones) gives `None`.
fn parse_duration(value: &str) -> Option<TimeDelta> {
    let captures = DURATION_REGEX.captures(value.trim())?;
    let component = |index: usize| -> Option<i64> {
        captures.get(index).map(|m| m.as_str().parse::<i64>().ok()).unwrap_or(Some(0))
    };
    if (1..=3).all(|index| captures.get(index).is_none()) {
        return None;
    }
    let hours = component(1)?;
    let minutes = component(2)?;
    let seconds = component(3)?;
    let total = hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)?;
    TimeDelta::try_seconds(total)
}

/// First property called `name` in the block.
fn property<'a>(block: &'a str, name: &str) -> Option<Property<'a>> {
    block.lines().find_map(|line| split_property(line, name))
}

/// Every property called `name` in the block, in order.
fn properties<'a>(block: &'a str, name: &'a str) -> impl Iterator<Item = Property<'a>> {
    block.lines().filter_map(move |line| split_property(line, name))
}

/// Splits `NAME;PARAMS:VALUE` or `NAME:VALUE`. Colons inside quoted
/// parameter values do not end the parameters.
fn split_property<'a>(line: &'a str, name: &str) -> Option<Property<'a>> {
    let line = line.trim_end_matches('\r');
    let head = line.get(..name.len())?;
    if !head.eq_ignore_ascii_case(name) {
        return None;
    }
    let rest = &line[name.len()..];

    if let Some(value) = rest.strip_prefix(':') {
        return Some(Property { params: "", value });
    }
    let params_and_value = rest.strip_prefix(';')?;

    let mut in_quotes = false;
    for (index, ch) in params_and_value.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                return Some(Property {
                    params: &params_and_value[..index],
                    value: &params_and_value[index + 1..],
                });
            }
            _ => {}
        }
    }
    None
}

/// Undoes TEXT escaping (`\,` `\;` `\n` `\\`).
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn vcalendar(body: &str) -> String {
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n{}END:VCALENDAR\r\n", body)
    }

    #[test]
    fn unfold_joins_continuation_lines() {
        assert_eq!(unfold("SUMMARY:Long\r\n  title\r\n\t continued"), "SUMMARY:Long title continued");
        assert_eq!(unfold("A:1\nB:2"), "A:1\nB:2");
    }

    #[test]
    fn timed_event_with_dtend() {
        let ics = vcalendar(
            "BEGIN:VEVENT\r\nUID:1\r\nSUMMARY:Design review\r\nDTSTART:20250210T100000Z\r\nDTEND:20250210T113000Z\r\nCLASS:PRIVATE\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&ics, true);

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.summary(), Some("Design review"));
        assert_eq!(event.date(), date(2025, 2, 10));
        assert_eq!(event.start_time(), Some(time(10, 0)));
        assert_eq!(event.end_time(), Some(time(11, 30)));
        assert_eq!(event.status(), "PRIVATE");
        assert!(event.accessible());
    }

    #[test]
    fn duration_used_when_no_dtend() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:Standup\nDTSTART:20250211T091500\nDURATION:PT15M\nEND:VEVENT\n",
        );
        let events = parse_events(&ics, true);
        assert_eq!(events[0].start_time(), Some(time(9, 15)));
        assert_eq!(events[0].end_time(), Some(time(9, 30)));
        assert_eq!(events[0].status(), "PUBLIC");
    }

    #[test]
    fn dtend_wins_over_duration() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:x\nDTSTART:20250211T090000Z\nDURATION:PT3H\nDTEND:20250211T100000Z\nEND:VEVENT\n",
        );
        assert_eq!(parse_events(&ics, true)[0].end_time(), Some(time(10, 0)));
    }

    #[test]
    fn missing_or_bad_end_makes_event_all_day() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:a\nDTSTART:20250211T090000Z\nEND:VEVENT\n\
             BEGIN:VEVENT\nSUMMARY:b\nDTSTART:20250211T100000Z\nDURATION:P1D\nEND:VEVENT\n\
             BEGIN:VEVENT\nSUMMARY:c\nDTSTART:20250211T100000Z\nDTEND:20250211T080000Z\nEND:VEVENT\n",
        );
        let events = parse_events(&ics, true);
        assert_eq!(events.len(), 3);
        for event in &events {
            assert_eq!(event.date(), date(2025, 2, 11));
            assert!(event.is_all_day());
            assert!(event.end_time().is_none());
        }
    }

    #[test]
    fn event_without_end_blocks_its_day() {
        let ics = vcalendar("BEGIN:VEVENT\nSUMMARY:Offsite\nDTSTART:20250210T090000Z\nEND:VEVENT\n");
        let events = parse_events(&ics, true);
        let slots = weekplan_core::compute_user_slots(&events, date(2025, 2, 10), false);

        let busy_monday = slots
            .iter()
            .filter(|(key, slot)| key.starts_with("0-") && slot.busy)
            .count();
        assert_eq!(busy_monday, 24);
        assert!(slots.iter().filter(|(key, _)| key.starts_with("1-")).all(|(_, slot)| !slot.busy));
    }

    #[test]
    fn huge_duration_leaves_end_unknown() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:Forever\nDTSTART:20250210T090000Z\nDURATION:PT99999999999H\nEND:VEVENT\n",
        );
        let events = parse_events(&ics, true);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_all_day());

        let ics = vcalendar(
            "BEGIN:VFREEBUSY\nFREEBUSY:20250210T090000Z/PT99999999999H,20250210T140000Z/PT1H\nEND:VFREEBUSY\n",
        );
        let events = parse_free_busy(&ics);
        assert_eq!(events.len(), 2);
        assert!(events[0].is_all_day());
        assert_eq!(events[1].end_time(), Some(time(15, 0)));
    }

    #[test]
    fn unreadable_time_keeps_the_date() {
        let ics = vcalendar("BEGIN:VEVENT\nSUMMARY:Odd\nDTSTART:20250210T99XXXX\nEND:VEVENT\n");
        let events = parse_events(&ics, true);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date(), date(2025, 2, 10));
        assert!(events[0].is_all_day());
    }

    #[test]
    fn fbtype_is_case_insensitive() {
        let ics = vcalendar(
            "BEGIN:VFREEBUSY\nFREEBUSY;fbtype=busy-unavailable:20250210T090000Z/PT1H\nEND:VFREEBUSY\n",
        );
        let events = parse_free_busy(&ics);
        assert_eq!(events[0].status(), "BUSY-UNAVAILABLE");
    }

    #[test]
    fn event_past_midnight_ends_at_end_of_day() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:Deploy\nDTSTART:20250212T220000Z\nDURATION:PT4H\nEND:VEVENT\n",
        );
        let events = parse_events(&ics, true);
        assert_eq!(events[0].date(), date(2025, 2, 12));
        assert_eq!(events[0].end_time(), Some(end_of_day()));
    }

    #[test]
    fn all_day_event_with_value_parameter() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:Holiday\nDTSTART;VALUE=DATE:20250214\nDTEND;VALUE=DATE:20250215\nEND:VEVENT\n",
        );
        let events = parse_events(&ics, true);
        assert_eq!(events[0].date(), date(2025, 2, 14));
        assert!(events[0].is_all_day());
        assert!(events[0].end_time().is_none());
    }

    #[test]
    fn tzid_parameter_is_skipped() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:Call\nDTSTART;TZID=\"Europe/Paris: CET\":20250213T140000\nDTEND;TZID=Europe/Paris:20250213T150000\nEND:VEVENT\n",
        );
        let events = parse_events(&ics, true);
        assert_eq!(events[0].start_time(), Some(time(14, 0)));
        assert_eq!(events[0].end_time(), Some(time(15, 0)));
    }

    #[test]
    fn folded_summary_and_text_escapes() {
        let ics = vcalendar(
            "BEGIN:VEVENT\r\nSUMMARY:Budget\\, Q1\r\n  planning\r\nDTSTART:20250210T080000Z\r\nDTEND:20250210T090000Z\r\nEND:VEVENT\r\n",
        );
        let events = parse_events(&ics, true);
        assert_eq!(events[0].summary(), Some("Budget, Q1 planning"));
    }

    #[test]
    fn missing_summary_gets_placeholder_only_when_accessible() {
        let ics = vcalendar("BEGIN:VEVENT\nDTSTART:20250210T080000Z\nDTEND:20250210T090000Z\nEND:VEVENT\n");
        assert_eq!(parse_events(&ics, true)[0].summary(), Some(NO_TITLE));
        assert_eq!(parse_events(&ics, false)[0].summary(), None);
    }

    #[test]
    fn inaccessible_events_lose_their_summary() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:Secret\nDTSTART:20250210T080000Z\nDTEND:20250210T090000Z\nEND:VEVENT\n",
        );
        let events = parse_events(&ics, false);
        assert!(events[0].summary().is_none());
        assert!(!events[0].accessible());
    }

    #[test]
    fn vevent_without_dtstart_is_skipped() {
        let ics = vcalendar(
            "BEGIN:VEVENT\nSUMMARY:broken\nEND:VEVENT\nBEGIN:VEVENT\nSUMMARY:ok\nDTSTART:20250210\nEND:VEVENT\n",
        );
        let events = parse_events(&ics, true);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary(), Some("ok"));
    }

    #[test]
    fn property_scan_does_not_match_longer_names() {
        let block = "DTSTART-X:nope\nDTSTART:20250210\n";
        assert_eq!(property(block, "DTSTART").map(|p| p.value), Some("20250210"));
    }

    #[test]
    fn free_busy_period_with_duration() {
        let ics = vcalendar(
            "BEGIN:VFREEBUSY\r\nDTSTART:20250210T000000Z\r\nFREEBUSY;FBTYPE=BUSY:20250210T140000Z/PT1H30M\r\nEND:VFREEBUSY\r\n",
        );
        let events = parse_free_busy(&ics);

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.date(), date(2025, 2, 10));
        assert_eq!(event.start_time(), Some(time(14, 0)));
        assert_eq!(event.end_time(), Some(time(15, 30)));
        assert_eq!(event.status(), "BUSY");
        assert!(event.summary().is_none());
        assert!(!event.accessible());
    }

    #[test]
    fn free_busy_lists_types_and_explicit_ends() {
        let ics = vcalendar(
            "BEGIN:VFREEBUSY\n\
             FREEBUSY:20250211T080000Z/20250211T090000Z,20250211T100000Z/PT30M\n\
             FREEBUSY;FBTYPE=BUSY-TENTATIVE:20250212T120000Z/20250212T130000Z\n\
             FREEBUSY;FBTYPE=BUSY-UNAVAILABLE:20250213T070000Z/PT12H\n\
             FREEBUSY;FBTYPE=X-OUT-OF-OFFICE:20250214T070000Z/PT1H\n\
             END:VFREEBUSY\n",
        );
        let events = parse_free_busy(&ics);
        let statuses: Vec<&str> = events.iter().map(|e| e.status()).collect();
        assert_eq!(
            statuses,
            vec!["BUSY", "BUSY", "BUSY-TENTATIVE", "BUSY-UNAVAILABLE", "X-OUT-OF-OFFICE"]
        );
        assert_eq!(events[0].end_time(), Some(time(9, 0)));
        assert_eq!(events[1].end_time(), Some(time(10, 30)));
        assert_eq!(events[3].end_time(), Some(time(19, 0)));
    }

    #[test]
    fn malformed_periods_are_skipped_individually() {
        let ics = vcalendar(
            "BEGIN:VFREEBUSY\n\
             FREEBUSY:20250211T080000Z,garbage/PT1H,20250211T100000Z/PT30M\n\
             END:VFREEBUSY\n",
        );
        let events = parse_free_busy(&ics);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_time(), Some(time(10, 0)));
    }

    #[test]
    fn no_vfreebusy_means_no_events() {
        assert!(parse_free_busy(&vcalendar("")).is_empty());
        assert!(parse_free_busy("").is_empty());
    }

    #[test]
    fn duration_grammar() {
        assert_eq!(parse_duration("PT1H30M"), Some(TimeDelta::minutes(90)));
        assert_eq!(parse_duration("PT45M"), Some(TimeDelta::minutes(45)));
        assert_eq!(parse_duration("PT2H"), Some(TimeDelta::hours(2)));
        assert_eq!(parse_duration("PT1H0M30S"), Some(TimeDelta::seconds(3630)));
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("P1D"), None);
        assert_eq!(parse_duration("PT30M1H"), None);
    }

    #[test]
    fn date_time_values() {
        assert_eq!(
            parse_date_time("20250210T143000Z"),
            Some(IcsDateTime { date: date(2025, 2, 10), time: Some(time(14, 30)) })
        );
        assert_eq!(
            parse_date_time("20250210"),
            Some(IcsDateTime { date: date(2025, 2, 10), time: None })
        );
        assert_eq!(parse_date_time("2025"), None);
        assert_eq!(parse_date_time("20251310T000000Z"), None);
        assert_eq!(
            parse_date_time("20250210T99XXXX"),
            Some(IcsDateTime { date: date(2025, 2, 10), time: None })
        );
    }
}

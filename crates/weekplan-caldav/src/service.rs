//! High-level CalDAV workflows: user and calendar discovery, and fetching a
//! week of events for one or many users.
//!
//! Every operation validates the [`ConnectionInfo`] before touching the
//! network.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{debug, info, warn};
use weekplan_core::time::next_week;
use weekplan_core::{CalendarEvent, ScheduleRow, User, build_schedule_rows, sort_chronologically};

use crate::client::CalDavClient;
use crate::config::{CalDavConfig, ConnectionInfo};
use crate::error::{CalDavError, CalDavResult};
use crate::href::{normalize_url, resolve_href, with_trailing_slash};
use crate::ics;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::xml::{self, Calendar};

/// Name of the default calendar collection below a principal.
const DEFAULT_CALENDAR_SEGMENT: &str = "calendar/";

/// Result of the first PROPFIND against the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// The base URL lists calendars directly.
    DirectCalendars(Vec<Calendar>),
    /// The base URL is a root listing other collections (typically principal
    /// homes), each of which must be asked for its calendars.
    NeedsPrincipalFallback(Vec<String>),
}

/// One user's result within a [`WeekFetch`].
#[derive(Debug)]
pub struct UserOutcome {
    pub user: User,
    pub result: CalDavResult<Vec<CalendarEvent>>,
}

/// Events of several users for one week, tagged with the week they were
/// fetched for.
#[derive(Debug)]
pub struct WeekFetch {
    pub week_start: NaiveDate,
    /// One entry per requested user, in request order.
    pub outcomes: Vec<UserOutcome>,
}

impl WeekFetch {
    /// Returns true when this fetch belongs to `displayed_week`. Results for
    /// any other week are stale and should be dropped.
    pub fn is_for(&self, displayed_week: NaiveDate) -> bool {
        self.week_start == displayed_week
    }

    /// Events of every user whose fetch succeeded, keyed by href.
    pub fn events_by_user(&self) -> HashMap<String, Vec<CalendarEvent>> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match &outcome.result {
                Ok(events) => Some((outcome.user.href.clone(), events.clone())),
                Err(_) => None,
            })
            .collect()
    }

    /// Hrefs of users whose fetch failed.
    pub fn failed_users(&self) -> HashSet<String> {
        self.errors().map(|(user, _)| user.href.clone()).collect()
    }

    /// Failed users with their errors.
    pub fn errors(&self) -> impl Iterator<Item = (&User, &CalDavError)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|e| (&outcome.user, e)))
    }

    /// Builds the schedule grid for this week, one row per fetched user plus
    /// the all-free row.
    pub fn schedule_rows(&self) -> Vec<ScheduleRow> {
        let users: Vec<User> = self.outcomes.iter().map(|outcome| outcome.user.clone()).collect();
        build_schedule_rows(&users, &self.events_by_user(), &self.failed_users(), self.week_start)
    }
}

/// Entry point for all CalDAV workflows.
#[derive(Clone)]
pub struct CalDavService {
    client: CalDavClient,
}

impl CalDavService {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            client: CalDavClient::new(transport),
        }
    }

    /// Creates a service talking HTTP through reqwest.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the HTTP client cannot be built.
    pub fn with_config(config: &CalDavConfig) -> CalDavResult<Self> {
        Ok(Self::new(Arc::new(ReqwestTransport::new(config)?)))
    }

    /// Lists every principal on the server.
    pub async fn discover_users(&self, conn: &ConnectionInfo) -> CalDavResult<Vec<User>> {
        conn.validate()?;
        let body = self.client.principal_search(conn, None).await?;
        let users = xml::parse_principal_search_response(&body)?;
        info!(count = users.len(), "Discovered users");
        Ok(users)
    }

    /// Lists principals whose display name contains `term`.
    ///
    /// # Errors
    ///
    /// A blank term is a validation error, raised before any request.
    pub async fn search_users(&self, conn: &ConnectionInfo, term: &str) -> CalDavResult<Vec<User>> {
        conn.validate()?;
        let term = term.trim();
        if term.is_empty() {
            return Err(CalDavError::validation("Search term must not be empty."));
        }
        let body = self.client.principal_search(conn, Some(term)).await?;
        let users = xml::parse_principal_search_response(&body)?;
        info!(count = users.len(), term, "Found users");
        Ok(users)
    }

    /// Fetches the events of `user_href`'s default calendar for the week
    /// starting on `week_start`, sorted chronologically.
    ///
    /// Full event details are requested first. When the server answers 403,
    /// and only then, free-busy data is requested instead; those events carry
    /// no summary.
    pub async fn fetch_week_events(
        &self,
        conn: &ConnectionInfo,
        user_href: &str,
        week_start: NaiveDate,
    ) -> CalDavResult<Vec<CalendarEvent>> {
        conn.validate()?;
        let base = normalize_url(&conn.url);
        let calendar_url = resolve_href(
            &base,
            &format!("{}{}", with_trailing_slash(user_href), DEFAULT_CALENDAR_SEGMENT),
        );
        let week_end = next_week(week_start);

        let mut events: Vec<CalendarEvent> = match self
            .client
            .calendar_query(conn, &calendar_url, week_start, week_end)
            .await
        {
            Ok(body) => xml::parse_calendar_data_response(&body)?
                .iter()
                .flat_map(|data| ics::parse_events(data, true))
                .collect(),
            Err(e) if e.is_access_denied() => {
                debug!(url = %calendar_url, "Calendar query denied, falling back to free-busy");
                let body = self
                    .client
                    .free_busy_query(conn, &calendar_url, week_start, week_end)
                    .await?;
                ics::parse_free_busy(&body)
            }
            Err(e) => return Err(e),
        };

        sort_chronologically(&mut events);
        info!(user = user_href, count = events.len(), %week_start, "Fetched week events");
        Ok(events)
    }

    /// Fetches the week for every user concurrently. One user's failure does
    /// not affect the others.
    pub async fn fetch_users_week(
        &self,
        conn: &ConnectionInfo,
        users: &[User],
        week_start: NaiveDate,
    ) -> WeekFetch {
        let fetches = users.iter().map(|user| async move {
            let result = self.fetch_week_events(conn, &user.href, week_start).await;
            if let Err(ref e) = result {
                warn!(user = %user.href, error = %e, "Failed to fetch events");
            }
            UserOutcome {
                user: user.clone(),
                result,
            }
        });
        WeekFetch {
            week_start,
            outcomes: join_all(fetches).await,
        }
    }

    /// PROPFINDs the base URL. Calendars found there are returned directly;
    /// otherwise the child collections are returned for a second round.
    pub async fn discover(&self, conn: &ConnectionInfo) -> CalDavResult<Discovery> {
        conn.validate()?;
        let base = normalize_url(&conn.url);
        let body = self.client.propfind(conn, &base).await?;
        let result = xml::parse_multistatus_response(&body, &base)?;

        if result.calendars.is_empty() {
            debug!(collections = result.child_collections.len(), "No calendars at base URL");
            Ok(Discovery::NeedsPrincipalFallback(result.child_collections))
        } else {
            Ok(Discovery::DirectCalendars(result.calendars))
        }
    }

    /// Lists the calendars visible from the base URL, looking one level
    /// further down when the base URL holds no calendars itself.
    pub async fn discover_calendars(&self, conn: &ConnectionInfo) -> CalDavResult<Vec<Calendar>> {
        let calendars = match self.discover(conn).await? {
            Discovery::DirectCalendars(calendars) => calendars,
            Discovery::NeedsPrincipalFallback(collections) => {
                let base = normalize_url(&conn.url);
                let lookups = collections.iter().map(|href| {
                    let url = resolve_href(&base, href);
                    async move {
                        let result = self.calendars_at(conn, &url).await;
                        (url, result)
                    }
                });

                let mut calendars = Vec::new();
                for (url, result) in join_all(lookups).await {
                    match result {
                        Ok(found) => calendars.extend(found),
                        Err(e) => warn!(url = %url, error = %e, "Skipping collection"),
                    }
                }
                calendars
            }
        };

        info!(count = calendars.len(), "Discovered calendars");
        Ok(calendars)
    }

    /// Lists the calendars of every principal on the server, tagged with
    /// their owner.
    ///
    /// A principal whose collection answers 403 is represented by a single
    /// inaccessible placeholder for its default calendar. When the server
    /// has no principals, this is [`Self::discover_calendars`].
    pub async fn discover_all_calendars(&self, conn: &ConnectionInfo) -> CalDavResult<Vec<Calendar>> {
        let users = self.discover_users(conn).await?;
        if users.is_empty() {
            return self.discover_calendars(conn).await;
        }

        let base = normalize_url(&conn.url);
        let lookups = users.iter().map(|user| {
            let url = resolve_href(&base, &user.href);
            async move { (user, self.calendars_at(conn, &url).await) }
        });

        let mut calendars = Vec::new();
        for (user, result) in join_all(lookups).await {
            match result {
                Ok(found) => calendars.extend(found.into_iter().map(|calendar| Calendar {
                    owner: Some(user.display_name.clone()),
                    ..calendar
                })),
                Err(e) if e.is_access_denied() => calendars.push(Calendar {
                    display_name: user.display_name.clone(),
                    href: format!("{}{}", with_trailing_slash(&user.href), DEFAULT_CALENDAR_SEGMENT),
                    description: None,
                    color: None,
                    ctag: None,
                    owner: Some(user.display_name.clone()),
                    accessible: false,
                }),
                Err(e) => warn!(user = %user.href, error = %e, "Skipping principal"),
            }
        }

        info!(count = calendars.len(), principals = users.len(), "Discovered calendars of all users");
        Ok(calendars)
    }

    async fn calendars_at(&self, conn: &ConnectionInfo, url: &str) -> CalDavResult<Vec<Calendar>> {
        let body = self.client.propfind(conn, url).await?;
        Ok(xml::parse_multistatus_response(&body, url)?.calendars)
    }
}

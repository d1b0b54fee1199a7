//! CalDAV protocol operations.
//!
//! Each operation sends one request through the injected [`HttpTransport`]
//! and checks the status before handing back the body:
//!
//! | Operation        | Verb     | Depth | Success |
//! |------------------|----------|-------|---------|
//! | principal search | REPORT   | 0     | 207     |
//! | PROPFIND         | PROPFIND | 1     | 207     |
//! | calendar-query   | REPORT   | 1     | 207     |
//! | free-busy-query  | REPORT   | 1     | 200     |
//!
//! A free-busy answer is raw `text/calendar`, not a multistatus, which is why
//! it alone expects 200.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::auth::basic_auth;
use crate::config::ConnectionInfo;
use crate::error::{CalDavError, CalDavResult};
use crate::href::normalize_url;
use crate::transport::{DavMethod, DavRequest, HttpTransport};
use crate::xml;

const STATUS_OK: u16 = 200;
const STATUS_MULTI_STATUS: u16 = 207;

const ACCESS_DENIED_MESSAGE: &str =
    "Access denied. You don't have permission to access this calendar.";
const FREE_BUSY_DENIED_MESSAGE: &str =
    "Access denied. You don't have permission to view free/busy data for this calendar.";

/// Turns an HTTP status into a typed outcome.
///
/// `forbidden_message` is the text used for a 403.
///
/// # Errors
///
/// 401, 403 and 404 map to their own error codes; any other status that is
/// not `expected` is a protocol error carrying the status.
pub fn classify_status(status: u16, expected: u16, forbidden_message: &str) -> CalDavResult<()> {
    match status {
        s if s == expected => Ok(()),
        401 => Err(CalDavError::authentication(
            "Authentication failed. Please check your username and password.",
        )),
        403 => Err(CalDavError::access_denied(forbidden_message)),
        404 => Err(CalDavError::not_found("Calendar not found at this URL.")),
        s => Err(CalDavError::unexpected_status(s)),
    }
}

/// Low-level CalDAV client. Cheap to clone.
#[derive(Clone)]
pub struct CalDavClient {
    transport: Arc<dyn HttpTransport>,
}

impl CalDavClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Searches principals by display name at the connection's base URL.
    /// `None` or a blank term lists every principal.
    ///
    /// Returns the multistatus body.
    pub async fn principal_search(
        &self,
        conn: &ConnectionInfo,
        term: Option<&str>,
    ) -> CalDavResult<String> {
        let url = normalize_url(&conn.url);
        let body = xml::build_principal_search_xml(term);
        self.execute(conn, DavMethod::Report, url, 0, body, STATUS_MULTI_STATUS, ACCESS_DENIED_MESSAGE)
            .await
    }

    /// Lists the collection at `url` and its direct children.
    ///
    /// Returns the multistatus body.
    pub async fn propfind(&self, conn: &ConnectionInfo, url: &str) -> CalDavResult<String> {
        let body = xml::build_propfind_calendars_xml();
        self.execute(
            conn,
            DavMethod::Propfind,
            url.to_string(),
            1,
            body,
            STATUS_MULTI_STATUS,
            ACCESS_DENIED_MESSAGE,
        )
        .await
    }

    /// Fetches the events of the calendar at `url` within `[start, end)`.
    ///
    /// Returns the multistatus body.
    pub async fn calendar_query(
        &self,
        conn: &ConnectionInfo,
        url: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalDavResult<String> {
        let body = xml::build_calendar_query_xml(start, end);
        self.execute(
            conn,
            DavMethod::Report,
            url.to_string(),
            1,
            body,
            STATUS_MULTI_STATUS,
            ACCESS_DENIED_MESSAGE,
        )
        .await
    }

    /// Fetches free-busy information for the calendar at `url` within
    /// `[start, end)`.
    ///
    /// Returns the raw iCalendar body.
    pub async fn free_busy_query(
        &self,
        conn: &ConnectionInfo,
        url: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CalDavResult<String> {
        let body = xml::build_free_busy_query_xml(start, end);
        self.execute(
            conn,
            DavMethod::Report,
            url.to_string(),
            1,
            body,
            STATUS_OK,
            FREE_BUSY_DENIED_MESSAGE,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        conn: &ConnectionInfo,
        method: DavMethod,
        url: String,
        depth: u8,
        body: String,
        expected: u16,
        forbidden_message: &str,
    ) -> CalDavResult<String> {
        let request = DavRequest {
            method,
            url,
            depth,
            body,
            authorization: basic_auth(&conn.username, &conn.password),
        };
        let url = request.url.clone();

        let response = self.transport.send(request).await?;
        debug!(method = method.as_str(), url = %url, status = response.status, "Request completed");

        classify_status(response.status, expected, forbidden_message)?;
        Ok(response.body)
    }
}

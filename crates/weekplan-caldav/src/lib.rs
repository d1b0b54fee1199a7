//! CalDAV access for weekplan.
//!
//! - [`CalDavService`] - discovery of users and calendars, and week fetching
//! - [`CalDavClient`] - one request per call, with status classification
//! - [`HttpTransport`] - the injected network boundary ([`ReqwestTransport`]
//!   in production)
//! - [`xml`] and [`ics`] - request bodies and response parsing
//!
//! # Architecture
//!
//! ```text
//!  xml::build_*  ──►  CalDavClient  ──►  HttpTransport  ──►  server
//!                          │
//!                          ▼ status checked, body returned
//!  xml::parse_*  ◄──  CalDavService  ──►  ics::parse_*  ──►  CalendarEvent
//! ```
//!
//! # Example
//!
//! ```ignore
//! use weekplan_caldav::{CalDavConfig, CalDavService, ConnectionInfo};
//!
//! let service = CalDavService::with_config(&CalDavConfig::default())?;
//! let conn = ConnectionInfo::new("dav.example.com", "alice", "secret");
//! let users = service.discover_users(&conn).await?;
//! let fetch = service.fetch_users_week(&conn, &users, week_start).await;
//! let rows = fetch.schedule_rows();
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod href;
pub mod ics;
pub mod service;
pub mod transport;
pub mod xml;

#[cfg(test)]
mod testing;

pub use client::{CalDavClient, classify_status};
pub use config::{CalDavConfig, ConnectionInfo};
pub use error::{CalDavError, CalDavErrorCode, CalDavResult};
pub use href::{normalize_url, resolve_href};
pub use service::{CalDavService, Discovery, UserOutcome, WeekFetch};
pub use transport::{BoxFuture, DavMethod, DavRequest, DavResponse, HttpTransport, ReqwestTransport};
pub use xml::{Calendar, PropfindResult};

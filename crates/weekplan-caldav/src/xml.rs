//! WebDAV/CalDAV XML: request bodies and multistatus parsing.
//!
//! Request bodies are small fixed templates. Responses are read with a
//! namespace-resolving reader into a lightweight element tree, then searched
//! by (namespace, local name) so that any prefix a server picks works.

use chrono::NaiveDate;
use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{CalDavError, CalDavResult};
use crate::href::is_same_resource;
use weekplan_core::User;

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";
/// Apple iCal namespace (calendar-color)
pub const APPLE_ICAL_NS: &str = "http://apple.com/ns/ical/";
/// CalendarServer namespace (getctag)
pub const CS_NS: &str = "http://calendarserver.org/ns/";

/// A calendar collection found by PROPFIND.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Calendar {
    /// Display name, falling back to the href.
    pub display_name: String,
    pub href: String,
    pub description: Option<String>,
    /// `#RRGGBB` colour, when the server provides one.
    pub color: Option<String>,
    /// Change tag, for detecting modifications.
    pub ctag: Option<String>,
    /// Display name of the principal owning the calendar.
    pub owner: Option<String>,
    /// False for a placeholder standing in for a calendar the current user
    /// may not list.
    pub accessible: bool,
}

/// Outcome of parsing a PROPFIND answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropfindResult {
    pub calendars: Vec<Calendar>,
    /// Hrefs of collections that are not calendars, e.g. principal homes
    /// below a server root.
    pub child_collections: Vec<String>,
}

/// Escapes the five XML special characters. `&` goes first so the entities
/// produced by later replacements are left alone.
pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Body of a principal-property-search REPORT.
///
/// A missing or blank term matches every principal; otherwise the server
/// matches it as a case-insensitive substring of the display name.
pub fn build_principal_search_xml(term: Option<&str>) -> String {
    let term = term.map(str::trim).filter(|t| !t.is_empty());
    let matcher = match term {
        Some(term) => format!("<d:match>{}</d:match>", xml_escape(term)),
        None => "<d:match/>".to_string(),
    };
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<d:principal-property-search xmlns:d="DAV:" test="anyof">
  <d:property-search>
    <d:prop><d:displayname/></d:prop>
    {matcher}
  </d:property-search>
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
  </d:prop>
</d:principal-property-search>"#
    )
}

/// Body of a calendar-query REPORT returning every VEVENT instance within
/// `[start, end)`.
pub fn build_calendar_query_xml(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data/>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT">
        <c:time-range start="{}" end="{}"/>
      </c:comp-filter>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#,
        format_range_bound(start),
        format_range_bound(end)
    )
}

/// Body of a free-busy-query REPORT over `[start, end)`.
pub fn build_free_busy_query_xml(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:free-busy-query xmlns:c="urn:ietf:params:xml:ns:caldav">
  <c:time-range start="{}" end="{}"/>
</c:free-busy-query>"#,
        format_range_bound(start),
        format_range_bound(end)
    )
}

/// Body of a Depth 1 PROPFIND listing calendars and their properties.
pub fn build_propfind_calendars_xml() -> String {
    r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" xmlns:ic="http://apple.com/ns/ical/" xmlns:cs="http://calendarserver.org/ns/">
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
    <c:calendar-description/>
    <ic:calendar-color/>
    <cs:getctag/>
  </d:prop>
</d:propfind>"#
        .to_string()
}

/// Midnight UTC of `date` in iCalendar basic format.
fn format_range_bound(date: NaiveDate) -> String {
    date.format("%Y%m%dT000000Z").to_string()
}

/// Extracts the principals from a principal-property-search answer.
///
/// # Errors
///
/// Returns a protocol error if the body is not well-formed XML.
pub fn parse_principal_search_response(xml: &str) -> CalDavResult<Vec<User>> {
    let root = parse_document(xml)?;
    let mut users = Vec::new();

    for response in successful_responses(&root) {
        let Some(href) = response_href(response) else {
            continue;
        };
        if !has_resource_type(response, DAV_NS, "principal") {
            trace!(href = %href, "Skipping non-principal response");
            continue;
        }
        let display_name = property_text(response, DAV_NS, "displayname").unwrap_or_else(|| href.clone());
        users.push(User::new(display_name, href));
    }

    debug!(count = users.len(), "Parsed principal search response");
    Ok(users)
}

/// Extracts calendars and other child collections from a PROPFIND answer.
///
/// The entry for `request_url` itself is left out.
///
/// # Errors
///
/// Returns a protocol error if the body is not well-formed XML.
pub fn parse_multistatus_response(xml: &str, request_url: &str) -> CalDavResult<PropfindResult> {
    let root = parse_document(xml)?;
    let mut result = PropfindResult::default();

    for response in successful_responses(&root) {
        let Some(href) = response_href(response) else {
            continue;
        };
        if is_same_resource(request_url, &href) {
            continue;
        }

        if has_resource_type(response, CALDAV_NS, "calendar") {
            result.calendars.push(Calendar {
                display_name: property_text(response, DAV_NS, "displayname")
                    .unwrap_or_else(|| href.clone()),
                description: property_text(response, CALDAV_NS, "calendar-description"),
                color: property_text(response, APPLE_ICAL_NS, "calendar-color").map(truncate_color),
                ctag: property_text(response, CS_NS, "getctag"),
                owner: None,
                accessible: true,
                href,
            });
        } else if has_resource_type(response, DAV_NS, "collection") {
            result.child_collections.push(href);
        }
    }

    debug!(
        calendars = result.calendars.len(),
        collections = result.child_collections.len(),
        "Parsed PROPFIND response"
    );
    Ok(result)
}

/// Pulls the raw iCalendar text out of a calendar-query answer. Blank
/// calendar-data elements are skipped.
///
/// # Errors
///
/// Returns a protocol error if the body is not well-formed XML.
pub fn parse_calendar_data_response(xml: &str) -> CalDavResult<Vec<String>> {
    let root = parse_document(xml)?;
    let data: Vec<String> = successful_responses(&root)
        .filter(|response| response_href(response).is_some())
        .flat_map(|response| response.descendants(CALDAV_NS, "calendar-data"))
        .map(|element| element.text_content())
        .filter(|text| !text.trim().is_empty())
        .collect();

    debug!(count = data.len(), "Parsed calendar-query response");
    Ok(data)
}

/// `#RRGGBBAA` becomes `#RRGGBB`; anything else is kept.
fn truncate_color(color: String) -> String {
    match color.get(..7) {
        Some(rgb) if color.len() == 9 && color.starts_with('#') => rgb.to_string(),
        _ => color,
    }
}

fn successful_responses(root: &Element) -> impl Iterator<Item = &Element> {
    root.descendants(DAV_NS, "response")
        .into_iter()
        .filter(|response| is_successful(response))
}

/// Status lines are free text (`HTTP/1.1 200 OK`), so any propstat status
/// containing "200" counts.
fn is_successful(response: &Element) -> bool {
    response
        .descendants(DAV_NS, "propstat")
        .into_iter()
        .flat_map(|propstat| propstat.descendants(DAV_NS, "status"))
        .any(|status| status.text_content().contains("200"))
}

fn response_href(response: &Element) -> Option<String> {
    response
        .first_descendant(DAV_NS, "href")
        .map(|href| href.text_content().trim().to_string())
        .filter(|href| !href.is_empty())
}

fn has_resource_type(response: &Element, ns: &str, local: &str) -> bool {
    response
        .descendants(DAV_NS, "prop")
        .into_iter()
        .flat_map(|prop| prop.descendants(DAV_NS, "resourcetype"))
        .any(|resource_type| resource_type.first_descendant(ns, local).is_some())
}

/// Trimmed text of the first matching property, `None` when missing or blank.
fn property_text(response: &Element, ns: &str, local: &str) -> Option<String> {
    response
        .first_descendant(ns, local)
        .map(|element| element.text_content().trim().to_string())
        .filter(|text| !text.is_empty())
}

/// One XML element with its resolved namespace.
#[derive(Debug, Default)]
struct Element {
    namespace: Option<String>,
    local_name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(namespace: ResolveResult<'_>, start: &BytesStart<'_>) -> Self {
        let namespace = match namespace {
            ResolveResult::Bound(Namespace(ns)) => Some(String::from_utf8_lossy(ns).into_owned()),
            _ => None,
        };
        Self {
            namespace,
            local_name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    fn is(&self, ns: &str, local: &str) -> bool {
        self.local_name == local && self.namespace.as_deref() == Some(ns)
    }

    /// All matching elements below this one, in document order.
    fn descendants(&self, ns: &str, local: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(ns, local, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, ns: &str, local: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.is(ns, local) {
                found.push(child);
            }
            child.collect_descendants(ns, local, found);
        }
    }

    fn first_descendant(&self, ns: &str, local: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| {
            if child.is(ns, local) {
                Some(child)
            } else {
                child.first_descendant(ns, local)
            }
        })
    }

    /// Concatenated text of this element and everything below it.
    fn text_content(&self) -> String {
        let mut text = self.text.clone();
        for child in &self.children {
            text.push_str(&child.text_content());
        }
        text
    }
}

fn malformed(detail: impl std::fmt::Display) -> CalDavError {
    CalDavError::protocol(format!("Server returned malformed XML: {}", detail))
}

/// Reads a whole document into an element tree.
fn parse_document(xml: &str) -> CalDavResult<Element> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(start))) => stack.push(Element::from_start(ns, &start)),
            Ok((ns, Event::Empty(start))) => {
                let element = Element::from_start(ns, &start);
                attach(&mut stack, &mut root, element);
            }
            Ok((_, Event::End(_))) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok((_, Event::Text(text))) => {
                if let Some(current) = stack.last_mut() {
                    let unescaped = text.unescape().map_err(|e| malformed(&e).with_source(e))?;
                    current.text.push_str(&unescaped);
                }
            }
            Ok((_, Event::CData(data))) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(&e).with_source(e)),
        }
    }

    if let Some(open) = stack.last() {
        return Err(malformed(format!("unclosed element <{}>", open.local_name)));
    }
    root.ok_or_else(|| malformed("no root element"))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn escape_replaces_ampersand_first() {
        assert_eq!(xml_escape("a&b"), "a&amp;b");
        assert_eq!(xml_escape("<x>"), "&lt;x&gt;");
        assert_eq!(xml_escape(r#""O'Brien""#), "&quot;O&apos;Brien&quot;");
        assert_eq!(xml_escape("&lt;"), "&amp;lt;");
    }

    #[test]
    fn principal_search_embeds_escaped_term() {
        let body = build_principal_search_xml(Some("Smith & Jones"));
        assert!(body.contains("<d:match>Smith &amp; Jones</d:match>"));
        assert!(!body.contains("&amp;amp;"));
        assert!(body.contains("principal-property-search"));
        assert!(body.contains(r#"test="anyof""#));
    }

    #[test]
    fn principal_search_without_term_matches_all() {
        for term in [None, Some(""), Some("   ")] {
            let body = build_principal_search_xml(term);
            assert!(body.contains("<d:match/>"), "term {:?}", term);
        }
    }

    #[test]
    fn principal_search_body_is_well_formed() {
        let body = build_principal_search_xml(Some("<script>"));
        assert!(parse_document(&body).is_ok());
    }

    #[test]
    fn calendar_query_uses_midnight_utc_bounds() {
        let body = build_calendar_query_xml(date(2025, 2, 10), date(2025, 2, 17));
        assert!(body.contains(r#"start="20250210T000000Z""#));
        assert!(body.contains(r#"end="20250217T000000Z""#));
        assert!(body.contains(r#"name="VCALENDAR""#));
        assert!(body.contains(r#"name="VEVENT""#));
        assert!(body.contains("calendar-data"));
        assert!(parse_document(&body).is_ok());
    }

    #[test]
    fn free_busy_query_body() {
        let body = build_free_busy_query_xml(date(2025, 12, 29), date(2026, 1, 5));
        assert!(body.contains("free-busy-query"));
        assert!(body.contains(r#"start="20251229T000000Z""#));
        assert!(body.contains(r#"end="20260105T000000Z""#));
        assert!(parse_document(&body).is_ok());
    }

    #[test]
    fn propfind_body_requests_calendar_properties() {
        let body = build_propfind_calendars_xml();
        for property in ["displayname", "resourcetype", "calendar-description", "calendar-color", "getctag"] {
            assert!(body.contains(property), "missing {}", property);
        }
        assert!(parse_document(&body).is_ok());
    }

    const PRINCIPALS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/caldav.php/alice/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Alice Example</d:displayname>
        <d:resourcetype><d:collection/><d:principal/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/caldav.php/shared/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Shared</d:displayname>
        <d:resourcetype><d:collection/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn principal_search_keeps_only_principals() {
        let users = parse_principal_search_response(PRINCIPALS).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].display_name, "Alice Example");
        assert_eq!(users[0].href, "/caldav.php/alice/");
    }

    #[test]
    fn principal_search_with_other_prefix_and_blank_name() {
        let xml = r#"<multistatus xmlns="DAV:">
  <response>
    <href>/principals/bob/</href>
    <propstat>
      <prop><displayname>  </displayname><resourcetype><principal/></resourcetype></prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
  <response>
    <href>/principals/carol/</href>
    <propstat>
      <prop><resourcetype><principal/></resourcetype></prop>
      <status>HTTP/1.1 404 Not Found</status>
    </propstat>
  </response>
  <response>
    <propstat>
      <prop><resourcetype><principal/></resourcetype></prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;
        let users = parse_principal_search_response(xml).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].display_name, "/principals/bob/");
    }

    #[test]
    fn wrong_namespace_is_not_a_principal() {
        let xml = r#"<d:multistatus xmlns:d="DAV:" xmlns:x="urn:other">
  <d:response>
    <d:href>/x/</d:href>
    <d:propstat>
      <d:prop><d:resourcetype><x:principal/></d:resourcetype></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        assert!(parse_principal_search_response(xml).unwrap().is_empty());
    }

    #[test]
    fn malformed_xml_fails_the_whole_call() {
        let truncated = &PRINCIPALS[..PRINCIPALS.len() / 2];
        let err = parse_principal_search_response(truncated).unwrap_err();
        assert_eq!(err.code(), crate::CalDavErrorCode::Protocol);

        let mismatched = "<d:multistatus xmlns:d=\"DAV:\"><d:response></d:href></d:multistatus>";
        assert!(parse_principal_search_response(mismatched).is_err());
        assert!(parse_calendar_data_response("").is_err());
    }

    const CALENDARS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" xmlns:ic="http://apple.com/ns/ical/" xmlns:cs="http://calendarserver.org/ns/">
  <d:response>
    <d:href>/caldav.php/alice/</d:href>
    <d:propstat>
      <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/caldav.php/alice/calendar/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Work</d:displayname>
        <d:resourcetype><d:collection/><c:calendar/></d:resourcetype>
        <c:calendar-description>Team calendar</c:calendar-description>
        <ic:calendar-color>#FF5733FF</ic:calendar-color>
        <cs:getctag>"ctag-42"</cs:getctag>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/caldav.php/alice/home/</d:href>
    <d:propstat>
      <d:prop>
        <d:resourcetype><d:collection/><c:calendar/></d:resourcetype>
        <ic:calendar-color>#00AA00</ic:calendar-color>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/caldav.php/alice/addressbook/</d:href>
    <d:propstat>
      <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

    #[test]
    fn propfind_lists_calendars_and_children() {
        let result =
            parse_multistatus_response(CALENDARS, "https://dav.example.com/caldav.php/alice/").unwrap();

        assert_eq!(result.calendars.len(), 2);
        let work = &result.calendars[0];
        assert_eq!(work.display_name, "Work");
        assert_eq!(work.href, "/caldav.php/alice/calendar/");
        assert_eq!(work.description.as_deref(), Some("Team calendar"));
        assert_eq!(work.color.as_deref(), Some("#FF5733"));
        assert_eq!(work.ctag.as_deref(), Some("\"ctag-42\""));
        assert!(work.accessible);
        assert!(work.owner.is_none());

        let home = &result.calendars[1];
        assert_eq!(home.display_name, "/caldav.php/alice/home/");
        assert_eq!(home.color.as_deref(), Some("#00AA00"));

        // The requested collection itself is not a child.
        assert_eq!(result.child_collections, vec!["/caldav.php/alice/addressbook/"]);
    }

    #[test]
    fn calendar_data_is_taken_verbatim() {
        let xml = r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/cal/1.ics</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>"1"</d:getetag>
        <c:calendar-data>BEGIN:VCALENDAR
BEGIN:VEVENT
SUMMARY:Tom &amp; Jerry
END:VEVENT
END:VCALENDAR
</c:calendar-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/cal/2.ics</d:href>
    <d:propstat>
      <d:prop><c:calendar-data><![CDATA[BEGIN:VCALENDAR
END:VCALENDAR]]></c:calendar-data></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/cal/3.ics</d:href>
    <d:propstat>
      <d:prop><c:calendar-data>   </c:calendar-data></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        let data = parse_calendar_data_response(xml).unwrap();
        assert_eq!(data.len(), 2);
        assert!(data[0].contains("SUMMARY:Tom & Jerry"));
        assert!(data[1].starts_with("BEGIN:VCALENDAR"));
    }

    #[test]
    fn calendar_serializes_for_json_output() {
        let calendar = Calendar {
            display_name: "Work".to_string(),
            href: "https://dav.example.com/alice/work/".to_string(),
            description: None,
            color: Some("#FF0000".to_string()),
            ctag: Some("42".to_string()),
            owner: Some("Alice".to_string()),
            accessible: true,
        };
        assert_eq!(
            serde_json::to_value(&calendar).unwrap(),
            serde_json::json!({
                "display_name": "Work",
                "href": "https://dav.example.com/alice/work/",
                "description": null,
                "color": "#FF0000",
                "ctag": "42",
                "owner": "Alice",
                "accessible": true,
            })
        );
    }
}

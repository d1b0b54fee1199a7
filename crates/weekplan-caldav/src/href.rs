//! URL and href handling.
//!
//! Servers return hrefs either as absolute URLs or as paths relative to the
//! request URL. Collections are always addressed with a trailing slash.

use url::Url;

/// Trims the URL, adds `https://` when no http(s) scheme is given and makes
/// sure it ends with a slash.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let mut normalized = if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Resolves an href returned by the server against the request base and
/// normalizes the result.
pub fn resolve_href(base: &str, href: &str) -> String {
    let href = href.trim();
    if has_http_scheme(href) {
        return normalize_url(href);
    }
    match Url::parse(&normalize_url(base)).and_then(|base| base.join(href)) {
        Ok(joined) => normalize_url(joined.as_str()),
        Err(_) => normalize_url(&format!("{}{}", normalize_url(base), href.trim_start_matches('/'))),
    }
}

/// Ensures a path or URL ends with exactly one trailing slash.
pub fn with_trailing_slash(href: &str) -> String {
    format!("{}/", href.trim_end_matches('/'))
}

/// Returns true when `href` names the collection that was requested at
/// `request_url`.
///
/// Trailing slashes are ignored. An href matches when the request URL ends
/// with it, or when both resolve to the same path.
pub fn is_same_resource(request_url: &str, href: &str) -> bool {
    let request = request_url.trim().trim_end_matches('/');
    let href = href.trim().trim_end_matches('/');

    if href.is_empty() {
        return request.is_empty() || path_of(request).is_some_and(|p| p.trim_end_matches('/').is_empty());
    }
    if request.ends_with(href) {
        return true;
    }
    match (path_of(request), path_of(href)) {
        (Some(a), Some(b)) => a.trim_end_matches('/') == b.trim_end_matches('/'),
        _ => request == href,
    }
}

fn has_http_scheme(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Path component of an absolute URL, or the value itself when it is
/// already a path.
fn path_of(value: &str) -> Option<String> {
    if has_http_scheme(value) {
        Url::parse(value).ok().map(|url| url.path().to_string())
    } else if value.starts_with('/') {
        Some(value.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_scheme_and_slash() {
        assert_eq!(normalize_url("dav.example.com"), "https://dav.example.com/");
        assert_eq!(normalize_url("  http://dav.example.com/cal "), "http://dav.example.com/cal/");
        assert_eq!(normalize_url("https://dav.example.com/"), "https://dav.example.com/");
        assert_eq!(normalize_url("HTTPS://dav.example.com"), "HTTPS://dav.example.com/");
    }

    #[test]
    fn resolve_relative_and_absolute_hrefs() {
        let base = "https://dav.example.com/caldav.php/";
        assert_eq!(
            resolve_href(base, "/caldav.php/alice/calendar/"),
            "https://dav.example.com/caldav.php/alice/calendar/"
        );
        assert_eq!(
            resolve_href(base, "alice/calendar"),
            "https://dav.example.com/caldav.php/alice/calendar/"
        );
        assert_eq!(
            resolve_href(base, "https://other.example.com/cal"),
            "https://other.example.com/cal/"
        );
    }

    #[test]
    fn resolve_against_unnormalized_base() {
        assert_eq!(
            resolve_href("dav.example.com/dav", "/dav/bob/"),
            "https://dav.example.com/dav/bob/"
        );
    }

    #[test]
    fn trailing_slash_is_single() {
        assert_eq!(with_trailing_slash("/alice"), "/alice/");
        assert_eq!(with_trailing_slash("/alice//"), "/alice/");
    }

    #[test]
    fn same_resource_by_suffix_or_path() {
        let request = "https://dav.example.com/caldav.php/alice/";
        assert!(is_same_resource(request, "/caldav.php/alice/"));
        assert!(is_same_resource(request, "/caldav.php/alice"));
        assert!(is_same_resource(request, "https://dav.example.com/caldav.php/alice"));
        assert!(!is_same_resource(request, "/caldav.php/alice/calendar/"));
        assert!(!is_same_resource(request, "/caldav.php/bob/"));
    }

    #[test]
    fn root_href_matches_root_request() {
        assert!(is_same_resource("https://dav.example.com/", "/"));
        assert!(!is_same_resource("https://dav.example.com/alice/", "/"));
    }
}

//! In-memory transport for tests.

use std::sync::Mutex;

use crate::error::{CalDavError, CalDavResult};
use crate::transport::{BoxFuture, DavRequest, DavResponse, HttpTransport};

enum Outcome {
    Respond(DavResponse),
    Fail(String),
}

struct Rule {
    url: String,
    /// Substring the request body must contain, e.g. `free-busy-query`.
    body_marker: Option<String>,
    outcome: Outcome,
}

/// Replays canned answers keyed by URL and query kind, and records every
/// request. Requests nothing matches get a 404.
///
/// Matching does not depend on request order, so concurrent fetches are
/// deterministic.
pub(crate) struct ScriptedTransport {
    rules: Vec<Rule>,
    requests: Mutex<Vec<DavRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self {
            rules: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers requests to `url` whose body contains `body_marker`.
    pub(crate) fn on(mut self, url: &str, body_marker: &str, status: u16, body: &str) -> Self {
        self.rules.push(Rule {
            url: url.to_string(),
            body_marker: Some(body_marker.to_string()),
            outcome: Outcome::Respond(DavResponse::new(status, body)),
        });
        self
    }

    /// Fails every request to `url` as if the network were down.
    pub(crate) fn fail(mut self, url: &str, message: &str) -> Self {
        self.rules.push(Rule {
            url: url.to_string(),
            body_marker: None,
            outcome: Outcome::Fail(message.to_string()),
        });
        self
    }

    pub(crate) fn requests(&self) -> Vec<DavRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn answer(&self, request: &DavRequest) -> CalDavResult<DavResponse> {
        let rule = self.rules.iter().find(|rule| {
            rule.url == request.url
                && rule
                    .body_marker
                    .as_deref()
                    .is_none_or(|marker| request.body.contains(marker))
        });
        match rule.map(|rule| &rule.outcome) {
            Some(Outcome::Respond(response)) => Ok(response.clone()),
            Some(Outcome::Fail(message)) => Err(CalDavError::protocol(message.clone())),
            None => Ok(DavResponse::new(404, "")),
        }
    }
}

impl HttpTransport for ScriptedTransport {
    fn send(&self, request: DavRequest) -> BoxFuture<'_, CalDavResult<DavResponse>> {
        let outcome = self.answer(&request);
        self.requests.lock().unwrap().push(request);
        Box::pin(async move { outcome })
    }
}

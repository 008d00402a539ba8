//! HTTP seam between the client and the network.
//!
//! The [`Client`](super::Client) never talks to `reqwest` directly. It goes
//! through the [`Transport`] trait, which has two implementations:
//!
//! - [`ReqwestTransport`]: the real thing, bearer-authenticated blocking HTTP.
//! - [`ScriptedTransport`]: replays canned responses. Used by the tests and
//!   handy for offline replays of a captured session.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{ArchiveError, Result};

/// Minimal HTTP client interface used by the archiver.
pub trait Transport {
    /// Issues a GET request. `query` is appended to `url` in the given order.
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse>;

    /// Issues a HEAD request.
    fn head(&self, url: &str) -> Result<HttpResponse>;

    /// Issues a GET request and streams a successful body into `sink`.
    ///
    /// The returned response carries status and headers. Its body is empty
    /// on success and holds the (buffered) error text otherwise; nothing is
    /// written to `sink` unless the status is 2xx.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<HttpResponse>;
}

/// A fully-buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Headers with lower-cased names.
    pub headers: Vec<(String, String)>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Creates a 200 response carrying `value` as JSON.
    pub fn json_body(value: &serde_json::Value) -> Self {
        Self::new(200)
            .with_header("content-type", "application/json")
            .with_body(value.to_string())
    }

    /// Adds a header. The name is lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the body as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns the `rel="next"` target of the `Link` header.
    ///
    /// ```rust
    /// use space_archive::api::HttpResponse;
    ///
    /// let resp = HttpResponse::new(200).with_header(
    ///     "Link",
    ///     r#"<https://webexapis.com/v1/messages?roomId=R&beforeMessage=M9>; rel="next""#,
    /// );
    /// assert_eq!(
    ///     resp.next_link().as_deref(),
    ///     Some("https://webexapis.com/v1/messages?roomId=R&beforeMessage=M9")
    /// );
    /// ```
    pub fn next_link(&self) -> Option<String> {
        self.header("link").and_then(parse_next_link)
    }
}

/// Extracts the `rel="next"` URL from an RFC 8288 `Link` header value.
fn parse_next_link(value: &str) -> Option<String> {
    value.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;
        let is_next = parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
                .unwrap_or(false)
        });
        is_next.then(|| url.to_string())
    })
}

// ============================================================================
// reqwest
// ============================================================================

/// Total timeout for API calls.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connect timeout for downloads, which have no total timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("space-archive/", env!("CARGO_PKG_VERSION"));

/// Bearer-authenticated blocking HTTP transport.
///
/// API calls share one client with a total timeout. Downloads go through a
/// second client that only bounds the connect phase, so large files are not
/// cut off mid-transfer.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
    downloads: reqwest::blocking::Client,
    token: String,
}

impl ReqwestTransport {
    /// Builds a transport for `token`.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        let downloads = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None::<Duration>)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            downloads,
            token: token.into(),
        })
    }

    fn headers(response: &reqwest::blocking::Response) -> HttpResponse {
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        HttpResponse {
            status: response.status().as_u16(),
            headers,
            body: Vec::new(),
        }
    }

    fn buffer(response: reqwest::blocking::Response) -> Result<HttpResponse> {
        let head = Self::headers(&response);
        let body = response.bytes()?.to_vec();
        Ok(head.with_body(body))
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()?;
        Self::buffer(response)
    }

    fn head(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.head(url).bearer_auth(&self.token).send()?;
        Self::buffer(response)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<HttpResponse> {
        let mut response = self.downloads.get(url).bearer_auth(&self.token).send()?;
        if !response.status().is_success() {
            return Self::buffer(response);
        }
        let head = Self::headers(&response);
        io::copy(&mut response, sink)?;
        sink.flush()?;
        Ok(head)
    }
}

// ============================================================================
// Scripted
// ============================================================================

/// Replays canned responses.
///
/// Responses are keyed by method, URL and query string (`"GET url?k=v&k2=v2"`,
/// parameters in request order). Each key holds a queue; once only one
/// response is left it is repeated for every further request. Unknown keys
/// answer 404.
///
/// ```rust
/// use space_archive::api::{HttpResponse, ScriptedTransport, Transport};
///
/// let transport = ScriptedTransport::new()
///     .on_get("https://api.test/rooms", &[], HttpResponse::new(429))
///     .on_get("https://api.test/rooms", &[], HttpResponse::new(200));
///
/// assert_eq!(transport.get("https://api.test/rooms", &[]).unwrap().status, 429);
/// assert_eq!(transport.get("https://api.test/rooms", &[]).unwrap().status, 200);
/// assert_eq!(transport.get("https://api.test/rooms", &[]).unwrap().status, 200);
/// assert_eq!(transport.requests().len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: RefCell<HashMap<String, VecDeque<HttpResponse>>>,
    requests: RefCell<Vec<String>>,
}

impl ScriptedTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for a GET request.
    #[must_use]
    pub fn on_get(self, url: &str, query: &[(&str, &str)], response: HttpResponse) -> Self {
        let query: Vec<(&str, String)> = query.iter().map(|(k, v)| (*k, (*v).to_string())).collect();
        self.push(request_key("GET", url, &query), response)
    }

    /// Queues a response for a HEAD request.
    #[must_use]
    pub fn on_head(self, url: &str, response: HttpResponse) -> Self {
        self.push(request_key("HEAD", url, &[]), response)
    }

    fn push(self, key: String, response: HttpResponse) -> Self {
        self.routes
            .borrow_mut()
            .entry(key)
            .or_default()
            .push_back(response);
        self
    }

    /// Every request made so far, as `"METHOD url?query"` keys.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Number of requests made for one key.
    pub fn count(&self, key: &str) -> usize {
        self.requests.borrow().iter().filter(|r| *r == key).count()
    }

    fn replay(&self, key: String) -> HttpResponse {
        let response = {
            let mut routes = self.routes.borrow_mut();
            match routes.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        self.requests.borrow_mut().push(key);
        response.unwrap_or_else(|| HttpResponse::new(404).with_body("no scripted response"))
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse> {
        Ok(self.replay(request_key("GET", url, query)))
    }

    fn head(&self, url: &str) -> Result<HttpResponse> {
        Ok(self.replay(request_key("HEAD", url, &[])))
    }

    /// Replays the GET route for `url`, writing a 2xx body into `sink`.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<HttpResponse> {
        let mut response = self.replay(request_key("GET", url, &[]));
        if response.is_success() {
            sink.write_all(&std::mem::take(&mut response.body))?;
        }
        Ok(response)
    }
}

fn request_key(method: &str, url: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return format!("{} {}", method, url);
    }
    let query: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{} {}?{}", method, url, query.join("&"))
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str, query: &[(&str, String)]) -> Result<HttpResponse> {
        (**self).get(url, query)
    }

    fn head(&self, url: &str) -> Result<HttpResponse> {
        (**self).head(url)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<HttpResponse> {
        (**self).download(url, sink)
    }
}

/// Turns a non-success response into an error.
pub(crate) fn status_error(resource: &'static str, id: &str, response: &HttpResponse) -> ArchiveError {
    match response.status {
        401 => ArchiveError::Unauthorized,
        404 => ArchiveError::not_found(resource, id),
        status => {
            let message: String = response.text().chars().take(200).collect();
            ArchiveError::api(resource, status, message)
        }
    }
}

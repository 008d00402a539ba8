//! Paginated retrieval client.
//!
//! [`Client`] wraps a [`Transport`] and implements the handful of Webex API
//! operations the archiver needs. Collections are fetched page by page by
//! following the `Link: <...>; rel="next"` header until the collection is
//! exhausted or a caller-supplied cap is reached.
//!
//! # Failure policy
//!
//! | Response | Behaviour |
//! |----------|-----------|
//! | 429 | sleep the configured backoff and retry the identical request, forever |
//! | 401 | [`ArchiveError::Unauthorized`], which ends the run |
//! | other error, first page | error returned; the caller skips the resource |
//! | other error, later page | partial result with [`StopReason::Failed`] |

use std::cell::Cell;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::transport::{HttpResponse, Transport, status_error};
use crate::config::{ArchiveConfig, MessageCap};
use crate::error::{ArchiveError, Result};
use crate::message::{Membership, Message, Person, Room};
use crate::progress::{Progress, ProgressCallback};

/// Tokens shorter than this are certainly truncated copies.
pub const MIN_TOKEN_LEN: usize = 55;

/// Rejects obviously malformed access tokens before any request is made.
///
/// ```rust
/// use space_archive::api::validate_token;
///
/// assert!(validate_token("abc").is_err());
/// assert!(validate_token(&"x".repeat(100)).is_ok());
/// ```
pub fn validate_token(token: &str) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ArchiveError::InvalidToken { reason: "empty" });
    }
    if token.len() < MIN_TOKEN_LEN {
        return Err(ArchiveError::InvalidToken { reason: "too short" });
    }
    if token.chars().any(char::is_whitespace) {
        return Err(ArchiveError::InvalidToken {
            reason: "contains whitespace",
        });
    }
    Ok(())
}

/// Why pagination stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No continuation link was left.
    Exhausted,
    /// The item cap was reached while more records existed.
    ItemCap,
    /// A page reached records older than the age cap.
    AgeCap,
    /// A later page failed; `items` holds what was fetched before.
    Failed {
        /// HTTP status, if the failure had one
        status: Option<u16>,
        /// Error text
        reason: String,
    },
}

/// Result of a paginated fetch.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    /// Records in API order.
    pub items: Vec<T>,
    /// Pages fetched.
    pub pages: usize,
    /// Why retrieval stopped.
    pub stop: StopReason,
}

impl<T> Paged<T> {
    /// Returns `true` if records were left behind because of the item cap.
    pub fn is_truncated(&self) -> bool {
        self.stop == StopReason::ItemCap
    }

    /// Returns `true` if a page failed mid-way.
    pub fn is_failed(&self) -> bool {
        matches!(self.stop, StopReason::Failed { .. })
    }
}

#[derive(Deserialize)]
struct ItemsPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

enum Method<'w> {
    Get,
    Head,
    Download(&'w mut dyn Write),
}

/// Webex API client.
pub struct Client<T: Transport> {
    transport: T,
    base_url: String,
    backoff: Duration,
    message_page_size: usize,
    member_page_size: usize,
    room_page_size: usize,
    people_batch_size: usize,
    rate_limit_hits: Cell<u64>,
    progress: Option<ProgressCallback>,
}

impl<T: Transport> Client<T> {
    /// Creates a client using the API root, backoff and page sizes of `config`.
    pub fn new(transport: T, config: &ArchiveConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            backoff: config.rate_limit_backoff,
            message_page_size: config.message_page_size,
            member_page_size: config.member_page_size,
            room_page_size: config.room_page_size,
            people_batch_size: config.people_batch_size,
            rate_limit_hits: Cell::new(0),
            progress: None,
        }
    }

    /// Sets a callback that receives one update per fetched page.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Returns the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of 429 responses seen so far.
    pub fn rate_limit_hits(&self) -> u64 {
        self.rate_limit_hits.get()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Sends one request, sleeping and retrying while rate-limited.
    fn send(
        &self,
        mut method: Method<'_>,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<HttpResponse> {
        loop {
            let response = match &mut method {
                Method::Get => self.transport.get(url, query)?,
                Method::Head => self.transport.head(url)?,
                Method::Download(sink) => self.transport.download(url, &mut **sink)?,
            };
            match response.status {
                429 => {
                    self.rate_limit_hits.set(self.rate_limit_hits.get() + 1);
                    warn!(
                        url = url,
                        backoff_ms = self.backoff.as_millis(),
                        hits = self.rate_limit_hits.get(),
                        "Rate limited, retrying"
                    );
                    thread::sleep(self.backoff);
                }
                401 => return Err(ArchiveError::Unauthorized),
                _ => return Ok(response),
            }
        }
    }

    fn get_json<R: DeserializeOwned>(
        &self,
        resource: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<R> {
        let response = self.send(Method::Get, url, query)?;
        if !response.is_success() {
            return Err(status_error(resource, url, &response));
        }
        response.json()
    }

    /// Fetches a collection page by page.
    ///
    /// Stops at `limit` items (if any), or after the first page whose last
    /// record satisfies `past_horizon`.
    fn paginate<R: DeserializeOwned>(
        &self,
        resource: &'static str,
        url: &str,
        query: &[(&str, String)],
        limit: Option<usize>,
        past_horizon: impl Fn(&R) -> bool,
    ) -> Result<Paged<R>> {
        let mut items: Vec<R> = Vec::new();
        let mut pages = 0;
        let mut next: Option<String> = None;

        loop {
            let attempt = match &next {
                None => self.send(Method::Get, url, query),
                Some(link) => self.send(Method::Get, link, &[]),
            };
            let page = attempt.and_then(|response| {
                if response.is_success() {
                    let page: ItemsPage<R> = response.json()?;
                    Ok((page.items, response.next_link()))
                } else {
                    Err(status_error(resource, url, &response))
                }
            });

            let (page_items, next_link) = match page {
                Ok(page) => page,
                Err(e) if e.is_fatal() || pages == 0 => return Err(e),
                Err(e) => {
                    warn!(
                        resource = resource,
                        pages = pages,
                        items = items.len(),
                        error = %e,
                        "Pagination failed, keeping partial result"
                    );
                    return Ok(Paged {
                        items,
                        pages,
                        stop: StopReason::Failed {
                            status: e.status(),
                            reason: e.to_string(),
                        },
                    });
                }
            };

            pages += 1;
            let reached_horizon = page_items.last().is_some_and(&past_horizon);
            items.extend(page_items);
            debug!(resource = resource, page = pages, items = items.len(), "Fetched page");
            if let Some(callback) = &self.progress {
                callback(Progress::new(resource, items.len()));
            }

            if let Some(max) = limit {
                if items.len() >= max {
                    let truncated = items.len() > max || next_link.is_some();
                    items.truncate(max);
                    let stop = if truncated {
                        StopReason::ItemCap
                    } else {
                        StopReason::Exhausted
                    };
                    return Ok(Paged { items, pages, stop });
                }
            }
            if reached_horizon {
                return Ok(Paged {
                    items,
                    pages,
                    stop: StopReason::AgeCap,
                });
            }
            match next_link {
                Some(link) => next = Some(link),
                None => {
                    return Ok(Paged {
                        items,
                        pages,
                        stop: StopReason::Exhausted,
                    });
                }
            }
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Lists every conversation the user belongs to, most recently active first.
    pub fn list_rooms(&self) -> Result<Vec<Room>> {
        let query = [
            ("max", self.room_page_size.to_string()),
            ("sortBy", "lastactivity".to_string()),
        ];
        let paged = self.paginate("rooms", &self.endpoint("rooms"), &query, None, |_: &Room| false)?;
        info!(rooms = paged.items.len(), "Listed rooms");
        Ok(paged.items)
    }

    /// Looks up one conversation.
    pub fn room(&self, room_id: &str) -> Result<Room> {
        let url = self.endpoint(&format!("rooms/{}", room_id));
        self.get_json("room", &url, &[])
    }

    /// Returns the profile of the token owner.
    pub fn me(&self) -> Result<Person> {
        self.get_json("person", &self.endpoint("people/me"), &[])
    }

    /// Returns `true` if the conversation holds at least one message.
    pub fn has_messages(&self, room_id: &str) -> Result<bool> {
        let query = [("roomId", room_id.to_string()), ("max", "1".to_string())];
        let page: ItemsPage<serde_json::Value> =
            self.get_json("messages", &self.endpoint("messages"), &query)?;
        Ok(!page.items.is_empty())
    }

    /// Fetches the messages of a conversation, newest first, up to `cap`.
    pub fn list_messages(&self, room_id: &str, cap: MessageCap) -> Result<Paged<Message>> {
        self.list_messages_at(room_id, cap, Utc::now())
    }

    /// Like [`list_messages`](Self::list_messages), measuring message age
    /// against `now`.
    pub fn list_messages_at(
        &self,
        room_id: &str,
        cap: MessageCap,
        now: DateTime<Utc>,
    ) -> Result<Paged<Message>> {
        let url = self.endpoint("messages");
        let mut paged = match cap {
            MessageCap::Count(max) => {
                let query = [
                    ("roomId", room_id.to_string()),
                    ("max", self.message_page_size.min(max).to_string()),
                ];
                self.paginate("messages", &url, &query, Some(max), |_: &Message| false)?
            }
            MessageCap::Days(days) => {
                // Age is counted in whole elapsed days.
                let too_old =
                    |m: &Message| now.signed_duration_since(m.created).num_days() > i64::from(days);
                let query = [
                    ("roomId", room_id.to_string()),
                    ("max", self.message_page_size.to_string()),
                ];
                let mut paged = self.paginate("messages", &url, &query, None, too_old)?;
                if let Some(cut) = paged.items.iter().position(too_old) {
                    paged.items.truncate(cut);
                }
                paged
            }
        };
        paged.items.shrink_to_fit();
        info!(
            room = room_id,
            messages = paged.items.len(),
            pages = paged.pages,
            stop = ?paged.stop,
            "Fetched messages"
        );
        Ok(paged)
    }

    /// Fetches the memberships of a conversation.
    pub fn list_memberships(&self, room_id: &str) -> Result<Paged<Membership>> {
        let query = [
            ("roomId", room_id.to_string()),
            ("max", self.member_page_size.to_string()),
        ];
        self.paginate(
            "memberships",
            &self.endpoint("memberships"),
            &query,
            None,
            |_: &Membership| false,
        )
    }

    /// Looks up person profiles in batches.
    ///
    /// A failing batch is logged and skipped; the people in it simply get no
    /// profile.
    pub fn people(&self, ids: &[String]) -> Result<Vec<Person>> {
        let url = self.endpoint("people");
        let mut found = Vec::with_capacity(ids.len());
        for batch in ids.chunks(self.people_batch_size.max(1)) {
            let query = [("id", batch.join(","))];
            match self.get_json::<ItemsPage<Person>>("people", &url, &query) {
                Ok(page) => found.extend(page.items),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(batch = batch.len(), error = %e, "People lookup failed"),
            }
        }
        Ok(found)
    }

    /// Issues a HEAD request for an attachment URL.
    pub fn inspect(&self, url: &str) -> Result<HttpResponse> {
        self.send(Method::Head, url, &[])
    }

    /// Streams the body behind `url` into `sink`.
    ///
    /// Rate-limited attempts write nothing, so the sink only ever sees the
    /// body of the final, successful response.
    pub fn download_to(&self, url: &str, sink: &mut dyn Write) -> Result<HttpResponse> {
        self.send(Method::Download(sink), url, &[])
    }

    /// Downloads `url` into the file at `path`.
    ///
    /// A failed download leaves no partial file behind.
    pub fn save(&self, resource: &'static str, url: &str, path: &Path) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        let outcome = self.download_to(url, &mut file).and_then(|response| {
            if response.is_success() {
                file.flush()?;
                Ok(())
            } else {
                Err(status_error(resource, url, &response))
            }
        });
        if outcome.is_err() {
            drop(file);
            if let Err(e) = fs::remove_file(path) {
                debug!(path = %path.display(), error = %e, "Could not remove partial download");
            }
        }
        outcome
    }
}

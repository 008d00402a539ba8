//! Thread-order resolution.
//!
//! The API returns a flat, newest-first list in which threaded replies only
//! point at their parent. [`ThreadOrder`] turns that into one total order in
//! which each reply sits directly under its parent.
//!
//! Every message gets an [`OrderKey`]. Top-level messages take successive
//! majors (`1.000`, `2.000`, ...). A reply takes the first free minor slot
//! after its parent's key (`1.001`, `1.002`, ...), so replies follow their
//! parent in processing order and precede the next top-level message.
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use space_archive::Message;
//! use space_archive::core::order::ThreadOrder;
//!
//! let t = |s| Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, s).unwrap();
//! let messages = vec![
//!     Message::new("M3", "a@x.com", t(30), "later"),
//!     Message::new("M2", "b@x.com", t(5), "reply").with_parent("M1"),
//!     Message::new("M1", "a@x.com", t(0), "first"),
//! ];
//!
//! let order = ThreadOrder::resolve(&messages);
//! assert_eq!(order.ascending(), vec!["M1", "M2", "M3"]);
//! assert_eq!(order.descending(), vec!["M3", "M1", "M2"]);
//! assert_eq!(order.key_of("M2").unwrap().to_string(), "1.001");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::config::SortOrder;
use crate::message::Message;

/// Position of a message in the resolved order.
///
/// Compares as the decimal `major.minor`. Minor slots are unbounded, so one
/// message can hold any number of replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    /// Top-level position, starting at 1.
    pub major: u32,
    /// Reply slot under `major`; 0 for the top-level message itself.
    pub minor: u32,
}

impl OrderKey {
    /// Key of the `major`-th top-level message.
    pub fn top(major: u32) -> Self {
        Self { major, minor: 0 }
    }

    /// Returns `true` for reply slots.
    pub fn is_reply(&self) -> bool {
        self.minor > 0
    }

    fn next_slot(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.major, self.minor)
    }
}

/// Resolved order of one conversation.
#[derive(Debug, Clone, Default)]
pub struct ThreadOrder {
    keys: BTreeMap<OrderKey, String>,
    index: HashMap<String, OrderKey>,
    dropped: Vec<String>,
}

impl ThreadOrder {
    /// Resolves the order of `messages`, processing them oldest first.
    pub fn resolve(messages: &[Message]) -> Self {
        let mut sorted: Vec<&Message> = messages.iter().collect();
        sorted.sort_by_key(|m| m.created);
        Self::from_arrival(sorted)
    }

    /// Resolves the order processing messages exactly as given.
    pub fn from_arrival<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Self {
        let mut order = Self::default();
        let mut next_major = 1;

        for msg in messages {
            match &msg.parent_id {
                None => {
                    order.insert(OrderKey::top(next_major), &msg.id);
                    next_major += 1;
                }
                Some(parent) => match order.index.get(parent) {
                    Some(&parent_key) => {
                        let mut key = parent_key.next_slot();
                        while order.keys.contains_key(&key) {
                            key = key.next_slot();
                        }
                        order.insert(key, &msg.id);
                    }
                    None => order.dropped.push(msg.id.clone()),
                },
            }
        }

        order
    }

    fn insert(&mut self, key: OrderKey, id: &str) {
        self.keys.insert(key, id.to_string());
        self.index.insert(id.to_string(), key);
    }

    /// Ids oldest first, replies under their parent.
    pub fn ascending(&self) -> Vec<&str> {
        self.keys.values().map(String::as_str).collect()
    }

    /// Ids newest top-level message first, replies still under their parent.
    pub fn descending(&self) -> Vec<&str> {
        let mut keys: Vec<&OrderKey> = self.keys.keys().collect();
        keys.sort_by(|a, b| b.major.cmp(&a.major).then(a.minor.cmp(&b.minor)));
        keys.into_iter().map(|k| self.keys[k].as_str()).collect()
    }

    /// Ids in the requested presentation order.
    pub fn in_order(&self, sort: SortOrder) -> Vec<&str> {
        match sort {
            SortOrder::OldestFirst => self.ascending(),
            SortOrder::NewestFirst => self.descending(),
        }
    }

    /// Looks up the messages of `messages` in the requested order.
    ///
    /// Dropped replies are not included.
    pub fn arrange<'a>(&self, messages: &'a [Message], sort: SortOrder) -> Vec<&'a Message> {
        let by_id: HashMap<&str, &Message> = messages.iter().map(|m| (m.id.as_str(), m)).collect();
        self.in_order(sort)
            .into_iter()
            .filter_map(|id| by_id.get(id).copied())
            .collect()
    }

    /// Key assigned to `id`.
    pub fn key_of(&self, id: &str) -> Option<OrderKey> {
        self.index.get(id).copied()
    }

    /// Ids of replies whose parent was not in the input.
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Number of placed messages.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if nothing was placed.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

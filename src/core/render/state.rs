//! State carried across the render pass.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, Month, Utc};

use crate::config::SortOrder;
use crate::message::{Message, email_domain};

/// Same-author messages closer than this share one header.
pub const HEADER_GAP_SECS: i64 = 60;

/// Calendar month, used for separators and the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    /// Year.
    pub year: i32,
    /// Month number, 1-12.
    pub month: u32,
}

impl MonthKey {
    /// Month of `ts` in the display time zone.
    pub fn of(ts: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = ts.with_timezone(&offset);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    /// Three-letter month name ("Mar").
    pub fn short_name(&self) -> &'static str {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| &m.name()[..3])
            .unwrap_or("???")
    }

    /// Anchor id of the month separator ("2024-03").
    pub fn anchor(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    /// Table-of-contents label ("2024 - Mar").
    pub fn label(&self) -> String {
        format!("{} - {}", self.year, self.short_name())
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}    {}", self.year, self.short_name())
    }
}

/// Running totals of a render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Rendered messages.
    pub messages: usize,
    /// Image attachments.
    pub images: usize,
    /// Other attachments.
    pub files: usize,
    /// Messages with at least one mention.
    pub mentions: usize,
}

/// Mutable context of one conversation's render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    prev_email: Option<String>,
    prev_month: Option<MonthKey>,
    prev_created: Option<DateTime<Utc>>,
    authors: HashSet<String>,
    /// Totals so far.
    pub stats: Statistics,
    /// Messages per author domain.
    pub domains: BTreeMap<String, usize>,
    /// Messages per month.
    pub months: BTreeMap<MonthKey, usize>,
}

impl RenderState {
    /// Fresh state for a new conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A separator is due when a top-level message starts a new month.
    /// Replies never open a month.
    pub fn needs_month_separator(&self, month: MonthKey, threaded: bool) -> bool {
        !threaded && self.prev_month != Some(month)
    }

    /// A header is due for a new author, a gap of more than a minute, or an
    /// edited message.
    pub fn needs_header(&self, msg: &Message) -> bool {
        if msg.is_edited() {
            return true;
        }
        if self.prev_email.as_deref() != Some(msg.person_email.as_str()) {
            return true;
        }
        self.prev_created
            .map(|prev| (msg.created - prev).num_seconds().abs() > HEADER_GAP_SECS)
            .unwrap_or(true)
    }

    /// Records a rendered message.
    pub fn record(&mut self, msg: &Message, month: MonthKey, threaded: bool, mentioned: bool) {
        self.stats.messages += 1;
        if mentioned {
            self.stats.mentions += 1;
        }
        if let Some(domain) = email_domain(&msg.person_email) {
            *self.domains.entry(domain.to_string()).or_default() += 1;
        }
        *self.months.entry(month).or_default() += 1;
        self.authors.insert(msg.person_id.clone());

        self.prev_email = Some(msg.person_email.clone());
        if !threaded {
            self.prev_month = Some(month);
        }
        self.prev_created = Some(msg.created);
    }

    /// Distinct authors rendered so far.
    pub fn unique_authors(&self) -> usize {
        self.authors.len()
    }

    /// The `n` busiest domains, highest count first, ties by name.
    pub fn top_domains(&self, n: usize) -> Vec<(&str, usize)> {
        let mut domains: Vec<(&str, usize)> =
            self.domains.iter().map(|(d, c)| (d.as_str(), *c)).collect();
        domains.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        domains.truncate(n);
        domains
    }

    /// Months with their counts, in table-of-contents order.
    pub fn months_in_order(&self, sort: SortOrder) -> Vec<(MonthKey, usize)> {
        let months = self.months.iter().map(|(k, v)| (*k, *v));
        match sort {
            SortOrder::OldestFirst => months.collect(),
            SortOrder::NewestFirst => months.rev().collect(),
        }
    }
}

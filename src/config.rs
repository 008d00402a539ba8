//! Archive configuration.
//!
//! [`ArchiveConfig`] collects every setting that changes what an archive run
//! fetches and how it renders. All settings have working defaults, so a
//! library user only overrides what they care about:
//!
//! ```rust
//! use space_archive::config::{ArchiveConfig, AvatarMode, DownloadMode, MessageCap, SortOrder};
//!
//! let config = ArchiveConfig::new()
//!     .with_download(DownloadMode::Images)
//!     .with_sort(SortOrder::NewestFirst)
//!     .with_message_cap("60d".parse().unwrap())
//!     .with_avatars(AvatarMode::Download);
//!
//! assert_eq!(config.message_cap, MessageCap::Days(60));
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

/// Default Webex API root.
pub const DEFAULT_BASE_URL: &str = "https://webexapis.com/v1";

/// Largest number of person ids the people endpoint accepts per request.
pub const MAX_PEOPLE_BATCH: usize = 80;

/// Which attachments are downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    /// Only list attachment names and sizes
    #[cfg_attr(feature = "cli", value(alias = "no"))]
    None,
    /// Download images, list other files
    Images,
    /// Download every attachment
    #[default]
    #[cfg_attr(feature = "cli", value(alias = "files"))]
    #[serde(alias = "files")]
    All,
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadMode::None => write!(f, "none"),
            DownloadMode::Images => write!(f, "images"),
            DownloadMode::All => write!(f, "files"),
        }
    }
}

/// Order of messages in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Oldest message first
    #[default]
    #[cfg_attr(feature = "cli", value(alias = "old-new"))]
    OldestFirst,
    /// Newest message first; threads stay under their parent
    #[cfg_attr(feature = "cli", value(alias = "new-old"))]
    NewestFirst,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::OldestFirst => write!(f, "Old to new"),
            SortOrder::NewestFirst => write!(f, "New to old"),
        }
    }
}

/// How author avatars are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum AvatarMode {
    /// Initials only
    #[cfg_attr(feature = "cli", value(alias = "no"))]
    None,
    /// Link to the remote image (needs network access to view)
    #[default]
    Link,
    /// Download images next to the archive
    Download,
}

impl fmt::Display for AvatarMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvatarMode::None => write!(f, "none"),
            AvatarMode::Link => write!(f, "link"),
            AvatarMode::Download => write!(f, "download"),
        }
    }
}

/// Extra output written alongside the HTML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ExtraOutput {
    /// HTML only
    #[default]
    #[cfg_attr(feature = "cli", value(alias = "no"))]
    None,
    /// Raw fetched messages as JSON
    Json,
    /// Plain-text rendering
    #[cfg_attr(feature = "cli", value(alias = "txt"))]
    #[serde(alias = "txt")]
    Text,
    /// Both JSON and text
    #[cfg_attr(feature = "cli", value(alias = "yes"))]
    Both,
}

impl ExtraOutput {
    /// Returns `true` if the raw JSON export is enabled.
    pub fn json(self) -> bool {
        matches!(self, ExtraOutput::Json | ExtraOutput::Both)
    }

    /// Returns `true` if the plain-text rendering is enabled.
    pub fn text(self) -> bool {
        matches!(self, ExtraOutput::Text | ExtraOutput::Both)
    }
}

impl fmt::Display for ExtraOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraOutput::None => write!(f, "none"),
            ExtraOutput::Json => write!(f, "json"),
            ExtraOutput::Text => write!(f, "txt"),
            ExtraOutput::Both => write!(f, "json+txt"),
        }
    }
}

/// Which conversations are archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SpaceScope {
    /// One-to-one conversations only
    Direct,
    /// Group spaces only
    Group,
    /// Everything
    #[default]
    All,
}

impl fmt::Display for SpaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceScope::Direct => write!(f, "direct"),
            SpaceScope::Group => write!(f, "group"),
            SpaceScope::All => write!(f, "all"),
        }
    }
}

/// Looks `s` up case-insensitively in a table of accepted names.
fn parse_option<T: Copy>(key: &'static str, s: &str, names: &[(&str, T)]) -> Result<T, ArchiveError> {
    let wanted = s.trim().to_lowercase();
    names
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(_, value)| *value)
        .ok_or_else(|| {
            let expected: Vec<&str> = names.iter().map(|(name, _)| *name).collect();
            ArchiveError::invalid_config(
                key,
                format!("unknown value '{}'. Expected one of: {}", s, expected.join(", ")),
            )
        })
}

impl FromStr for DownloadMode {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_option(
            "download",
            s,
            &[
                ("none", DownloadMode::None),
                ("no", DownloadMode::None),
                ("images", DownloadMode::Images),
                ("all", DownloadMode::All),
                ("files", DownloadMode::All),
            ],
        )
    }
}

impl FromStr for SortOrder {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_option(
            "sort",
            s,
            &[
                ("oldest-first", SortOrder::OldestFirst),
                ("old-new", SortOrder::OldestFirst),
                ("newest-first", SortOrder::NewestFirst),
                ("new-old", SortOrder::NewestFirst),
            ],
        )
    }
}

impl FromStr for AvatarMode {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_option(
            "avatars",
            s,
            &[
                ("none", AvatarMode::None),
                ("no", AvatarMode::None),
                ("link", AvatarMode::Link),
                ("download", AvatarMode::Download),
            ],
        )
    }
}

impl FromStr for ExtraOutput {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_option(
            "extra_output",
            s,
            &[
                ("none", ExtraOutput::None),
                ("no", ExtraOutput::None),
                ("json", ExtraOutput::Json),
                ("text", ExtraOutput::Text),
                ("txt", ExtraOutput::Text),
                ("both", ExtraOutput::Both),
                ("yes", ExtraOutput::Both),
            ],
        )
    }
}

impl FromStr for SpaceScope {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_option(
            "scope",
            s,
            &[
                ("direct", SpaceScope::Direct),
                ("group", SpaceScope::Group),
                ("all", SpaceScope::All),
            ],
        )
    }
}

/// Upper bound on the messages fetched per conversation.
///
/// Parses from `"5000"` (a count) or `"60d"` (an age in days):
///
/// ```rust
/// use space_archive::config::MessageCap;
///
/// assert_eq!("5000".parse::<MessageCap>().unwrap(), MessageCap::Count(5000));
/// assert_eq!("60d".parse::<MessageCap>().unwrap(), MessageCap::Days(60));
/// assert!("0".parse::<MessageCap>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageCap {
    /// Keep at most this many messages.
    Count(usize),
    /// Keep messages at most this many days old.
    Days(u32),
}

impl Default for MessageCap {
    fn default() -> Self {
        MessageCap::Count(999_999)
    }
}

impl fmt::Display for MessageCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageCap::Count(n) => write!(f, "{}", n),
            MessageCap::Days(d) => write!(f, "{} days", d),
        }
    }
}

impl FromStr for MessageCap {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let cap = if let Some(days) = trimmed.strip_suffix(['d', 'D']) {
            days.trim().parse::<u32>().ok().map(MessageCap::Days)
        } else {
            trimmed.parse::<usize>().ok().map(MessageCap::Count)
        };

        match cap {
            Some(MessageCap::Count(0) | MessageCap::Days(0)) | None => {
                Err(ArchiveError::invalid_message_cap(s))
            }
            Some(cap) => Ok(cap),
        }
    }
}

/// Configuration for an archive run.
///
/// # Example
///
/// ```rust
/// use space_archive::config::{ArchiveConfig, ExtraOutput};
/// use std::time::Duration;
///
/// let config = ArchiveConfig::new()
///     .with_extra_output(ExtraOutput::Both)
///     .with_rate_limit_backoff(Duration::from_secs(5));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// API root (default: Webex public API)
    pub base_url: String,

    /// Attachment download mode (default: all files)
    pub download: DownloadMode,

    /// Message order (default: oldest first)
    pub sort: SortOrder,

    /// Message cap per conversation (default: 999 999 messages)
    pub message_cap: MessageCap,

    /// Avatar mode (default: link)
    pub avatars: AvatarMode,

    /// Additional JSON/text output (default: none)
    pub extra_output: ExtraOutput,

    /// Conversations to archive (default: all)
    pub scope: SpaceScope,

    /// Folder under which one sub-folder per conversation is created
    pub output_dir: PathBuf,

    /// Sleep before retrying a rate-limited request (default: 3s)
    pub rate_limit_backoff: Duration,

    /// Messages requested per page (default: 900)
    pub message_page_size: usize,

    /// Memberships requested per page (default: 500)
    pub member_page_size: usize,

    /// Rooms requested per page (default: 900)
    pub room_page_size: usize,

    /// Person ids per profile lookup (default: 80, the API maximum)
    pub people_batch_size: usize,

    /// Avatar download attempts, first try included (default: 3)
    pub avatar_attempts: u32,

    /// Pause between avatar retry rounds (default: 1s)
    pub avatar_retry_delay: Duration,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            download: DownloadMode::default(),
            sort: SortOrder::default(),
            message_cap: MessageCap::default(),
            avatars: AvatarMode::default(),
            extra_output: ExtraOutput::default(),
            scope: SpaceScope::default(),
            output_dir: PathBuf::from("."),
            rate_limit_backoff: Duration::from_secs(3),
            message_page_size: 900,
            member_page_size: 500,
            room_page_size: 900,
            people_batch_size: MAX_PEOPLE_BATCH,
            avatar_attempts: 3,
            avatar_retry_delay: Duration::from_secs(1),
        }
    }
}

impl ArchiveConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API root.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the attachment download mode.
    #[must_use]
    pub fn with_download(mut self, mode: DownloadMode) -> Self {
        self.download = mode;
        self
    }

    /// Sets the message order.
    #[must_use]
    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the per-conversation message cap.
    #[must_use]
    pub fn with_message_cap(mut self, cap: MessageCap) -> Self {
        self.message_cap = cap;
        self
    }

    /// Sets the avatar mode.
    #[must_use]
    pub fn with_avatars(mut self, mode: AvatarMode) -> Self {
        self.avatars = mode;
        self
    }

    /// Sets the extra output.
    #[must_use]
    pub fn with_extra_output(mut self, output: ExtraOutput) -> Self {
        self.extra_output = output;
        self
    }

    /// Sets which conversations are archived.
    #[must_use]
    pub fn with_scope(mut self, scope: SpaceScope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the output folder.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the rate-limit backoff.
    #[must_use]
    pub fn with_rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.rate_limit_backoff = backoff;
        self
    }

    /// Sets the avatar retry policy.
    #[must_use]
    pub fn with_avatar_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.avatar_attempts = attempts;
        self.avatar_retry_delay = delay;
        self
    }

    /// Checks that numeric settings are in range.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        let page_sizes = [
            ("message_page_size", self.message_page_size),
            ("member_page_size", self.member_page_size),
            ("room_page_size", self.room_page_size),
        ];
        for (key, size) in page_sizes {
            if size == 0 {
                return Err(ArchiveError::invalid_config(key, "must be at least 1"));
            }
        }
        if !(1..=MAX_PEOPLE_BATCH).contains(&self.people_batch_size) {
            return Err(ArchiveError::invalid_config(
                "people_batch_size",
                format!("must be between 1 and {}", MAX_PEOPLE_BATCH),
            ));
        }
        if self.avatar_attempts == 0 {
            return Err(ArchiveError::invalid_config(
                "avatar_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

//! # space-archive
//!
//! A Rust library for archiving Webex spaces into self-contained HTML
//! documents, with downloaded attachments, avatars and per-space statistics.
//!
//! ## Overview
//!
//! For every conversation in scope the archiver:
//! - **fetches** the messages page by page, absorbing 429 responses with a
//!   fixed backoff and stopping at a message-count or age cap
//! - **orders** them so that thread replies follow their parent
//! - **resolves** attachments: names, sizes, collision-free local copies
//! - **renders** one HTML document with a month index, author headers,
//!   mentions and a statistics table, plus optional TXT and JSON exports
//!
//! Problems that do not stop the run (an attachment that cannot be
//! downloaded, a reply whose parent is outside the fetched window) are
//! collected in an [`AnomalyLog`](anomaly::AnomalyLog) and reported at the end.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use space_archive::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let token = std::env::var("WEBEX_TOKEN").unwrap_or_default();
//!     validate_token(&token)?;
//!
//!     let config = ArchiveConfig::new()
//!         .with_scope(SpaceScope::Group)
//!         .with_message_cap("60d".parse()?);
//!     let client = Client::new(ReqwestTransport::new(&token)?, &config);
//!
//!     let summary = ArchiveRun::new(client, config).run()?;
//!     for report in &summary.conversations {
//!         println!("{} -> {}", report.title, report.html.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Offline rendering
//!
//! The API client is generic over [`Transport`](api::Transport), so the
//! whole pipeline runs against canned responses as well:
//!
//! ```rust
//! use space_archive::api::{HttpResponse, ScriptedTransport};
//! use space_archive::prelude::*;
//!
//! let transport = ScriptedTransport::new().on_get(
//!     "https://webexapis.com/v1/people/me",
//!     &[],
//!     HttpResponse::new(401),
//! );
//! let client = Client::new(transport, &ArchiveConfig::new());
//! let err = client.me().unwrap_err();
//! assert!(err.is_fatal());
//! ```
//!
//! ## Module Structure
//!
//! - [`api`] - HTTP transport, pagination and rate-limit handling
//!   - [`Client`](api::Client), [`Transport`](api::Transport), [`Paged`](api::Paged)
//! - [`core`] - Per-conversation archive generation
//!   - [`core::order`] - [`ThreadOrder`](core::ThreadOrder)
//!   - [`core::attachment`] - [`AttachmentResolver`](core::AttachmentResolver)
//!   - [`core::avatar`] - [`AvatarMap`](core::AvatarMap)
//!   - [`core::render`] - [`Renderer`](core::Renderer)
//!   - [`core::output`] - [`ConversationFolder`](core::ConversationFolder), JSON export
//! - [`archive`] - [`ArchiveRun`](archive::ArchiveRun), the whole run
//! - [`config`] - [`ArchiveConfig`](config::ArchiveConfig) and option enums
//! - [`message`] - API record types ([`Message`], [`Room`](message::Room), ...)
//! - [`anomaly`] - Non-fatal problem log
//! - [`progress`] - Progress reporting
//! - [`error`] - Unified error types ([`ArchiveError`], [`Result`])
//! - [`prelude`] - Convenient re-exports

pub mod anomaly;
pub mod api;
pub mod archive;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod message;
pub mod progress;

// Re-export the main types at the crate root for convenience
pub use archive::{ArchiveRun, ArchiveSummary};
pub use config::ArchiveConfig;
pub use error::{ArchiveError, Result};
pub use message::Message;

/// Convenient re-exports for common usage.
///
/// ```rust
/// use space_archive::prelude::*;
/// ```
pub mod prelude {
    // Core message type
    pub use crate::Message;
    pub use crate::message::{Membership, Person, Room, RoomType};

    // Error types
    pub use crate::error::{ArchiveError, Result};

    // Configuration
    pub use crate::config::{
        ArchiveConfig, AvatarMode, DownloadMode, ExtraOutput, MessageCap, SortOrder, SpaceScope,
    };

    // API client
    pub use crate::api::{Client, Paged, ReqwestTransport, StopReason, validate_token};

    // Run orchestration
    pub use crate::archive::{ArchiveRun, ArchiveSummary, ConversationReport};

    // Building blocks
    pub use crate::anomaly::{Anomaly, AnomalyKind, AnomalyLog};
    pub use crate::core::{ConversationMeta, Renderer, Statistics, ThreadOrder};
    pub use crate::progress::{Progress, ProgressCallback};
}

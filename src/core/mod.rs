//! Archive generation for a single conversation.
//!
//! This module contains:
//! - [`order`] - Thread-order resolution ([`ThreadOrder`], [`OrderKey`])
//! - [`attachment`] - Attachment lookup, naming and download
//! - [`avatar`] - Avatar links, downloads and initials
//! - [`names`] - Email to display-name cache
//! - [`render`] - Stateful render pass and document assembly
//! - [`output`] - Conversation folders and JSON export
//!
//! Data flows one way: fetched messages are ordered, then rendered, with
//! attachments resolved on demand while rendering.

pub mod attachment;
pub mod avatar;
pub mod names;
pub mod order;
pub mod output;
pub mod render;

pub use attachment::{AttachmentKind, AttachmentRecord, AttachmentResolver, AttachmentSource, format_size};
pub use avatar::{AvatarMap, AvatarRef, AvatarRetry, build_avatar_map};
pub use names::NameCache;
pub use order::{OrderKey, ThreadOrder};
pub use output::{ConversationFolder, write_json};
pub use render::{ConversationMeta, Rendered, Renderer, Statistics};

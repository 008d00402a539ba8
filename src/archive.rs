//! Archive run orchestration.
//!
//! [`ArchiveRun`] drives the whole export: it lists the conversations in
//! scope and archives them one after the other. Each conversation goes
//! through the same steps:
//!
//! 1. skip it if it has no messages
//! 2. look up its title, fetch messages and member names
//! 3. create its output folder
//! 4. resolve avatars and write the optional JSON export
//! 5. order the messages, render, write the documents
//!
//! A failure inside one conversation is recorded and the run moves on. Only
//! a rejected token ([`crate::ArchiveError::is_fatal`]) stops the run.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use tracing::{error, info, warn};

use crate::anomaly::{AnomalyKind, AnomalyLog};
use crate::api::{Client, StopReason, Transport};
use crate::config::{ArchiveConfig, AvatarMode, SpaceScope};
use crate::core::{
    AttachmentResolver, AvatarMap, AvatarRetry, ConversationFolder, ConversationMeta, NameCache,
    Renderer, Statistics, ThreadOrder, build_avatar_map, write_json,
};
use crate::error::Result;
use crate::message::{Person, Room, RoomType, email_domain};
use crate::progress::ProgressCallback;

/// One archived conversation.
#[derive(Debug, Clone)]
pub struct ConversationReport {
    /// Conversation id.
    pub room_id: String,
    /// Conversation title.
    pub title: String,
    /// Output folder.
    pub folder: PathBuf,
    /// The HTML document.
    pub html: PathBuf,
    /// Render totals.
    pub stats: Statistics,
    /// Distinct authors in the archive.
    pub unique_authors: usize,
    /// The message cap cut the conversation short.
    pub truncated: bool,
}

/// A conversation that produced no archive.
#[derive(Debug, Clone)]
pub struct SkippedConversation {
    /// Conversation id.
    pub room_id: String,
    /// Title, when it could be fetched.
    pub title: Option<String>,
    /// Why it was skipped.
    pub reason: String,
}

/// Result of a whole run.
#[derive(Debug, Clone, Default)]
pub struct ArchiveSummary {
    /// Archived conversations.
    pub conversations: Vec<ConversationReport>,
    /// Empty or failed conversations.
    pub skipped: Vec<SkippedConversation>,
    /// Every non-fatal problem, in the order met.
    pub anomalies: AnomalyLog,
    /// 429 responses absorbed by backoff.
    pub rate_limit_hits: u64,
}

/// Who runs the archive; used for the header and external-domain marking.
#[derive(Debug, Clone, Default)]
struct Owner {
    name: String,
    domain: Option<String>,
}

impl Owner {
    fn from_person(person: &Person) -> Self {
        Self {
            name: person.display_name.clone(),
            domain: person
                .primary_email()
                .and_then(email_domain)
                .map(str::to_string),
        }
    }
}

/// Returns `true` if `room` falls under `scope`.
pub fn in_scope(room: &Room, scope: SpaceScope) -> bool {
    match scope {
        SpaceScope::All => true,
        SpaceScope::Direct => room.room_type == RoomType::Direct,
        SpaceScope::Group => room.room_type == RoomType::Group,
    }
}

/// A complete archive run.
pub struct ArchiveRun<T: Transport> {
    client: Client<T>,
    config: ArchiveConfig,
    names: NameCache,
    anomalies: AnomalyLog,
    offset: FixedOffset,
    now: Option<DateTime<Utc>>,
    progress: Option<ProgressCallback>,
}

impl<T: Transport> ArchiveRun<T> {
    /// Creates a run.
    pub fn new(client: Client<T>, config: ArchiveConfig) -> Self {
        Self {
            client,
            config,
            names: NameCache::new(),
            anomalies: AnomalyLog::new(),
            offset: Utc.fix(),
            now: None,
            progress: None,
        }
    }

    /// Shows message times in `offset` (default: UTC).
    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Pins the clock used for age caps and the "created" stamp.
    #[must_use]
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Reports attachment progress through `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// The display-name cache built so far.
    pub fn names(&self) -> &NameCache {
        &self.names
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn owner(&self) -> Result<Owner> {
        match self.client.me() {
            Ok(person) => Ok(Owner::from_person(&person)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Could not fetch own profile, external authors will not be marked");
                Ok(Owner::default())
            }
        }
    }

    /// Archives every conversation in the configured scope.
    pub fn run(self) -> Result<ArchiveSummary> {
        self.config.validate()?;
        let rooms = self.client.list_rooms()?;
        let scope = self.config.scope;
        let ids: Vec<String> = rooms
            .into_iter()
            .filter(|room| in_scope(room, scope))
            .map(|room| room.id)
            .collect();
        info!(scope = %scope, conversations = ids.len(), "Conversations in scope");
        self.run_rooms(&ids)
    }

    /// Archives the given conversations.
    pub fn run_rooms(mut self, room_ids: &[String]) -> Result<ArchiveSummary> {
        self.config.validate()?;
        let owner = self.owner()?;
        let mut summary = ArchiveSummary::default();

        for (index, room_id) in room_ids.iter().enumerate() {
            info!(room = %room_id, index = index + 1, total = room_ids.len(), "Archiving conversation");
            match self.archive_conversation(room_id, &owner) {
                Ok(Ok(report)) => summary.conversations.push(report),
                Ok(Err(skipped)) => summary.skipped.push(skipped),
                Err(e) if e.is_fatal() => {
                    error!(room = %room_id, error = %e, "Aborting run");
                    return Err(e);
                }
                Err(e) => {
                    warn!(room = %room_id, error = %e, "Conversation failed, moving on");
                    self.anomalies.push(
                        AnomalyKind::ConversationFailed,
                        None,
                        format!("{}: {}", room_id, e),
                    );
                    summary.skipped.push(SkippedConversation {
                        room_id: room_id.clone(),
                        title: None,
                        reason: e.to_string(),
                    });
                }
            }
        }

        summary.anomalies = self.anomalies;
        summary.rate_limit_hits = self.client.rate_limit_hits();
        Ok(summary)
    }

    /// Archives one conversation. `Ok(Err(_))` means it was skipped as empty.
    fn archive_conversation(
        &mut self,
        room_id: &str,
        owner: &Owner,
    ) -> Result<std::result::Result<ConversationReport, SkippedConversation>> {
        let skipped = |title: Option<&str>, reason: &str| SkippedConversation {
            room_id: room_id.to_string(),
            title: title.map(str::to_string),
            reason: reason.to_string(),
        };

        if !self.client.has_messages(room_id)? {
            info!(room = %room_id, "No messages, skipping");
            return Ok(Err(skipped(None, "no messages")));
        }

        let room = self.client.room(room_id)?;
        let title = room.title.clone();
        let now = self.now();

        let paged = self
            .client
            .list_messages_at(room_id, self.config.message_cap, now)?;
        if let StopReason::Failed { reason, .. } = &paged.stop {
            self.anomalies.push(
                AnomalyKind::RetrievalIncomplete,
                Some(&title),
                format!("messages: {}", reason),
            );
        }
        if paged.items.is_empty() {
            return Ok(Err(skipped(Some(&title), "no messages within the cap")));
        }
        let messages = paged.items;
        let truncated = paged.stop == StopReason::ItemCap;

        let member_count = match self.client.list_memberships(room_id) {
            Ok(members) => {
                if let StopReason::Failed { reason, .. } = &members.stop {
                    self.anomalies.push(
                        AnomalyKind::RetrievalIncomplete,
                        Some(&title),
                        format!("memberships: {}", reason),
                    );
                }
                self.names.learn_memberships(&members.items);
                members.items.len()
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(room = %room_id, error = %e, "Could not list members, showing emails");
                0
            }
        };

        let folder = ConversationFolder::create(&self.config.output_dir, &title, &self.config)?;
        info!(room = %room_id, folder = %folder.path().display(), messages = messages.len(), "Output folder ready");

        let avatars = if self.config.avatars == AvatarMode::None {
            AvatarMap::new()
        } else {
            let ids: Vec<String> = messages
                .iter()
                .map(|m| m.person_id.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let people = self.client.people(&ids)?;
            self.names.learn_people(&people);
            let mut avatar_anomalies = AnomalyLog::new();
            let retry = AvatarRetry {
                attempts: self.config.avatar_attempts,
                delay: self.config.avatar_retry_delay,
            };
            let map = build_avatar_map(
                &self.client,
                &people,
                self.config.avatars,
                folder.path(),
                retry,
                &mut avatar_anomalies,
            )?;
            self.anomalies.extend(avatar_anomalies, Some(&title));
            map
        };

        if self.config.extra_output.json() {
            write_json(&messages, &folder.document("json"))?;
        }

        let order = ThreadOrder::resolve(&messages);
        for id in order.dropped() {
            self.anomalies.push(
                AnomalyKind::OrphanedReply,
                Some(&title),
                format!("reply {} has no parent in the fetched window", id),
            );
        }
        let arranged = order.arrange(&messages, self.config.sort);

        let meta = ConversationMeta {
            title: title.clone(),
            owner: owner.name.clone(),
            generated_at: now,
            member_count,
            truncated,
        };
        let attachments = arranged.iter().map(|m| m.files.len()).sum();
        let mut resolver =
            AttachmentResolver::new(&self.client, folder.path(), self.config.download)
                .with_expected(attachments);
        if let Some(callback) = &self.progress {
            resolver = resolver.with_progress(callback.clone());
        }
        let rendered = Renderer::new(&self.config, &self.names, &avatars)
            .with_own_domain(owner.domain.as_deref())
            .with_offset(self.offset)
            .render(&meta, &arranged, &mut resolver)?;

        let html = folder.write_document("html", &rendered.html)?;
        if let Some(text) = &rendered.text {
            folder.write_document("txt", text)?;
        }
        self.anomalies.extend(rendered.anomalies, Some(&title));

        info!(
            room = %room_id,
            messages = rendered.stats.messages,
            images = rendered.stats.images,
            files = rendered.stats.files,
            "Conversation archived"
        );
        Ok(Ok(ConversationReport {
            room_id: room_id.to_string(),
            title,
            folder: folder.path().to_path_buf(),
            html,
            stats: rendered.stats,
            unique_authors: rendered.unique_authors,
            truncated,
        }))
    }
}

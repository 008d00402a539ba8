//! Non-fatal problems collected during an archive run.
//!
//! Anything that goes wrong for a single message, attachment or avatar is
//! recorded here instead of aborting. The binary prints the log at the end
//! of the run so the operator can check the affected archives by hand.

use std::fmt;

/// Category of a recorded anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    /// Attachment name missing or unusable; a placeholder was used.
    AttachmentName,
    /// Attachment bytes could not be downloaded.
    AttachmentDownload,
    /// Avatar still failing after every retry; initials are shown.
    AvatarDownload,
    /// Mention markup had to be replaced generically.
    MentionMarkup,
    /// Threaded reply whose parent is outside the fetched window.
    OrphanedReply,
    /// Retrieval stopped early; the archive holds a partial result.
    RetrievalIncomplete,
    /// A whole conversation was skipped.
    ConversationFailed,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnomalyKind::AttachmentName => "attachment name",
            AnomalyKind::AttachmentDownload => "attachment download",
            AnomalyKind::AvatarDownload => "avatar download",
            AnomalyKind::MentionMarkup => "mention markup",
            AnomalyKind::OrphanedReply => "orphaned reply",
            AnomalyKind::RetrievalIncomplete => "incomplete retrieval",
            AnomalyKind::ConversationFailed => "conversation failed",
        };
        f.write_str(label)
    }
}

/// One recorded anomaly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// Category.
    pub kind: AnomalyKind,
    /// Conversation title, when known.
    pub conversation: Option<String>,
    /// Free-form detail (file name, message id, status...).
    pub detail: String,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.conversation {
            Some(name) => write!(f, "[{}] {}: {}", self.kind, name, self.detail),
            None => write!(f, "[{}] {}", self.kind, self.detail),
        }
    }
}

/// Ordered list of anomalies.
#[derive(Debug, Clone, Default)]
pub struct AnomalyLog {
    entries: Vec<Anomaly>,
}

impl AnomalyLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an anomaly.
    pub fn push(
        &mut self,
        kind: AnomalyKind,
        conversation: Option<&str>,
        detail: impl Into<String>,
    ) {
        let detail = detail.into();
        tracing::debug!(kind = %kind, detail = %detail, "anomaly recorded");
        self.entries.push(Anomaly {
            kind,
            conversation: conversation.map(str::to_string),
            detail,
        });
    }

    /// Appends every entry of `other`, stamping entries that have no
    /// conversation with `conversation`.
    pub fn extend(&mut self, other: AnomalyLog, conversation: Option<&str>) {
        self.entries.extend(other.entries.into_iter().map(|mut a| {
            if a.conversation.is_none() {
                a.conversation = conversation.map(str::to_string);
            }
            a
        }));
    }

    /// Iterates over entries in recording order.
    pub fn iter(&self) -> std::slice::Iter<'_, Anomaly> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counts entries of one kind.
    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.entries.iter().filter(|a| a.kind == kind).count()
    }
}

impl<'a> IntoIterator for &'a AnomalyLog {
    type Item = &'a Anomaly;
    type IntoIter = std::slice::Iter<'a, Anomaly>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//! Plain-text transcript written next to the HTML archive.

use chrono::FixedOffset;

use super::state::{MonthKey, Statistics};
use super::{ConversationMeta, timezone_label};
use crate::core::attachment::AttachmentRecord;
use crate::config::ArchiveConfig;

const RULE: &str = "------------------------------------------------------------";
const INDENT: &str = "                           ";

/// Builds the `.txt` rendering of a conversation.
#[derive(Debug, Clone)]
pub struct TextTranscript {
    out: String,
}

impl TextTranscript {
    /// Starts a transcript with the settings header.
    pub fn new(meta: &ConversationMeta, config: &ArchiveConfig, offset: FixedOffset) -> Self {
        let created = meta.generated_at.with_timezone(&offset).format("%Y-%m-%d %H:%M");
        let mut out = String::new();
        out.push_str(&format!("{}\n {}\n{}\n", RULE, meta.title, RULE));
        out.push_str(&format!("Created:        {}\n", created));
        out.push_str(&format!("File download:  {}\n", config.download.to_string().to_uppercase()));
        out.push_str(&format!("Generated by:   {}\n", meta.owner));
        out.push_str(&format!("Sort:           {}\n", config.sort));
        out.push_str(&format!("Max messages:   {}\n", config.message_cap));
        out.push_str(&format!("Avatar:         {}\n", config.avatars));
        out.push_str(&format!("Version:        {}\n", env!("CARGO_PKG_VERSION")));
        out.push_str(&format!("Timezone:       {}\n", timezone_label(offset)));
        Self { out }
    }

    /// Adds a month separator.
    pub fn month(&mut self, month: MonthKey) {
        self.out
            .push_str(&format!("\n\n---------- {} ------------------------------\n\n", month));
    }

    /// Adds a message line. `body` is plain text, not HTML.
    pub fn message(&mut self, created: &str, email: &str, body: &str) {
        self.out.push_str(&format!("{}  {} - {}\n", created, email, body));
    }

    /// Adds an attachment line under the current message.
    pub fn attachment(&mut self, record: &AttachmentRecord) {
        let status = if record.failed { " - unavailable" } else { "" };
        self.out.push_str(&format!(
            "{}Attachment: {} ({}){}\n",
            INDENT, record.name, record.size, status
        ));
    }

    /// Appends the statistics block and returns the transcript.
    pub fn finish(mut self, stats: &Statistics, truncated: bool) -> String {
        self.out.push_str(&format!(
            "\n\n STATISTICS\n--------------------------\n # of messages : {}\n # of images   : {}\n # of files    : {}\n # of mentions : {}\n",
            stats.messages, stats.images, stats.files, stats.mentions
        ));
        if truncated {
            self.out.push_str(&format!(
                " (space contains more than {} messages)\n",
                stats.messages
            ));
        }
        self.out
    }
}

//! Records returned by the Webex API.
//!
//! [`Message`] is the central type: every conversation is fetched as a list of
//! messages, ordered by [`ThreadOrder`](crate::core::order::ThreadOrder) and
//! rendered by the [render pipeline](crate::core::render). The remaining
//! types ([`Room`], [`Membership`], [`Person`]) carry just the fields the
//! archiver needs.
//!
//! Field names follow the API's camelCase JSON so that a fetched collection
//! can be written back out unchanged as the optional JSON export.
//!
//! # Example
//!
//! ```
//! use space_archive::Message;
//!
//! let json = r#"{
//!     "id": "M1",
//!     "personId": "P1",
//!     "personEmail": "alice@example.com",
//!     "created": "2024-03-01T09:00:00.000Z",
//!     "text": "Hello!"
//! }"#;
//! let msg: Message = serde_json::from_str(json)?;
//! assert_eq!(msg.author_domain(), Some("example.com"));
//! assert!(!msg.is_threaded());
//! # Ok::<(), serde_json::Error>(())
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single message in a conversation.
///
/// Messages are immutable once fetched. A message with a
/// [`parent_id`](Message::parent_id) is a threaded reply; its parent may lie
/// outside the fetched window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier.
    pub id: String,

    /// Identifier of the author.
    #[serde(default)]
    pub person_id: String,

    /// Email address of the author.
    #[serde(default)]
    pub person_email: String,

    /// When the message was posted.
    pub created: DateTime<Utc>,

    /// When the message was last edited, if ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    /// Parent message identifier for threaded replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    /// Plain-text body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Rich (HTML) body. Takes precedence over `text` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// Attachment URLs, in posting order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// Person identifiers mentioned in the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_people: Vec<String>,

    /// Group mentions (e.g. `all`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_groups: Vec<String>,
}

/// The body of a message: rich markup, plain text, or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBody<'a> {
    /// HTML produced by the client's rich-text editor.
    Rich(&'a str),
    /// Plain text, rendered escaped.
    Plain(&'a str),
    /// No textual content (attachment-only or mention-only messages).
    Empty,
}

impl MessageBody<'_> {
    /// Returns `true` when there is no text to render.
    pub fn is_empty(&self) -> bool {
        match self {
            MessageBody::Rich(s) | MessageBody::Plain(s) => s.is_empty(),
            MessageBody::Empty => true,
        }
    }
}

impl Message {
    /// Creates a top-level plain-text message.
    pub fn new(
        id: impl Into<String>,
        person_email: impl Into<String>,
        created: DateTime<Utc>,
        text: impl Into<String>,
    ) -> Self {
        let person_email = person_email.into();
        Self {
            id: id.into(),
            person_id: person_email.clone(),
            person_email,
            created,
            updated: None,
            parent_id: None,
            text: Some(text.into()),
            html: None,
            files: Vec::new(),
            mentioned_people: Vec::new(),
            mentioned_groups: Vec::new(),
        }
    }

    // =========================================================================
    // Builder methods
    // =========================================================================

    /// Marks this message as a threaded reply to `parent`.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Sets the author identifier.
    #[must_use]
    pub fn with_person_id(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = person_id.into();
        self
    }

    /// Sets the rich body.
    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Sets the edit timestamp.
    #[must_use]
    pub fn with_updated(mut self, ts: DateTime<Utc>) -> Self {
        self.updated = Some(ts);
        self
    }

    /// Appends an attachment URL.
    #[must_use]
    pub fn with_file(mut self, url: impl Into<String>) -> Self {
        self.files.push(url.into());
        self
    }

    /// Adds a mentioned person.
    #[must_use]
    pub fn with_mention(mut self, person_id: impl Into<String>) -> Self {
        self.mentioned_people.push(person_id.into());
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the body, preferring rich markup over plain text.
    pub fn body(&self) -> MessageBody<'_> {
        match (&self.html, &self.text) {
            (Some(html), _) => MessageBody::Rich(html),
            (None, Some(text)) => MessageBody::Plain(text),
            (None, None) => MessageBody::Empty,
        }
    }

    /// Returns `true` for threaded replies.
    pub fn is_threaded(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Returns `true` if the message was edited after posting.
    pub fn is_edited(&self) -> bool {
        self.updated.is_some()
    }

    /// Returns `true` if the message mentions anyone.
    pub fn has_mentions(&self) -> bool {
        !self.mentioned_people.is_empty() || !self.mentioned_groups.is_empty()
    }

    /// Returns the domain part of the author's email address.
    pub fn author_domain(&self) -> Option<&str> {
        email_domain(&self.person_email)
    }
}

/// Returns the part of `email` after the last `@`.
pub fn email_domain(email: &str) -> Option<&str> {
    email
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|d| !d.is_empty())
}

/// Kind of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    /// One-to-one conversation
    Direct,
    /// Group space
    Group,
    /// Anything the API adds later
    #[serde(other)]
    Other,
}

/// A conversation ("space" or "room").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Room identifier.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Direct or group.
    #[serde(rename = "type")]
    pub room_type: RoomType,
    /// Timestamp of the last activity, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
}

/// A room membership, used to map author emails to display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// Member email address.
    #[serde(default)]
    pub person_email: String,
    /// Member display name, absent for some bots and deleted users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_display_name: Option<String>,
}

/// A person profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Person identifier.
    pub id: String,
    /// Email addresses.
    #[serde(default)]
    pub emails: Vec<String>,
    /// Display name.
    #[serde(default)]
    pub display_name: String,
    /// Avatar URL, if the person set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Person {
    /// Returns the primary email address.
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_deserialize_api_message() {
        let json = r#"{
            "id": "M2",
            "roomId": "R1",
            "roomType": "group",
            "text": "see attached",
            "html": "<p>see <b>attached</b></p>",
            "files": ["https://webexapis.com/v1/contents/C1"],
            "personId": "P1",
            "personEmail": "bob@partner.org",
            "parentId": "M1",
            "mentionedPeople": ["P2"],
            "created": "2024-03-01T09:00:05.123Z",
            "updated": "2024-03-01T09:10:00.000Z"
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.parent_id.as_deref(), Some("M1"));
        assert!(msg.is_threaded());
        assert!(msg.is_edited());
        assert!(msg.has_mentions());
        assert_eq!(msg.files.len(), 1);
        assert_eq!(msg.body(), MessageBody::Rich("<p>see <b>attached</b></p>"));
    }

    #[test]
    fn test_body_variants() {
        let plain = Message::new("M1", "a@x.com", ts(), "hi");
        assert_eq!(plain.body(), MessageBody::Plain("hi"));

        let mut empty = Message::new("M2", "a@x.com", ts(), "");
        empty.text = None;
        assert_eq!(empty.body(), MessageBody::Empty);
        assert!(empty.body().is_empty());
        assert!(MessageBody::Plain("").is_empty());
    }

    #[test]
    fn test_serialization_omits_absent_fields() {
        let msg = Message::new("M1", "a@x.com", ts(), "hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"personEmail\":\"a@x.com\""));
        assert!(!json.contains("parentId"));
        assert!(!json.contains("files"));
    }

    #[test]
    fn test_email_domain() {
        assert_eq!(email_domain("alice@example.com"), Some("example.com"));
        assert_eq!(email_domain("no-at-sign"), None);
        assert_eq!(email_domain("trailing@"), None);
    }

    #[test]
    fn test_room_type_unknown_variant() {
        let room: Room =
            serde_json::from_str(r#"{"id":"R1","title":"Team","type":"team"}"#).unwrap();
        assert_eq!(room.room_type, RoomType::Other);
    }
}

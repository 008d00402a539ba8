//! Rendering pipeline.
//!
//! One left-to-right pass over the ordered messages of a conversation. The
//! pass threads a [`RenderState`] through every message to decide where
//! month separators and author headers go, resolves attachments through an
//! [`AttachmentSource`], and accumulates the statistics shown at the top of
//! the document.
//!
//! - [`markup`]: body rewriting (escaping, links, mentions)
//! - [`state`]: [`RenderState`], [`MonthKey`], [`Statistics`]
//! - [`html`]: document assembly
//! - [`text`]: plain-text transcript

pub mod html;
pub mod markup;
pub mod state;
pub mod text;

use chrono::{DateTime, FixedOffset, Offset, Utc};

pub use markup::{Markup, escape_html};
pub use state::{MonthKey, RenderState, Statistics};
pub use text::TextTranscript;

use super::attachment::{AttachmentKind, AttachmentRecord, AttachmentSource};
use super::avatar::{AvatarMap, initials};
use super::names::NameCache;
use crate::anomaly::{AnomalyKind, AnomalyLog};
use crate::config::{ArchiveConfig, DownloadMode};
use crate::error::Result;
use crate::message::{Message, MessageBody, email_domain};

/// Facts about the conversation shown in the document header.
#[derive(Debug, Clone)]
pub struct ConversationMeta {
    /// Conversation title.
    pub title: String,
    /// Display name of the person running the archive.
    pub owner: String,
    /// When the archive was generated.
    pub generated_at: DateTime<Utc>,
    /// Members of the conversation.
    pub member_count: usize,
    /// More messages existed than were fetched.
    pub truncated: bool,
}

/// Output of a render pass.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Complete HTML document.
    pub html: String,
    /// Plain-text transcript, if enabled.
    pub text: Option<String>,
    /// Totals of the pass.
    pub stats: Statistics,
    /// Distinct authors rendered.
    pub unique_authors: usize,
    /// Problems met while rendering, attachments included.
    pub anomalies: AnomalyLog,
}

/// Formats a message timestamp for display.
///
/// ```rust
/// use chrono::{FixedOffset, TimeZone, Utc};
/// use space_archive::core::render::display_time;
///
/// let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
/// let utc = FixedOffset::east_opt(0).unwrap();
/// assert_eq!(display_time(ts, utc, false), "Friday, 09:05      (Mar 01, 2024)");
/// assert_eq!(display_time(ts, utc, true), "Friday, 09:05      (Mar 01, 2024)  Edited");
/// ```
pub fn display_time(ts: DateTime<Utc>, offset: FixedOffset, edited: bool) -> String {
    let mut text = ts
        .with_timezone(&offset)
        .format("%A, %H:%M      (%b %d, %Y)")
        .to_string();
    if edited {
        text.push_str("  Edited");
    }
    text
}

/// Human-readable name of a fixed offset ("UTC+02:00").
pub fn timezone_label(offset: FixedOffset) -> String {
    format!("UTC{}", offset)
}

/// Renders conversations.
pub struct Renderer<'a> {
    config: &'a ArchiveConfig,
    names: &'a NameCache,
    avatars: &'a AvatarMap,
    own_domain: Option<&'a str>,
    offset: FixedOffset,
    markup: Markup,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer showing times in UTC.
    pub fn new(config: &'a ArchiveConfig, names: &'a NameCache, avatars: &'a AvatarMap) -> Self {
        Self {
            config,
            names,
            avatars,
            own_domain: None,
            offset: Utc.fix(),
            markup: Markup::new(),
        }
    }

    /// Marks authors outside `domain` as external.
    #[must_use]
    pub fn with_own_domain(mut self, domain: Option<&'a str>) -> Self {
        self.own_domain = domain;
        self
    }

    /// Shows times in `offset`.
    #[must_use]
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Renders `messages`, already in presentation order.
    pub fn render(
        &self,
        meta: &ConversationMeta,
        messages: &[&Message],
        attachments: &mut dyn AttachmentSource,
    ) -> Result<Rendered> {
        let mut state = RenderState::new();
        let mut anomalies = AnomalyLog::new();
        let mut stream = String::new();
        let mut transcript = self
            .config
            .extra_output
            .text()
            .then(|| TextTranscript::new(meta, self.config, self.offset));

        for msg in messages {
            let body = msg.body();
            if body.is_empty() && msg.files.is_empty() && !msg.has_mentions() {
                continue;
            }

            let threaded = msg.is_threaded();
            let month = MonthKey::of(msg.created, self.offset);
            if state.needs_month_separator(month, threaded) {
                stream.push_str(&format!(
                    "<div class='cssNewMonth' id='{}'>{}</div>\n",
                    month.anchor(),
                    month
                ));
                if let Some(t) = transcript.as_mut() {
                    t.month(month);
                }
            }

            stream.push_str(if threaded {
                "<div class='css_message_thread'>"
            } else {
                "<div class='css_message'>"
            });
            if state.needs_header(msg) {
                stream.push_str(&self.header(msg));
            }

            let text = match body {
                MessageBody::Rich(html) => {
                    let html = self.markup.widen_click_handlers(html);
                    let (html, unresolved) = self.markup.replace_mentions(&html, msg);
                    if unresolved {
                        anomalies.push(
                            AnomalyKind::MentionMarkup,
                            None,
                            format!("unresolved mention in message {}", msg.id),
                        );
                    }
                    html
                }
                MessageBody::Plain(text) => self.markup.linkify(text),
                MessageBody::Empty => String::new(),
            };
            stream.push_str("<div class='css_messagetext'>");
            stream.push_str(&text);
            if let Some(t) = transcript.as_mut() {
                let created = msg.created.with_timezone(&self.offset).to_rfc3339();
                let plain = match body {
                    MessageBody::Plain(raw) => raw.to_string(),
                    _ => self.markup.plain_text(&text),
                };
                t.message(&created, &msg.person_email, &plain);
            }

            if !msg.files.is_empty() {
                let mut records = attachments.resolve(&msg.files)?;
                records.sort_by_key(AttachmentRecord::is_image);
                if !text.is_empty() {
                    stream.push_str("<br>");
                }
                for record in &records {
                    match record.kind {
                        AttachmentKind::Image => state.stats.images += 1,
                        AttachmentKind::File => state.stats.files += 1,
                    }
                    stream.push_str(&self.attachment(record));
                    if let Some(t) = transcript.as_mut() {
                        t.attachment(record);
                    }
                }
            }
            stream.push_str("</div></div>\n");

            state.record(msg, month, threaded, msg.has_mentions());
        }

        anomalies.extend(attachments.take_anomalies(), None);
        let html = html::document(meta, self.config, self.offset, &state, &stream);
        let text = transcript.map(|t| t.finish(&state.stats, meta.truncated));

        Ok(Rendered {
            html,
            text,
            stats: state.stats,
            unique_authors: state.unique_authors(),
            anomalies,
        })
    }

    fn header(&self, msg: &Message) -> String {
        let email = msg.person_email.as_str();
        let name = self.names.display_name(email);

        let avatar = match self.avatars.get(&msg.person_id) {
            Some(avatar) => format!(
                "<img src='{}' class='avatarCircle' width='36px' height='36px'/>",
                escape_html(avatar.src())
            ),
            None => format!("<div class='avatarCircle'>{}</div>", escape_html(&initials(name))),
        };

        let external = match (self.own_domain, email_domain(email)) {
            (Some(own), Some(domain)) if !own.eq_ignore_ascii_case(domain) => format!(
                " <span class='css_email_external'>(@{})</span>",
                escape_html(domain)
            ),
            _ => String::new(),
        };

        format!(
            "<div class='css_header'>{}<span class='css_email' title='{}'>{}</span>{}<span class='css_created'>{}</span></div>",
            avatar,
            escape_html(email),
            escape_html(name),
            external,
            display_time(msg.created, self.offset, msg.is_edited())
        )
    }

    fn attachment(&self, record: &AttachmentRecord) -> String {
        let name = escape_html(&record.name);
        let size = escape_html(&record.size);
        if record.failed {
            return format!(
                "<br><div class='fileicon'></div><span class='css_file css_failed'>{} ({}) - unavailable</span>",
                name, size
            );
        }
        match (record.kind, record.link()) {
            (AttachmentKind::Image, Some(link)) => format!(
                "<div class='css_image'><img src='{}' title='click to zoom' onclick='onClick(this)'/><br>{}<br><div class='filesize'>{}</div></div>",
                escape_html(&link),
                name,
                size
            ),
            (AttachmentKind::File, Some(link)) if self.config.download == DownloadMode::All => format!(
                "<br><div class='fileicon'></div><span class='css_file'><a href='{}'>{}</a> ({})</span>",
                escape_html(&link),
                name,
                size
            ),
            _ => format!(
                "<br><div class='fileicon'></div><span class='css_file'>{} ({})</span>",
                name, size
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtraOutput, SortOrder};
    use crate::core::ThreadOrder;
    use crate::core::avatar::AvatarRef;
    use crate::message::Membership;
    use chrono::TimeZone;
    use std::path::PathBuf;

    /// Serves canned records keyed by URL.
    struct FakeAttachments;

    impl AttachmentSource for FakeAttachments {
        fn resolve(&mut self, urls: &[String]) -> Result<Vec<AttachmentRecord>> {
            Ok(urls
                .iter()
                .map(|url| {
                    let name = url.rsplit('/').next().unwrap_or_default().to_string();
                    let kind = AttachmentKind::of(&name);
                    AttachmentRecord {
                        url: url.clone(),
                        stored: Some(PathBuf::from(kind.subfolder()).join(&name)),
                        name,
                        size: "1.0 KB".into(),
                        kind,
                        failed: false,
                    }
                })
                .collect())
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn meta() -> ConversationMeta {
        ConversationMeta {
            title: "Team".into(),
            owner: "Ada".into(),
            generated_at: t(0),
            member_count: 2,
            truncated: false,
        }
    }

    fn names() -> NameCache {
        let mut names = NameCache::new();
        names.learn_memberships(&[Membership {
            person_email: "ada@home.com".into(),
            person_display_name: Some("Ada Lovelace".into()),
        }]);
        names
    }

    fn render(config: &ArchiveConfig, messages: &[Message]) -> Rendered {
        let names = names();
        let avatars = AvatarMap::new();
        let renderer = Renderer::new(config, &names, &avatars).with_own_domain(Some("home.com"));
        let refs: Vec<&Message> = messages.iter().collect();
        renderer.render(&meta(), &refs, &mut FakeAttachments).unwrap()
    }

    #[test]
    fn test_same_author_within_a_minute_shares_header() {
        let msgs = vec![
            Message::new("M1", "ada@home.com", t(0), "one"),
            Message::new("M2", "ada@home.com", t(5), "two").with_parent("M1"),
            Message::new("M3", "ada@home.com", t(120), "three"),
        ];
        let out = render(&ArchiveConfig::new(), &msgs);
        assert_eq!(out.html.matches("<div class='css_header'>").count(), 2);
        assert_eq!(out.html.matches("<div class='css_message_thread'>").count(), 1);
        assert_eq!(out.html.matches("class='cssNewMonth' id='2024-03'").count(), 1);
        assert_eq!(out.stats.messages, 3);

        let one = out.html.find(">one<").unwrap();
        let two = out.html.find(">two<").unwrap();
        let three = out.html.find(">three<").unwrap();
        assert!(one < two && two < three);
    }

    #[test]
    fn test_empty_messages_are_skipped() {
        let mut empty = Message::new("M1", "ada@home.com", t(0), "");
        empty.text = None;
        let msgs = vec![empty, Message::new("M2", "ada@home.com", t(1), "hi")];
        let out = render(&ArchiveConfig::new(), &msgs);
        assert_eq!(out.stats.messages, 1);
        assert_eq!(out.html.matches("<div class='css_header'>").count(), 1);
    }

    #[test]
    fn test_external_author_is_marked() {
        let msgs = vec![
            Message::new("M1", "ada@home.com", t(0), "inside"),
            Message::new("M2", "bob@partner.org", t(1), "outside"),
        ];
        let out = render(&ArchiveConfig::new(), &msgs);
        assert_eq!(out.html.matches("<span class='css_email_external'>").count(), 1);
        assert!(out.html.contains("(@partner.org)"));
        assert!(out.html.contains(">Ada Lovelace</span>"));
        assert!(out.html.contains("<div class='avatarCircle'>AL</div>"));
        assert!(out.html.contains("<div class='avatarCircle'>BO</div>"));
    }

    #[test]
    fn test_mentions_counted_once_per_message() {
        let msgs = vec![
            Message::new("M1", "ada@home.com", t(0), "")
                .with_html(concat!(
                    r#"<spark-mention data-object-type="person" data-object-id="P2">Bob</spark-mention> "#,
                    r#"<spark-mention data-object-type="person" data-object-id="P3">Cy</spark-mention>"#
                ))
                .with_mention("P2")
                .with_mention("P3"),
        ];
        let out = render(&ArchiveConfig::new(), &msgs);
        assert_eq!(out.stats.mentions, 1);
        assert!(out.html.contains("<span class='css_mention'>@Bob</span>"));
        assert!(out.anomalies.is_empty());
    }

    #[test]
    fn test_files_listed_before_images() {
        let msgs = vec![
            Message::new("M1", "ada@home.com", t(0), "see")
                .with_file("https://f.test/photo.png")
                .with_file("https://f.test/notes.pdf"),
        ];
        let out = render(&ArchiveConfig::new(), &msgs);
        let pdf = out.html.find("notes.pdf").unwrap();
        let png = out.html.find("photo.png").unwrap();
        assert!(pdf < png);
        assert_eq!(out.stats.images, 1);
        assert_eq!(out.stats.files, 1);
        assert!(out.html.contains("<a href='files/notes.pdf'>notes.pdf</a>"));
        assert!(out.html.contains("<img src='images/photo.png'"));
    }

    #[test]
    fn test_plain_text_is_escaped_and_linked() {
        let msgs = vec![Message::new("M1", "ada@home.com", t(0), "<b>x</b> https://example.com")];
        let out = render(&ArchiveConfig::new(), &msgs);
        assert!(out.html.contains("&lt;b&gt;x&lt;/b&gt; <a href='https://example.com' target='_blank'>"));
    }

    #[test]
    fn test_avatar_image_used_when_known() {
        let config = ArchiveConfig::new();
        let names = names();
        let mut avatars = AvatarMap::new();
        avatars.insert("ada@home.com", AvatarRef::Local("avatars/P1".into()));
        let renderer = Renderer::new(&config, &names, &avatars);
        let msg = Message::new("M1", "ada@home.com", t(0), "hi");
        let out = renderer.render(&meta(), &[&msg], &mut FakeAttachments).unwrap();
        assert!(out.html.contains("<img src='avatars/P1' class='avatarCircle'"));
    }

    #[test]
    fn test_text_transcript_when_enabled() {
        let config = ArchiveConfig::new().with_extra_output(ExtraOutput::Text);
        let msgs = vec![Message::new("M1", "ada@home.com", t(0), "hello")];
        let out = render(&config, &msgs);
        let text = out.text.unwrap();
        assert!(text.contains("ada@home.com - hello"));
        assert!(text.contains("# of messages : 1"));

        let out = render(&ArchiveConfig::new(), &msgs);
        assert!(out.text.is_none());
    }

    #[test]
    fn test_transcript_carries_unescaped_text() {
        let config = ArchiveConfig::new().with_extra_output(ExtraOutput::Text);
        let msgs = vec![
            Message::new("M1", "ada@home.com", t(0), "R&D says a < b \"ok\""),
            Message::new("M2", "ada@home.com", t(300), "")
                .with_html("<p>Q&amp;A at <b>5</b> &gt; 4 &#39;pm&#39;</p>"),
        ];
        let out = render(&config, &msgs);
        assert!(out.html.contains("R&amp;D says a &lt; b &quot;ok&quot;"));

        let text = out.text.unwrap();
        assert!(text.contains("ada@home.com - R&D says a < b \"ok\"\n"), "{}", text);
        assert!(text.contains("ada@home.com - Q&A at 5 > 4 'pm'\n"), "{}", text);
        assert!(!text.contains("&amp;"));
    }

    #[test]
    fn test_newest_first_document() {
        let feb = Utc.with_ymd_and_hms(2024, 2, 20, 10, 0, 0).unwrap();
        // API order: newest first.
        let messages = vec![
            Message::new("B2", "bob@partner.org", t(86_400), "march second"),
            Message::new("B1", "ada@home.com", t(0), "march first"),
            Message::new("A2", "ada@home.com", feb + chrono::Duration::seconds(30), "february reply")
                .with_parent("A1"),
            Message::new("A1", "ada@home.com", feb, "february root"),
        ];
        let config = ArchiveConfig::new().with_sort(SortOrder::NewestFirst);
        let arranged = ThreadOrder::resolve(&messages).arrange(&messages, SortOrder::NewestFirst);
        let names = names();
        let avatars = AvatarMap::new();
        let out = Renderer::new(&config, &names, &avatars)
            .render(&meta(), &arranged, &mut FakeAttachments)
            .unwrap();
        let html = &out.html;

        let toc_march = html.find("<a href='#2024-03'>").unwrap();
        let toc_feb = html.find("<a href='#2024-02'>").unwrap();
        assert!(toc_march < toc_feb);

        let sep_march = html.find("id='2024-03'").unwrap();
        let sep_feb = html.find("id='2024-02'").unwrap();
        assert!(sep_march < sep_feb);

        let order: Vec<usize> = ["march second", "march first", "february root", "february reply"]
            .iter()
            .map(|text| html.find(&format!(">{}<", text)).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{:?}", order);
        assert!(sep_march < order[0] && order[1] < sep_feb && sep_feb < order[2]);

        // Same author within a minute: the reply renders without a header.
        assert!(html.contains(
            "<div class='css_message_thread'><div class='css_messagetext'>february reply"
        ));
        assert_eq!(html.matches("<div class='css_header'>").count(), 3);
        assert_eq!(html.matches("class='cssNewMonth' id='2024-").count(), 2);
    }
}

//! Message body rewriting.
//!
//! Plain bodies are escaped and get their bare URLs turned into links. Rich
//! bodies are already HTML: only their mention tags and link click handlers
//! are rewritten.

use regex::{NoExpand, Regex};

use crate::message::Message;

const MENTION_OPEN: &str = "<span class='css_mention'>@";
const CLICK_HANDLER_MARKER: &str = "sparkBase.clickEventHandler(event)";
const NEW_TAB: &str = " target='_blank'";

/// Escapes text for use in HTML content and single- or double-quoted
/// attributes.
///
/// ```rust
/// use space_archive::core::render::escape_html;
///
/// assert_eq!(escape_html("<b>\"R&D\"</b>"), "&lt;b&gt;&quot;R&amp;D&quot;&lt;/b&gt;");
/// ```
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Compiled patterns for body rewriting.
#[derive(Debug, Clone)]
pub struct Markup {
    url: Regex,
    alt_handler: Regex,
    onclick_handler: Regex,
    any_mention: Regex,
    tag: Regex,
    entity: Regex,
}

impl Default for Markup {
    fn default() -> Self {
        Self::new()
    }
}

impl Markup {
    /// Compiles the patterns.
    pub fn new() -> Self {
        Self {
            url: Regex::new(
                r"(?:http|ftp|https)://[\w_-]+(?:\.[\w_-]+)+(?:[\w.,@?^=%&!:/~+#-]*[\w@?^=%&/~+#-])?",
            )
            .expect("url pattern is valid"),
            alt_handler: Regex::new(r#"alt=.*?event\);""#).expect("alt pattern is valid"),
            onclick_handler: Regex::new(r#" onClick=.*?event\);""#)
                .expect("onClick pattern is valid"),
            any_mention: Regex::new(r"<spark-mention[^>]*>").expect("mention pattern is valid"),
            tag: Regex::new(r"<[^>]*>").expect("tag pattern is valid"),
            entity: Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]+);")
                .expect("entity pattern is valid"),
        }
    }

    /// Escapes plain text and turns `http`, `https` and `ftp` URLs into
    /// links opening in a new tab.
    ///
    /// ```rust
    /// use space_archive::core::render::Markup;
    ///
    /// let markup = Markup::new();
    /// assert_eq!(
    ///     markup.linkify("see https://example.com/a?b=1&c=2 <now>"),
    ///     "see <a href='https://example.com/a?b=1&amp;c=2' target='_blank'>https://example.com/a?b=1&amp;c=2</a> &lt;now&gt;"
    /// );
    /// ```
    pub fn linkify(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for found in self.url.find_iter(text) {
            out.push_str(&escape_html(&text[last..found.start()]));
            let url = escape_html(found.as_str());
            out.push_str(&format!("<a href='{}'{}>{}</a>", url, NEW_TAB, url));
            last = found.end();
        }
        out.push_str(&escape_html(&text[last..]));
        out
    }

    /// Makes links produced by the desktop client's click handlers open in a
    /// new tab. Bodies without those handlers are returned unchanged.
    pub fn widen_click_handlers(&self, html: &str) -> String {
        if !html.contains(CLICK_HANDLER_MARKER) {
            return html.to_string();
        }
        let html = self.alt_handler.replace_all(html, NoExpand(NEW_TAB));
        self.onclick_handler
            .replace_all(&html, NoExpand(NEW_TAB))
            .into_owned()
    }

    /// Replaces mention tags with a highlighted `@` token.
    ///
    /// Tags for the people and groups listed on `msg` are replaced exactly.
    /// Any other mention tag is replaced generically; the returned flag is
    /// `true` when that happened.
    pub fn replace_mentions(&self, html: &str, msg: &Message) -> (String, bool) {
        let mut out = html.to_string();
        for person in &msg.mentioned_people {
            let tag = format!(
                "<spark-mention data-object-type=\"person\" data-object-id=\"{}\">",
                person
            );
            out = out.replace(&tag, MENTION_OPEN);
        }
        for group in &msg.mentioned_groups {
            let tag = format!(
                "<spark-mention data-object-type=\"groupMention\" data-group-type=\"{}\">",
                group
            );
            out = out.replace(&tag, MENTION_OPEN);
        }

        let unresolved = self.any_mention.is_match(&out);
        if unresolved {
            out = self
                .any_mention
                .replace_all(&out, NoExpand(MENTION_OPEN))
                .into_owned();
        }
        (out.replace("</spark-mention>", "</span>"), unresolved)
    }

    /// Removes every tag.
    pub fn strip_tags(&self, html: &str) -> String {
        self.tag.replace_all(html, "").into_owned()
    }

    /// Turns an HTML fragment into readable text: tags are removed and
    /// character references decoded. Unknown references are kept as written.
    ///
    /// ```rust
    /// use space_archive::core::render::Markup;
    ///
    /// let markup = Markup::new();
    /// assert_eq!(
    ///     markup.plain_text("<p>R&amp;D: a &lt; b &#8594; &quot;ok&quot;&nbsp;&bogus;</p>"),
    ///     "R&D: a < b \u{2192} \"ok\"\u{a0}&bogus;"
    /// );
    /// ```
    pub fn plain_text(&self, html: &str) -> String {
        let text = self.strip_tags(html);
        self.entity
            .replace_all(&text, |caps: &regex::Captures<'_>| match decode_entity(&caps[1]) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse().ok().and_then(char::from_u32);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

//! Archive document assembly.
//!
//! The message stream is produced by the pipeline; this module wraps it with
//! the header block, the index/statistics/domain tables, the footer anchor
//! and the image zoom script.

use chrono::FixedOffset;

use super::markup::escape_html;
use super::state::RenderState;
use super::{ConversationMeta, timezone_label};
use crate::config::{ArchiveConfig, SortOrder};

/// Domains listed in the domain table.
pub const TOP_DOMAINS: usize = 10;

const STYLE: &str = r#"<style>
body { font-family: "Helvetica Neue", Arial, sans-serif; font-size: 14px; margin: 0 24px; color: #222; }
a { color: #07c; text-decoration: none; }
.cssRoomName { background: #eef3f7; border-radius: 6px; padding: 18px 20px; font-size: 26px; margin-top: 16px; overflow: auto; }
.cssRoomName .meta { display: block; margin-top: 8px; font-size: 12px; color: #4a4d4a; }
.cssRoomName .meta b { color: #000; font-weight: normal; }
.myheader { width: 100%; margin-top: 12px; }
.myheader td { vertical-align: top; padding-right: 24px; }
.mytoc td { font-size: 13px; padding: 1px 8px 1px 0; }
.mytoc .count { color: grey; font-size: 12px; }
.cssNewMonth { background: #f3f3f3; border-top: 1px solid #ddd; font-size: 22px; padding: 14px 10px; margin-top: 28px; }
.css_message, .css_message_thread { margin: 2px 0 2px 0; padding: 2px 0 2px 50px; position: relative; }
.css_message_thread { margin-left: 50px; border-left: 3px solid #e4e4e4; }
.css_header { margin-top: 12px; }
.avatarCircle { position: absolute; left: 4px; width: 36px; height: 36px; border-radius: 50%; background: #6b8ba4; color: #fff; text-align: center; line-height: 36px; font-size: 14px; }
.css_email { font-weight: bold; }
.css_email_external { color: #d2691e; font-size: 12px; }
.css_created { color: #888; font-size: 11px; margin-left: 12px; }
.css_messagetext { white-space: pre-wrap; }
.css_mention { color: red; display: inline; }
.css_image { display: inline-block; margin: 6px 10px 6px 0; font-size: 11px; color: #555; }
.css_image img { max-width: 280px; max-height: 200px; cursor: zoom-in; }
.css_file { line-height: 32px; }
.css_failed { color: #b00; }
.filesize { color: #999; }
.fileicon { display: inline-block; width: 14px; height: 18px; margin-right: 6px; vertical-align: middle; border: 1px solid #999; border-radius: 2px; }
.image-modal { display: none; position: fixed; z-index: 10; left: 0; top: 0; width: 100%; height: 100%; background: rgba(0, 0, 0, 0.85); }
.image-modal-content { margin: 40px auto; text-align: center; }
.imagepopup { max-width: 90%; max-height: 90vh; }
#myBtn { display: none; position: fixed; bottom: 20px; right: 30px; z-index: 9; }
</style>"#;

const SCRIPT: &str = r#"<div id="modal01" class="image-modal" onclick="this.style.display='none'">
  <div class="image-modal-content"><img id="img01" class="imagepopup"></div>
</div>
<button onclick="topFunction()" id="myBtn" title="Go to top">top</button>
<script>
function onClick(element) {
  document.getElementById("img01").src = element.src;
  document.getElementById("modal01").style.display = "block";
}
document.addEventListener("keydown", function (event) {
  if (event.key === "Escape") {
    document.getElementById("modal01").style.display = "none";
  }
});
window.onscroll = function () {
  var scrolled = document.body.scrollTop > 20 || document.documentElement.scrollTop > 20;
  document.getElementById("myBtn").style.display = scrolled ? "block" : "none";
};
function topFunction() {
  document.body.scrollTop = 0;
  document.documentElement.scrollTop = 0;
}
</script>"#;

fn header_block(meta: &ConversationMeta, config: &ArchiveConfig, offset: FixedOffset) -> String {
    let created = meta.generated_at.with_timezone(&offset).format("%Y-%m-%d %H:%M");
    format!(
        "<div class='cssRoomName' id='top'>{title}<span class='meta'>Created: <b>{created}</b> &nbsp; \
         Generated by: <b>{owner}</b> &nbsp; Message timezone: <b>{tz}</b> &nbsp; Version: <b>{version}</b><br>\
         Sort: <b>{sort}</b> &nbsp; Max messages: <b>{cap}</b> &nbsp; File download: <b>{download}</b> &nbsp; \
         Avatar: <b>{avatars}</b></span></div>",
        title = escape_html(&meta.title),
        created = created,
        owner = escape_html(&meta.owner),
        tz = timezone_label(offset),
        version = env!("CARGO_PKG_VERSION"),
        sort = config.sort,
        cap = config.message_cap,
        download = config.download,
        avatars = config.avatars,
    )
}

fn index_table(state: &RenderState, sort: SortOrder) -> String {
    let mut html = String::from("<table class='mytoc'>");
    for (month, count) in state.months_in_order(sort) {
        let indent = if month.month == 1 { "" } else { "&nbsp;&nbsp;&nbsp;" };
        html.push_str(&format!(
            "<tr><td>{}<a href='#{}'>{}</a></td><td class='count'>{}</td></tr>",
            indent,
            month.anchor(),
            month.label(),
            count
        ));
    }
    html.push_str(
        "<tr><td colspan='2'>&nbsp;&nbsp;&nbsp;<a href='#endoffile'>last message</a></td></tr></table>",
    );
    html
}

fn numbers_table(meta: &ConversationMeta, state: &RenderState) -> String {
    let stats = &state.stats;
    let mut html = String::from("<table class='mytoc'>");
    let rows = [
        ("# of messages", stats.messages),
        ("# images", stats.images),
        ("# files", stats.files),
        ("# mentions", stats.mentions),
        ("# total members", meta.member_count),
        ("# unique members (in this archive)", state.unique_authors()),
    ];
    for (label, value) in rows {
        html.push_str(&format!("<tr><td>{}:</td><td>{}</td></tr>", label, value));
    }
    if meta.truncated {
        html.push_str(&format!(
            "<tr><td colspan='2' class='count' id='truncated'>space contains more than {} messages</td></tr>",
            stats.messages
        ));
    }
    html.push_str("</table>");
    html
}

fn domain_table(state: &RenderState) -> String {
    let mut html = String::from("<table class='mytoc'>");
    for (domain, count) in state.top_domains(TOP_DOMAINS) {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(domain),
            count
        ));
    }
    html.push_str("</table>");
    html
}

/// Wraps a rendered message stream into a complete HTML document.
pub fn document(
    meta: &ConversationMeta,
    config: &ArchiveConfig,
    offset: FixedOffset,
    state: &RenderState,
    stream: &str,
) -> String {
    let mut html = String::with_capacity(stream.len() + 8 * 1024);
    html.push_str("<!DOCTYPE html>\n<html><head><meta charset='utf-8'>");
    html.push_str(&format!("<title>{}</title>", escape_html(&meta.title)));
    html.push_str(STYLE);
    html.push_str("</head><body>\n");
    html.push_str(&header_block(meta, config, offset));
    html.push_str("<table class='myheader' id='myheader'><tr>");
    html.push_str(&format!("<td><strong>Index</strong><br>{}</td>", index_table(state, config.sort)));
    html.push_str(&format!("<td><strong>Numbers</strong><br>{}</td>", numbers_table(meta, state)));
    html.push_str(&format!(
        "<td><strong>Top-{} user domains</strong><br>{}</td>",
        TOP_DOMAINS,
        domain_table(state)
    ));
    html.push_str("</tr></table>\n");
    html.push_str(stream);
    html.push_str(
        "\n<div class='cssNewMonth' id='endoffile'>end of file <span style='float:right;font-size:16px;'><a href='#top'>back to top</a></span></div>\n",
    );
    html.push_str(SCRIPT);
    html.push_str("\n</body></html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::render::state::MonthKey;
    use chrono::{TimeZone, Utc};

    fn meta(truncated: bool) -> ConversationMeta {
        ConversationMeta {
            title: "R&D <team>".into(),
            owner: "Ada".into(),
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            member_count: 7,
            truncated,
        }
    }

    #[test]
    fn test_document_sections() {
        let mut state = RenderState::new();
        state.months.insert(MonthKey { year: 2024, month: 1 }, 4);
        state.months.insert(MonthKey { year: 2024, month: 2 }, 1);
        state.domains.insert("x.com".into(), 5);
        state.stats.messages = 5;

        let html = document(
            &meta(false),
            &ArchiveConfig::new(),
            FixedOffset::east_opt(0).unwrap(),
            &state,
            "<p>stream</p>",
        );
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("R&amp;D &lt;team&gt;"));
        assert!(html.contains("<tr><td><a href='#2024-01'>2024 - Jan</a></td><td class='count'>4</td></tr>"));
        assert!(html.contains("&nbsp;&nbsp;&nbsp;<a href='#2024-02'>2024 - Feb</a>"));
        assert!(html.contains("<tr><td>x.com</td><td>5</td></tr>"));
        assert!(html.contains("<tr><td># total members:</td><td>7</td></tr>"));
        assert!(html.contains("<p>stream</p>"));
        assert!(html.contains("id='endoffile'"));
        assert!(html.contains("function onClick(element)"));
        assert!(!html.contains("id='truncated'"));
    }

    #[test]
    fn test_truncation_notice() {
        let mut state = RenderState::new();
        state.stats.messages = 100;
        let html = document(
            &meta(true),
            &ArchiveConfig::new(),
            FixedOffset::east_opt(0).unwrap(),
            &state,
            "",
        );
        assert!(html.contains("space contains more than 100 messages"));
    }
}

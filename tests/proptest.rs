//! Property-based tests for space-archive.
//!
//! These tests generate random conversations to find ordering edge cases.

use std::collections::HashMap;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use space_archive::config::{MessageCap, SortOrder};
use space_archive::core::ThreadOrder;
use space_archive::core::attachment::{format_size, sanitize_filename};
use space_archive::core::render::markup::escape_html;
use space_archive::message::Message;

/// Builds a conversation from one choice byte per message, in posting order.
///
/// A choice picks a top-level message, a reply to an earlier top-level
/// message, or a reply whose parent was never fetched.
fn conversation(choices: &[u8]) -> Vec<Message> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut tops: Vec<String> = Vec::new();
    let mut messages = Vec::with_capacity(choices.len());

    for (i, &choice) in choices.iter().enumerate() {
        let id = format!("M{}", i);
        let created = base + Duration::minutes(i as i64);
        let mut msg = Message::new(id.clone(), "a@x.com", created, "text");
        if choice % 7 == 3 {
            msg = msg.with_parent("GONE");
        } else if choice % 3 == 0 && !tops.is_empty() {
            let parent = tops[usize::from(choice) % tops.len()].clone();
            msg = msg.with_parent(parent);
        } else {
            tops.push(id);
        }
        messages.push(msg);
    }
    // The API returns newest first.
    messages.reverse();
    messages
}

fn arb_conversation(max_len: usize) -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(any::<u8>(), 0..max_len).prop_map(|c| conversation(&c))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ============================================
    // THREAD ORDER PROPERTIES
    // ============================================

    /// Every message is either placed or dropped, never both, never lost
    #[test]
    fn order_accounts_for_every_message(messages in arb_conversation(60)) {
        let order = ThreadOrder::resolve(&messages);
        prop_assert_eq!(order.len() + order.dropped().len(), messages.len());

        let placed = order.ascending();
        for id in order.dropped() {
            prop_assert!(!placed.contains(&id.as_str()));
        }
    }

    /// Only replies to unfetched parents are dropped
    #[test]
    fn only_orphans_are_dropped(messages in arb_conversation(60)) {
        let order = ThreadOrder::resolve(&messages);
        let orphans: Vec<&str> = messages
            .iter()
            .filter(|m| m.parent_id.as_deref() == Some("GONE"))
            .map(|m| m.id.as_str())
            .collect();
        prop_assert_eq!(order.dropped().len(), orphans.len());
    }

    /// A reply always comes after its parent, in either sort order
    #[test]
    fn replies_follow_parent(messages in arb_conversation(60)) {
        let order = ThreadOrder::resolve(&messages);
        let parents: HashMap<&str, &str> = messages
            .iter()
            .filter_map(|m| m.parent_id.as_deref().map(|p| (m.id.as_str(), p)))
            .collect();

        for sort in [SortOrder::OldestFirst, SortOrder::NewestFirst] {
            let ids = order.in_order(sort);
            let position: HashMap<&str, usize> =
                ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
            for (reply, parent) in &parents {
                if let (Some(r), Some(p)) = (position.get(reply), position.get(parent)) {
                    prop_assert!(p < r, "{} placed before its parent {}", reply, parent);
                }
            }
        }
    }

    /// Replies sit in the block directly under their parent
    #[test]
    fn threads_are_contiguous(messages in arb_conversation(60)) {
        let order = ThreadOrder::resolve(&messages);
        let by_id: HashMap<&str, &Message> = messages.iter().map(|m| (m.id.as_str(), m)).collect();

        for sort in [SortOrder::OldestFirst, SortOrder::NewestFirst] {
            let mut current_top: Option<&str> = None;
            for id in order.in_order(sort) {
                match by_id[id].parent_id.as_deref() {
                    None => current_top = Some(id),
                    Some(parent) => {
                        prop_assert_eq!(Some(parent), current_top);
                    }
                }
            }
        }
    }

    /// Top-level messages follow posting time; newest-first reverses them
    #[test]
    fn top_level_follows_time(messages in arb_conversation(60)) {
        let order = ThreadOrder::resolve(&messages);
        let by_id: HashMap<&str, &Message> = messages.iter().map(|m| (m.id.as_str(), m)).collect();
        let ascending: Vec<&str> = order
            .in_order(SortOrder::OldestFirst)
            .into_iter()
            .filter(|id| !by_id[id].is_threaded())
            .collect();
        for pair in ascending.windows(2) {
            prop_assert!(by_id[pair[0]].created < by_id[pair[1]].created);
        }
        let mut descending: Vec<&str> = order
            .in_order(SortOrder::NewestFirst)
            .into_iter()
            .filter(|id| !by_id[id].is_threaded())
            .collect();
        descending.reverse();
        prop_assert_eq!(ascending, descending);
    }

    /// Replies within a thread keep posting order in both sort orders
    #[test]
    fn replies_keep_posting_order(messages in arb_conversation(60)) {
        let order = ThreadOrder::resolve(&messages);
        let by_id: HashMap<&str, &Message> = messages.iter().map(|m| (m.id.as_str(), m)).collect();

        for sort in [SortOrder::OldestFirst, SortOrder::NewestFirst] {
            let ids = order.in_order(sort);
            for pair in ids.windows(2) {
                let (a, b) = (by_id[pair[0]], by_id[pair[1]]);
                if a.is_threaded() && b.is_threaded() {
                    prop_assert!(a.created < b.created);
                }
            }
        }
    }

    // ============================================
    // TEXT HELPERS
    // ============================================

    /// Escaped text contains no markup characters
    #[test]
    fn escape_removes_markup(text in ".{0,80}") {
        let escaped = escape_html(&text);
        prop_assert!(!escaped.contains('<'));
        prop_assert!(!escaped.contains('>'));
        prop_assert!(!escaped.contains('\''));
        prop_assert!(!escaped.contains('"'));
    }

    /// Sanitized names never contain path separators
    #[test]
    fn sanitized_names_are_flat(name in ".{0,40}") {
        let clean = sanitize_filename(&name);
        prop_assert!(!clean.contains('/'));
        prop_assert!(!clean.contains('\\'));
    }

    /// Sizes always carry a unit
    #[test]
    fn sizes_have_unit(bytes in any::<u64>()) {
        let size = format_size(bytes);
        prop_assert!(size.ends_with('B'));
    }

    /// Day caps parse back from their short form
    #[test]
    fn day_caps_parse(days in 1u32..100_000) {
        prop_assert_eq!(format!("{}d", days).parse::<MessageCap>().unwrap(), MessageCap::Days(days));
    }
}

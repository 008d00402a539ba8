//! Email to display-name lookup shared across conversations.

use std::collections::HashMap;

use crate::message::{Membership, Person};

/// Display names keyed by email address.
///
/// Filled from each conversation's memberships and never cleared, so a name
/// learned in one conversation is reused in later ones.
///
/// ```rust
/// use space_archive::core::NameCache;
/// use space_archive::message::Membership;
///
/// let mut names = NameCache::new();
/// names.learn_memberships(&[Membership {
///     person_email: "ada@example.com".into(),
///     person_display_name: Some("Ada Lovelace".into()),
/// }]);
/// assert_eq!(names.display_name("ada@example.com"), "Ada Lovelace");
/// assert_eq!(names.display_name("ghost@example.com"), "ghost@example.com");
/// ```
#[derive(Debug, Clone, Default)]
pub struct NameCache {
    names: HashMap<String, String>,
}

impl NameCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the names of a conversation's members.
    pub fn learn_memberships(&mut self, members: &[Membership]) {
        for member in members {
            if let Some(name) = member.person_display_name.as_deref().filter(|n| !n.trim().is_empty()) {
                self.names.insert(member.person_email.clone(), name.to_string());
            }
        }
    }

    /// Records names from person profiles, keeping names already known.
    pub fn learn_people(&mut self, people: &[Person]) {
        for person in people {
            if person.display_name.trim().is_empty() {
                continue;
            }
            for email in &person.emails {
                self.names
                    .entry(email.clone())
                    .or_insert_with(|| person.display_name.clone());
            }
        }
    }

    /// Name for `email`, falling back to the address itself.
    pub fn display_name<'a>(&'a self, email: &'a str) -> &'a str {
        self.names.get(email).map(String::as_str).unwrap_or(email)
    }

    /// Number of known names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if no names are known.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

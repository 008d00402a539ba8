//! Author avatars.
//!
//! Depending on [`AvatarMode`], each author is shown with their remote
//! avatar, a downloaded copy under `avatars/`, or just their initials.
//! Downloads are retried as a batch: every round only retries the avatars
//! that failed in the previous one.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::anomaly::{AnomalyKind, AnomalyLog};
use crate::api::{Client, Transport};
use crate::config::AvatarMode;
use crate::error::Result;
use crate::message::Person;

/// Where an author's avatar comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarRef {
    /// Remote image URL.
    Remote(String),
    /// Path relative to the conversation folder.
    Local(String),
}

impl AvatarRef {
    /// Value for an `<img src>` attribute.
    pub fn src(&self) -> &str {
        match self {
            AvatarRef::Remote(url) => url,
            AvatarRef::Local(path) => path,
        }
    }
}

/// Author id to avatar mapping for one conversation.
#[derive(Debug, Clone, Default)]
pub struct AvatarMap {
    refs: HashMap<String, AvatarRef>,
}

impl AvatarMap {
    /// Creates an empty map (everyone gets initials).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one entry.
    pub fn insert(&mut self, person_id: impl Into<String>, avatar: AvatarRef) {
        self.refs.insert(person_id.into(), avatar);
    }

    /// Looks up an author.
    pub fn get(&self, person_id: &str) -> Option<&AvatarRef> {
        self.refs.get(person_id)
    }

    /// Number of authors with an avatar.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Returns `true` if nobody has an avatar.
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Asks for the small (80 px) rendition of an avatar.
///
/// ```rust
/// use space_archive::core::avatar::small_avatar_url;
///
/// assert_eq!(
///     small_avatar_url("https://avatar.test/V1~abc~1600"),
///     "https://avatar.test/V1~abc~80"
/// );
/// ```
pub fn small_avatar_url(url: &str) -> String {
    url.replace("~1600", "~80")
}

/// File name for a downloaded avatar: the person id without punctuation.
pub fn avatar_file_name(person_id: &str) -> String {
    person_id.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Initials shown when there is no avatar.
///
/// ```rust
/// use space_archive::core::avatar::initials;
///
/// assert_eq!(initials("Ada Lovelace"), "AL");
/// assert_eq!(initials("bob"), "BO");
/// assert_eq!(initials("x"), "X");
/// ```
pub fn initials(display_name: &str) -> String {
    let mut words = display_name.split_whitespace();
    match (words.next(), words.next()) {
        (Some(first), Some(second)) => first
            .chars()
            .take(1)
            .chain(second.chars().take(1))
            .flat_map(char::to_uppercase)
            .collect(),
        _ => display_name
            .trim()
            .chars()
            .take(2)
            .flat_map(char::to_uppercase)
            .collect(),
    }
}

/// Retry policy for avatar downloads.
#[derive(Debug, Clone, Copy)]
pub struct AvatarRetry {
    /// Total attempts, first try included.
    pub attempts: u32,
    /// Pause before each retry round.
    pub delay: Duration,
}

/// Builds the avatar map for `people`.
///
/// In [`AvatarMode::Download`] the images are stored in `folder/avatars/`;
/// authors whose avatar still fails after the last round are left out of
/// the map and reported in `anomalies`.
pub fn build_avatar_map<T: Transport>(
    client: &Client<T>,
    people: &[Person],
    mode: AvatarMode,
    folder: &Path,
    retry: AvatarRetry,
    anomalies: &mut AnomalyLog,
) -> Result<AvatarMap> {
    let mut map = AvatarMap::new();
    let remote: Vec<(String, String)> = people
        .iter()
        .filter_map(|p| p.avatar.as_deref().map(|url| (p.id.clone(), small_avatar_url(url))))
        .collect();

    match mode {
        AvatarMode::None => {}
        AvatarMode::Link => {
            for (id, url) in remote {
                map.insert(id, AvatarRef::Remote(url));
            }
        }
        AvatarMode::Download => {
            let dir = folder.join("avatars");
            fs::create_dir_all(&dir)?;
            download_all(client, remote, &dir, retry, &mut map, anomalies)?;
        }
    }
    Ok(map)
}

fn download_all<T: Transport>(
    client: &Client<T>,
    mut pending: Vec<(String, String)>,
    dir: &Path,
    retry: AvatarRetry,
    map: &mut AvatarMap,
    anomalies: &mut AnomalyLog,
) -> Result<()> {
    let mut attempt = 1;
    loop {
        let mut failed = Vec::new();
        for (id, url) in pending {
            let file = avatar_file_name(&id);
            match client.save("avatar", &url, &dir.join(&file)) {
                Ok(()) => map.insert(id, AvatarRef::Local(format!("avatars/{}", file))),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!(person = %id, attempt = attempt, error = %e, "Avatar download failed");
                    failed.push((id, url, e.to_string()));
                }
            }
        }

        if failed.is_empty() {
            return Ok(());
        }
        if attempt >= retry.attempts {
            for (id, url, error) in failed {
                warn!(person = %id, url = %url, "Avatar unavailable, using initials");
                anomalies.push(
                    AnomalyKind::AvatarDownload,
                    None,
                    format!("{} ({}): {}", id, url, error),
                );
            }
            return Ok(());
        }

        attempt += 1;
        info!(
            failed = failed.len(),
            attempt = attempt,
            max_attempts = retry.attempts,
            "Retrying avatar downloads"
        );
        thread::sleep(retry.delay);
        pending = failed.into_iter().map(|(id, url, _)| (id, url)).collect();
    }
}

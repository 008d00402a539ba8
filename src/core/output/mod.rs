//! Archive files on disk.
//!
//! Every conversation gets its own folder under the output directory:
//!
//! ```text
//! <output>/<Title>/            (or <Title>-01, <Title>-02, ... if taken)
//! ├── <Title>.html
//! ├── <Title>.txt              (extra output: txt)
//! ├── <Title>.json             (extra output: json)
//! ├── images/                  (download: images or files)
//! ├── files/                   (download: files)
//! └── avatars/                 (avatars: download)
//! ```

mod json_writer;

use std::fs;
use std::path::{Path, PathBuf};

pub use json_writer::{to_json, write_json};

use crate::config::{ArchiveConfig, AvatarMode, DownloadMode};
use crate::core::attachment::sanitize_filename;
use crate::error::{ArchiveError, Result};

/// Name used when a title has no usable characters.
pub const FALLBACK_NAME: &str = "webex-space-archive";

/// Output folder of one conversation.
#[derive(Debug, Clone)]
pub struct ConversationFolder {
    path: PathBuf,
    name: String,
}

impl ConversationFolder {
    /// Creates a fresh folder for `title` under `base`, with the
    /// subfolders `config` needs.
    ///
    /// An existing folder is never reused: `-01`, `-02`, ... is appended
    /// until the name is free.
    pub fn create(base: &Path, title: &str, config: &ArchiveConfig) -> Result<Self> {
        let name = file_stem_for(title);
        let mut path = base.join(&name);
        if path.exists() {
            let mut counter = 1u32;
            while base.join(format!("{}-{:02}", name, counter)).exists() {
                counter += 1;
            }
            path = base.join(format!("{}-{:02}", name, counter));
        }

        let mut dirs = vec![path.clone()];
        match config.download {
            DownloadMode::None => {}
            DownloadMode::Images => dirs.push(path.join("images")),
            DownloadMode::All => {
                dirs.push(path.join("images"));
                dirs.push(path.join("files"));
            }
        }
        if config.avatars == AvatarMode::Download {
            dirs.push(path.join("avatars"));
        }
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|e| ArchiveError::output_folder(&dir, e))?;
        }

        Ok(Self { path, name })
    }

    /// Folder path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem shared by the documents (`<name>.html`, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of a document with the given extension.
    pub fn document(&self, extension: &str) -> PathBuf {
        self.path.join(format!("{}.{}", self.name, extension))
    }

    /// Writes a text document and returns its path.
    pub fn write_document(&self, extension: &str, contents: &str) -> Result<PathBuf> {
        let path = self.document(extension);
        fs::write(&path, contents)?;
        Ok(path)
    }
}

/// Safe file stem for a conversation title.
///
/// ```rust
/// use space_archive::core::output::file_stem_for;
///
/// assert_eq!(file_stem_for("Team: Q3/Q4 plans"), "Team Q3Q4 plans");
/// assert_eq!(file_stem_for("???"), "webex-space-archive");
/// ```
pub fn file_stem_for(title: &str) -> String {
    let name = sanitize_filename(title);
    let name = name.trim();
    if name.is_empty() || name.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}

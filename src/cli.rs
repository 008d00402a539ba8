//! Command-line interface definition using clap.
//!
//! This module defines [`Args`], the CLI argument structure. The option
//! enums themselves live in [`crate::config`] and derive
//! [`clap::ValueEnum`] when the `cli` feature is on, so the same types serve
//! library users and the binary:
//!
//! ```rust
//! use clap::Parser;
//! use space_archive::cli::Args;
//! use space_archive::config::{DownloadMode, MessageCap};
//!
//! let args = Args::parse_from(["space-archive", "--token", "t", "--max", "60d", "--download", "images"]);
//! let config = args.to_config();
//! assert_eq!(config.message_cap, MessageCap::Days(60));
//! assert_eq!(config.download, DownloadMode::Images);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{
    ArchiveConfig, AvatarMode, DEFAULT_BASE_URL, DownloadMode, ExtraOutput, MessageCap, SortOrder,
    SpaceScope,
};

/// Archive Webex spaces into self-contained HTML documents,
/// with attachments, avatars and per-space statistics.
#[derive(Parser, Debug, Clone)]
#[command(name = "space-archive")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    space-archive --token $WEBEX_TOKEN
    space-archive --scope group --max 60d -o archives
    space-archive --room Y2lzY29zcGFyazovL3VzL1JPT00v... --download images
    space-archive --avatars download --extra-output both --sort newest-first

The token can also be given through the WEBEX_TOKEN environment variable.
Set RUST_LOG=space_archive=debug for detailed progress.")]
pub struct Args {
    /// Webex access token
    #[arg(short, long, env = "WEBEX_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Archive only these conversation ids (repeatable); overrides --scope
    #[arg(long = "room", value_name = "ID")]
    pub rooms: Vec<String>,

    /// Which conversations to archive
    #[arg(short, long, value_enum, default_value_t = SpaceScope::All)]
    pub scope: SpaceScope,

    /// Message cap per conversation: a count ("5000") or an age ("60d")
    #[arg(short, long, value_name = "CAP", default_value = "999999")]
    pub max: MessageCap,

    /// Which attachments to download
    #[arg(short, long, value_enum, default_value_t = DownloadMode::All)]
    pub download: DownloadMode,

    /// Message order
    #[arg(long, value_enum, default_value_t = SortOrder::OldestFirst)]
    pub sort: SortOrder,

    /// How author avatars are shown
    #[arg(long, value_enum, default_value_t = AvatarMode::Link)]
    pub avatars: AvatarMode,

    /// Extra output next to the HTML document
    #[arg(short = 'x', long, value_enum, default_value_t = ExtraOutput::None)]
    pub extra_output: ExtraOutput,

    /// Folder that receives one sub-folder per conversation
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Seconds to wait after a 429 response before retrying
    #[arg(long, value_name = "SECS", default_value_t = 3)]
    pub backoff: u64,

    /// API root
    #[arg(long, value_name = "URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Do not print attachment progress
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Builds the archive configuration described by these arguments.
    pub fn to_config(&self) -> ArchiveConfig {
        ArchiveConfig::new()
            .with_base_url(self.base_url.clone())
            .with_scope(self.scope)
            .with_message_cap(self.max)
            .with_download(self.download)
            .with_sort(self.sort)
            .with_avatars(self.avatars)
            .with_extra_output(self.extra_output)
            .with_output_dir(self.output.clone())
            .with_rate_limit_backoff(Duration::from_secs(self.backoff))
    }
}

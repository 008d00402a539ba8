//! Attachment resolution.
//!
//! Each attachment URL is first checked with a HEAD request for its name and size,
//! then optionally downloaded into the conversation folder:
//!
//! ```text
//! <conversation>/
//! ├── images/   png, jpg, jpeg, bmp, gif, tif
//! └── files/    everything else
//! ```
//!
//! Deleted attachments (404) are skipped. Missing names, failed downloads and
//! other per-file problems are recorded as anomalies; the message still
//! renders.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::anomaly::{AnomalyKind, AnomalyLog};
use crate::api::{Client, HttpResponse, Transport};
use crate::config::DownloadMode;
use crate::error::Result;
use crate::progress::{Progress, ProgressCallback};

/// Extensions treated as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "tif"];

/// Placeholder for blank or garbled names.
pub const UNKNOWN_NAME: &str = "unknown-filename";

/// Placeholder when the server sent no `Content-Disposition`.
pub const MISSING_NAME: &str = "error-getting-filename";

/// Size text when the server sent no `Content-Length`.
pub const UNKNOWN_SIZE: &str = "could not determine filesize";

/// Attachment category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    /// Raster image, shown inline
    Image,
    /// Anything else, shown as a link or name
    File,
}

impl AttachmentKind {
    /// Classifies a file name by its extension.
    ///
    /// ```rust
    /// use space_archive::core::attachment::AttachmentKind;
    ///
    /// assert_eq!(AttachmentKind::of("photo.JPG"), AttachmentKind::Image);
    /// assert_eq!(AttachmentKind::of("notes.pdf"), AttachmentKind::File);
    /// assert_eq!(AttachmentKind::of("README"), AttachmentKind::File);
    /// ```
    pub fn of(name: &str) -> Self {
        let is_image = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|i| i.eq_ignore_ascii_case(ext)));
        if is_image {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        }
    }

    /// Storage subfolder.
    pub fn subfolder(self) -> &'static str {
        match self {
            AttachmentKind::Image => "images",
            AttachmentKind::File => "files",
        }
    }
}

/// Resolved attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    /// Source URL.
    pub url: String,
    /// Final, filesystem-safe name.
    pub name: String,
    /// Human-readable size.
    pub size: String,
    /// Image or generic file.
    pub kind: AttachmentKind,
    /// Path relative to the conversation folder, when downloaded.
    pub stored: Option<PathBuf>,
    /// Download was attempted and failed.
    pub failed: bool,
}

impl AttachmentRecord {
    fn unavailable(url: &str) -> Self {
        Self {
            url: url.to_string(),
            name: MISSING_NAME.to_string(),
            size: UNKNOWN_SIZE.to_string(),
            kind: AttachmentKind::File,
            stored: None,
            failed: true,
        }
    }

    /// Returns `true` for images.
    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }

    /// Relative link target, e.g. `images/photo.png`.
    pub fn link(&self) -> Option<String> {
        self.stored
            .as_ref()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

/// Anything that can turn attachment URLs into records.
///
/// The render pipeline only depends on this trait, so it can be driven
/// without network access.
pub trait AttachmentSource {
    /// Resolves `urls` in order. Deleted attachments are left out.
    fn resolve(&mut self, urls: &[String]) -> Result<Vec<AttachmentRecord>>;

    /// Hands over the anomalies recorded so far.
    fn take_anomalies(&mut self) -> AnomalyLog {
        AnomalyLog::new()
    }
}

/// Formats a byte count with binary prefixes.
///
/// ```rust
/// use space_archive::core::attachment::format_size;
///
/// assert_eq!(format_size(0), "0B");
/// assert_eq!(format_size(1536), "1.5 KB");
/// assert_eq!(format_size(1_048_576), "1.0 MB");
/// assert_eq!(format_size(1_288_490), "1.23 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

    if bytes == 0 {
        return "0B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    let mut text = format!("{:.2}", rounded);
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.push('0');
    }
    format!("{} {}", text, UNITS[unit])
}

/// Drops every character outside letters, digits and `-_.() `.
///
/// ```rust
/// use space_archive::core::attachment::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Q3 report (final).pdf"), "Q3 report (final).pdf");
/// assert_eq!(sanitize_filename("../../etc/pass:wd"), "....etcpasswd");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || "-_.() ".contains(*c))
        .collect()
}

/// Extracts the file name of a `Content-Disposition` value.
///
/// The RFC 5987 `filename*=charset'lang'percent-encoded` form wins over a
/// plain `filename=` parameter, which may be quoted or bare. Returns `None`
/// when neither is present.
///
/// ```rust
/// use space_archive::core::attachment::filename_from_disposition;
///
/// let value = "attachment; filename=\"fallback.txt\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf";
/// assert_eq!(filename_from_disposition(value).as_deref(), Some("résumé.pdf"));
/// ```
pub fn filename_from_disposition(value: &str) -> Option<String> {
    extended_filename(value).or_else(|| plain_filename(value))
}

fn extended_filename(value: &str) -> Option<String> {
    let start = value.find("filename*=")? + "filename*=".len();
    let raw = value[start..].split(';').next()?.trim().trim_matches('"');
    let encoded = &raw[raw.rfind('\'')? + 1..];
    urlencoding::decode(encoded).ok().map(|name| name.into_owned())
}

fn plain_filename(value: &str) -> Option<String> {
    let start = value.find("filename=")? + "filename=".len();
    let rest = value[start..].trim_start();
    let name = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next().unwrap_or_default(),
        None => rest.split(';').next().unwrap_or_default().trim(),
    };
    Some(name.to_string())
}

fn is_placeholder(name: &str) -> bool {
    name.trim().is_empty() || name.chars().all(|c| c == '+')
}

/// Returns `name`, or `stem-N.ext` with the smallest `N` not present in `dir`.
pub fn next_free_name(dir: &Path, name: &str) -> String {
    if !dir.join(name).exists() {
        return name.to_string();
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut counter = 1u32;
    loop {
        let candidate = format!("{}-{}{}", stem, counter, ext);
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Resolves attachments through the API and stores them under a
/// conversation folder.
pub struct AttachmentResolver<'a, T: Transport> {
    client: &'a Client<T>,
    folder: PathBuf,
    mode: DownloadMode,
    anomalies: AnomalyLog,
    progress: Option<ProgressCallback>,
    processed: usize,
    expected: Option<usize>,
}

impl<'a, T: Transport> AttachmentResolver<'a, T> {
    /// Creates a resolver storing files under `folder`.
    pub fn new(client: &'a Client<T>, folder: impl Into<PathBuf>, mode: DownloadMode) -> Self {
        Self {
            client,
            folder: folder.into(),
            mode,
            anomalies: AnomalyLog::new(),
            progress: None,
            processed: 0,
            expected: None,
        }
    }

    /// Sets a callback receiving one update per attachment.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Sets the number of attachments expected across all `resolve` calls,
    /// so progress updates carry a total.
    #[must_use]
    pub fn with_expected(mut self, total: usize) -> Self {
        self.expected = Some(total);
        self
    }

    fn report(&self) {
        if let Some(callback) = &self.progress {
            let progress = Progress::new("attachments", self.processed);
            callback(match self.expected {
                Some(total) => progress.with_total(total),
                None => progress,
            });
        }
    }

    fn wants(&self, kind: AttachmentKind) -> bool {
        match self.mode {
            DownloadMode::None => false,
            DownloadMode::Images => kind == AttachmentKind::Image,
            DownloadMode::All => true,
        }
    }

    fn display_name(&mut self, url: &str, head: &HttpResponse) -> String {
        let raw = head
            .header("content-disposition")
            .and_then(filename_from_disposition);
        let name = match raw {
            None => {
                self.anomalies.push(
                    AnomalyKind::AttachmentName,
                    None,
                    format!("no Content-Disposition header for {}", url),
                );
                return MISSING_NAME.to_string();
            }
            Some(raw) if is_placeholder(&raw) => String::new(),
            Some(raw) => sanitize_filename(&raw),
        };
        if name.trim().is_empty() {
            self.anomalies.push(
                AnomalyKind::AttachmentName,
                None,
                format!("unusable file name for {}", url),
            );
            return UNKNOWN_NAME.to_string();
        }
        name
    }

    fn download(&self, url: &str, dir: &Path, name: &str) -> Result<()> {
        fs::create_dir_all(dir)?;
        self.client.save("attachment", url, &dir.join(name))
    }

    fn resolve_one(&mut self, url: &str) -> Result<Option<AttachmentRecord>> {
        let head = match self.client.inspect(url) {
            Ok(head) => head,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.anomalies
                    .push(AnomalyKind::AttachmentDownload, None, format!("{}: {}", url, e));
                return Ok(Some(AttachmentRecord::unavailable(url)));
            }
        };
        if head.status == 404 {
            debug!(url = url, "Attachment deleted, skipping");
            return Ok(None);
        }
        if !head.is_success() {
            self.anomalies.push(
                AnomalyKind::AttachmentDownload,
                None,
                format!("{}: status {}", url, head.status),
            );
            return Ok(Some(AttachmentRecord::unavailable(url)));
        }

        let name = self.display_name(url, &head);
        let size = head
            .header("content-length")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or_else(|| UNKNOWN_SIZE.to_string(), format_size);
        let kind = AttachmentKind::of(&name);
        let mut record = AttachmentRecord {
            url: url.to_string(),
            name,
            size,
            kind,
            stored: None,
            failed: false,
        };
        if !self.wants(kind) {
            return Ok(Some(record));
        }

        let dir = self.folder.join(kind.subfolder());
        let name = next_free_name(&dir, &record.name);
        match self.download(url, &dir, &name) {
            Ok(()) => {
                debug!(url = url, name = %name, "Attachment stored");
                record.stored = Some(Path::new(kind.subfolder()).join(&name));
                record.name = name;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(url = url, name = %record.name, error = %e, "Attachment download failed");
                self.anomalies.push(
                    AnomalyKind::AttachmentDownload,
                    None,
                    format!("{}: {}", record.name, e),
                );
                record.failed = true;
            }
        }
        Ok(Some(record))
    }
}

impl<T: Transport> AttachmentSource for AttachmentResolver<'_, T> {
    fn resolve(&mut self, urls: &[String]) -> Result<Vec<AttachmentRecord>> {
        let mut records = Vec::with_capacity(urls.len());
        for url in urls {
            if let Some(record) = self.resolve_one(url)? {
                records.push(record);
            }
            self.processed += 1;
            self.report();
        }
        Ok(records)
    }

    fn take_anomalies(&mut self) -> AnomalyLog {
        std::mem::take(&mut self.anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ScriptedTransport;
    use crate::config::ArchiveConfig;
    use std::time::Duration;
    use tempfile::TempDir;

    fn client(transport: ScriptedTransport) -> Client<ScriptedTransport> {
        let config = ArchiveConfig::new().with_rate_limit_backoff(Duration::ZERO);
        Client::new(transport, &config)
    }

    fn head(name: &str, len: u64) -> HttpResponse {
        HttpResponse::new(200)
            .with_header("Content-Disposition", format!("attachment; filename=\"{}\"", name))
            .with_header("Content-Length", len.to_string())
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0B");
        assert_eq!(format_size(1), "1.0 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GB");
    }

    #[test]
    fn test_filename_from_disposition() {
        assert_eq!(
            filename_from_disposition("attachment; filename=\"a b.png\"").as_deref(),
            Some("a b.png")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=report.pdf; size=3").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(filename_from_disposition("inline").as_deref(), None);
    }

    #[test]
    fn test_filename_from_encoded_disposition() {
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''file%20name%20with%20spaces.png")
                .as_deref(),
            Some("file name with spaces.png")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=utf-8'en'notes.txt; size=4").as_deref(),
            Some("notes.txt")
        );
        // Without the charset quotes the encoded form is unusable.
        assert_eq!(
            filename_from_disposition("attachment; filename*=broken; filename=\"ok.txt\"").as_deref(),
            Some("ok.txt")
        );
    }

    #[test]
    fn test_encoded_name_reaches_record() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().on_head(
            "https://f.test/1",
            HttpResponse::new(200)
                .with_header("Content-Disposition", "attachment; filename*=UTF-8''Q3%20plan.jpg")
                .with_header("Content-Length", "10"),
        );
        let client = client(transport);
        let mut resolver = AttachmentResolver::new(&client, dir.path(), DownloadMode::None);

        let records = resolver.resolve(&["https://f.test/1".to_string()]).unwrap();
        assert_eq!(records[0].name, "Q3 plan.jpg");
        assert!(records[0].is_image());
        assert!(resolver.take_anomalies().is_empty());
    }

    #[test]
    fn test_placeholder_names() {
        assert!(is_placeholder("   "));
        assert!(is_placeholder("+++"));
        assert!(!is_placeholder("a+b"));
    }

    #[test]
    fn test_metadata_only_mode_fetches_no_bytes() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new().on_head("https://f.test/1", head("x.png", 1536));
        let client = client(transport);
        let mut resolver = AttachmentResolver::new(&client, dir.path(), DownloadMode::None);

        let records = resolver.resolve(&["https://f.test/1".to_string()]).unwrap();
        assert_eq!(records[0].name, "x.png");
        assert_eq!(records[0].size, "1.5 KB");
        assert!(records[0].is_image());
        assert_eq!(records[0].stored, None);
        assert_eq!(client.transport().requests(), vec!["HEAD https://f.test/1"]);
    }

    #[test]
    fn test_images_mode_lists_files_without_download() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .on_head("https://f.test/doc", head("doc.pdf", 10))
            .on_head("https://f.test/img", head("pic.gif", 10))
            .on_get("https://f.test/img", &[], HttpResponse::new(200).with_body("GIF89a"));
        let client = client(transport);
        let mut resolver = AttachmentResolver::new(&client, dir.path(), DownloadMode::Images);

        let urls = ["https://f.test/doc".to_string(), "https://f.test/img".to_string()];
        let records = resolver.resolve(&urls).unwrap();
        assert_eq!(records[0].stored, None);
        assert_eq!(records[1].link().as_deref(), Some("images/pic.gif"));
        assert!(dir.path().join("images/pic.gif").exists());
        assert!(!dir.path().join("files").exists());
    }

    #[test]
    fn test_name_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .on_head("https://f.test/a", head("notes.txt", 3))
            .on_head("https://f.test/b", head("notes.txt", 3))
            .on_head("https://f.test/c", head("notes.txt", 3))
            .on_get("https://f.test/a", &[], HttpResponse::new(200).with_body("one"))
            .on_get("https://f.test/b", &[], HttpResponse::new(200).with_body("two"))
            .on_get("https://f.test/c", &[], HttpResponse::new(200).with_body("six"));
        let client = client(transport);
        let mut resolver = AttachmentResolver::new(&client, dir.path(), DownloadMode::All);

        let urls: Vec<String> = ["a", "b", "c"].iter().map(|s| format!("https://f.test/{}", s)).collect();
        let records = resolver.resolve(&urls).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["notes.txt", "notes-1.txt", "notes-2.txt"]);
        assert_eq!(fs::read_to_string(dir.path().join("files/notes.txt")).unwrap(), "one");
        assert_eq!(fs::read_to_string(dir.path().join("files/notes-1.txt")).unwrap(), "two");
    }

    #[test]
    fn test_deleted_attachment_is_skipped() {
        let dir = TempDir::new().unwrap();
        let client = client(ScriptedTransport::new());
        let mut resolver = AttachmentResolver::new(&client, dir.path(), DownloadMode::All);

        let records = resolver.resolve(&["https://f.test/gone".to_string()]).unwrap();
        assert!(records.is_empty());
        assert!(resolver.take_anomalies().is_empty());
    }

    #[test]
    fn test_missing_and_blank_names_are_anomalies() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .on_head("https://f.test/a", HttpResponse::new(200))
            .on_head("https://f.test/b", head("+++", 1));
        let client = client(transport);
        let mut resolver = AttachmentResolver::new(&client, dir.path(), DownloadMode::None);

        let urls = ["https://f.test/a".to_string(), "https://f.test/b".to_string()];
        let records = resolver.resolve(&urls).unwrap();
        assert_eq!(records[0].name, MISSING_NAME);
        assert_eq!(records[0].size, UNKNOWN_SIZE);
        assert_eq!(records[1].name, UNKNOWN_NAME);
        assert_eq!(resolver.take_anomalies().count(AnomalyKind::AttachmentName), 2);
    }

    #[test]
    fn test_download_failure_marks_record() {
        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .on_head("https://f.test/a", head("big.zip", 10))
            .on_get("https://f.test/a", &[], HttpResponse::new(500));
        let client = client(transport);
        let mut resolver = AttachmentResolver::new(&client, dir.path(), DownloadMode::All);

        let records = resolver.resolve(&["https://f.test/a".to_string()]).unwrap();
        assert!(records[0].failed);
        assert_eq!(records[0].stored, None);
        let anomalies = resolver.take_anomalies();
        assert_eq!(anomalies.count(AnomalyKind::AttachmentDownload), 1);
    }

    #[test]
    fn test_progress_carries_expected_total() {
        use std::sync::{Arc, Mutex};

        let dir = TempDir::new().unwrap();
        let transport = ScriptedTransport::new()
            .on_head("https://f.test/a", head("a.txt", 1))
            .on_head("https://f.test/b", head("b.txt", 1));
        let client = client(transport);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut resolver = AttachmentResolver::new(&client, dir.path(), DownloadMode::None)
            .with_expected(3)
            .with_progress(Arc::new(move |p: Progress| sink.lock().unwrap().push(p)));

        resolver.resolve(&["https://f.test/a".to_string()]).unwrap();
        resolver
            .resolve(&["https://f.test/b".to_string(), "https://f.test/gone".to_string()])
            .unwrap();

        let seen = seen.lock().unwrap();
        let percentages: Vec<_> = seen.iter().map(|p| p.percentage().unwrap().round()).collect();
        assert_eq!(percentages, vec![33.0, 67.0, 100.0]);
        assert!(seen.iter().all(|p| p.total_items == Some(3)));
        assert!(seen.last().unwrap().is_complete());
    }

    #[test]
    fn test_next_free_name_without_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README"), "x").unwrap();
        assert_eq!(next_free_name(dir.path(), "README"), "README-1");
        assert_eq!(next_free_name(dir.path(), "other"), "other");
    }
}

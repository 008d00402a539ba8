//! Progress reporting for long-running operations.
//!
//! Retrieval and downloads can take minutes for large spaces. The client and
//! the attachment resolver push [`Progress`] updates through a
//! [`ProgressCallback`] so the caller can show what is happening.
//!
//! # Example
//!
//! ```rust
//! use space_archive::progress::{Progress, ProgressCallback};
//! use std::sync::Arc;
//!
//! let callback: ProgressCallback = Arc::new(|progress| {
//!     println!("{}: {} items", progress.stage, progress.items_processed);
//! });
//!
//! for page in 1..=3usize {
//!     callback(Progress::new("messages", page * 900));
//! }
//! ```

use std::sync::Arc;

/// Progress information for a long-running operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    /// What is being processed ("messages", "members", "attachments", ...).
    pub stage: &'static str,

    /// Number of items processed so far.
    pub items_processed: usize,

    /// Total items to process, if known.
    pub total_items: Option<usize>,
}

impl Progress {
    /// Creates a new progress instance.
    pub fn new(stage: &'static str, items_processed: usize) -> Self {
        Self {
            stage,
            items_processed,
            total_items: None,
        }
    }

    /// Sets the total item count.
    #[must_use]
    pub fn with_total(mut self, total_items: usize) -> Self {
        self.total_items = Some(total_items);
        self
    }

    /// Returns the progress as a percentage (0.0 - 100.0).
    ///
    /// Returns `None` if the total is not known. Paginated retrieval never
    /// knows its total up front.
    ///
    /// ```rust
    /// use space_archive::progress::Progress;
    ///
    /// let progress = Progress::new("attachments", 3).with_total(4);
    /// assert_eq!(progress.percentage(), Some(75.0));
    ///
    /// assert_eq!(Progress::new("messages", 900).percentage(), None);
    /// ```
    pub fn percentage(&self) -> Option<f64> {
        self.total_items.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.items_processed as f64 / total as f64) * 100.0
            }
        })
    }

    /// Returns whether the operation is complete.
    pub fn is_complete(&self) -> bool {
        self.total_items
            .map(|total| self.items_processed >= total)
            .unwrap_or(false)
    }
}

/// Callback type for receiving progress updates.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Creates a progress callback that prints to stderr.
///
/// ```rust
/// use space_archive::progress::{stderr_progress, Progress};
///
/// let callback = stderr_progress();
/// // Prints "  attachments: 2/4 (50.0%)"
/// callback(Progress::new("attachments", 2).with_total(4));
/// // Prints "  attachments: 4/4 done"
/// callback(Progress::new("attachments", 4).with_total(4));
/// ```
pub fn stderr_progress() -> ProgressCallback {
    Arc::new(|progress| match (progress.total_items, progress.percentage()) {
        (Some(total), _) if progress.is_complete() => {
            eprintln!("  {}: {}/{} done", progress.stage, progress.items_processed, total);
        }
        (Some(total), Some(pct)) => eprintln!(
            "  {}: {}/{} ({:.1}%)",
            progress.stage, progress.items_processed, total, pct
        ),
        _ => eprintln!("  {}: {}", progress.stage, progress.items_processed),
    })
}

//! Recursive zip export of tree selections.
//!
//! [`zip`] walks the given entries depth-first with an explicit stack,
//! retrieves every file's bytes through its [`ContentSource`], and writes
//! them into an in-memory zip container at their tree-relative paths. A
//! directory contributes its name as a path segment, so archiving a root
//! produces `Home/a.txt`, `Home/Docs/b.txt`, and so on.
//!
//! The whole operation is one ordinary future: dropping it between awaits
//! cancels the walk and discards the partial buffer. Any single retrieval
//! or container failure aborts the operation; a partial archive is never
//! returned. Content is fetched one file at a time and no node lock is held
//! across an await.
//!
//! The walk takes no snapshot of the tree. Structural mutation of the
//! selected subtrees while an archive is in progress has no consistency
//! guarantee; callers must quiesce mutations for the duration.
//!
//! # Example
//!
//! ```no_run
//! use fmtree_core::{archive, Entry};
//!
//! # async fn example() -> Result<(), fmtree_core::ArchiveError> {
//! let home = Entry::<()>::home();
//! if let Some(entry) = archive::zip(&[home]).await? {
//!     assert_eq!(entry.content_type(), "application/zip");
//! }
//! # Ok(())
//! # }
//! ```

use std::io::{Cursor, Write};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, instrument, trace};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::content::{ContentError, ContentSource};
use crate::tree::{Entry, EntryKind, FileSpec};

/// Error surfaced by the archive operations.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// A file's content retrieval failed; the archive was abandoned.
    #[error(transparent)]
    Content(#[from] ContentError),
    /// The zip container rejected a write.
    #[error("zip serialization failed: {0}")]
    Zip(#[from] ZipError),
    /// The in-memory buffer failed to accept bytes.
    #[error("archive buffer write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize the given subtrees into zip container bytes.
///
/// Returns `Ok(None)` for an empty selection; an empty archive is never
/// produced for it. Directories that contain no files still shape the paths
/// of deeper entries but are not written themselves. Duplicate paths are
/// written as-is (the container keeps the last one).
#[instrument(level = "debug", skip(entries), fields(roots = entries.len()))]
pub async fn zip_bytes<T>(entries: &[Arc<Entry<T>>]) -> Result<Option<Vec<u8>>, ArchiveError> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    // (entry, path prefix of its parent); explicit stack, pre-order
    let mut stack: Vec<(Arc<Entry<T>>, String)> = Vec::new();
    for entry in entries.iter().rev() {
        stack.push((entry.clone(), String::new()));
    }

    while let Some((entry, prefix)) = stack.pop() {
        let name = entry.name();
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        match entry.kind() {
            EntryKind::Directory => {
                let files = entry.files();
                let dirs = entry.dirs();
                for file in files.into_iter().rev() {
                    stack.push((file, path.clone()));
                }
                for dir in dirs.into_iter().rev() {
                    stack.push((dir, path.clone()));
                }
            }
            EntryKind::File => {
                // Cloned source; the entry is unlocked while we await
                let bytes = match entry.content() {
                    Some(source) => source.bytes().await?,
                    None => Vec::new(),
                };
                writer.start_file(path.as_str(), options)?;
                writer.write_all(&bytes)?;
                trace!(path = %path, len = bytes.len(), "file added to archive");
            }
        }
    }

    let cursor = writer.finish()?;
    Ok(Some(cursor.into_inner()))
}

/// Serialize the given subtrees and wrap the result in a synthetic file
/// entry named `archive_<UTC timestamp>.zip`.
///
/// The entry is detached (no parent), carries the archive bytes as resident
/// content, and reports `application/zip`. Returns `Ok(None)` for an empty
/// selection.
pub async fn zip<T: Default>(
    entries: &[Arc<Entry<T>>],
) -> Result<Option<Arc<Entry<T>>>, ArchiveError> {
    let Some(bytes) = zip_bytes(entries).await? else {
        return Ok(None);
    };

    let name = format!("archive_{}.zip", Utc::now().format("%Y%m%d%H%M%S"));
    let size = bytes.len();
    let entry = Entry::detached_file(FileSpec::new(name, ContentSource::from_bytes(bytes)));
    debug!(name = %entry.name(), size, "archive entry built");
    Ok(Some(entry))
}

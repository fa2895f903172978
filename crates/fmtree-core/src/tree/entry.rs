//! Tree nodes: identity, metadata, payload, and name-level operations.
//!
//! An [`Entry`] is always handled as `Arc<Entry<T>>`. Identity (id, kind,
//! payload) is fixed at construction; everything user-visible that can change
//! (name, stat, content, parent, children, sort settings) sits behind its own
//! `parking_lot::RwLock`, so a shared node can be read and mutated from any
//! thread without a tree-wide lock.
//!
//! Nodes are built through [`Entry::home`], the `detached_*` constructors, or
//! the child-creating operations in [`crate::tree`]. A detached node owns its
//! subtree and stays fully usable until the last `Arc` drops; attaching it
//! only swaps the non-owning parent back-reference.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sort::{MergeCache, SortSpec};
use super::TreeError;
use crate::content::{mime, ContentSource};

/// Name given to tree roots created by [`Entry::home`].
pub const ROOT_NAME: &str = "Home";

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a tree node.
///
/// IDs are minted from a monotonically increasing counter starting at 1 and
/// are never reused, so a stale id can never alias a newer node. Equality and
/// hashing of entries go through this id alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> Self {
        EntryId(NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of node an entry is. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Holds child entries, never content.
    Directory,
    /// Holds a [`ContentSource`], never children.
    File,
}

/// Size and timestamp metadata of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntryStat {
    /// Byte length for files (provisional 0 for provider-backed content
    /// until the host sets one); always 0 for directories.
    pub size: u64,
    /// Creation timestamp.
    pub created: DateTime<Utc>,
    /// Last mutation of name, content, or size.
    pub modified: DateTime<Utc>,
}

/// Owned child collections of a directory, split by kind.
///
/// The split keeps the directories-first listing policy a cheap partition
/// instead of a per-sort scan.
pub(crate) struct Children<T> {
    pub(crate) dirs: Vec<Arc<Entry<T>>>,
    pub(crate) files: Vec<Arc<Entry<T>>>,
}

impl<T> Default for Children<T> {
    fn default() -> Self {
        Self {
            dirs: Vec::new(),
            files: Vec::new(),
        }
    }
}

impl<T> Children<T> {
    pub(crate) fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    /// Remove the child with the given id from whichever bucket holds it.
    pub(crate) fn remove_by_id(&mut self, id: EntryId) -> Option<Arc<Entry<T>>> {
        if let Some(pos) = self.dirs.iter().position(|e| e.id() == id) {
            return Some(self.dirs.remove(pos));
        }
        if let Some(pos) = self.files.iter().position(|e| e.id() == id) {
            return Some(self.files.remove(pos));
        }
        None
    }
}

/// Capability flags carried by an entry payload.
///
/// Hosts that gate UI actions per entry (a read-only share, a protected
/// system folder) implement this on their payload type; everything defaults
/// to allowed. The unit payload `()` allows everything.
pub trait Capabilities {
    /// Whether the entry may be renamed.
    fn renamable(&self) -> bool {
        true
    }

    /// Whether the entry may be removed from its parent.
    fn deletable(&self) -> bool {
        true
    }

    /// Whether the entry's content may be handed to a download/archive surface.
    fn downloadable(&self) -> bool {
        true
    }
}

impl Capabilities for () {}

/// A node of the virtual file tree.
///
/// `T` is an opaque application payload; the tree stores and returns it but
/// never interprets it. See the [module docs](self) for the ownership and
/// locking model.
pub struct Entry<T> {
    /// Weak self-reference, set by `Arc::new_cyclic`. Lets `&self` methods
    /// hand out owning clones and parent child nodes.
    pub(crate) me: Weak<Entry<T>>,
    id: EntryId,
    kind: EntryKind,
    payload: T,
    pub(crate) name: RwLock<String>,
    stat: RwLock<EntryStat>,
    content: RwLock<Option<ContentSource>>,
    pub(crate) parent: RwLock<Weak<Entry<T>>>,
    pub(crate) children: RwLock<Children<T>>,
    pub(crate) sort: RwLock<SortSpec>,
    pub(crate) merge: RwLock<MergeCache<T>>,
}

impl<T> Entry<T> {
    fn construct(
        kind: EntryKind,
        name: String,
        payload: T,
        content: Option<ContentSource>,
        stat: EntryStat,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            id: EntryId::next(),
            kind,
            payload,
            name: RwLock::new(name),
            stat: RwLock::new(stat),
            content: RwLock::new(content),
            parent: RwLock::new(Weak::new()),
            children: RwLock::new(Children::default()),
            sort: RwLock::new(SortSpec::default()),
            merge: RwLock::new(MergeCache::new()),
        })
    }

    /// Create a root directory named [`ROOT_NAME`].
    pub fn home() -> Arc<Self>
    where
        T: Default,
    {
        Self::home_with(T::default())
    }

    /// Create a root directory named [`ROOT_NAME`] with an explicit payload.
    pub fn home_with(payload: T) -> Arc<Self> {
        Self::detached_directory_with(ROOT_NAME, payload)
    }

    /// Create a standalone directory, not attached to any parent.
    ///
    /// Standalone constructors do not validate the name; the attaching
    /// operations ([`create_directory`](Entry::create_directory) and friends)
    /// do.
    pub fn detached_directory(name: impl Into<String>) -> Arc<Self>
    where
        T: Default,
    {
        Self::detached_directory_with(name, T::default())
    }

    /// Create a standalone directory with an explicit payload.
    pub fn detached_directory_with(name: impl Into<String>, payload: T) -> Arc<Self> {
        let now = Utc::now();
        Self::construct(
            EntryKind::Directory,
            name.into(),
            payload,
            None,
            EntryStat {
                size: 0,
                created: now,
                modified: now,
            },
        )
    }

    /// Create a standalone file from a [`FileSpec`].
    pub fn detached_file(spec: FileSpec<T>) -> Arc<Self> {
        spec.build()
    }

    /// Owning clone of this node.
    pub(crate) fn self_arc(&self) -> Arc<Entry<T>> {
        self.me.upgrade().expect("entries are always Arc-owned")
    }

    /// Stable identifier of this entry.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Directory or file.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// Check if this entry is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    /// The application payload attached at construction.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Current display name (for files, including the extension).
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Size, creation, and modification metadata as one snapshot.
    pub fn stat(&self) -> EntryStat {
        *self.stat.read()
    }

    /// Byte size. Directories report 0; see
    /// [`total_size`](Entry::total_size) for the subtree aggregate.
    pub fn size(&self) -> u64 {
        self.stat.read().size
    }

    /// Creation timestamp.
    pub fn created(&self) -> DateTime<Utc> {
        self.stat.read().created
    }

    /// Last modification timestamp.
    pub fn modified(&self) -> DateTime<Utc> {
        self.stat.read().modified
    }

    /// The parent directory, if this entry is attached to one.
    ///
    /// The back-reference is weak: it never keeps a parent alive, and it is
    /// cleared when the entry is removed from its parent.
    pub fn parent(&self) -> Option<Arc<Entry<T>>> {
        self.parent.read().upgrade()
    }

    /// Check if the name carries an extension.
    pub fn has_extension(&self) -> bool {
        self.extension().is_some()
    }

    /// The final dot-delimited suffix of a file name.
    ///
    /// Directories have no extension. Dotfiles (`.gitignore`) and names with
    /// a trailing dot have none either, matching `std::path::Path`.
    pub fn extension(&self) -> Option<String> {
        if self.is_directory() {
            return None;
        }
        let name = self.name.read();
        split_extension(name.as_str()).1.map(str::to_owned)
    }

    /// Content type derived from the extension via the static table in
    /// [`crate::content::mime`]. Entries without an extension (directories
    /// always) report [`mime::FALLBACK`].
    pub fn content_type(&self) -> &'static str {
        match self.extension() {
            Some(ext) => mime::from_extension(&ext),
            None => mime::FALLBACK,
        }
    }

    /// The entry's content source. `None` for directories.
    pub fn content(&self) -> Option<ContentSource> {
        self.content.read().clone()
    }

    /// Retrieve the entry's bytes through its content source.
    ///
    /// Directories yield an empty buffer. The source is cloned out before
    /// awaiting, so no node lock is held across the await point.
    pub async fn bytes(&self) -> Result<Vec<u8>, crate::content::ContentError> {
        let source = self.content.read().clone();
        match source {
            Some(source) => source.bytes().await,
            None => Ok(Vec::new()),
        }
    }

    /// Rename this entry, preserving a file's extension.
    ///
    /// `new_base` replaces the name stem: `"report.txt"` renamed to `"q3"`
    /// becomes `"q3.txt"`, while directories (and extension-less files) take
    /// `new_base` verbatim. Updates `modified` and invalidates the parent's
    /// merged view, since the entry may land elsewhere under any sort key.
    pub fn rename(&self, new_base: &str) -> Result<(), TreeError> {
        validate_name(new_base)?;
        {
            let mut name = self.name.write();
            let next = if self.is_file() {
                match split_extension(name.as_str()) {
                    (_, Some(ext)) => format!("{new_base}.{ext}"),
                    (_, None) => new_base.to_owned(),
                }
            } else {
                new_base.to_owned()
            };
            debug!(from = %name, to = %next, "renaming entry");
            *name = next;
        }
        self.stat.write().modified = Utc::now();
        if let Some(parent) = self.parent() {
            parent.invalidate_merged();
        }
        Ok(())
    }

    /// Swap a file's content source.
    ///
    /// The size is refreshed from the new source's length hint (provisional 0
    /// for providers), `modified` is updated, and the parent's merged view is
    /// invalidated. Fails with [`TreeError::NotAFile`] on directories.
    pub fn set_content(&self, source: ContentSource) -> Result<(), TreeError> {
        if !self.is_file() {
            return Err(TreeError::NotAFile { name: self.name() });
        }
        let size = source.len_hint().unwrap_or(0);
        *self.content.write() = Some(source);
        {
            let mut stat = self.stat.write();
            stat.size = size;
            stat.modified = Utc::now();
        }
        if let Some(parent) = self.parent() {
            parent.invalidate_merged();
        }
        Ok(())
    }

    /// Set the byte size directly.
    ///
    /// For provider-backed files whose length the host knows out of band.
    /// Invalidates the parent's merged view (the entry moves under the size
    /// key).
    pub fn set_size(&self, size: u64) {
        self.stat.write().size = size;
        if let Some(parent) = self.parent() {
            parent.invalidate_merged();
        }
    }
}

impl<T: Capabilities> Entry<T> {
    /// Whether the payload allows renaming.
    pub fn is_renamable(&self) -> bool {
        self.payload.renamable()
    }

    /// Whether the payload allows removal.
    pub fn is_deletable(&self) -> bool {
        self.payload.deletable()
    }

    /// Whether the payload allows downloading/archiving.
    pub fn is_downloadable(&self) -> bool {
        self.payload.downloadable()
    }
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Entry<T> {}

impl<T> Hash for Entry<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Entry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &*self.name.read())
            .finish_non_exhaustive()
    }
}

/// Split a name into `(stem, extension)` with `std::path::Path` semantics.
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

/// Reject empty names and names containing path separators.
pub(crate) fn validate_name(name: &str) -> Result<(), TreeError> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(TreeError::InvalidName {
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Builder for file entries.
///
/// Unset fields fall back at build time: the size to the content source's
/// length hint (0 for providers), the timestamps to now.
///
/// # Example
///
/// ```
/// use fmtree_core::{ContentSource, Entry, FileSpec};
///
/// let spec = FileSpec::new("notes.txt", ContentSource::from_bytes(b"hi".to_vec()));
/// let file = Entry::<()>::detached_file(spec);
/// assert_eq!(file.size(), 2);
/// ```
pub struct FileSpec<T> {
    pub(crate) name: String,
    content: ContentSource,
    payload: T,
    size: Option<u64>,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

impl<T: Default> FileSpec<T> {
    /// Spec for a file with a default payload.
    ///
    /// Pair with [`ContentSource::empty`] for a placeholder entry that a
    /// later [`Entry::set_content`] fills in.
    pub fn new(name: impl Into<String>, content: ContentSource) -> Self {
        Self::with_payload(name, content, T::default())
    }
}

impl<T> FileSpec<T> {
    /// Spec for a file with an explicit payload.
    pub fn with_payload(name: impl Into<String>, content: ContentSource, payload: T) -> Self {
        Self {
            name: name.into(),
            content,
            payload,
            size: None,
            created: None,
            modified: None,
        }
    }

    /// Override the size instead of taking the content length hint.
    #[must_use]
    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Override the creation timestamp.
    #[must_use]
    pub fn created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Override the modification timestamp.
    #[must_use]
    pub fn modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    fn build(self) -> Arc<Entry<T>> {
        let now = Utc::now();
        let size = self.size.or_else(|| self.content.len_hint()).unwrap_or(0);
        Entry::construct(
            EntryKind::File,
            self.name,
            self.payload,
            Some(self.content),
            EntryStat {
                size,
                created: self.created.unwrap_or(now),
                modified: self.modified.unwrap_or(now),
            },
        )
    }
}

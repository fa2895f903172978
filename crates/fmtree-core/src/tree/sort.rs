//! Sort settings and the per-directory merge cache.
//!
//! Every directory carries its own [`SortSpec`] and a [`MergeCache`] holding
//! the last computed merged view of its children. The cache is a two-state
//! valid/invalid flag, not a TTL: structural mutations and sort changes mark
//! it invalid, and the next [`Entry::merged`] call recomputes. Nothing is
//! recomputed eagerly.
//!
//! # Ordering
//!
//! Directories come before files unless `dirs_first` is switched off. Within
//! a partition the chosen key orders entries (names and extensions fold case
//! before falling back to the exact string); ties fall back to the
//! case-folded name and finally the entry id, so the ordering is total and
//! stable across recomputes. `Descending` reverses the whole comparison.

use std::cmp::Ordering;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::entry::Entry;

/// Key a directory listing is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SortKey {
    /// Case-insensitive name.
    #[default]
    Name,
    /// File extension; extension-less entries order first.
    Extension,
    /// Byte size.
    Size,
    /// Creation timestamp.
    Created,
    /// Modification timestamp.
    Modified,
}

/// Direction of a sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Complete ordering settings of one directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SortSpec {
    pub key: SortKey,
    pub order: SortOrder,
    /// Partition directories before files regardless of key and order.
    pub dirs_first: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Name,
            order: SortOrder::Ascending,
            dirs_first: true,
        }
    }
}

impl SortSpec {
    /// Total comparison of two entries under these settings.
    pub(crate) fn compare<T>(&self, a: &Entry<T>, b: &Entry<T>) -> Ordering {
        let by_key = match self.key {
            // The name tie-break below doubles as the primary key
            SortKey::Name => Ordering::Equal,
            SortKey::Extension => compare_extensions(a.extension(), b.extension()),
            SortKey::Size => a.size().cmp(&b.size()),
            SortKey::Created => a.created().cmp(&b.created()),
            SortKey::Modified => a.modified().cmp(&b.modified()),
        };
        let total = by_key
            .then_with(|| fold_names(&a.name(), &b.name()))
            .then_with(|| a.id().cmp(&b.id()));
        match self.order {
            SortOrder::Ascending => total,
            SortOrder::Descending => total.reverse(),
        }
    }
}

fn fold_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_extensions(a: Option<String>, b: Option<String>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => fold_names(&a, &b),
    }
}

/// Cached merged view of a directory's children.
pub(crate) enum CacheState<T> {
    Valid(Vec<Arc<Entry<T>>>),
    Invalid,
}

/// Per-directory cache state plus the counters guarding and observing it.
///
/// `epoch` counts invalidations: a recompute that started before an
/// invalidation must not overwrite it, so fills are discarded when the epoch
/// moved underneath them. `generation` counts successful recomputes and is
/// exposed for host instrumentation and tests.
pub(crate) struct MergeCache<T> {
    state: CacheState<T>,
    epoch: u64,
    generation: u64,
}

impl<T> MergeCache<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: CacheState::Invalid,
            epoch: 0,
            generation: 0,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        self.state = CacheState::Invalid;
        self.epoch += 1;
    }

    pub(crate) fn view(&self) -> Option<&[Arc<Entry<T>>]> {
        match &self.state {
            CacheState::Valid(view) => Some(view),
            CacheState::Invalid => None,
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        matches!(self.state, CacheState::Valid(_))
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn fill(&mut self, view: Vec<Arc<Entry<T>>>) {
        self.state = CacheState::Valid(view);
        self.generation += 1;
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T> Entry<T> {
    /// Current sort settings of this directory.
    pub fn sort_spec(&self) -> SortSpec {
        *self.sort.read()
    }

    /// Set the sort key and order for this directory and invalidate its
    /// merged view.
    ///
    /// Applies to this node only; child directories keep their own settings.
    pub fn sort(&self, order: SortOrder, key: SortKey) {
        {
            let mut spec = self.sort.write();
            spec.key = key;
            spec.order = order;
        }
        trace!(?key, ?order, "sort settings changed");
        self.invalidate_merged();
    }

    /// Toggle the directories-before-files partition and invalidate.
    pub fn set_dirs_first(&self, dirs_first: bool) {
        self.sort.write().dirs_first = dirs_first;
        self.invalidate_merged();
    }

    /// Mark the merged view stale.
    ///
    /// The mutating operations call this themselves; it is public for
    /// callers who mutate entry metadata out of band.
    pub fn invalidate_merged(&self) {
        self.merge.write().invalidate();
    }

    /// Check if the merged view is currently memoized.
    pub fn is_merge_valid(&self) -> bool {
        self.merge.read().is_valid()
    }

    /// Number of merged-view recomputes this directory has performed.
    ///
    /// Stable across cached reads; a cheap handle for instrumentation and
    /// cache-behavior assertions.
    pub fn merge_generation(&self) -> u64 {
        self.merge.read().generation()
    }

    /// The merged, sorted view of this directory's children.
    ///
    /// Returns the memoized view when valid; otherwise recomputes it from
    /// the child collections under the current [`SortSpec`], memoizes, and
    /// returns it. Files and empty directories yield an empty view.
    pub fn merged(&self) -> Vec<Arc<Entry<T>>> {
        let observed_epoch = {
            let cache = self.merge.read();
            if let Some(view) = cache.view() {
                return view.to_vec();
            }
            cache.epoch()
        };

        let spec = *self.sort.read();
        let (mut dirs, mut files) = {
            let children = self.children.read();
            (children.dirs.clone(), children.files.clone())
        };

        let view = if spec.dirs_first {
            dirs.sort_by(|a, b| spec.compare(a, b));
            files.sort_by(|a, b| spec.compare(a, b));
            dirs.append(&mut files);
            dirs
        } else {
            dirs.append(&mut files);
            dirs.sort_by(|a, b| spec.compare(a, b));
            dirs
        };

        let mut cache = self.merge.write();
        if cache.epoch() == observed_epoch {
            cache.fill(view.clone());
            trace!(
                len = view.len(),
                generation = cache.generation(),
                "merged view recomputed"
            );
        }
        // An invalidation that raced this recompute wins; the next call
        // recomputes against the newer children state.
        view
    }
}

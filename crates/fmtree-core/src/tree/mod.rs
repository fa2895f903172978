//! The virtual file tree: nodes, ordering, traversal, and mutation.
//!
//! # Architecture
//!
//! - [`entry`] - the [`Entry`] node type, identity, metadata, payloads
//! - [`sort`] - per-directory sort settings and the lazy merge cache
//! - [`search`] - explicit-stack pre-order traversal and lookup
//!
//! Structural mutation lives in this module: creating children, attaching
//! pre-built subtrees, removing, and re-parenting. Every mutation marks the
//! affected directory's merged view invalid exactly once, however many
//! entries it touched; the view is recomputed lazily on the next
//! [`Entry::merged`] call.
//!
//! # Thread safety
//!
//! Nodes are `Send + Sync` for `Send + Sync` payloads and all operations
//! take `&self`, so an `Arc<Entry<T>>` can be shared freely. Operations are
//! individually consistent but there is no cross-operation snapshot: a
//! concurrent walk sees mutations in the parts it has not visited yet.
//! Internally no operation holds more than one lock at a time, so the API
//! cannot deadlock against itself.
//!
//! # Example
//!
//! ```
//! use fmtree_core::{ContentSource, Entry, FileSpec};
//!
//! let home = Entry::<()>::home();
//! let docs = home.create_directory("Documents")?;
//! docs.create_file(FileSpec::new(
//!     "notes.txt",
//!     ContentSource::from_bytes(b"jot this down".to_vec()),
//! ))?;
//!
//! assert_eq!(home.merged().len(), 1);
//! assert_eq!(docs.path(), "Home/Documents");
//! # Ok::<(), fmtree_core::TreeError>(())
//! ```

pub mod entry;
pub mod search;
pub mod sort;

pub use entry::{Capabilities, Entry, EntryId, EntryKind, EntryStat, FileSpec, ROOT_NAME};
pub use search::{NameMatches, Walk};
pub use sort::{SortKey, SortOrder, SortSpec};

use std::sync::{Arc, Weak};

use thiserror::Error;
use tracing::debug;

use entry::validate_name;

/// Error for structural and name-level tree operations.
#[derive(Error, Debug)]
pub enum TreeError {
    /// Target of a child-creating or attaching operation is a file.
    #[error("'{name}' is not a directory")]
    NotADirectory { name: String },
    /// Content operation aimed at a directory.
    #[error("'{name}' is not a file")]
    NotAFile { name: String },
    /// Empty name, or a name containing a path separator.
    #[error("invalid entry name {name:?}")]
    InvalidName { name: String },
    /// Attaching the entry would make it its own ancestor.
    #[error("attaching '{name}' would create a cycle")]
    WouldCycle { name: String },
}

impl<T> Entry<T> {
    /// Create a directory with a default payload under this one.
    ///
    /// The child is appended to the directory collection and the merged view
    /// is invalidated. Fails with [`TreeError::NotADirectory`] when `self`
    /// is a file and [`TreeError::InvalidName`] on empty or separator-bearing
    /// names.
    pub fn create_directory(&self, name: impl Into<String>) -> Result<Arc<Entry<T>>, TreeError>
    where
        T: Default,
    {
        self.create_directory_with(name, T::default())
    }

    /// Create a directory with an explicit payload under this one.
    pub fn create_directory_with(
        &self,
        name: impl Into<String>,
        payload: T,
    ) -> Result<Arc<Entry<T>>, TreeError> {
        let name = name.into();
        self.require_directory()?;
        validate_name(&name)?;
        let child = Entry::detached_directory_with(name, payload);
        self.attach(&child);
        self.invalidate_merged();
        debug!(parent = %self.name(), child = %child.name(), "created directory");
        Ok(child)
    }

    /// Create a file under this directory from a [`FileSpec`].
    ///
    /// For a placeholder entry, pair it with
    /// [`ContentSource::empty`](crate::content::ContentSource::empty).
    pub fn create_file(&self, spec: FileSpec<T>) -> Result<Arc<Entry<T>>, TreeError> {
        self.require_directory()?;
        validate_name(&spec.name)?;
        let child = Entry::detached_file(spec);
        self.attach(&child);
        self.invalidate_merged();
        debug!(parent = %self.name(), child = %child.name(), "created file");
        Ok(child)
    }

    /// Attach one pre-built entry; see [`add_all`](Entry::add_all).
    pub fn add(&self, entry: Arc<Entry<T>>) -> Result<(), TreeError> {
        self.add_all([entry])
    }

    /// Attach pre-built entries of either kind, re-parenting as needed.
    ///
    /// Each entry is detached from its previous parent (whose merged view is
    /// invalidated) and appended to the matching collection here; this
    /// directory's view is invalidated once for the whole batch. Entries
    /// already under `self` are left in place.
    ///
    /// Fails with [`TreeError::WouldCycle`] if any entry is `self` or an
    /// ancestor of `self`; the batch is checked up front, so a failure
    /// mutates nothing.
    pub fn add_all<I>(&self, entries: I) -> Result<(), TreeError>
    where
        I: IntoIterator<Item = Arc<Entry<T>>>,
    {
        self.require_directory()?;
        let entries: Vec<_> = entries.into_iter().collect();
        for entry in &entries {
            self.ensure_no_cycle(entry)?;
        }

        let mut attached = 0usize;
        for entry in entries {
            if let Some(old_parent) = entry.parent() {
                if old_parent.id() == self.id() {
                    continue;
                }
                old_parent.detach_child(entry.id());
                old_parent.invalidate_merged();
            }
            self.attach(&entry);
            attached += 1;
        }
        if attached > 0 {
            self.invalidate_merged();
            debug!(parent = %self.name(), attached, "attached entries");
        }
        Ok(())
    }

    /// Detach a child entry.
    ///
    /// Returns `false` when the entry is not a child of `self`, making
    /// repeated removal a no-op. The detached entry keeps its children and
    /// content and stays fully usable while referenced; only its parent
    /// back-reference is cleared.
    pub fn remove(&self, entry: &Arc<Entry<T>>) -> bool {
        match self.detach_child(entry.id()) {
            Some(detached) => {
                *detached.parent.write() = Weak::new();
                self.invalidate_merged();
                debug!(parent = %self.name(), child = %detached.name(), "removed entry");
                true
            }
            None => false,
        }
    }

    /// Detach several children, skipping entries that are not here.
    ///
    /// Returns how many were removed. The merged view is invalidated once
    /// for the whole batch.
    pub fn remove_all<'a, I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = &'a Arc<Entry<T>>>,
        T: 'a,
    {
        let mut removed = 0usize;
        for entry in entries {
            if let Some(detached) = self.detach_child(entry.id()) {
                *detached.parent.write() = Weak::new();
                removed += 1;
            }
        }
        if removed > 0 {
            self.invalidate_merged();
            debug!(parent = %self.name(), removed, "removed entries");
        }
        removed
    }

    /// Detach all children at once.
    pub fn clear(&self) {
        let drained: Vec<Arc<Entry<T>>> = {
            let mut guard = self.children.write();
            let children = &mut *guard;
            let mut all = Vec::with_capacity(children.len());
            all.append(&mut children.dirs);
            all.append(&mut children.files);
            all
        };
        if drained.is_empty() {
            return;
        }
        for entry in &drained {
            *entry.parent.write() = Weak::new();
        }
        self.invalidate_merged();
        debug!(parent = %self.name(), cleared = drained.len(), "cleared directory");
    }

    /// Re-parent this entry under `new_parent`.
    ///
    /// Equivalent to `new_parent.add(entry)`: the same re-parenting, cycle
    /// check, and invalidation of both directories apply.
    pub fn move_to(&self, new_parent: &Arc<Entry<T>>) -> Result<(), TreeError> {
        new_parent.add(self.self_arc())
    }

    /// Snapshot of the directory children, insertion-ordered.
    pub fn dirs(&self) -> Vec<Arc<Entry<T>>> {
        self.children.read().dirs.clone()
    }

    /// Snapshot of the file children, insertion-ordered.
    pub fn files(&self) -> Vec<Arc<Entry<T>>> {
        self.children.read().files.clone()
    }

    /// Number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    fn require_directory(&self) -> Result<(), TreeError> {
        if self.is_directory() {
            Ok(())
        } else {
            Err(TreeError::NotADirectory { name: self.name() })
        }
    }

    /// Refuse attaching `entry` under `self` when `entry` is `self` or one
    /// of its ancestors.
    fn ensure_no_cycle(&self, entry: &Arc<Entry<T>>) -> Result<(), TreeError> {
        let mut cursor = Some(self.self_arc());
        while let Some(node) = cursor {
            if node.id() == entry.id() {
                return Err(TreeError::WouldCycle { name: entry.name() });
            }
            cursor = node.parent();
        }
        Ok(())
    }

    fn attach(&self, child: &Arc<Entry<T>>) {
        *child.parent.write() = self.me.clone();
        let mut children = self.children.write();
        match child.kind() {
            EntryKind::Directory => children.dirs.push(child.clone()),
            EntryKind::File => children.files.push(child.clone()),
        }
    }

    fn detach_child(&self, id: EntryId) -> Option<Arc<Entry<T>>> {
        self.children.write().remove_by_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentSource;

    fn file_spec(name: &str) -> FileSpec<()> {
        FileSpec::new(name, ContentSource::empty())
    }

    #[test]
    fn test_create_directory_wires_parent_and_kind() {
        let home = Entry::<()>::home();
        let docs = home.create_directory("Docs").unwrap();

        assert!(docs.is_directory());
        assert_eq!(docs.parent().unwrap(), home);
        assert_eq!(home.dirs().len(), 1);
        assert!(home.files().is_empty());
        assert_eq!(docs.path(), "Home/Docs");
    }

    #[test]
    fn test_create_file_lands_in_the_file_bucket() {
        let home = Entry::<()>::home();
        let f = home.create_file(file_spec("a.txt")).unwrap();

        assert!(f.is_file());
        assert_eq!(f.parent().unwrap(), home);
        assert_eq!(home.files().len(), 1);
        assert!(home.dirs().is_empty());
    }

    #[test]
    fn test_create_under_a_file_fails() {
        let home = Entry::<()>::home();
        let f = home.create_file(file_spec("a.txt")).unwrap();

        assert!(matches!(
            f.create_directory("sub"),
            Err(TreeError::NotADirectory { .. })
        ));
        assert!(matches!(
            f.create_file(file_spec("b.txt")),
            Err(TreeError::NotADirectory { .. })
        ));
        assert_eq!(f.child_count(), 0);
    }

    #[test]
    fn test_create_rejects_invalid_names() {
        let home = Entry::<()>::home();
        assert!(matches!(
            home.create_directory(""),
            Err(TreeError::InvalidName { .. })
        ));
        assert!(matches!(
            home.create_file(file_spec("a/b.txt")),
            Err(TreeError::InvalidName { .. })
        ));
        assert_eq!(home.child_count(), 0);
    }

    #[test]
    fn test_create_directory_with_payload() {
        let home = Entry::<u32>::home_with(0);
        let docs = home.create_directory_with("Docs", 7).unwrap();
        assert_eq!(*docs.payload(), 7);
    }

    #[test]
    fn test_add_all_attaches_mixed_kinds() {
        let home = Entry::<()>::home();
        let dir = Entry::<()>::detached_directory("bundle");
        let file = Entry::<()>::detached_file(file_spec("b.txt"));

        home.add_all([dir.clone(), file.clone()]).unwrap();

        assert_eq!(home.dirs(), [dir.clone()]);
        assert_eq!(home.files(), [file.clone()]);
        assert_eq!(dir.parent().unwrap(), home);
        assert_eq!(file.parent().unwrap(), home);
    }

    #[test]
    fn test_add_all_reparents_from_old_parent() {
        let home = Entry::<()>::home();
        let src = home.create_directory("src").unwrap();
        let dst = home.create_directory("dst").unwrap();
        let f = src.create_file(file_spec("a.txt")).unwrap();
        src.merged();
        assert!(src.is_merge_valid());

        dst.add_all([f.clone()]).unwrap();

        assert!(src.files().is_empty(), "moved out of the old parent");
        assert_eq!(dst.files(), [f.clone()]);
        assert_eq!(f.parent().unwrap(), dst);
        assert!(!src.is_merge_valid(), "old parent view went stale");
    }

    #[test]
    fn test_add_all_is_one_invalidation_per_batch() {
        let home = Entry::<()>::home();
        home.merged();
        let g = home.merge_generation();

        let batch: Vec<_> = (0..4)
            .map(|i| Entry::<()>::detached_file(file_spec(&format!("f{i}.txt"))))
            .collect();
        home.add_all(batch).unwrap();

        assert_eq!(home.merged().len(), 4);
        assert_eq!(home.merge_generation(), g + 1, "one recompute for the batch");
    }

    #[test]
    fn test_add_existing_child_is_a_no_op() {
        let home = Entry::<()>::home();
        let f = home.create_file(file_spec("a.txt")).unwrap();

        home.add(f.clone()).unwrap();

        assert_eq!(home.files().len(), 1, "no duplicate membership");
        assert_eq!(f.parent().unwrap(), home);
    }

    #[test]
    fn test_add_self_is_a_cycle() {
        let home = Entry::<()>::home();
        let err = home.add(home.clone()).unwrap_err();
        assert!(matches!(err, TreeError::WouldCycle { .. }));
    }

    #[test]
    fn test_add_ancestor_is_a_cycle() {
        let home = Entry::<()>::home();
        let a = home.create_directory("a").unwrap();
        let b = a.create_directory("b").unwrap();

        let err = b.add(home.clone()).unwrap_err();
        assert!(matches!(err, TreeError::WouldCycle { .. }));
        assert_eq!(home.parent(), None, "failed attach mutates nothing");
        assert_eq!(b.child_count(), 0);
    }

    #[test]
    fn test_add_all_failure_leaves_the_batch_unattached() {
        let home = Entry::<()>::home();
        let sub = home.create_directory("sub").unwrap();
        let clean = Entry::<()>::detached_file(file_spec("ok.txt"));

        let err = sub.add_all([clean.clone(), home.clone()]).unwrap_err();

        assert!(matches!(err, TreeError::WouldCycle { .. }));
        assert!(clean.parent().is_none(), "nothing from the batch attached");
        assert_eq!(sub.child_count(), 0);
    }

    #[test]
    fn test_add_all_to_a_file_fails() {
        let home = Entry::<()>::home();
        let f = home.create_file(file_spec("a.txt")).unwrap();
        let orphan = Entry::<()>::detached_file(file_spec("b.txt"));

        assert!(matches!(
            f.add_all([orphan]),
            Err(TreeError::NotADirectory { .. })
        ));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let home = Entry::<()>::home();
        let f = home.create_file(file_spec("a.txt")).unwrap();

        assert!(home.remove(&f));
        assert!(!home.remove(&f), "second removal is a no-op");
        assert!(home.files().is_empty());
        assert!(f.parent().is_none());
    }

    #[test]
    fn test_remove_foreign_entry_returns_false() {
        let home = Entry::<()>::home();
        let stranger = Entry::<()>::detached_file(file_spec("x.txt"));
        assert!(!home.remove(&stranger));
    }

    #[test]
    fn test_removed_subtree_stays_usable() {
        let home = Entry::<()>::home();
        let docs = home.create_directory("Docs").unwrap();
        let f = docs.create_file(file_spec("a.txt")).unwrap();

        home.remove(&docs);

        assert_eq!(docs.files(), [f.clone()]);
        docs.create_file(file_spec("b.txt")).unwrap();
        assert_eq!(docs.child_count(), 2);
        assert_eq!(docs.merged().len(), 2);
    }

    #[test]
    fn test_remove_all_counts_and_skips() {
        let home = Entry::<()>::home();
        let a = home.create_file(file_spec("a.txt")).unwrap();
        let b = home.create_file(file_spec("b.txt")).unwrap();
        let stranger = Entry::<()>::detached_file(file_spec("x.txt"));

        let selection = vec![a.clone(), stranger, b.clone()];
        assert_eq!(home.remove_all(&selection), 2);
        assert_eq!(home.child_count(), 0);
    }

    #[test]
    fn test_remove_all_is_one_invalidation_per_batch() {
        let home = Entry::<()>::home();
        let a = home.create_file(file_spec("a.txt")).unwrap();
        let b = home.create_file(file_spec("b.txt")).unwrap();
        home.merged();
        let g = home.merge_generation();

        home.remove_all(&[a, b]);
        assert!(home.merged().is_empty());
        assert_eq!(home.merge_generation(), g + 1);
    }

    #[test]
    fn test_clear() {
        let home = Entry::<()>::home();
        let dir = home.create_directory("d").unwrap();
        let f = home.create_file(file_spec("a.txt")).unwrap();

        home.clear();

        assert_eq!(home.child_count(), 0);
        assert!(dir.parent().is_none());
        assert!(f.parent().is_none());
        assert!(home.merged().is_empty());
    }

    #[test]
    fn test_move_to() {
        let home = Entry::<()>::home();
        let src = home.create_directory("src").unwrap();
        let dst = home.create_directory("dst").unwrap();
        let f = src.create_file(file_spec("a.txt")).unwrap();

        f.move_to(&dst).unwrap();

        assert_eq!(f.parent().unwrap(), dst);
        assert!(src.files().is_empty());
        assert_eq!(f.path(), "Home/dst/a.txt");
    }

    #[test]
    fn test_move_into_own_descendant_is_a_cycle() {
        let home = Entry::<()>::home();
        let outer = home.create_directory("outer").unwrap();
        let inner = outer.create_directory("inner").unwrap();

        let err = outer.move_to(&inner).unwrap_err();
        assert!(matches!(err, TreeError::WouldCycle { .. }));
        assert_eq!(outer.parent().unwrap(), home, "still where it was");
    }

    #[test]
    fn test_concurrent_creation_under_one_parent() {
        use std::thread;

        let home = Entry::<()>::home();
        let mut handles = Vec::new();
        for t in 0..8 {
            let home = home.clone();
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    home.create_file(FileSpec::new(
                        format!("t{t}-{i}.txt"),
                        ContentSource::empty(),
                    ))
                    .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(home.child_count(), 8 * 50);
        assert_eq!(home.merged().len(), 8 * 50);
    }
}

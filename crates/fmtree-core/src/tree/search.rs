//! Subtree traversal and lookup.
//!
//! All searches ride on [`Walk`], a lazy depth-first pre-order iterator
//! driven by an explicit stack. Nothing here recurses, so pathologically
//! deep trees cannot blow the call stack, and nothing is collected eagerly,
//! so an early [`Iterator::next`] exit visits only what it had to.

use std::sync::Arc;

use super::entry::{Entry, EntryId};

/// Lazy depth-first pre-order iterator over a subtree.
///
/// Yields the start entry first, then each directory's children in listing
/// order (directories before files, insertion order within each). Children
/// are read per visited node, so mutations during a walk affect the parts
/// not yet visited.
pub struct Walk<T> {
    stack: Vec<Arc<Entry<T>>>,
}

impl<T> Iterator for Walk<T> {
    type Item = Arc<Entry<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.stack.pop()?;
        {
            // Push in reverse so the first child is the next pop
            let children = entry.children.read();
            for file in children.files.iter().rev() {
                self.stack.push(file.clone());
            }
            for dir in children.dirs.iter().rev() {
                self.stack.push(dir.clone());
            }
        }
        Some(entry)
    }
}

/// Lazy case-insensitive substring search, produced by
/// [`Entry::find_by_name`].
pub struct NameMatches<T> {
    walk: Walk<T>,
    needle: String,
}

impl<T> Iterator for NameMatches<T> {
    type Item = Arc<Entry<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = self.walk.next()?;
            if entry.name().to_lowercase().contains(&self.needle) {
                return Some(entry);
            }
        }
    }
}

impl<T> Entry<T> {
    /// Depth-first pre-order traversal of this subtree, `self` included.
    pub fn walk(&self) -> Walk<T> {
        Walk {
            stack: vec![self.self_arc()],
        }
    }

    /// Find an entry in this subtree by id, `self` included.
    ///
    /// A miss is `None`, never an error; stale ids held by a host after a
    /// removal simply stop matching.
    pub fn find(&self, id: EntryId) -> Option<Arc<Entry<T>>> {
        self.walk().find(|entry| entry.id() == id)
    }

    /// Find the first entry in pre-order satisfying `predicate`.
    pub fn find_by<P>(&self, mut predicate: P) -> Option<Arc<Entry<T>>>
    where
        P: FnMut(&Entry<T>) -> bool,
    {
        self.walk().find(|entry| predicate(entry))
    }

    /// All entries in this subtree whose name contains `pattern`,
    /// case-insensitively, as a lazy sequence in pre-order.
    ///
    /// An empty pattern matches everything.
    pub fn find_by_name(&self, pattern: &str) -> NameMatches<T> {
        NameMatches {
            walk: self.walk(),
            needle: pattern.to_lowercase(),
        }
    }

    /// `/`-joined names from the root down to and including this entry.
    ///
    /// A detached entry's path starts at itself.
    pub fn path(&self) -> String {
        let mut segments = vec![self.name()];
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            segments.push(node.name());
            cursor = node.parent();
        }
        segments.reverse();
        segments.join("/")
    }

    /// Sum of the file sizes in this subtree, `self` included.
    pub fn total_size(&self) -> u64 {
        self.walk().filter(|e| e.is_file()).map(|e| e.size()).sum()
    }

    /// Number of entries below this one.
    pub fn descendant_count(&self) -> usize {
        self.walk().count().saturating_sub(1)
    }
}

//! In-memory virtual file tree for file-manager frontends.
//!
//! This crate is the model layer behind a file-manager widget: a
//! hierarchical tree of directories and files that the host renders and
//! mutates in response to user actions. It owns structure, ordering, and
//! content plumbing; it never touches the DOM, the network, or a disk.
//!
//! # Components
//!
//! - [`Entry`] - the tree node: stable identity, kind, metadata, opaque
//!   payload, and the mutation operations (create, attach, remove, rename,
//!   move)
//! - [`ContentSource`] - resident bytes or a deferred async provider, with
//!   one uniform retrieval path
//! - [`SortKey`] / [`SortOrder`] / [`SortSpec`] - per-directory ordering
//!   settings backing the lazily recomputed, cached merged view
//! - [`Walk`] and the `find*` operations - explicit-stack pre-order
//!   traversal and lookup
//! - [`archive`] - recursive zip export of a selection into a synthetic
//!   download entry
//! - [`Capabilities`] - per-payload flags gating rename/delete/download
//!   surfaces
//!
//! # Example
//!
//! ```
//! use fmtree_core::{ContentSource, Entry, FileSpec, SortKey, SortOrder};
//!
//! let home = Entry::<()>::home();
//! let docs = home.create_directory("Documents")?;
//! docs.create_file(FileSpec::new(
//!     "notes.txt",
//!     ContentSource::from_bytes(b"remember the milk".to_vec()),
//! ))?;
//! docs.create_file(FileSpec::new("todo.md", ContentSource::empty()))?;
//!
//! docs.sort(SortOrder::Descending, SortKey::Name);
//! let listing: Vec<_> = docs.merged().iter().map(|e| e.name()).collect();
//! assert_eq!(listing, ["todo.md", "notes.txt"]);
//!
//! let hit = home.find_by_name("notes").next().unwrap();
//! assert_eq!(hit.path(), "Home/Documents/notes.txt");
//! # Ok::<(), fmtree_core::TreeError>(())
//! ```
//!
//! Deferred content and archival are async; everything structural is
//! synchronous. See [`archive::zip`] for the export path.

pub mod archive;
pub mod content;
pub mod error;
pub mod tree;

pub use archive::ArchiveError;
pub use content::{BoxError, ByteProvider, ContentError, ContentSource};
pub use tree::{
    Capabilities, Entry, EntryId, EntryKind, EntryStat, FileSpec, NameMatches, ROOT_NAME, SortKey,
    SortOrder, SortSpec, TreeError, Walk,
};

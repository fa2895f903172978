//! Error types for the tree crate.
//!
//! Each subsystem defines its errors next to the code that raises them;
//! this module gathers the public surface in one place.

// Re-export error types from submodules
pub use crate::archive::ArchiveError;
pub use crate::content::{BoxError, ContentError};
pub use crate::tree::TreeError;

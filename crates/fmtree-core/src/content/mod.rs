//! Content backing for file entries.
//!
//! A file in the tree either holds its bytes in memory or defers to a
//! caller-supplied async provider (e.g. a host fetching from object storage).
//! [`ContentSource`] is the tagged union over those two cases, and
//! [`ContentSource::bytes`] is the single retrieval path for both.
//!
//! The crate performs no I/O of its own: whatever side effects a retrieval
//! has are those of the caller's provider closure.
//!
//! # Example
//!
//! ```
//! use fmtree_core::ContentSource;
//!
//! # async fn example() -> Result<(), fmtree_core::ContentError> {
//! let resident = ContentSource::from_bytes(b"hello".to_vec());
//! assert_eq!(resident.bytes().await?, b"hello");
//!
//! let deferred = ContentSource::from_provider(|| async { Ok(vec![1, 2, 3]) });
//! assert_eq!(deferred.bytes().await?, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::trace;

pub mod mime;

/// Boxed error carried out of caller-supplied byte providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Caller-supplied deferred byte producer.
///
/// Invoked once per retrieval; results are never cached by the tree.
pub type ByteProvider =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<u8>, BoxError>> + Send + Sync>;

/// Error surfaced by [`ContentSource::bytes`].
#[derive(Error, Debug)]
pub enum ContentError {
    /// The deferred provider failed to produce bytes.
    #[error("content provider failed: {source}")]
    Provider {
        #[source]
        source: BoxError,
    },
}

/// Where a file entry's bytes come from.
///
/// Exactly one of the two cases holds at a time; there is no nullable
/// "maybe resident, maybe deferred" state to keep consistent.
#[derive(Clone)]
pub enum ContentSource {
    /// Bytes held in memory alongside the entry.
    Bytes(Arc<[u8]>),
    /// Deferred producer invoked on every retrieval.
    Provider(ByteProvider),
}

impl ContentSource {
    /// Resident content from an in-memory buffer.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        ContentSource::Bytes(bytes.into())
    }

    /// Deferred content from an async producer.
    ///
    /// The closure is called on every [`bytes`](Self::bytes) retrieval;
    /// memoize inside the closure if repeated fetches are expensive.
    pub fn from_provider<F, Fut>(provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
    {
        ContentSource::Provider(Arc::new(move || Box::pin(provider())))
    }

    /// Resident content with zero bytes.
    pub fn empty() -> Self {
        ContentSource::Bytes(Vec::new().into())
    }

    /// Check if the content is resident in memory.
    pub fn is_resident(&self) -> bool {
        matches!(self, ContentSource::Bytes(_))
    }

    /// Check if the content is produced by a deferred provider.
    pub fn is_deferred(&self) -> bool {
        matches!(self, ContentSource::Provider(_))
    }

    /// Byte length, if it is knowable without running a provider.
    ///
    /// `Some` for resident buffers, `None` for providers. Entries built from
    /// provider-backed sources carry a provisional size of 0 until the host
    /// sets one.
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            ContentSource::Bytes(bytes) => Some(bytes.len() as u64),
            ContentSource::Provider(_) => None,
        }
    }

    /// Retrieve the content bytes.
    ///
    /// Resident buffers are copied out and the future completes immediately.
    /// Provider-backed sources invoke the provider exactly once per call;
    /// a provider failure is returned as [`ContentError::Provider`] with the
    /// original error preserved as its source.
    pub async fn bytes(&self) -> Result<Vec<u8>, ContentError> {
        match self {
            ContentSource::Bytes(bytes) => Ok(bytes.to_vec()),
            ContentSource::Provider(provider) => {
                trace!("invoking deferred content provider");
                provider()
                    .await
                    .map_err(|source| ContentError::Provider { source })
            }
        }
    }
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSource::Bytes(bytes) => {
                f.debug_tuple("Bytes").field(&bytes.len()).finish()
            }
            ContentSource::Provider(_) => f.debug_tuple("Provider").field(&"..").finish(),
        }
    }
}

impl Default for ContentSource {
    fn default() -> Self {
        Self::empty()
    }
}

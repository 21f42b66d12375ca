//! secondary
//!
//! Secondary-repository commit resolution.
//!
//! # Design
//!
//! Some deployments track a repository that pins the primary repository to a
//! fixed revision through a dependency manifest (a `DEPS` file or similar).
//! Resolving a commit of that pinning repository to the primary-repo commit
//! it pins needs two capabilities, kept as separate seams:
//!
//! - [`ManifestSource`] fetches the manifest body as recorded at a commit.
//! - [`CommitExtractor`] pulls the pinned hash out of the manifest body.
//!
//! Extraction is manifest-format specific, so any `Fn(&str) -> Result<String,
//! ExtractError>` closure can serve as an extractor.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use revcache::secondary::{ExtractError, MockManifestSource, SecondaryRepo};
//!
//! # tokio_test::block_on(async {
//! let source = MockManifestSource::with_manifest("sec1", "primary_rev: abc123\n");
//! let repo = SecondaryRepo::new(
//!     Arc::new(source),
//!     Arc::new(|manifest: &str| {
//!         manifest
//!             .strip_prefix("primary_rev: ")
//!             .map(|rest| rest.trim().to_string())
//!             .ok_or_else(|| ExtractError::new("no primary_rev line"))
//!     }),
//! );
//!
//! let resolved = repo.resolve_commit("sec1").await.unwrap();
//! assert_eq!(resolved, "abc123");
//! # });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use crate::store::StoreError;

/// Errors from secondary-repository resolution.
#[derive(Debug, Error)]
pub enum SecondaryError {
    /// The manifest could not be fetched for the given commit.
    #[error("fetching manifest at '{hash}': {source}")]
    Manifest {
        /// The secondary-repo commit whose manifest was requested.
        hash: String,
        /// The underlying fetch error.
        #[source]
        source: StoreError,
    },

    /// The manifest was fetched but no commit could be extracted from it.
    #[error("extracting commit from manifest: {0}")]
    Extract(#[from] ExtractError),
}

/// Failure to extract a pinned commit from a manifest body.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExtractError {
    /// What went wrong during extraction.
    pub message: String,
}

impl ExtractError {
    /// Create an extraction error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Fetches dependency manifests from the secondary repository.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the manifest body as recorded at `hash`.
    async fn manifest_at(&self, hash: &str) -> Result<String, StoreError>;
}

/// Extracts the pinned primary-repo commit hash from a manifest body.
pub trait CommitExtractor: Send + Sync {
    /// Pull the pinned commit hash out of `manifest`.
    fn extract_commit(&self, manifest: &str) -> Result<String, ExtractError>;
}

impl<F> CommitExtractor for F
where
    F: Fn(&str) -> Result<String, ExtractError> + Send + Sync,
{
    fn extract_commit(&self, manifest: &str) -> Result<String, ExtractError> {
        self(manifest)
    }
}

/// A secondary repository paired with the extractor for its manifest format.
#[derive(Clone)]
pub struct SecondaryRepo {
    source: Arc<dyn ManifestSource>,
    extractor: Arc<dyn CommitExtractor>,
}

impl SecondaryRepo {
    /// Pair a manifest source with an extractor.
    pub fn new(source: Arc<dyn ManifestSource>, extractor: Arc<dyn CommitExtractor>) -> Self {
        Self { source, extractor }
    }

    /// Resolve a secondary-repo commit to the primary-repo commit it pins.
    ///
    /// # Errors
    ///
    /// Returns `SecondaryError::Manifest` if the manifest cannot be fetched,
    /// `SecondaryError::Extract` if no commit can be extracted from it.
    pub async fn resolve_commit(&self, hash: &str) -> Result<String, SecondaryError> {
        let manifest =
            self.source
                .manifest_at(hash)
                .await
                .map_err(|e| SecondaryError::Manifest {
                    hash: hash.to_string(),
                    source: e,
                })?;
        Ok(self.extractor.extract_commit(&manifest)?)
    }
}

impl fmt::Debug for SecondaryRepo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryRepo").finish_non_exhaustive()
    }
}

/// Mock manifest source for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockManifestSource {
    inner: Arc<Mutex<MockManifestInner>>,
}

#[derive(Debug, Default)]
struct MockManifestInner {
    /// Manifest bodies by secondary-repo commit hash.
    manifests: HashMap<String, String>,
    /// Error to return instead of serving manifests.
    fail: Option<StoreError>,
}

impl MockManifestSource {
    /// Create an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock source with a single manifest.
    pub fn with_manifest(hash: &str, manifest: &str) -> Self {
        let source = Self::new();
        source.insert(hash, manifest);
        source
    }

    /// Install (or replace) the manifest at a commit.
    pub fn insert(&self, hash: &str, manifest: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.manifests.insert(hash.to_string(), manifest.to_string());
    }

    /// Make every fetch fail with the given error.
    pub fn fail_with(&self, error: StoreError) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail = Some(error);
    }
}

#[async_trait]
impl ManifestSource for MockManifestSource {
    async fn manifest_at(&self, hash: &str) -> Result<String, StoreError> {
        let inner = self.inner.lock().unwrap();
        if let Some(error) = &inner.fail {
            return Err(error.clone());
        }
        inner
            .manifests
            .get(hash)
            .cloned()
            .ok_or_else(|| StoreError::Request(format!("no manifest at '{hash}'")))
    }
}

//! # Document Store Abstractions
//!
//! Defines the persistence seam between [`crate::ManifestService`] and backend implementations.
//!
//! Manifest documents are only ever read and written whole: there is no nested-field update
//! primitive. To keep concurrent read-modify-write cycles from silently discarding each other's
//! edits, every stored document carries an opaque [`ETag`] which changes on every write, and
//! [`ManifestStore::replace`] only succeeds if the caller presents the tag it read.
//!
//! ## Known Implementations
//!
//! ### [`crate::memory::MemoryManifestStore`]
//!
//! Keeps documents in process memory. Used for tests and throwaway development servers.
//!
//! ### manifold_backend_postgres
//!
//! Stores each manifest as a JSONB column in a Postgres table, with conditional writes expressed
//! as `UPDATE ... WHERE etag = $1`.
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identifiers::PackageIdentifier;
use crate::types::PackageManifest;

/// Location of a manifest document: its id and partition key.
///
/// Only constructible from a [`PackageIdentifier`], which is used for both halves, so the id and
/// partition key of a manifest document are always equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentKey {
    id: String,
    partition_key: String,
}

impl DocumentKey {
    #[inline]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    #[inline]
    pub fn partition_key(&self) -> &str {
        self.partition_key.as_str()
    }
}

impl From<&PackageIdentifier> for DocumentKey {
    fn from(id: &PackageIdentifier) -> DocumentKey {
        DocumentKey {
            id: id.to_string(),
            partition_key: id.to_string(),
        }
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition_key, self.id)
    }
}

/// Opaque version tag of a stored document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// A fresh tag, distinct from every tag previously handed out.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for ETag {
    fn from(s: String) -> ETag {
        ETag(s)
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A manifest document as read from (or just written to) a [`ManifestStore`].
#[derive(Clone, Debug, PartialEq)]
pub struct StoredManifest {
    pub manifest: PackageManifest,
    pub etag: ETag,
}

impl StoredManifest {
    pub fn key(&self) -> DocumentKey {
        DocumentKey::from(&self.manifest.package_identifier)
    }
}

/// Whole-document access to package manifests.
///
/// Implementations report an absent document as [`crate::Error::NotFound`], a stale `if_match`
/// tag as [`crate::Error::PreconditionFailed`] and a create over an existing document as a
/// [`crate::ErrorCode::PackageAlreadyExists`] conflict once their errors are converted.
#[async_trait]
pub trait ManifestStore: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Into<crate::errors::Error> + Send + Sync;

    /// Fetch the document stored under `key`.
    async fn get(&self, key: &DocumentKey) -> std::result::Result<StoredManifest, Self::Error>;

    /// Store a new document. Fails if a document with the same key already exists.
    async fn create(
        &self,
        manifest: &PackageManifest,
    ) -> std::result::Result<StoredManifest, Self::Error>;

    /// Overwrite an existing document, but only if its current tag equals `if_match`.
    async fn replace(
        &self,
        manifest: &PackageManifest,
        if_match: &ETag,
    ) -> std::result::Result<StoredManifest, Self::Error>;

    /// Remove the document stored under `key`.
    async fn delete(&self, key: &DocumentKey) -> std::result::Result<(), Self::Error>;
}

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror;

use crate::errors::{DomainError, Error, ErrorCode};
use crate::store::{DocumentKey, ETag, ManifestStore, StoredManifest};
use crate::types::PackageManifest;

#[derive(thiserror::Error, Debug)]
pub enum MemoryStoreError {
    #[error("document not found: {0}")]
    NotFound(DocumentKey),

    #[error("document already exists: {0}")]
    AlreadyExists(DocumentKey),

    #[error("etag mismatch for document: {0}")]
    PreconditionFailed(DocumentKey),

    #[error("document lock poisoned")]
    LockPoisoned,
}

impl From<MemoryStoreError> for Error {
    fn from(e: MemoryStoreError) -> Error {
        match e {
            MemoryStoreError::NotFound(key) => Error::NotFound(key.id().to_string()),
            MemoryStoreError::AlreadyExists(key) => DomainError::with_message(
                ErrorCode::PackageAlreadyExists,
                format!("package already exists: {}", key.id()),
            )
            .into(),
            MemoryStoreError::PreconditionFailed(key) => {
                Error::PreconditionFailed(key.id().to_string())
            }
            e @ MemoryStoreError::LockPoisoned => Error::BackendError(format!("{e}")),
        }
    }
}

type Result<T> = std::result::Result<T, MemoryStoreError>;

/// [`ManifestStore`] keeping documents in process memory. Clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryManifestStore {
    documents: Arc<RwLock<HashMap<DocumentKey, StoredManifest>>>,
}

impl MemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ManifestStore for MemoryManifestStore {
    type Error = MemoryStoreError;

    async fn get(&self, key: &DocumentKey) -> Result<StoredManifest> {
        let documents = self
            .documents
            .read()
            .map_err(|_| MemoryStoreError::LockPoisoned)?;
        documents
            .get(key)
            .cloned()
            .ok_or_else(|| MemoryStoreError::NotFound(key.clone()))
    }

    async fn create(&self, manifest: &PackageManifest) -> Result<StoredManifest> {
        let key = DocumentKey::from(&manifest.package_identifier);
        let mut documents = self
            .documents
            .write()
            .map_err(|_| MemoryStoreError::LockPoisoned)?;
        if documents.contains_key(&key) {
            return Err(MemoryStoreError::AlreadyExists(key));
        }
        let stored = StoredManifest {
            manifest: manifest.clone(),
            etag: ETag::generate(),
        };
        documents.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace(&self, manifest: &PackageManifest, if_match: &ETag) -> Result<StoredManifest> {
        let key = DocumentKey::from(&manifest.package_identifier);
        let mut documents = self
            .documents
            .write()
            .map_err(|_| MemoryStoreError::LockPoisoned)?;
        let current = documents
            .get_mut(&key)
            .ok_or_else(|| MemoryStoreError::NotFound(key.clone()))?;
        if &current.etag != if_match {
            return Err(MemoryStoreError::PreconditionFailed(key));
        }
        *current = StoredManifest {
            manifest: manifest.clone(),
            etag: ETag::generate(),
        };
        Ok(current.clone())
    }

    async fn delete(&self, key: &DocumentKey) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| MemoryStoreError::LockPoisoned)?;
        documents
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| MemoryStoreError::NotFound(key.clone()))
    }
}

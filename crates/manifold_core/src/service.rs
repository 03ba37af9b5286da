use std::sync::Arc;

use crate::config::PackageDefinition;
use crate::editor;
use crate::errors::{DomainError, Error, ErrorCode, Result};
use crate::identifiers::{InstallerIdentifier, PackageIdentifier, PackageVersion};
use crate::locator;
use crate::store::{DocumentKey, ManifestStore, StoredManifest};
use crate::types::{Installer, PackageManifest, Version};
use crate::validator::{ManifestValidator, SchemaValidator};

pub const DEFAULT_MAX_WRITE_ATTEMPTS: usize = 5;

/// Package, version and installer operations over a [`ManifestStore`].
///
/// Every mutation is a read-modify-write of the whole manifest document: fetch the document,
/// locate the version, edit the in-memory copy, then write it back conditionally on the tag that
/// was read. A write that loses against a concurrent writer is retried from a fresh read, up to
/// `max_write_attempts` times in total.
#[derive(Clone)]
pub struct ManifestService<S: ManifestStore> {
    store: S,
    validator: Arc<dyn ManifestValidator>,
    max_write_attempts: usize,
}

impl<S: ManifestStore> ManifestService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            validator: Arc::new(SchemaValidator),
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn ManifestValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_max_write_attempts(mut self, attempts: usize) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn fetch(&self, package: &PackageIdentifier) -> Result<StoredManifest> {
        self.store
            .get(&DocumentKey::from(package))
            .await
            .map_err(Into::<Error>::into)
    }

    /// Fetch a manifest that is expected to carry a version set.
    async fn locate(&self, package: &PackageIdentifier) -> Result<StoredManifest> {
        let stored = self.fetch(package).await?;
        locator::versions(&stored.manifest)?;
        Ok(stored)
    }

    /// Apply `edit` to the stored manifest of `package` and persist the result.
    ///
    /// `edit` may run more than once if concurrent writers interleave; each run sees a freshly
    /// fetched document.
    async fn mutate<T, F>(&self, package: &PackageIdentifier, mut edit: F) -> Result<T>
    where
        F: FnMut(&mut PackageManifest) -> Result<T> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let StoredManifest { mut manifest, etag } = self.fetch(package).await?;
            let output = edit(&mut manifest)?;
            match self
                .store
                .replace(&manifest, &etag)
                .await
                .map_err(Into::<Error>::into)
            {
                Ok(_) => {
                    tracing::debug!(%package, attempt, "persisted manifest");
                    return Ok(output);
                }
                Err(Error::PreconditionFailed(_)) if attempt < self.max_write_attempts => {
                    tracing::warn!(%package, attempt, "manifest modified concurrently, retrying");
                }
                Err(Error::PreconditionFailed(_)) => {
                    tracing::warn!(%package, attempt, "giving up on concurrently modified manifest");
                    return Err(DomainError::with_message(
                        ErrorCode::ConcurrentModification,
                        format!(
                            "package {package} was modified concurrently {attempt} times, retry the request"
                        ),
                    )
                    .into());
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn create_installer(
        &self,
        package: &PackageIdentifier,
        version: &PackageVersion,
        installer: Installer,
    ) -> Result<Installer> {
        self.validator.validate_installer(&installer)?;
        self.mutate(package, |manifest| {
            let v = locator::version_mut(manifest, version)?;
            editor::insert_installer(v, installer.clone())
        })
        .await?;
        tracing::info!(%package, %version, installer = %installer.installer_identifier, "created installer");
        Ok(installer)
    }

    pub async fn replace_installer(
        &self,
        package: &PackageIdentifier,
        version: &PackageVersion,
        target: &InstallerIdentifier,
        installer: Installer,
    ) -> Result<Installer> {
        editor::ensure_installer_matches(target, &installer)?;
        self.validator.validate_installer(&installer)?;
        self.mutate(package, |manifest| {
            let v = locator::version_mut(manifest, version)?;
            editor::replace_installer(v, target, installer.clone())
        })
        .await?;
        tracing::info!(%package, %version, installer = %target, "replaced installer");
        Ok(installer)
    }

    pub async fn delete_installer(
        &self,
        package: &PackageIdentifier,
        version: &PackageVersion,
        target: &InstallerIdentifier,
    ) -> Result<()> {
        self.mutate(package, |manifest| {
            let v = locator::version_mut(manifest, version)?;
            editor::remove_installer(v, target).map(|_| ())
        })
        .await?;
        tracing::info!(%package, %version, installer = %target, "deleted installer");
        Ok(())
    }

    pub async fn get_installers(
        &self,
        package: &PackageIdentifier,
        version: &PackageVersion,
        target: Option<&InstallerIdentifier>,
    ) -> Result<Vec<Installer>> {
        let stored = self.locate(package).await?;
        let v = locator::version(&stored.manifest, version)?;
        editor::query_installers(v, target)
    }

    pub async fn create_version(
        &self,
        package: &PackageIdentifier,
        version: Version,
    ) -> Result<Version> {
        self.validator.validate_version(&version)?;
        self.mutate(package, |manifest| {
            editor::insert_version(manifest, version.clone())
        })
        .await?;
        tracing::info!(%package, version = %version.package_version, "created version");
        Ok(version)
    }

    pub async fn replace_version(
        &self,
        package: &PackageIdentifier,
        target: &PackageVersion,
        version: Version,
    ) -> Result<Version> {
        editor::ensure_version_matches(target, &version)?;
        self.validator.validate_version(&version)?;
        self.mutate(package, |manifest| {
            editor::replace_version(manifest, target, version.clone())
        })
        .await?;
        tracing::info!(%package, version = %target, "replaced version");
        Ok(version)
    }

    pub async fn delete_version(
        &self,
        package: &PackageIdentifier,
        target: &PackageVersion,
    ) -> Result<()> {
        self.mutate(package, |manifest| {
            editor::remove_version(manifest, target).map(|_| ())
        })
        .await?;
        tracing::info!(%package, version = %target, "deleted version");
        Ok(())
    }

    pub async fn get_versions(
        &self,
        package: &PackageIdentifier,
        target: Option<&PackageVersion>,
    ) -> Result<Vec<Version>> {
        let stored = self.fetch(package).await?;
        editor::query_versions(&stored.manifest, target)
    }

    pub async fn create_package(&self, manifest: PackageManifest) -> Result<StoredManifest> {
        self.validator.validate_manifest(&manifest)?;
        let stored = self
            .store
            .create(&manifest)
            .await
            .map_err(Into::<Error>::into)?;
        tracing::info!(package = %manifest.package_identifier, "created package");
        Ok(stored)
    }

    pub async fn get_package(&self, package: &PackageIdentifier) -> Result<StoredManifest> {
        self.fetch(package).await
    }

    pub async fn delete_package(&self, package: &PackageIdentifier) -> Result<()> {
        self.store
            .delete(&DocumentKey::from(package))
            .await
            .map_err(Into::<Error>::into)?;
        tracing::info!(%package, "deleted package");
        Ok(())
    }

    /// Make sure every statically configured package and version exists. Existing packages and
    /// versions are left as they are.
    pub async fn initialize_static_packages(&self, packages: Vec<PackageDefinition>) -> Result<()> {
        for definition in packages {
            let package = PackageIdentifier::try_from(definition.identifier.as_str())?;
            let versions = definition
                .versions
                .iter()
                .map(|v| PackageVersion::try_from(v.as_str()))
                .collect::<Result<Vec<_>>>()?;

            let stored = match self.fetch(&package).await {
                Ok(stored) => stored,
                Err(Error::NotFound(_)) => {
                    tracing::info!("static package '{package}' not found, inserting into store");
                    match self.store.create(&PackageManifest::new(package.clone())).await {
                        Ok(stored) => stored,
                        Err(e) => match Into::<Error>::into(e) {
                            // raced with another instance seeding the same package
                            Error::Conflict(d) if d.code == ErrorCode::PackageAlreadyExists => {
                                self.fetch(&package).await?
                            }
                            e => return Err(e),
                        },
                    }
                }
                Err(e) => return Err(e),
            };

            if versions.iter().all(|v| has_version(&stored.manifest, v)) {
                continue;
            }
            self.mutate(&package, |manifest| {
                for version in &versions {
                    if !has_version(manifest, version) {
                        tracing::info!("static version '{package}' {version} not found, inserting");
                        editor::insert_version(manifest, Version::new(version.clone()))?;
                    }
                }
                Ok(())
            })
            .await?;
        }
        Ok(())
    }
}

fn has_version(manifest: &PackageManifest, version: &PackageVersion) -> bool {
    manifest
        .versions
        .as_ref()
        .map(|vs| vs.contains_key(version))
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::keyed_set::KeyedSet;
    use crate::memory::{MemoryManifestStore, MemoryStoreError};
    use crate::store::ETag;

    fn pkg(s: &str) -> PackageIdentifier {
        PackageIdentifier::try_from(s).unwrap()
    }

    fn ver(s: &str) -> PackageVersion {
        PackageVersion::try_from(s).unwrap()
    }

    fn iid(c: char) -> InstallerIdentifier {
        InstallerIdentifier::try_from(c.to_string().repeat(64).as_str()).unwrap()
    }

    fn installer(c: char, url: &str) -> Installer {
        serde_json::from_value(json!({
            "InstallerIdentifier": c.to_string().repeat(64),
            "InstallerSha256": c.to_string().repeat(64),
            "InstallerUrl": url,
            "Architecture": "x64",
        }))
        .unwrap()
    }

    async fn seeded() -> ManifestService<MemoryManifestStore> {
        let service = ManifestService::new(MemoryManifestStore::new());
        let mut version = Version::new(ver("1.0"));
        version.installers =
            Some(KeyedSet::try_from(vec![installer('a', "https://contoso.example/a")]).unwrap());
        let mut manifest = PackageManifest::new(pkg("Contoso.P1"));
        manifest.versions = Some(KeyedSet::try_from(vec![version]).unwrap());
        service.create_package(manifest).await.unwrap();
        service
    }

    async fn stored_ids(service: &ManifestService<MemoryManifestStore>) -> Vec<InstallerIdentifier> {
        service
            .get_installers(&pkg("Contoso.P1"), &ver("1.0"), None)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.installer_identifier)
            .collect()
    }

    #[tokio::test]
    async fn installer_lifecycle() {
        let service = seeded().await;
        let p1 = pkg("Contoso.P1");
        let v1 = ver("1.0");

        service
            .create_installer(&p1, &v1, installer('b', "https://contoso.example/b"))
            .await
            .unwrap();
        assert_eq!(stored_ids(&service).await, vec![iid('a'), iid('b')]);

        let err = service
            .create_installer(&p1, &v1, installer('a', "https://contoso.example/a2"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InstallerAlreadyExists));
        assert_eq!(stored_ids(&service).await, vec![iid('a'), iid('b')]);

        service.delete_installer(&p1, &v1, &iid('a')).await.unwrap();
        assert_eq!(stored_ids(&service).await, vec![iid('b')]);

        let replacement = installer('b', "https://contoso.example/b-prime");
        service
            .replace_installer(&p1, &v1, &iid('b'), replacement.clone())
            .await
            .unwrap();
        let all = service.get_installers(&p1, &v1, None).await.unwrap();
        assert_eq!(all, vec![replacement]);

        let err = service
            .get_installers(&p1, &v1, Some(&iid('c')))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InstallerDoesNotExist));
    }

    #[tokio::test]
    async fn missing_version_rejects_every_operation() {
        let service = seeded().await;
        let p1 = pkg("Contoso.P1");
        let v2 = ver("2.0");
        let b = installer('b', "https://contoso.example/b");

        let results = vec![
            service.create_installer(&p1, &v2, b.clone()).await.map(|_| ()),
            service
                .replace_installer(&p1, &v2, &iid('b'), b.clone())
                .await
                .map(|_| ()),
            service.delete_installer(&p1, &v2, &iid('b')).await,
            service.get_installers(&p1, &v2, None).await.map(|_| ()),
            service.get_installers(&p1, &v2, Some(&iid('b'))).await.map(|_| ()),
        ];
        for res in results {
            assert_eq!(res.unwrap_err().code(), Some(ErrorCode::VersionDoesNotExist));
        }
    }

    #[tokio::test]
    async fn missing_package_is_not_found() {
        let service = seeded().await;
        let err = service
            .get_installers(&pkg("Contoso.Missing"), &ver("1.0"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref id) if id == "Contoso.Missing"));
    }

    #[tokio::test]
    async fn null_versions_rejects_installer_operations() {
        let service = ManifestService::new(MemoryManifestStore::new());
        service
            .create_package(PackageManifest::new(pkg("Contoso.Empty")))
            .await
            .unwrap();
        let err = service
            .get_installers(&pkg("Contoso.Empty"), &ver("1.0"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::VersionsIsNull));
        let err = service
            .create_installer(
                &pkg("Contoso.Empty"),
                &ver("1.0"),
                installer('a', "https://contoso.example/a"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::VersionsIsNull));
    }

    #[tokio::test]
    async fn query_by_id_on_null_installers_does_not_exist() {
        let service = ManifestService::new(MemoryManifestStore::new());
        let mut manifest = PackageManifest::new(pkg("Contoso.P1"));
        manifest.versions = Some(KeyedSet::try_from(vec![Version::new(ver("1.0"))]).unwrap());
        service.create_package(manifest).await.unwrap();

        let err = service
            .get_installers(&pkg("Contoso.P1"), &ver("1.0"), Some(&iid('c')))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InstallerDoesNotExist));
        let err = service
            .get_installers(&pkg("Contoso.P1"), &ver("1.0"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InstallerIsNull));
    }

    /// Store wrapper that counts reads and fails when it is read, so tests can assert that a
    /// request was rejected before any store access.
    #[derive(Clone, Default)]
    struct UntouchableStore {
        reads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ManifestStore for UntouchableStore {
        type Error = MemoryStoreError;

        async fn get(&self, key: &DocumentKey) -> std::result::Result<StoredManifest, MemoryStoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Err(MemoryStoreError::NotFound(key.clone()))
        }

        async fn create(
            &self,
            manifest: &PackageManifest,
        ) -> std::result::Result<StoredManifest, MemoryStoreError> {
            Err(MemoryStoreError::AlreadyExists(DocumentKey::from(&manifest.package_identifier)))
        }

        async fn replace(
            &self,
            manifest: &PackageManifest,
            _if_match: &ETag,
        ) -> std::result::Result<StoredManifest, MemoryStoreError> {
            Err(MemoryStoreError::NotFound(DocumentKey::from(&manifest.package_identifier)))
        }

        async fn delete(&self, key: &DocumentKey) -> std::result::Result<(), MemoryStoreError> {
            Err(MemoryStoreError::NotFound(key.clone()))
        }
    }

    #[tokio::test]
    async fn invalid_input_never_touches_the_store() {
        let store = UntouchableStore::default();
        let service = ManifestService::new(store.clone());
        let p1 = pkg("Contoso.P1");
        let v1 = ver("1.0");

        let err = service
            .replace_installer(&p1, &v1, &iid('a'), installer('b', "https://contoso.example/b"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InstallerDoesNotMatch));

        let err = service
            .create_installer(&p1, &v1, installer('b', "ftp://contoso.example/b"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ValidationFailed));

        let err = service
            .replace_version(&p1, &v1, Version::new(ver("2.0")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::VersionDoesNotMatch));

        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
    }

    /// Store wrapper that sneaks in a competing write right before the first `remaining` replace
    /// calls, the way a concurrent request would.
    #[derive(Clone)]
    struct InterleavingStore {
        inner: MemoryManifestStore,
        remaining: Arc<AtomicUsize>,
        competing: Installer,
    }

    #[async_trait]
    impl ManifestStore for InterleavingStore {
        type Error = MemoryStoreError;

        async fn get(&self, key: &DocumentKey) -> std::result::Result<StoredManifest, MemoryStoreError> {
            self.inner.get(key).await
        }

        async fn create(
            &self,
            manifest: &PackageManifest,
        ) -> std::result::Result<StoredManifest, MemoryStoreError> {
            self.inner.create(manifest).await
        }

        async fn replace(
            &self,
            manifest: &PackageManifest,
            if_match: &ETag,
        ) -> std::result::Result<StoredManifest, MemoryStoreError> {
            let interleave = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if interleave {
                let key = DocumentKey::from(&manifest.package_identifier);
                let mut current = self.inner.get(&key).await?;
                let version = locator::version_mut(&mut current.manifest, &ver("1.0"))
                    .expect("seeded version exists");
                let competing = self.competing.clone();
                let installers = version.installers.get_or_insert_with(KeyedSet::new);
                let _ = installers.remove(&competing.installer_identifier);
                installers.insert(competing).expect("removed above");
                self.inner.replace(&current.manifest, &current.etag).await?;
            }
            self.inner.replace(manifest, if_match).await
        }

        async fn delete(&self, key: &DocumentKey) -> std::result::Result<(), MemoryStoreError> {
            self.inner.delete(key).await
        }
    }

    async fn interleaved(remaining: usize) -> ManifestService<InterleavingStore> {
        let seeded = seeded().await;
        ManifestService::new(InterleavingStore {
            inner: seeded.store().clone(),
            remaining: Arc::new(AtomicUsize::new(remaining)),
            competing: installer('c', "https://contoso.example/c"),
        })
        .with_max_write_attempts(3)
    }

    #[tokio::test]
    async fn concurrent_write_is_retried_not_lost() {
        let service = interleaved(1).await;
        let p1 = pkg("Contoso.P1");
        let v1 = ver("1.0");

        service
            .create_installer(&p1, &v1, installer('b', "https://contoso.example/b"))
            .await
            .unwrap();

        let ids: Vec<_> = service
            .get_installers(&p1, &v1, None)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.installer_identifier)
            .collect();
        // both the competing write and ours survive
        assert_eq!(ids, vec![iid('a'), iid('b'), iid('c')]);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let service = interleaved(10).await;
        let err = service
            .create_installer(
                &pkg("Contoso.P1"),
                &ver("1.0"),
                installer('b', "https://contoso.example/b"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ConcurrentModification));

        let ids = service
            .get_installers(&pkg("Contoso.P1"), &ver("1.0"), Some(&iid('b')))
            .await
            .unwrap_err();
        assert_eq!(ids.code(), Some(ErrorCode::InstallerDoesNotExist));
    }

    #[tokio::test]
    async fn version_operations() {
        let service = seeded().await;
        let p1 = pkg("Contoso.P1");

        let mut v2 = Version::new(ver("2.0"));
        v2.fields.insert("Channel".to_string(), json!("beta"));
        service.create_version(&p1, v2.clone()).await.unwrap();
        let err = service.create_version(&p1, v2.clone()).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::VersionAlreadyExists));

        let versions = service.get_versions(&p1, None).await.unwrap();
        assert_eq!(versions.len(), 2);

        v2.fields.insert("Channel".to_string(), json!("stable"));
        service
            .replace_version(&p1, &ver("2.0"), v2.clone())
            .await
            .unwrap();
        let found = service.get_versions(&p1, Some(&ver("2.0"))).await.unwrap();
        assert_eq!(found, vec![v2]);

        service.delete_version(&p1, &ver("2.0")).await.unwrap();
        let err = service
            .get_versions(&p1, Some(&ver("2.0")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::VersionDoesNotExist));
    }

    #[tokio::test]
    async fn package_operations() {
        let service = seeded().await;
        let err = service
            .create_package(PackageManifest::new(pkg("Contoso.P1")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::PackageAlreadyExists));

        service.delete_package(&pkg("Contoso.P1")).await.unwrap();
        let err = service.get_package(&pkg("Contoso.P1")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn static_packages_are_seeded_once() {
        let service = seeded().await;
        let definitions = vec![
            PackageDefinition {
                identifier: "Contoso.P1".to_string(),
                versions: vec!["1.0".to_string(), "3.0".to_string()],
            },
            PackageDefinition {
                identifier: "Contoso.P2".to_string(),
                versions: vec![],
            },
        ];
        service
            .initialize_static_packages(definitions.clone())
            .await
            .unwrap();
        let etags = (
            service.get_package(&pkg("Contoso.P1")).await.unwrap().etag,
            service.get_package(&pkg("Contoso.P2")).await.unwrap().etag,
        );
        service.initialize_static_packages(definitions).await.unwrap();

        // a repeated run writes nothing
        assert_eq!(
            (
                service.get_package(&pkg("Contoso.P1")).await.unwrap().etag,
                service.get_package(&pkg("Contoso.P2")).await.unwrap().etag,
            ),
            etags
        );

        // existing installers untouched, missing version added
        assert_eq!(stored_ids(&service).await, vec![iid('a')]);
        let versions = service.get_versions(&pkg("Contoso.P1"), None).await.unwrap();
        assert_eq!(versions.len(), 2);

        let p2 = service.get_package(&pkg("Contoso.P2")).await.unwrap();
        assert!(p2.manifest.versions.is_none());
        assert_eq!(service.store().len(), 2);
    }
}

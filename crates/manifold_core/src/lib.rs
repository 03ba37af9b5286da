//! # Manifold Core
//!
//! Document model and operations for a repository of software package manifests. Each package is
//! stored as a single manifest document holding its versions, and each version holds the
//! installers published for it.
//!
//! [`ManifestService`] implements package, version and installer operations on top of any
//! [`store::ManifestStore`]; see that module for the available implementations.
mod config;
pub use config::PackageDefinition;

pub mod errors;
pub use errors::{DomainError, Error, ErrorCode, ErrorKind, Result, ValidationError};

mod identifiers;
pub use identifiers::{InstallerIdentifier, PackageIdentifier, PackageVersion};

pub mod keyed_set;
pub use keyed_set::{Keyed, KeyedSet};

mod types;
pub use types::{Installer, PackageManifest, Version};

pub mod store;
pub use store::{DocumentKey, ETag, ManifestStore, StoredManifest};

pub mod memory;
pub use memory::MemoryManifestStore;

pub mod validator;
pub use validator::{ManifestValidator, SchemaValidator};

pub mod editor;
pub mod locator;

mod service;
pub use service::{ManifestService, DEFAULT_MAX_WRITE_ATTEMPTS};

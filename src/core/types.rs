//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`RepositoryId`] - Validated repository identifier
//! - [`ModificationMarker`] - Opaque freshness marker of a repository
//! - [`Fingerprint`] - Digest over a repository set, used as a cache key
//! - [`CacheNamespace`] - Logical namespace of cached derived data
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use pkgfront::core::types::{CacheNamespace, RepositoryId};
//!
//! let repo = RepositoryId::new("main").unwrap();
//! assert!(!repo.is_package_repository());
//!
//! let local = RepositoryId::new("foo-1.0.tbz2").unwrap();
//! assert!(local.is_package_repository());
//!
//! assert!(RepositoryId::new("has space").is_err());
//! assert!(CacheNamespace::new("Available").is_err());
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Identifier suffix of repositories backed by a single package file.
pub const PACKAGE_REPOSITORY_SUFFIX: &str = ".tbz2";

/// Identifier suffix of repositories created by a web install request.
pub const WEB_INSTALL_REPOSITORY_SUFFIX: &str = ".etp";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid repository identifier: {0}")]
    InvalidRepositoryId(String),

    #[error("invalid cache namespace: {0}")]
    InvalidNamespace(String),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}

/// A validated repository identifier.
///
/// Identifiers are used as directory names and as hash input, so they
/// must be non-empty, must not contain path separators, whitespace or
/// control characters, and must not start with `.`.
///
/// # Example
///
/// ```
/// use pkgfront::core::types::RepositoryId;
///
/// let id = RepositoryId::new("community").unwrap();
/// assert_eq!(id.as_str(), "community");
///
/// assert!(RepositoryId::new("").is_err());
/// assert!(RepositoryId::new("a/b").is_err());
/// assert!(RepositoryId::new(".hidden").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryId(String);

impl RepositoryId {
    /// Create a new validated repository identifier.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRepositoryId` if the identifier is malformed.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    fn validate(id: &str) -> Result<(), TypeError> {
        if id.is_empty() {
            return Err(TypeError::InvalidRepositoryId(
                "identifier cannot be empty".into(),
            ));
        }
        if id.starts_with('.') {
            return Err(TypeError::InvalidRepositoryId(
                "identifier cannot start with '.'".into(),
            ));
        }
        if id.contains('/') || id.contains('\\') {
            return Err(TypeError::InvalidRepositoryId(
                "identifier cannot contain path separators".into(),
            ));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidRepositoryId(format!(
                "identifier '{}' contains whitespace or control characters",
                id.escape_default()
            )));
        }
        Ok(())
    }

    /// Whether this is a package (single file or web-install) repository.
    ///
    /// Package repositories are ephemeral and never contribute to the
    /// filtered fingerprint.
    pub fn is_package_repository(&self) -> bool {
        self.0.ends_with(PACKAGE_REPOSITORY_SUFFIX) || self.0.ends_with(WEB_INSTALL_REPOSITORY_SUFFIX)
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepositoryId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepositoryId> for String {
    fn from(id: RepositoryId) -> Self {
        id.0
    }
}

impl AsRef<str> for RepositoryId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Freshness marker of a repository.
///
/// The fingerprinter only ever looks at [`ModificationMarker::repr`], so
/// two markers are interchangeable exactly when their representations
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModificationMarker {
    /// Nanoseconds since the Unix epoch.
    Timestamp(u128),
    /// Monotonic revision counter.
    Revision(u64),
}

impl ModificationMarker {
    /// Marker from a filesystem modification time.
    ///
    /// Times before the epoch collapse to zero.
    pub fn from_system_time(time: SystemTime) -> Self {
        let nanos = time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self::Timestamp(nanos)
    }

    /// Stable textual representation used as hash input.
    ///
    /// # Example
    ///
    /// ```
    /// use pkgfront::core::types::ModificationMarker;
    ///
    /// assert_eq!(ModificationMarker::Revision(7).repr(), "r7");
    /// assert_eq!(ModificationMarker::Timestamp(12).repr(), "t12");
    /// ```
    pub fn repr(&self) -> String {
        match self {
            Self::Timestamp(nanos) => format!("t{nanos}"),
            Self::Revision(rev) => format!("r{rev}"),
        }
    }
}

impl std::fmt::Display for ModificationMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.repr())
    }
}

/// A digest summarizing the identity and freshness of a repository set.
///
/// Fingerprints are hex-encoded SHA-256 digests. They are compared, never
/// parsed, so the only structural guarantee is the lowercase hex shape.
///
/// # Example
///
/// ```
/// use pkgfront::core::types::Fingerprint;
///
/// let fp = Fingerprint::of(&[b"0", b"t12"]);
/// assert_eq!(fp, Fingerprint::of(&[b"0", b"t12"]));
/// assert_ne!(fp, Fingerprint::of(&[b"0", b"t13"]));
/// assert_eq!(fp.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Finalize a hasher into a fingerprint.
    pub fn from_hasher(hasher: Sha256) -> Self {
        Self(hex::encode(hasher.finalize()))
    }

    /// Hash a sequence of byte chunks in order.
    pub fn of(chunks: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        Self::from_hasher(hasher)
    }

    /// Parse a previously rendered fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidFingerprint` unless the value is 64
    /// lowercase hex characters.
    pub fn parse(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        let well_formed = value.len() == 64
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !well_formed {
            return Err(TypeError::InvalidFingerprint(value));
        }
        Ok(Self(value))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical namespace for cached derived data (e.g. `available_packages`).
///
/// Namespaces become directory names under the cache root, so they are
/// restricted to `[a-z0-9_-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheNamespace(String);

impl CacheNamespace {
    /// Namespace of the available-packages list.
    pub const AVAILABLE_PACKAGES: &'static str = "available_packages";

    /// Create a new validated namespace.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidNamespace` for empty names or names with
    /// characters outside `[a-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidNamespace("namespace cannot be empty".into()));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-'))
        {
            return Err(TypeError::InvalidNamespace(format!(
                "namespace '{name}' cannot contain '{c}'"
            )));
        }
        Ok(Self(name))
    }

    /// The namespace used for the available-packages list.
    pub fn available_packages() -> Self {
        Self(Self::AVAILABLE_PACKAGES.to_string())
    }

    /// Get the namespace as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

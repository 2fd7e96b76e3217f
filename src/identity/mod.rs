// Document identity and content fingerprints
// Identifiers and fingerprints share one representation: 64 lowercase hex chars of a SHA-256


use sha2::{Digest as _, Sha256};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::{Result, VaultError};

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// A validated, lowercase, hex-encoded SHA-256 digest.
///
/// This is the only type accepted where an identifier is interpolated into a
/// store predicate, so anything that reaches a query has passed [`Digest::parse`]
/// or was produced by hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Validate an externally supplied identifier or fingerprint.
    ///
    /// Accepts exactly 64 ASCII hex digits in either case and normalizes to
    /// lowercase. Everything else is a [`VaultError::MalformedIdentifier`].
    #[inline]
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() == DIGEST_HEX_LEN && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(VaultError::MalformedIdentifier(value.to_string()))
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }
}

impl fmt::Display for Digest {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of the document stored at `relative_path` (relative to the corpus root)
#[inline]
pub fn identify(relative_path: &str) -> Digest {
    Digest::of(relative_path.as_bytes())
}

/// Fingerprint of a document's raw content
#[inline]
pub fn fingerprint(content: &[u8]) -> Digest {
    Digest::of(content)
}

/// Path of `path` relative to `root`, with `/` separators on every platform.
///
/// Fails with [`VaultError::OutsideCorpus`] when `path` is not below `root`
/// or is the root itself.
#[inline]
pub fn relative_path(path: &Path, root: &Path) -> Result<String> {
    let outside = || VaultError::OutsideCorpus {
        path: path.display().to_string(),
        root: root.display().to_string(),
    };

    let stripped = path.strip_prefix(root).map_err(|_| outside())?;

    let mut parts = Vec::new();
    for component in stripped.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            _ => return Err(outside()),
        }
    }

    if parts.is_empty() {
        return Err(outside());
    }
    Ok(parts.join("/"))
}

/// Inverse of [`relative_path`]: join a stored `/`-separated path onto `root`
#[inline]
pub fn absolute_path(relative: &str, root: &Path) -> PathBuf {
    let mut path = root.to_path_buf();
    path.extend(relative.split('/').filter(|part| !part.is_empty()));
    path
}

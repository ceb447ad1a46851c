//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while registering content with a
/// [`DevServer`](crate::DevServer).
///
/// All of these surface synchronously to the registering caller; nothing
/// here is deferred to request time.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The file backing a static route or named asset does not exist.
    #[error("no such file: `{0}`")]
    FileNotFound(PathBuf),

    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    /// A second dynamic endpoint was registered for the same route.
    /// Static routes overwrite on collision; dynamic routes are code and
    /// refuse to.
    #[error("route `{0}` is already registered")]
    DuplicateRoute(String),

    /// A redirect points at a URL with no endpoint behind it.
    #[error("redirect target `{0}` has no registered endpoint")]
    UnknownTarget(String),
}

/// Errors raised while opening an asset archive or reading it back into a
/// server.
///
/// A failed load leaves the target server untouched.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive IO error")]
    Io(#[from] std::io::Error),

    #[error("not an asset archive (bad magic)")]
    BadMagic,

    /// An entry header or payload is truncated or not valid UTF-8.
    #[error("archive is corrupt")]
    Corrupt,

    #[error("archive has no manifest entry")]
    MissingManifest,

    #[error("malformed archive manifest")]
    Manifest(#[source] serde_json::Error),

    /// The manifest names a content entry the archive does not contain.
    #[error("manifest references missing entry `{0}`")]
    MissingEntry(String),
}

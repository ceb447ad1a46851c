//! Content descriptors backing static routes and named assets.

use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::archive::SharedReader;
use crate::error::RegisterError;
use crate::utils::mime;

/// How an asset may be used once registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Served directly from a URL.
    Direct,
    /// Only readable by dynamic handlers, never routed.
    Referenced,
}

/// Where the asset bytes live.
#[derive(Clone)]
enum AssetSource {
    /// A file on disk, re-read on every request.
    File(PathBuf),
    /// An entry inside a shared asset archive.
    Archive { reader: SharedReader, entry: String },
}

impl fmt::Debug for AssetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetSource::File(path) => f.debug_tuple("File").field(path).finish(),
            AssetSource::Archive { entry, .. } => {
                f.debug_struct("Archive").field("entry", entry).finish()
            }
        }
    }
}

/// An immutable descriptor of a single piece of content.
///
/// Metadata (content type, size) is fixed at registration time; the
/// bytes themselves are fetched on demand, so a change to the file on
/// disk shows up on the next request.
#[derive(Debug, Clone)]
pub struct Asset {
    kind: AssetKind,
    name: String,
    content_type: Option<String>,
    size: Option<u64>,
    source: AssetSource,
}

impl Asset {
    /// Describe a file on disk.
    ///
    /// Fails if the file does not exist. A missing content type is
    /// guessed from the file name; an unguessable type is logged and
    /// left unset rather than blocking registration. A missing size is
    /// read from file metadata.
    pub fn from_file(
        kind: AssetKind,
        name: impl Into<String>,
        content_type: Option<&str>,
        path: impl Into<PathBuf>,
        size: Option<u64>,
    ) -> Result<Self, RegisterError> {
        let path = path.into();
        let name = name.into();

        if !path.exists() {
            return Err(RegisterError::FileNotFound(path));
        }

        let content_type = match content_type {
            Some(ct) => Some(ct.to_string()),
            None => {
                let guessed = mime::from_path(&path).map(str::to_string);
                if guessed.is_none() {
                    log::warn!("cannot determine mime type for {}", path.display());
                }
                guessed
            }
        };

        let size = match size {
            Some(size) => Some(size),
            None => Some(
                fs::metadata(&path)
                    .map_err(|e| RegisterError::Io(path.clone(), e))?
                    .len(),
            ),
        };

        Ok(Self {
            kind,
            name,
            content_type,
            size,
            source: AssetSource::File(path),
        })
    }

    /// Recreate an asset from persisted metadata and an archive entry.
    ///
    /// Never touches the filesystem; the metadata is trusted as saved.
    pub fn from_archive(meta: AssetMetadata, reader: SharedReader, entry: String) -> Self {
        Self {
            kind: meta.kind,
            name: meta.name,
            content_type: meta.content_type,
            size: meta.size,
            source: AssetSource::Archive { reader, entry },
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// The registration key; for static routes this is also the URL.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Fetch the asset bytes.
    ///
    /// Re-reads the backing file or archive entry on every call; nothing
    /// is cached between requests.
    pub fn content(&self) -> io::Result<Vec<u8>> {
        match &self.source {
            AssetSource::File(path) => fs::read(path),
            AssetSource::Archive { reader, entry } => reader.read(entry),
        }
    }

    /// The slice of this asset persisted into archive manifests.
    pub fn metadata(&self) -> AssetMetadata {
        AssetMetadata {
            name: self.name.clone(),
            kind: self.kind,
            content_type: self.content_type.clone(),
            size: self.size,
        }
    }
}

/// Asset metadata as stored in an archive manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub name: String,
    pub kind: AssetKind,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

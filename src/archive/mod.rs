//! Portable archives of a server's static content.
//!
//! An archive packs every static route and named asset, plus a manifest,
//! into one blob that another process restores with a single call. The
//! container is deliberately small: a magic tag followed by named,
//! length-prefixed, deflate-compressed entries, with the manifest JSON
//! written as the final entry. Dynamic endpoints are code and are never
//! serialized.
//!
//! Saves iterate routes and assets in sorted key order, so saving an
//! unchanged server twice produces byte-identical blobs.

mod reader;

pub use reader::{ReadSeek, SharedReader};

use std::io::{self, Write as _};

use flate2::Compression;
use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};

use crate::asset::{Asset, AssetMetadata};
use crate::endpoint::{Endpoint, StaticEndpoint};
use crate::error::ArchiveError;
use crate::server::ServerState;

/// Identifies the container format (and its revision).
pub(crate) const MAGIC: &[u8; 8] = b"dsrv0001";

/// Name of the manifest entry inside the container.
const MANIFEST_ENTRY: &str = "manifest.json";

/// Top-level manifest record.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    endpoints: Vec<ManifestEndpoint>,
    assets: Vec<ManifestAsset>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestEndpoint {
    url: String,
    asset: AssetMetadata,
    entry: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestAsset {
    name: String,
    asset: AssetMetadata,
    entry: String,
}

/// Appends named, compressed entries to a growing container.
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self {
            buf: MAGIC.to_vec(),
        }
    }

    pub(crate) fn add_entry(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;

        let name_len = u32::try_from(name.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry name too long"))?;
        let data_len = u32::try_from(compressed.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "entry too large"))?;

        self.buf.extend_from_slice(&name_len.to_le_bytes());
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(&data_len.to_le_bytes());
        self.buf.extend_from_slice(&compressed);
        Ok(())
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Serialize the server's static routes and named assets.
///
/// Only static endpoints contribute; dynamic ones are skipped. Content
/// is read through each asset at save time, so an archive-loaded server
/// can itself be re-saved.
pub(crate) fn save(state: &ServerState) -> io::Result<Vec<u8>> {
    let mut writer = Writer::new();
    let mut manifest = Manifest::default();

    let mut statics: Vec<(&String, &Asset)> = state
        .endpoints
        .iter()
        .filter_map(|(url, ep)| ep.static_asset().map(|asset| (url, asset)))
        .collect();
    statics.sort_by_key(|(url, _)| *url);

    for (i, (url, asset)) in statics.into_iter().enumerate() {
        let entry = format!("static.{}.dat", i + 1);
        writer.add_entry(&entry, &asset.content()?)?;
        manifest.endpoints.push(ManifestEndpoint {
            url: url.clone(),
            asset: asset.metadata(),
            entry,
        });
    }

    let mut named: Vec<(&String, &Asset)> = state.assets.iter().collect();
    named.sort_by_key(|(name, _)| *name);

    for (i, (name, asset)) in named.into_iter().enumerate() {
        let entry = format!("asset.{}.dat", i + 1);
        writer.add_entry(&entry, &asset.content()?)?;
        manifest.assets.push(ManifestAsset {
            name: name.clone(),
            asset: asset.metadata(),
            entry,
        });
    }

    writer.add_entry(MANIFEST_ENTRY, &serde_json::to_vec_pretty(&manifest)?)?;
    Ok(writer.finish())
}

/// Restore archived routes and assets into the server.
///
/// All-or-nothing: the manifest is parsed and every referenced entry
/// verified before the first map insertion, so a malformed archive
/// leaves the server exactly as it was.
pub(crate) fn load(state: &mut ServerState, reader: &SharedReader) -> Result<(), ArchiveError> {
    let raw = match reader.read(MANIFEST_ENTRY) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArchiveError::MissingManifest);
        }
        Err(e) => return Err(ArchiveError::Io(e)),
    };
    let manifest: Manifest = serde_json::from_slice(&raw).map_err(ArchiveError::Manifest)?;

    for entry in manifest
        .endpoints
        .iter()
        .map(|e| &e.entry)
        .chain(manifest.assets.iter().map(|a| &a.entry))
    {
        if !reader.contains(entry) {
            return Err(ArchiveError::MissingEntry(entry.clone()));
        }
    }

    for info in manifest.endpoints {
        let asset = Asset::from_archive(info.asset, reader.clone(), info.entry);
        state
            .endpoints
            .insert(info.url, Endpoint::Static(StaticEndpoint::new(asset)));
    }

    for info in manifest.assets {
        let asset = Asset::from_archive(info.asset, reader.clone(), info.entry);
        state.assets.insert(info.name, asset);
    }

    Ok(())
}

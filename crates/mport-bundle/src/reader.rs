//! Bundle reader (§4.D).
//!
//! A bundle is one zstd- or xz-compressed tar archive. Entries under the
//! `.mport/` prefix are the metadata subdirectory (stub database, hook
//! scripts, message file); everything else is a payload file, appearing in
//! the archive in the same order the stub plist enumerates materializable
//! assets.
//!
//! Neither zstd nor xz streams are cheaply seekable, so `open` makes one
//! sequential pass over the archive, staging the metadata subdirectory and
//! every payload entry into a temporary directory (mirroring
//! `extract_tar`'s "walk once, unpack everything" shape). `next_entry` /
//! `extract_current` then replay the staged payload entries one at a time,
//! in lockstep with the installer's asset-list walk.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use mport_db::MetadataStore;
use mport_schema::Sha256Hash;

use crate::error::BundleError;

const METADATA_PREFIX: &str = ".mport";
const STUB_DB_NAME: &str = "stub.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BundleFormat {
    Zstd,
    Xz,
}

fn detect_format(path: &Path) -> Result<BundleFormat, BundleError> {
    let mut magic = [0u8; 6];
    let mut file = File::open(path)?;
    let n = file.read(&mut magic)?;
    if n >= 4 && magic[0..4] == [0x28, 0xB5, 0x2F, 0xFD] {
        return Ok(BundleFormat::Zstd);
    }
    if n >= 6 && magic[0..6] == [0xFD, b'7', b'z', b'X', b'Z', 0x00] {
        return Ok(BundleFormat::Xz);
    }
    Err(BundleError::UnsupportedFormat)
}

fn open_decompressed(path: &Path, format: BundleFormat) -> Result<Box<dyn Read>, BundleError> {
    let file = File::open(path)?;
    Ok(match format {
        BundleFormat::Zstd => Box::new(zstd::stream::Decoder::new(file)?),
        BundleFormat::Xz => Box::new(xz2::read::XzDecoder::new(file)),
    })
}

/// One staged payload entry, in archive order.
struct PayloadEntry {
    relative_path: PathBuf,
    staged_path: PathBuf,
    mode: u32,
}

/// The header handed back by [`BundleReader::next_entry`].
#[derive(Debug, Clone)]
pub struct BundleEntryHeader {
    /// Path relative to the install prefix.
    pub relative_path: PathBuf,
    /// Unix file mode from the archive.
    pub mode: u32,
}

/// Opens a bundle archive and yields its staged metadata and payload entries.
pub struct BundleReader {
    metadata_dir: TempDir,
    staging_dir: TempDir,
    payload: Vec<PayloadEntry>,
    cursor: usize,
}

impl BundleReader {
    /// Opens `path`, staging its metadata subdirectory and payload entries.
    pub fn open(path: &Path) -> Result<Self, BundleError> {
        tracing::debug!(path = %path.display(), "opening bundle");
        let format = detect_format(path)?;
        let reader = open_decompressed(path, format)?;
        let mut archive = tar::Archive::new(reader);

        let metadata_dir = tempfile::tempdir()?;
        let staging_dir = tempfile::tempdir()?;
        let mut payload = Vec::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let entry_path = entry.path()?.into_owned();
            let mode = entry.header().mode().unwrap_or(0o644);

            if let Ok(rel) = entry_path.strip_prefix(METADATA_PREFIX) {
                let dest = sanitized_join(metadata_dir.path(), rel)?;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                entry.unpack(&dest)?;
            } else {
                let staged_path = staging_dir.path().join(payload.len().to_string());
                entry.unpack(&staged_path)?;
                payload.push(PayloadEntry {
                    relative_path: entry_path,
                    staged_path,
                    mode,
                });
            }
        }

        tracing::debug!(entries = payload.len(), "staged bundle payload");
        Ok(Self {
            metadata_dir,
            staging_dir,
            payload,
            cursor: 0,
        })
    }

    /// Copies the stub database out of the staged metadata directory and
    /// attaches it to `store` as `stub`.
    pub fn attach_stub_db(&self, store: &MetadataStore) -> Result<(), BundleError> {
        let stub_path = self.metadata_dir.path().join(STUB_DB_NAME);
        store.attach_stub(&stub_path)?;
        Ok(())
    }

    /// Returns the path to the already-staged metadata subdirectory (hook
    /// scripts, mtree, message file).
    pub fn prep_for_install(&self) -> Result<&Path, BundleError> {
        Ok(self.metadata_dir.path())
    }

    /// Yields the next payload entry's header without consuming it.
    pub fn next_entry(&self) -> Option<BundleEntryHeader> {
        self.payload.get(self.cursor).map(|e| BundleEntryHeader {
            relative_path: e.relative_path.clone(),
            mode: e.mode,
        })
    }

    /// Writes the current payload entry to `target_path`, preserving its
    /// archive mode, and advances the cursor. Returns the extracted file's
    /// SHA-256 so the installer can record it without a second read.
    pub fn extract_current(&mut self, target_path: &Path) -> Result<Sha256Hash, BundleError> {
        let entry = self
            .payload
            .get(self.cursor)
            .ok_or(BundleError::OutOfSync)?;

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&entry.staged_path, target_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(target_path, fs::Permissions::from_mode(entry.mode))?;
        }

        let bytes = fs::read(target_path)?;
        let hash = Sha256Hash::compute(&bytes);
        self.cursor += 1;
        Ok(hash)
    }

    /// Whether every payload entry has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.payload.len()
    }

    /// Releases the staging directories and detaches the stub database.
    /// Consumes `self`; the `TempDir`s are removed on drop.
    pub fn finish(self, store: &MetadataStore) -> Result<(), BundleError> {
        store.detach_stub()?;
        drop(self.metadata_dir);
        drop(self.staging_dir);
        Ok(())
    }

    /// Reads this bundle's declared dependencies directly out of its stub
    /// database, without attaching it to the live store -- used for
    /// precheck, which runs before the stub is attached for phase 2.
    ///
    /// # Errors
    ///
    /// Returns a [`BundleError`] if the stub database cannot be opened or
    /// queried.
    pub fn stub_depends(&self) -> Result<Vec<(mport_schema::PackageName, String)>, BundleError> {
        self.query_stub_edges("SELECT pkg, depend_pkgname, depend_pkgversion FROM depends")
    }

    /// Reads this bundle's declared conflicts directly out of its stub
    /// database.
    ///
    /// # Errors
    ///
    /// Returns a [`BundleError`] if the stub database cannot be opened or
    /// queried.
    pub fn stub_conflicts(&self) -> Result<Vec<(mport_schema::PackageName, String)>, BundleError> {
        self.query_stub_edges("SELECT pkg, conflict_pkg, conflict_version FROM conflicts")
    }

    /// Reads the package row out of this bundle's stub database (`add`
    /// installs a bundle with no corresponding index entry to source this
    /// metadata from).
    ///
    /// # Errors
    ///
    /// Returns a [`BundleError`] if the stub database cannot be opened or
    /// has no package row.
    pub fn stub_package_record(&self) -> Result<mport_schema::PackageRecord, BundleError> {
        use mport_schema::{InstallReason, PackageKind, PackageName, Version};

        let stub_path = self.metadata_dir.path().join(STUB_DB_NAME);
        let conn = rusqlite::Connection::open(stub_path)?;
        let record = conn.query_row(
            "SELECT pkg, version, origin, prefix, lang, options, comment, desc, os_release, cpe, \
             purl, locked, deprecated, expiration_date, no_provide_shlib, flavor, automatic, \
             install_date, type, flatsize FROM packages LIMIT 1",
            [],
            |row| {
                let automatic: bool = row.get(16)?;
                let kind: i64 = row.get(18)?;
                Ok(mport_schema::PackageRecord {
                    name: PackageName::new(&row.get::<_, String>(0)?),
                    version: Version::parse(&row.get::<_, String>(1)?),
                    origin: row.get(2)?,
                    prefix: row.get(3)?,
                    lang: row.get(4)?,
                    options: row.get(5)?,
                    comment: row.get(6)?,
                    desc: row.get(7)?,
                    categories: Vec::new(),
                    os_release: row.get(8)?,
                    cpe: row.get(9)?,
                    purl: row.get(10)?,
                    locked: row.get(11)?,
                    deprecated: row.get(12)?,
                    expiration_date: row.get(13)?,
                    no_provide_shlib: row.get(14)?,
                    flavor: row.get(15)?,
                    automatic: if automatic { InstallReason::Automatic } else { InstallReason::Explicit },
                    install_date: row.get(17)?,
                    kind: if kind == 1 { PackageKind::System } else { PackageKind::Application },
                    flatsize: row.get(19)?,
                })
            },
        )?;
        Ok(record)
    }

    fn query_stub_edges(&self, sql: &str) -> Result<Vec<(mport_schema::PackageName, String)>, BundleError> {
        let stub_path = self.metadata_dir.path().join(STUB_DB_NAME);
        let conn = rusqlite::Connection::open(stub_path)?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(1)?;
            let requirement: String = row.get(2)?;
            Ok((mport_schema::PackageName::new(&name), requirement))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// Joins `rel` onto `base`, rejecting paths that would escape it (Zip Slip).
fn sanitized_join(base: &Path, rel: &Path) -> Result<PathBuf, BundleError> {
    let joined = base.join(rel);
    if !joined.starts_with(base) {
        return Err(BundleError::UnsafePath(rel.display().to_string()));
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_bundle(dir: &Path) -> PathBuf {
        let bundle_path = dir.join("pkg.mport.zst");
        let tar_bytes = {
            let mut builder = tar::Builder::new(Vec::new());

            let stub_db = b"fake sqlite contents";
            let mut header = tar::Header::new_gnu();
            header.set_size(stub_db.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, ".mport/stub.db", &stub_db[..])
                .unwrap();

            let payload = b"#!/bin/sh\necho hi\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(payload.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, "bin/hello", &payload[..])
                .unwrap();

            builder.into_inner().unwrap()
        };

        let mut encoder = zstd::stream::Encoder::new(Vec::new(), 0).unwrap();
        encoder.write_all(&tar_bytes).unwrap();
        let compressed = encoder.finish().unwrap();

        fs::write(&bundle_path, compressed).unwrap();
        bundle_path
    }

    #[test]
    fn open_splits_metadata_and_payload() {
        let dir = tempfile::tempdir().unwrap();
        let bundle_path = build_bundle(dir.path());

        let reader = BundleReader::open(&bundle_path).unwrap();
        assert!(reader.metadata_dir.path().join("stub.db").exists());
        assert_eq!(reader.payload.len(), 1);
        assert_eq!(reader.payload[0].relative_path, Path::new("bin/hello"));
    }

    #[test]
    fn extract_current_advances_cursor_and_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let bundle_path = build_bundle(dir.path());

        let mut reader = BundleReader::open(&bundle_path).unwrap();
        let header = reader.next_entry().unwrap();
        assert_eq!(header.mode & 0o777, 0o755);

        let target = dir.path().join("installed/bin/hello");
        let hash = reader.extract_current(&target).unwrap();
        assert!(target.exists());
        assert_eq!(hash.as_str().len(), 64);
        assert!(reader.is_exhausted());
    }

    #[test]
    fn extract_past_the_end_is_out_of_sync() {
        let dir = tempfile::tempdir().unwrap();
        let bundle_path = build_bundle(dir.path());

        let mut reader = BundleReader::open(&bundle_path).unwrap();
        reader.extract_current(&dir.path().join("a")).unwrap();
        let err = reader.extract_current(&dir.path().join("b")).unwrap_err();
        assert!(matches!(err, BundleError::OutOfSync));
    }
}

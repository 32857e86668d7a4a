//! Remote index client and rename/moved-package lookups (§4.G).
//!
//! The index is a second, independently-cached SQLite database (the index
//! mirror serves it compressed; the cached copy on disk is always
//! decompressed). `load` opens the cache as-is; `get` refreshes it from the
//! configured mirror with a SHA-256 integrity check and an atomic
//! temp-file-then-rename swap so a reader never observes a half-written
//! cache.

use std::fs;
use std::path::{Path, PathBuf};

use mport_schema::{CheckOutcome, IndexEntry, MirrorEntry, MovedEntry, MportError, PackageName, Sha256Hash};
use rusqlite::{params, Connection, OptionalExtension};

use crate::collaborators::HttpFetcher;

/// A locally cached copy of the remote package index.
pub struct IndexClient {
    conn: Connection,
    cache_path: PathBuf,
}

impl IndexClient {
    /// Opens the cached index database at `cache_path` without touching the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns [`MportError::IndexNotLoaded`] if no cache exists yet.
    pub fn load(cache_path: &Path) -> Result<Self, MportError> {
        if !cache_path.exists() {
            return Err(MportError::IndexNotLoaded);
        }
        let conn = Connection::open(cache_path).map_err(|e| MportError::Fatal(e.to_string()))?;
        Ok(Self {
            conn,
            cache_path: cache_path.to_path_buf(),
        })
    }

    /// Fetches a fresh index from `mirror_url`, verifies it against
    /// `expected_sha256`, and atomically replaces the cache.
    ///
    /// # Errors
    ///
    /// Returns [`MportError::FetchTimeout`] or [`MportError::ChecksumMismatch`]
    /// on integrity failure, otherwise a [`MportError::Fatal`] wrapping the
    /// underlying IO/HTTP error.
    pub fn get(
        cache_path: &Path,
        mirror_url: &str,
        expected_sha256: &Sha256Hash,
        http: &dyn HttpFetcher,
    ) -> Result<Self, MportError> {
        let bytes = http.get(mirror_url).map_err(|e| {
            if e == "fetch timed out" {
                MportError::FetchTimeout
            } else {
                MportError::Fatal(e)
            }
        })?;

        let actual = Sha256Hash::compute(&bytes);
        if &actual != expected_sha256 {
            return Err(MportError::ChecksumMismatch {
                path: mirror_url.to_string(),
                expected: expected_sha256.to_string(),
                actual: actual.to_string(),
            });
        }

        let parent = cache_path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| MportError::Fatal(e.to_string()))?;
        let tmp_path = parent.join(format!(".{}.tmp", cache_path.file_name().unwrap_or_default().to_string_lossy()));
        fs::write(&tmp_path, &bytes).map_err(|e| MportError::Fatal(e.to_string()))?;
        fs::rename(&tmp_path, cache_path).map_err(|e| MportError::Fatal(e.to_string()))?;

        Self::load(cache_path)
    }

    /// The on-disk path this client's cache was loaded from or written to.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Looks up an index entry by exact package name.
    ///
    /// # Errors
    ///
    /// Returns a [`MportError::Fatal`] on a database error.
    pub fn lookup_by_name(&self, name: &PackageName) -> Result<Option<IndexEntry>, MportError> {
        self.conn
            .query_row(INDEX_SELECT, params![name.as_str()], row_to_entry)
            .optional()
            .map_err(|e| MportError::Fatal(e.to_string()))
    }

    /// Substring search over name and comment, ordered by `(pkgname, version)`.
    ///
    /// # Errors
    ///
    /// Returns a [`MportError::Fatal`] on a database error.
    pub fn search_term(&self, term: &str) -> Result<Vec<IndexEntry>, MportError> {
        let like = format!("%{term}%");
        let mut stmt = self
            .conn
            .prepare(&format!(
                "{INDEX_SELECT_BASE} WHERE pkgname LIKE ?1 OR comment LIKE ?1 ORDER BY pkgname, version"
            ))
            .map_err(|e| MportError::Fatal(e.to_string()))?;
        let rows = stmt
            .query_map(params![like], row_to_entry)
            .map_err(|e| MportError::Fatal(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| MportError::Fatal(e.to_string()))
    }

    /// The dependency names an index entry declares for `(name, version)`.
    ///
    /// # Errors
    ///
    /// Returns a [`MportError::Fatal`] on a database error.
    pub fn depends_list(&self, name: &PackageName, version: &str) -> Result<Vec<PackageName>, MportError> {
        let mut stmt = self
            .conn
            .prepare("SELECT depend_pkgname FROM index_depends WHERE pkgname = ?1 AND version = ?2 ORDER BY depend_pkgname")
            .map_err(|e| MportError::Fatal(e.to_string()))?;
        let rows = stmt
            .query_map(params![name.as_str(), version], |row| row.get::<_, String>(0))
            .map_err(|e| MportError::Fatal(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map(|v| v.into_iter().map(PackageName::new).collect())
            .map_err(|e| MportError::Fatal(e.to_string()))
    }

    /// The configured mirror list.
    ///
    /// # Errors
    ///
    /// Returns a [`MportError::Fatal`] on a database error.
    pub fn mirror_list(&self) -> Result<Vec<MirrorEntry>, MportError> {
        let mut stmt = self
            .conn
            .prepare("SELECT country, url FROM mirrors ORDER BY country")
            .map_err(|e| MportError::Fatal(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MirrorEntry {
                    country: row.get(0)?,
                    url: row.get(1)?,
                })
            })
            .map_err(|e| MportError::Fatal(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|e| MportError::Fatal(e.to_string()))
    }

    /// Looks up a `moved` entry by source-tree origin.
    ///
    /// # Errors
    ///
    /// Returns a [`MportError::Fatal`] on a database error.
    pub fn moved_lookup(&self, origin: &str) -> Result<Option<MovedEntry>, MportError> {
        self.conn
            .query_row(
                "SELECT port, moved_to, moved_to_pkgname, why, date FROM moved WHERE port = ?1",
                params![origin],
                |row| {
                    Ok(MovedEntry {
                        port: row.get(0)?,
                        moved_to: row.get(1)?,
                        moved_to_pkgname: row.get(2)?,
                        why: row.get(3)?,
                        date: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(|e| MportError::Fatal(e.to_string()))
    }

    /// Classifies an installed package's update status against this index
    /// (§4.G tri-state).
    ///
    /// # Errors
    ///
    /// Returns a [`MportError::Fatal`] on a database error.
    pub fn check(
        &self,
        installed_name: &PackageName,
        installed_version: &mport_schema::Version,
        installed_origin: &str,
    ) -> Result<CheckOutcome, MportError> {
        if let Some(entry) = self.lookup_by_name(installed_name)? {
            if entry.version > *installed_version {
                return Ok(CheckOutcome::UpdateAvailable);
            }
            return Ok(CheckOutcome::NoUpdate);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM index_entries WHERE origin = ?1 AND pkgname != ?2 LIMIT 1")
            .map_err(|e| MportError::Fatal(e.to_string()))?;
        let found = stmt
            .exists(params![installed_origin, installed_name.as_str()])
            .map_err(|e| MportError::Fatal(e.to_string()))?;

        Ok(if found { CheckOutcome::OriginMatch } else { CheckOutcome::NoUpdate })
    }
}

const INDEX_SELECT_BASE: &str =
    "SELECT pkgname, version, comment, bundlefile, license, sha256, type, origin FROM index_entries";
const INDEX_SELECT: &str = "SELECT pkgname, version, comment, bundlefile, license, sha256, type, origin \
    FROM index_entries WHERE pkgname = ?1";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<IndexEntry> {
    Ok(IndexEntry {
        pkgname: PackageName::new(&row.get::<_, String>(0)?),
        version: mport_schema::Version::parse(&row.get::<_, String>(1)?),
        comment: row.get(2)?,
        bundlefile: row.get(3)?,
        license: row.get(4)?,
        sha256: Sha256Hash::new(row.get::<_, String>(5)?),
        type_: row.get(6)?,
        origin: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE index_entries (pkgname TEXT, version TEXT, comment TEXT, bundlefile TEXT, \
             license TEXT, sha256 TEXT, type TEXT, origin TEXT);
             CREATE TABLE index_depends (pkgname TEXT, version TEXT, depend_pkgname TEXT);
             CREATE TABLE mirrors (country TEXT, url TEXT);
             CREATE TABLE moved (port TEXT, moved_to TEXT, moved_to_pkgname TEXT, why TEXT, date TEXT);
             INSERT INTO index_entries VALUES ('jq', '1.7', 'a json processor', 'jq-1.7.mport', 'MIT', \
             'deadbeef', 'application', 'textproc/jq');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn lookup_by_name_finds_seeded_row() {
        let client = IndexClient {
            conn: seeded_conn(),
            cache_path: PathBuf::new(),
        };
        let entry = client.lookup_by_name(&PackageName::new("jq")).unwrap().unwrap();
        assert_eq!(entry.origin, "textproc/jq");
    }

    #[test]
    fn check_reports_update_available() {
        let client = IndexClient {
            conn: seeded_conn(),
            cache_path: PathBuf::new(),
        };
        let outcome = client
            .check(&PackageName::new("jq"), &mport_schema::Version::parse("1.6"), "textproc/jq")
            .unwrap();
        assert_eq!(outcome, CheckOutcome::UpdateAvailable);
    }

    #[test]
    fn check_reports_origin_match_on_rename() {
        let client = IndexClient {
            conn: seeded_conn(),
            cache_path: PathBuf::new(),
        };
        let outcome = client
            .check(&PackageName::new("jq-classic"), &mport_schema::Version::parse("1.6"), "textproc/jq")
            .unwrap();
        assert_eq!(outcome, CheckOutcome::OriginMatch);
    }
}

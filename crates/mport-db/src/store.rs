//! SQLite-backed metadata store (§4.B).
//!
//! `MetadataStore` owns one [`rusqlite::Connection`] and is called directly
//! and synchronously -- there is no background actor thread, per the
//! single-threaded redesign. Bulk, multi-row writes that must be atomic
//! (install materialize, package removal) go through [`InstallTxn`] or
//! [`MetadataStore::delete_package`], each wrapping exactly one SQL
//! transaction.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use mport_schema::{
    AssetEntry, AssetKind, InstallReason, PackageKind, PackageName, PackageRecord, Sha256Hash,
    Version,
};

use crate::error::DbError;
use crate::schema::SCHEMA_SQL;

/// Owns the connection to the installed-package metadata database.
pub struct MetadataStore {
    conn: Connection,
}

impl MetadataStore {
    /// Opens the metadata store at `path`, creating and migrating the
    /// schema if necessary.
    pub fn open_at(path: &Path) -> Result<Self, DbError> {
        tracing::debug!(path = %path.display(), "opening metadata store");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store (tests, dry-run planning).
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        register_version_cmp(&conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// Attaches a bundle's stub database under the name `stub` (§4.D).
    pub fn attach_stub(&self, stub_path: &Path) -> Result<(), DbError> {
        self.conn
            .execute("ATTACH DATABASE ?1 AS stub", params![stub_path.to_string_lossy()])?;
        Ok(())
    }

    /// Detaches the stub database previously opened with [`attach_stub`].
    ///
    /// [`attach_stub`]: MetadataStore::attach_stub
    pub fn detach_stub(&self) -> Result<(), DbError> {
        self.conn.execute("DETACH DATABASE stub", [])?;
        Ok(())
    }

    /// Begins phase-2 materialize: a transaction that stays open across the
    /// interleaved bundle-reader extraction calls (§4.E).
    pub fn begin_install(&mut self) -> Result<InstallTxn<'_>, DbError> {
        let tx = self.conn.transaction()?;
        Ok(InstallTxn { tx, seq: 0, pkg: None })
    }

    /// Removes every row for `name` in one transaction, returning its asset
    /// list so the caller can delete the underlying files in reverse order
    /// (§4.F).
    pub fn delete_package(&mut self, name: &PackageName) -> Result<Vec<AssetEntry>, DbError> {
        let assets = self.get_assets(name)?;

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM assets WHERE pkg = ?1", params![name.as_str()])?;
        tx.execute("DELETE FROM depends WHERE pkg = ?1", params![name.as_str()])?;
        tx.execute("DELETE FROM categories WHERE pkg = ?1", params![name.as_str()])?;
        tx.execute("DELETE FROM conflicts WHERE pkg = ?1", params![name.as_str()])?;
        tx.execute("DELETE FROM log WHERE pkg = ?1", params![name.as_str()])?;
        let deleted = tx.execute("DELETE FROM packages WHERE pkg = ?1", params![name.as_str()])?;
        tx.commit()?;

        if deleted == 0 {
            return Err(DbError::PackageNotFound(name.to_string()));
        }
        tracing::info!(package = %name, assets = assets.len(), "deleted package row");
        Ok(assets)
    }

    /// Fetches one package's record, if installed.
    pub fn get(&self, name: &PackageName) -> Result<Option<PackageRecord>, DbError> {
        let record = self
            .conn
            .query_row(PACKAGE_SELECT, params![name.as_str()], row_to_record)
            .optional()?;
        let Some(mut record) = record else {
            return Ok(None);
        };
        record.categories = self.get_categories(name)?;
        Ok(Some(record))
    }

    /// Lists every installed package, ordered by name.
    pub fn list_all(&self) -> Result<Vec<PackageRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PACKAGE_SELECT_BASE} ORDER BY pkg"))?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = rows.collect::<Result<Vec<_>, _>>()?;
        for record in &mut records {
            record.categories = self.get_categories(&record.name)?;
        }
        Ok(records)
    }

    /// Lists the names of every locked package.
    pub fn list_locked(&self) -> Result<Vec<PackageName>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT pkg FROM packages WHERE locked = 1 ORDER BY pkg")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PackageName::new)
            .collect())
    }

    /// Finds the package that owns the file at `path`, if any (`which`).
    pub fn find_owner(&self, path: &str) -> Result<Option<PackageName>, DbError> {
        self.conn
            .query_row(
                "SELECT pkg FROM assets WHERE data = ?1 AND type = ?2 LIMIT 1",
                params![path, encode_asset_kind(AssetKind::File)],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map(|opt| opt.map(PackageName::new))
            .map_err(Into::into)
    }

    /// Rewrites the checksum of one asset row, identified by package and
    /// path (§4.I `recompute_checksums` operator override).
    pub fn update_asset_checksum(&self, name: &PackageName, path: &str, checksum: &Sha256Hash) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE assets SET checksum = ?3 WHERE pkg = ?1 AND data = ?2",
            params![name.as_str(), path, checksum.to_string()],
        )?;
        Ok(())
    }

    /// Records a single dependency edge directly, bypassing the stub-copy
    /// path used during install (repair tooling, tests).
    pub fn record_dependency(
        &self,
        pkg: &PackageName,
        depend_pkgname: &PackageName,
        depend_pkgversion: &str,
        depend_port: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO depends (pkg, depend_pkgname, depend_pkgversion, depend_port) VALUES (?1, ?2, ?3, ?4)",
            params![pkg.as_str(), depend_pkgname.as_str(), depend_pkgversion, depend_port],
        )?;
        Ok(())
    }

    /// Sets or clears a package's lock flag.
    pub fn set_locked(&self, name: &PackageName, locked: bool) -> Result<(), DbError> {
        let changed = self.conn.execute(
            "UPDATE packages SET locked = ?2 WHERE pkg = ?1",
            params![name.as_str(), locked],
        )?;
        if changed == 0 {
            return Err(DbError::PackageNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Full-text-ish search over name, comment, and description.
    pub fn search(&self, pattern: &str) -> Result<Vec<PackageRecord>, DbError> {
        let like = format!("%{pattern}%");
        let mut stmt = self.conn.prepare(&format!(
            "{PACKAGE_SELECT_BASE} WHERE pkg LIKE ?1 OR comment LIKE ?1 OR desc LIKE ?1 ORDER BY pkg"
        ))?;
        let rows = stmt.query_map(params![like], row_to_record)?;
        let mut records = rows.collect::<Result<Vec<_>, _>>()?;
        for record in &mut records {
            record.categories = self.get_categories(&record.name)?;
        }
        Ok(records)
    }

    /// The packages `name` depends on (down-edges).
    pub fn get_down_depends(&self, name: &PackageName) -> Result<Vec<PackageName>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT depend_pkgname FROM depends WHERE pkg = ?1 ORDER BY depend_pkgname")?;
        let rows = stmt.query_map(params![name.as_str()], |row| row.get::<_, String>(0))?;
        Ok(rows
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PackageName::new)
            .collect())
    }

    /// The packages that depend on `name` (up-edges, i.e. its reverse deps).
    pub fn get_up_depends(&self, name: &PackageName) -> Result<Vec<PackageName>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT pkg FROM depends WHERE depend_pkgname = ?1 ORDER BY pkg")?;
        let rows = stmt.query_map(params![name.as_str()], |row| row.get::<_, String>(0))?;
        Ok(rows
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PackageName::new)
            .collect())
    }

    /// A package's asset list, in original plist order.
    pub fn get_assets(&self, name: &PackageName) -> Result<Vec<AssetEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT type, data, checksum, owner, grp, mode FROM assets WHERE pkg = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![name.as_str()], |row| {
            Ok(AssetEntry {
                kind: decode_asset_kind(row.get(0)?),
                data: row.get(1)?,
                checksum: row
                    .get::<_, Option<String>>(2)?
                    .map(|s| Sha256Hash::validated(&s))
                    .transpose()
                    .map_err(|e: String| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::<dyn std::error::Error + Send + Sync>::from(e),
                        )
                    })?,
                owner: row.get(3)?,
                group: row.get(4)?,
                mode: row.get::<_, Option<i64>>(5)?.map(|m| m as u32),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn get_categories(&self, name: &PackageName) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT category FROM categories WHERE pkg = ?1 ORDER BY category")?;
        let rows = stmt.query_map(params![name.as_str()], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Appends an install/upgrade/delete event row (§4.B history log).
    pub fn log_event(&self, name: &PackageName, version: &Version, msg: &str) -> Result<(), DbError> {
        let now = now_secs();
        self.conn.execute(
            "INSERT INTO log (pkg, version, date, msg) VALUES (?1, ?2, ?3, ?4)",
            params![name.as_str(), version.as_str(), now, msg],
        )?;
        Ok(())
    }

    /// Reads a column off the attached stub database, tolerating schemas
    /// that predate it -- falls back to `default` when the column is
    /// missing (grounded on `migrate_or_init`'s `pragma_table_info` probe).
    pub fn stub_has_column(&self, table: &str, column: &str) -> Result<bool, DbError> {
        let count: u32 = self.conn.query_row(
            &format!("SELECT count(*) FROM pragma_table_info('{table}', 'stub') WHERE name = ?1"),
            params![column],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// A single install transaction (§4.E phase 2): the installer inserts the
/// package row, copies dependency/category/conflict edges out of the
/// attached stub, and inserts one `assets` row per extracted file, all
/// inside this one transaction.
pub struct InstallTxn<'conn> {
    tx: rusqlite::Transaction<'conn>,
    seq: i64,
    pkg: Option<String>,
}

impl InstallTxn<'_> {
    /// Inserts or replaces the package's top-level row.
    pub fn insert_package_row(&mut self, record: &PackageRecord) -> Result<(), DbError> {
        self.pkg = Some(record.name.to_string());
        self.tx.execute(
            "INSERT OR REPLACE INTO packages (
                pkg, version, origin, prefix, lang, options, comment, desc, os_release,
                cpe, purl, locked, deprecated, expiration_date, no_provide_shlib, flavor,
                automatic, install_date, type, flatsize, status
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,'dirty')",
            params![
                record.name.as_str(),
                record.version.as_str(),
                record.origin,
                record.prefix,
                record.lang,
                record.options,
                record.comment,
                record.desc,
                record.os_release,
                record.cpe,
                record.purl,
                record.locked,
                record.deprecated,
                record.expiration_date,
                record.no_provide_shlib,
                record.flavor,
                matches!(record.automatic, InstallReason::Automatic),
                record.install_date,
                matches!(record.kind, PackageKind::System) as i64,
                record.flatsize,
            ],
        )?;
        for category in &record.categories {
            self.tx.execute(
                "INSERT INTO categories (pkg, category) VALUES (?1, ?2)",
                params![record.name.as_str(), category],
            )?;
        }
        Ok(())
    }

    /// Copies this package's dependency edges out of the attached stub.
    pub fn copy_depends_from_stub(&self, name: &PackageName) -> Result<(), DbError> {
        self.tx.execute(
            "INSERT INTO depends (pkg, depend_pkgname, depend_pkgversion, depend_port)
             SELECT pkg, depend_pkgname, depend_pkgversion, depend_port
             FROM stub.depends WHERE pkg = ?1",
            params![name.as_str()],
        )?;
        Ok(())
    }

    /// Copies this package's conflict edges out of the attached stub.
    pub fn copy_conflicts_from_stub(&self, name: &PackageName) -> Result<(), DbError> {
        self.tx.execute(
            "INSERT INTO conflicts (pkg, conflict_pkg, conflict_version)
             SELECT pkg, conflict_pkg, conflict_version
             FROM stub.conflicts WHERE pkg = ?1",
            params![name.as_str()],
        )?;
        Ok(())
    }

    /// Inserts one asset row, in order. Materializable kinds (regular files)
    /// should already carry the checksum computed while extracting.
    pub fn insert_asset(&mut self, name: &PackageName, entry: &AssetEntry) -> Result<(), DbError> {
        self.tx.execute(
            "INSERT INTO assets (pkg, seq, type, data, checksum, owner, grp, mode)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                name.as_str(),
                self.seq,
                encode_asset_kind(entry.kind),
                entry.data,
                entry.checksum.as_ref().map(std::string::ToString::to_string),
                entry.owner,
                entry.group,
                entry.mode.map(|m| m as i64),
            ],
        )?;
        self.seq += 1;
        Ok(())
    }

    /// Commits the transaction, marking the package row clean. The package
    /// is now fully installed.
    pub fn commit(self) -> Result<(), DbError> {
        if let Some(pkg) = &self.pkg {
            self.tx.execute(
                "UPDATE packages SET status = 'clean' WHERE pkg = ?1",
                params![pkg],
            )?;
        }
        self.tx.commit()?;
        Ok(())
    }

    /// Rolls back, leaving the store as though install was never attempted.
    pub fn rollback(self) -> Result<(), DbError> {
        self.tx.rollback()?;
        Ok(())
    }
}

const PACKAGE_SELECT_BASE: &str = "SELECT pkg, version, origin, prefix, lang, options, comment, \
    desc, os_release, cpe, purl, locked, deprecated, expiration_date, no_provide_shlib, flavor, \
    automatic, install_date, type, flatsize FROM packages";
const PACKAGE_SELECT: &str = "SELECT pkg, version, origin, prefix, lang, options, comment, desc, \
    os_release, cpe, purl, locked, deprecated, expiration_date, no_provide_shlib, flavor, \
    automatic, install_date, type, flatsize FROM packages WHERE pkg = ?1";

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PackageRecord> {
    let automatic: bool = row.get(16)?;
    let kind: i64 = row.get(18)?;
    Ok(PackageRecord {
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
        automatic: if automatic {
            InstallReason::Automatic
        } else {
            InstallReason::Explicit
        },
        install_date: row.get(17)?,
        kind: if kind == 1 {
            PackageKind::System
        } else {
            PackageKind::Application
        },
        flatsize: row.get(19)?,
    })
}

fn encode_asset_kind(kind: AssetKind) -> i64 {
    kind as i64
}

fn decode_asset_kind(raw: i64) -> AssetKind {
    const KINDS: &[AssetKind] = &[
        AssetKind::File,
        AssetKind::SampleFile,
        AssetKind::ShellFile,
        AssetKind::InfoFile,
        AssetKind::Directory,
        AssetKind::DirectoryRm,
        AssetKind::DirectoryRmTry,
        AssetKind::Cwd,
        AssetKind::Chmod,
        AssetKind::Chown,
        AssetKind::Chgrp,
        AssetKind::Exec,
        AssetKind::PreExec,
        AssetKind::PostExec,
        AssetKind::UnExec,
        AssetKind::PreUnExec,
        AssetKind::PostUnExec,
        AssetKind::Ldconfig,
        AssetKind::LdconfigLinux,
        AssetKind::GlibSchemas,
        AssetKind::DesktopFileUtils,
        AssetKind::Kld,
        AssetKind::Info,
        AssetKind::Touch,
        AssetKind::FileOwnerMode,
        AssetKind::DirOwnerMode,
        AssetKind::SampleOwnerMode,
        AssetKind::Comment,
        AssetKind::Ignore,
        AssetKind::Option,
        AssetKind::Origin,
        AssetKind::DepOrigin,
        AssetKind::Display,
    ];
    KINDS
        .get(usize::try_from(raw).unwrap_or(0))
        .copied()
        .unwrap_or(AssetKind::Comment)
}

/// Registers the `version_cmp(a, b)` SQL scalar function used by queries
/// that need to sort or filter on version order rather than text order.
fn register_version_cmp(conn: &Connection) -> Result<(), DbError> {
    conn.create_scalar_function(
        "version_cmp",
        2,
        rusqlite::functions::FunctionFlags::SQLITE_DETERMINISTIC
            | rusqlite::functions::FunctionFlags::SQLITE_UTF8,
        |ctx| {
            let a: String = ctx.get(0)?;
            let b: String = ctx.get(1)?;
            let ordering = Version::parse(&a).cmp(&Version::parse(&b));
            Ok(match ordering {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            })
        },
    )?;
    Ok(())
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mport_schema::PackageKind;

    fn sample(name: &str) -> PackageRecord {
        PackageRecord {
            name: PackageName::new(name),
            version: Version::parse("1.0.0"),
            origin: "category/port".into(),
            prefix: "/usr/local".into(),
            lang: String::new(),
            options: String::new(),
            comment: "a package".into(),
            desc: "a longer description".into(),
            categories: vec!["utils".into()],
            os_release: String::new(),
            cpe: String::new(),
            purl: String::new(),
            locked: false,
            deprecated: String::new(),
            expiration_date: 0,
            no_provide_shlib: false,
            flavor: String::new(),
            automatic: InstallReason::Explicit,
            install_date: 1_700_000_000,
            kind: PackageKind::Application,
            flatsize: 4096,
        }
    }

    #[test]
    fn install_then_list() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample("neovim")).unwrap();
            txn.insert_asset(
                &PackageName::new("neovim"),
                &AssetEntry::new(AssetKind::File, "bin/nvim"),
            )
            .unwrap();
            txn.commit().unwrap();
        }

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "neovim");
        assert_eq!(all[0].categories, vec!["utils".to_string()]);

        let assets = store.get_assets(&PackageName::new("neovim")).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].data, "bin/nvim");
    }

    #[test]
    fn delete_removes_all_rows() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample("ripgrep")).unwrap();
            txn.commit().unwrap();
        }

        let removed = store.delete_package(&PackageName::new("ripgrep")).unwrap();
        assert_eq!(removed.len(), 0);
        assert!(store.get(&PackageName::new("ripgrep")).unwrap().is_none());
    }

    #[test]
    fn delete_missing_package_errors() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        let err = store.delete_package(&PackageName::new("missing")).unwrap_err();
        assert!(matches!(err, DbError::PackageNotFound(_)));
    }

    #[test]
    fn lock_toggle() {
        let mut store = MetadataStore::open_in_memory().unwrap();
        {
            let mut txn = store.begin_install().unwrap();
            txn.insert_package_row(&sample("jq")).unwrap();
            txn.commit().unwrap();
        }
        store.set_locked(&PackageName::new("jq"), true).unwrap();
        assert_eq!(store.list_locked().unwrap(), vec![PackageName::new("jq")]);
    }

    #[test]
    fn version_cmp_orders_numerically() {
        let store = MetadataStore::open_in_memory().unwrap();
        let result: i64 = store
            .conn
            .query_row("SELECT version_cmp('1.9', '1.10')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(result, -1);
    }
}

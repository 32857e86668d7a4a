//! SQL schema for the live metadata store and the per-bundle stub database
//! (§4.B). Both databases share this schema; the stub is attached under the
//! name `stub` while a bundle is open for install.

/// DDL applied to every fresh metadata store or stub database.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS packages (
    pkg               TEXT PRIMARY KEY,
    version            TEXT NOT NULL,
    origin              TEXT NOT NULL DEFAULT '',
    prefix              TEXT NOT NULL DEFAULT '',
    lang                TEXT NOT NULL DEFAULT '',
    options             TEXT NOT NULL DEFAULT '',
    comment             TEXT NOT NULL DEFAULT '',
    desc                TEXT NOT NULL DEFAULT '',
    os_release          TEXT NOT NULL DEFAULT '',
    cpe                 TEXT NOT NULL DEFAULT '',
    purl                TEXT NOT NULL DEFAULT '',
    locked              INTEGER NOT NULL DEFAULT 0,
    deprecated          TEXT NOT NULL DEFAULT '',
    expiration_date     INTEGER NOT NULL DEFAULT 0,
    no_provide_shlib    INTEGER NOT NULL DEFAULT 0,
    flavor              TEXT NOT NULL DEFAULT '',
    automatic           INTEGER NOT NULL DEFAULT 0,
    install_date        INTEGER NOT NULL,
    type                INTEGER NOT NULL DEFAULT 0,
    flatsize            INTEGER NOT NULL DEFAULT 0,
    status              TEXT NOT NULL DEFAULT 'dirty'
);

CREATE TABLE IF NOT EXISTS assets (
    pkg      TEXT NOT NULL REFERENCES packages(pkg) ON DELETE CASCADE,
    seq      INTEGER NOT NULL,
    type     INTEGER NOT NULL,
    data     TEXT NOT NULL,
    checksum TEXT,
    owner    TEXT,
    grp      TEXT,
    mode     INTEGER,
    PRIMARY KEY (pkg, seq)
);

CREATE TABLE IF NOT EXISTS depends (
    pkg               TEXT NOT NULL,
    depend_pkgname    TEXT NOT NULL,
    depend_pkgversion TEXT NOT NULL DEFAULT '',
    depend_port       TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_depends_pkg ON depends(pkg);
CREATE INDEX IF NOT EXISTS idx_depends_dep ON depends(depend_pkgname);

CREATE TABLE IF NOT EXISTS categories (
    pkg      TEXT NOT NULL,
    category TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_categories_pkg ON categories(pkg);

CREATE TABLE IF NOT EXISTS conflicts (
    pkg               TEXT NOT NULL,
    conflict_pkg      TEXT NOT NULL,
    conflict_version  TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_conflicts_pkg ON conflicts(pkg);

CREATE TABLE IF NOT EXISTS log (
    pkg     TEXT NOT NULL,
    version TEXT NOT NULL,
    date    INTEGER NOT NULL,
    msg     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_log_pkg ON log(pkg);
";

// SQLite driver: one `docs` table keyed by (path, author) plus a
// `config` side table.
//
// The schema version lives in `config` under `schemaVersion`; an
// unknown version refuses to open rather than guessing at a migration.
// `begin` also pins the workspace address into `config` so a database
// file can't be silently reused for a different workspace.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use driftwood_common::document::Document;
use driftwood_common::query::{finish_query, HistoryMode, Query};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};

use crate::driver::StorageDriver;

const SCHEMA_VERSION: &str = "1";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS docs (
    format        TEXT NOT NULL,
    workspace     TEXT NOT NULL,
    path          TEXT NOT NULL,
    content_hash  TEXT NOT NULL,
    content       TEXT NOT NULL,
    author        TEXT NOT NULL,
    timestamp     INTEGER NOT NULL,
    delete_after  INTEGER NULL,
    signature     TEXT NOT NULL,
    PRIMARY KEY (path, author)
);

CREATE TABLE IF NOT EXISTS config (
    key      TEXT PRIMARY KEY,
    content  TEXT NOT NULL
);
"#;

pub struct SqliteDriver {
    conn: Option<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteDriver {
    /// Open (or create) a database file. Parent directories are created
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database parent directory `{}`", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at `{}`", path.display()))?;
        Self::configure(&conn)?;

        Ok(Self { conn: Some(conn), db_path: Some(path.to_path_buf()) })
    }

    /// Open a private in-memory database: the SQLite code paths without a
    /// file, for tests and throwaway workspaces.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::configure(&conn)?;
        Ok(Self { conn: Some(conn), db_path: None })
    }

    fn configure(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            ",
        )
        .context("failed to configure sqlite pragmas")
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or_else(|| anyhow!("sqlite driver is closed"))
    }

    fn read_config(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row("SELECT content FROM config WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to read config key `{key}`"))
    }

    fn write_config(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO config (key, content) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET content = excluded.content",
            params![key, value],
        )
        .with_context(|| format!("failed to write config key `{key}`"))?;
        Ok(())
    }
}

impl StorageDriver for SqliteDriver {
    fn begin(&mut self, workspace: &str, now: i64) -> Result<()> {
        let conn = self.conn()?;

        let config_exists: i64 = conn
            .query_row(
                "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = 'config'",
                [],
                |row| row.get(0),
            )
            .context("failed to inspect existing schema")?;

        if config_exists > 0 {
            match Self::read_config(conn, "schemaVersion")? {
                Some(version) if version != SCHEMA_VERSION => {
                    bail!("unsupported schema version `{version}` (expected `{SCHEMA_VERSION}`)");
                }
                _ => {}
            }
        }

        conn.execute_batch(SCHEMA_SQL).context("failed to ensure document store schema")?;
        Self::write_config(conn, "schemaVersion", SCHEMA_VERSION)?;

        match Self::read_config(conn, "workspace")? {
            Some(existing) if existing != workspace => {
                bail!(
                    "database belongs to workspace `{existing}`, refusing to open it \
                     as `{workspace}`"
                );
            }
            Some(_) => {}
            None => Self::write_config(conn, "workspace", workspace)?,
        }

        let swept = self.remove_expired_documents(now)?;
        tracing::info!(workspace, swept, "sqlite document store opened");
        Ok(())
    }

    fn authors(&mut self, now: i64) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT author FROM docs \
                 WHERE (delete_after IS NULL OR delete_after >= ?1) \
                 ORDER BY author ASC",
            )
            .context("failed to prepare authors query")?;

        let rows = stmt
            .query_map(params![now], |row| row.get(0))
            .context("failed to query authors")?;
        rows.collect::<std::result::Result<Vec<_>, _>>().context("failed to collect authors")
    }

    fn query_documents(&mut self, query: &Query, now: i64) -> Result<Vec<Document>> {
        let clean = query.clean_up();
        if clean.matches_nothing {
            return Ok(Vec::new());
        }
        let q = &clean.query;

        let mut sql = String::from(
            "SELECT format, workspace, path, content_hash, content, author, timestamp, \
             delete_after, signature \
             FROM docs WHERE (delete_after IS NULL OR delete_after >= ?)",
        );
        let mut bindings: Vec<Value> = vec![Value::Integer(now)];

        // Path selectors and the expiry bound are safe to push down in
        // every mode; the prefix becomes a range lower bound and the
        // exact prefix check stays in the shared predicate.
        if let Some(path) = &q.path {
            sql.push_str(" AND path = ?");
            bindings.push(Value::Text(path.clone()));
        }
        if let Some(prefix) = &q.path_prefix {
            sql.push_str(" AND path >= ?");
            bindings.push(Value::Text(prefix.clone()));
        }

        // Per-document selectors may only be pushed down when no fold
        // happens; under a latest fold they apply to heads, not history.
        if q.history == Some(HistoryMode::All) {
            if let Some(author) = &q.author {
                sql.push_str(" AND author = ?");
                bindings.push(Value::Text(author.clone()));
            }
            if let Some(timestamp) = q.timestamp {
                sql.push_str(" AND timestamp = ?");
                bindings.push(Value::Integer(timestamp));
            }
            if let Some(bound) = q.timestamp_gt {
                sql.push_str(" AND timestamp > ?");
                bindings.push(Value::Integer(bound));
            }
            if let Some(bound) = q.timestamp_lt {
                sql.push_str(" AND timestamp < ?");
                bindings.push(Value::Integer(bound));
            }
        }

        sql.push_str(" ORDER BY path ASC, timestamp DESC, signature DESC");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).context("failed to prepare document query")?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(bindings), row_to_document)
            .context("failed to query documents")?;
        let candidates = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to decode document rows")?;

        Ok(finish_query(candidates, &clean))
    }

    fn upsert_document(&mut self, doc: Document) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO docs \
             (format, workspace, path, content_hash, content, author, timestamp, \
              delete_after, signature) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                doc.format,
                doc.workspace,
                doc.path,
                doc.content_hash,
                doc.content,
                doc.author,
                doc.timestamp,
                doc.delete_after,
                doc.signature,
            ],
        )
        .context("failed to upsert document")?;
        Ok(())
    }

    fn remove_expired_documents(&mut self, now: i64) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM docs WHERE delete_after IS NOT NULL AND delete_after < ?1",
                params![now],
            )
            .context("failed to delete expired documents")?;
        if removed > 0 {
            tracing::debug!(removed, "reclaimed expired documents");
        }
        Ok(removed)
    }

    fn set_config(&mut self, key: &str, value: &str) -> Result<()> {
        Self::write_config(self.conn()?, key, value)
    }

    fn get_config(&mut self, key: &str) -> Result<Option<String>> {
        Self::read_config(self.conn()?, key)
    }

    fn delete_config(&mut self, key: &str) -> Result<bool> {
        let removed = self
            .conn()?
            .execute("DELETE FROM config WHERE key = ?1", params![key])
            .with_context(|| format!("failed to delete config key `{key}`"))?;
        Ok(removed > 0)
    }

    fn delete_all_config(&mut self) -> Result<()> {
        self.conn()?.execute("DELETE FROM config", []).context("failed to clear config")?;
        Ok(())
    }

    fn close(&mut self, delete: bool) -> Result<()> {
        // Dropping the connection releases the file handles.
        self.conn = None;

        if delete {
            if let Some(path) = &self.db_path {
                let path_str = path.display().to_string();
                fs::remove_file(path)
                    .with_context(|| format!("failed to delete database `{path_str}`"))?;
                let _ = fs::remove_file(format!("{path_str}-wal"));
                let _ = fs::remove_file(format!("{path_str}-shm"));
            }
        }
        tracing::info!(deleted = delete, "sqlite document store closed");
        Ok(())
    }
}

fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        format: row.get(0)?,
        workspace: row.get(1)?,
        path: row.get(2)?,
        content_hash: row.get(3)?,
        content: row.get(4)?,
        author: row.get(5)?,
        timestamp: row.get(6)?,
        delete_after: row.get(7)?,
        signature: row.get(8)?,
    })
}

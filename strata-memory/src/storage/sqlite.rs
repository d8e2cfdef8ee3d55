//! `SqliteBackend` - Durable Storage with FTS5
//!
//! `TigerStyle`: Commands translated to parameterized SQL, explicit
//! transactions, index failures degrade instead of failing.
//!
//! # Layout
//!
//! ```text
//! memories        entries of both durable tiers
//! memories_fts    FTS5 mirror of content (id/tier/type unindexed)
//! session_deltas  transcript watermarks
//! memory_meta     schema_version
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use tracing::{debug, info, warn};

use super::backend::{BackendKind, Capabilities, RankedId, StorageBackend};
use super::command::{Command, Order, Predicate, Row, SqlValue, Table};
use super::error::{StorageError, StorageResult};
use super::schema::{self, FTS_CREATE, FTS_REBUILD, SCHEMA_VERSION_KEY};
use crate::dst::FaultInjector;
use crate::memory::Tier;

// =============================================================================
// Options
// =============================================================================

/// How to open the database.
#[derive(Debug, Clone, Copy)]
pub struct SqliteOptions {
    /// Create and use the FTS5 index
    pub fts_enabled: bool,
    /// Switch file databases to WAL journaling
    pub wal_mode: bool,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            fts_enabled: true,
            wal_mode: true,
        }
    }
}

// =============================================================================
// SqliteBackend
// =============================================================================

/// SQLite-backed storage.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Connection,
    path: Option<PathBuf>,
    options: SqliteOptions,
    wal: bool,
    fts_ready: bool,
    fts_error: Option<String>,
    in_transaction: bool,
    faults: Option<Arc<FaultInjector>>,
}

impl SqliteBackend {
    /// Open a database file, or an in-memory database when `path` is `None`.
    ///
    /// # Errors
    /// Returns a connection error if the database cannot be opened.
    pub fn open(path: Option<&Path>, options: SqliteOptions) -> StorageResult<Self> {
        let conn = match path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(|e| StorageError::connection(e.to_string()))?;

        let mut backend = Self {
            conn,
            path: path.map(Path::to_path_buf),
            options,
            wal: false,
            fts_ready: false,
            fts_error: None,
            in_transaction: false,
            faults: None,
        };

        if options.wal_mode && backend.path.is_some() {
            let mode: String = backend
                .conn
                .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
                .map_err(|e| StorageError::connection(e.to_string()))?;
            backend.wal = mode.eq_ignore_ascii_case("wal");
            if !backend.wal {
                warn!(mode = %mode, "WAL journaling requested but not enabled");
            }
        }

        info!(
            path = ?backend.path,
            wal = backend.wal,
            "opened sqlite backend"
        );
        Ok(backend)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns a connection error if SQLite cannot allocate the database.
    pub fn in_memory(options: SqliteOptions) -> StorageResult<Self> {
        Self::open(None, options)
    }

    /// Attach a fault injector (labels as in `Command::label`, plus
    /// `begin`, `commit` and `fts`).
    #[must_use]
    pub fn with_fault_injector(mut self, faults: Arc<FaultInjector>) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Database file, `None` when in memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn maybe_inject_fault(&self, operation: &str) -> StorageResult<()> {
        match self.faults.as_ref().and_then(|f| f.should_inject(operation)) {
            Some(fault) => Err(StorageError::simulated_fault(format!(
                "{} during {operation}",
                fault.as_str()
            ))),
            None => Ok(()),
        }
    }

    fn stored_version(&self) -> StorageResult<u32> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'memory_meta'",
            [],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Ok(0);
        }

        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM memory_meta WHERE key = ?1",
                [SCHEMA_VERSION_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            None => Ok(0),
            Some(v) => v
                .parse()
                .map_err(|_| StorageError::schema(format!("unreadable schema_version {v:?}"))),
        }
    }

    fn migrate(&mut self) -> StorageResult<u32> {
        let current = self.stored_version()?;
        let latest = schema::latest_version();
        if current > latest {
            return Err(StorageError::schema(format!(
                "database schema v{current} is newer than supported v{latest}"
            )));
        }

        for migration in schema::pending(current) {
            let tx = self
                .conn
                .transaction()
                .map_err(|e| StorageError::schema(e.to_string()))?;
            for statement in migration.statements {
                tx.execute_batch(statement).map_err(|e| {
                    StorageError::schema(format!("migration v{}: {e}", migration.version))
                })?;
            }
            tx.execute(
                "INSERT INTO memory_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![SCHEMA_VERSION_KEY, migration.version.to_string()],
            )?;
            tx.commit()
                .map_err(|e| StorageError::schema(e.to_string()))?;
            info!(
                version = migration.version,
                description = migration.description,
                "applied schema migration"
            );
        }
        Ok(latest)
    }

    fn ensure_full_text(&mut self) {
        if let Err(e) = self.conn.execute_batch(FTS_CREATE) {
            warn!(error = %e, "full-text index unavailable");
            self.fts_ready = false;
            self.fts_error = Some(e.to_string());
            return;
        }
        self.fts_ready = true;
        self.fts_error = None;

        let counts = self
            .conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get::<_, i64>(0))
            .and_then(|memories| {
                self.conn
                    .query_row("SELECT COUNT(*) FROM memories_fts", [], |row| {
                        row.get::<_, i64>(0)
                    })
                    .map(|fts| (memories, fts))
            });

        match counts {
            Ok((memories, fts)) if memories != fts => {
                if let Err(e) = self.conn.execute_batch(&FTS_REBUILD.join(";\n")) {
                    warn!(error = %e, "full-text rebuild failed");
                    self.fts_ready = false;
                    self.fts_error = Some(format!("rebuild failed: {e}"));
                } else {
                    info!(rows = memories, stale = fts, "rebuilt full-text index");
                }
            }
            Ok(_) => {}
            Err(e) => {
                self.fts_ready = false;
                self.fts_error = Some(e.to_string());
            }
        }
    }

    fn select(&self, table: Table, predicate: &Predicate, order: Order) -> StorageResult<Vec<Row>> {
        let mut sql = format!("SELECT {} FROM {}", table.columns().join(", "), table.name());
        let mut params: Vec<&SqlValue> = Vec::new();

        if let Predicate::Eq(column, value) = predicate {
            sql.push_str(&format!(" WHERE {column} = ?1"));
            params.push(value);
        }
        match order {
            Order::Unordered => {}
            Order::Asc(column) => sql.push_str(&format!(" ORDER BY {column} ASC")),
            Order::Desc(column) => sql.push_str(&format!(" ORDER BY {column} DESC")),
        }

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let width = table.columns().len();
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(from_value_ref(row.get_ref(i)?));
                }
                Ok(Row::new(table, values))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl StorageBackend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactions: true,
            full_text: self.fts_ready,
            durable: self.path.is_some(),
            wal: self.wal,
        }
    }

    fn ensure_schema(&mut self) -> StorageResult<()> {
        self.maybe_inject_fault("schema")?;
        let version = self.migrate()?;

        if self.options.fts_enabled {
            self.ensure_full_text();
        } else {
            self.fts_ready = false;
            self.fts_error = None;
        }

        debug!(version, fts = self.fts_ready, "schema ready");
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> StorageResult<Vec<Row>> {
        command.validate()?;
        self.maybe_inject_fault(&command.label())?;

        match command {
            Command::Insert {
                table,
                columns,
                values,
            } => {
                let sql = insert_sql(*table, columns);
                self.conn
                    .prepare_cached(&sql)?
                    .execute(params_from_iter(values.iter()))?;
                Ok(Vec::new())
            }
            Command::Delete { table, key } => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    table.name(),
                    table.key_column()
                );
                self.conn.prepare_cached(&sql)?.execute([key])?;
                Ok(Vec::new())
            }
            Command::Select {
                table,
                predicate,
                order,
            } => self.select(*table, predicate, *order),
            Command::Truncate { table } => {
                self.conn
                    .execute(&format!("DELETE FROM {}", table.name()), [])?;
                Ok(Vec::new())
            }
        }
    }

    fn search_full_text(
        &mut self,
        query: &str,
        tiers: &[Tier],
        limit: usize,
    ) -> StorageResult<Vec<RankedId>> {
        if !self.fts_ready {
            let reason = self
                .fts_error
                .clone()
                .unwrap_or_else(|| "full-text index disabled".to_string());
            return Err(StorageError::index_unavailable(reason));
        }
        self.maybe_inject_fault("fts")?;
        if query.trim().is_empty() || tiers.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (0..tiers.len()).map(|i| format!("?{}", i + 2)).collect();
        let sql = format!(
            "SELECT id, rank FROM memories_fts
             WHERE memories_fts MATCH ?1 AND tier IN ({})
             ORDER BY rank LIMIT {limit}",
            placeholders.join(", ")
        );

        let params =
            std::iter::once(query).chain(tiers.iter().map(|tier| -> &str { tier.as_str() }));

        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| StorageError::index_unavailable(e.to_string()))?;
        let hits = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(RankedId {
                    id: row.get(0)?,
                    rank: row.get(1)?,
                })
            })
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| StorageError::index_unavailable(e.to_string()))?;
        Ok(hits)
    }

    fn begin(&mut self) -> StorageResult<()> {
        // Precondition
        assert!(!self.in_transaction, "transaction already open");

        self.maybe_inject_fault("begin")?;
        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| StorageError::transaction(e.to_string()))?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        // Precondition
        assert!(self.in_transaction, "no transaction to commit");

        self.maybe_inject_fault("commit")?;
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| StorageError::transaction(e.to_string()))?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        if !self.in_transaction {
            return Ok(());
        }
        // An injected failure is reported after the real ROLLBACK so the
        // connection is left usable
        let injected = self.maybe_inject_fault("rollback");
        self.in_transaction = false;
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| StorageError::transaction(e.to_string()))?;
        injected
    }

    fn checkpoint(&mut self) -> StorageResult<()> {
        if !self.wal {
            return Ok(());
        }
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .map_err(|e| StorageError::query(e.to_string()))
    }

    fn index_error(&self) -> Option<String> {
        self.fts_error.clone()
    }
}

// =============================================================================
// SQL Translation
// =============================================================================

fn insert_sql(table: Table, columns: &[&'static str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.name(),
        columns.join(", "),
        placeholders.join(", ")
    );

    // FTS5 tables have no unique key; callers delete before reinserting
    if table == Table::MemoriesFts {
        return sql;
    }

    let key = table.key_column();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != key)
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    if updates.is_empty() {
        sql.push_str(&format!(" ON CONFLICT({key}) DO NOTHING"));
    } else {
        sql.push_str(&format!(
            " ON CONFLICT({key}) DO UPDATE SET {}",
            updates.join(", ")
        ));
    }
    sql
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Self::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SqliteBackend {
        let mut backend = SqliteBackend::in_memory(SqliteOptions::default()).unwrap();
        backend.ensure_schema().unwrap();
        backend
    }

    fn memory(id: &str, tier: &str, content: &str, ts: i64) -> Command {
        Command::upsert(
            Table::Memories,
            vec![
                ("id", id.into()),
                ("tier", tier.into()),
                ("content", content.into()),
                ("type", "interaction".into()),
                ("timestamp", ts.into()),
            ],
        )
    }

    fn fts(id: &str, tier: &str, content: &str) -> Command {
        Command::upsert(
            Table::MemoriesFts,
            vec![
                ("id", id.into()),
                ("tier", tier.into()),
                ("type", "interaction".into()),
                ("content", content.into()),
            ],
        )
    }

    #[test]
    fn test_schema_idempotent_and_versioned() {
        let mut backend = backend();
        backend.ensure_schema().unwrap();

        let rows = backend
            .execute(&Command::Select {
                table: Table::MemoryMeta,
                predicate: Predicate::Eq("key", SCHEMA_VERSION_KEY.into()),
                order: Order::Unordered,
            })
            .unwrap();
        assert_eq!(
            rows[0].text("value").unwrap(),
            crate::constants::SCHEMA_VERSION.to_string()
        );
        assert!(backend.capabilities().full_text);
        assert!(backend.capabilities().transactions);
        assert!(!backend.capabilities().durable);
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let mut backend = backend();
        backend.execute(&memory("m1", "episodic", "first", 1)).unwrap();
        backend.execute(&memory("m1", "semantic", "second", 2)).unwrap();

        let rows = backend.execute(&Command::select_all(Table::Memories)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("tier").unwrap(), "semantic");
        assert_eq!(rows[0].text("content").unwrap(), "second");
        assert!(rows[0].get("metadata").is_null());
    }

    #[test]
    fn test_select_order() {
        let mut backend = backend();
        backend.execute(&memory("a", "episodic", "x", 1)).unwrap();
        backend.execute(&memory("b", "episodic", "y", 3)).unwrap();
        backend.execute(&memory("c", "episodic", "z", 2)).unwrap();

        let rows = backend
            .execute(&Command::Select {
                table: Table::Memories,
                predicate: Predicate::All,
                order: Order::Desc("timestamp"),
            })
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.text("id").unwrap()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_full_text_tier_filter() {
        let mut backend = backend();
        backend.execute(&fts("e1", "episodic", "deploy the service")).unwrap();
        backend.execute(&fts("s1", "semantic", "deploy checklist")).unwrap();
        backend.execute(&fts("e2", "episodic", "lunch plans")).unwrap();

        let hits = backend
            .search_full_text("\"deploy\"", &[Tier::Episodic], 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "e1");

        let hits = backend
            .search_full_text("\"deploy\"", &Tier::DURABLE, 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.rank <= 0.0));
    }

    #[test]
    fn test_fts_disabled() {
        let mut backend = SqliteBackend::in_memory(SqliteOptions {
            fts_enabled: false,
            wal_mode: false,
        })
        .unwrap();
        backend.ensure_schema().unwrap();

        assert!(!backend.capabilities().full_text);
        assert!(backend.index_error().is_none());
        assert!(matches!(
            backend.search_full_text("x", &[Tier::Episodic], 5),
            Err(StorageError::IndexUnavailable { .. })
        ));
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut backend = backend();
        backend.begin().unwrap();
        backend.execute(&memory("m1", "episodic", "x", 1)).unwrap();
        backend.rollback().unwrap();

        let rows = backend.execute(&Command::select_all(Table::Memories)).unwrap();
        assert!(rows.is_empty());

        backend.begin().unwrap();
        backend.execute(&memory("m2", "episodic", "y", 2)).unwrap();
        backend.commit().unwrap();
        let rows = backend.execute(&Command::select_all(Table::Memories)).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_fts_rebuilt_when_out_of_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rebuild.db");
        {
            let mut backend = SqliteBackend::open(Some(&path), SqliteOptions::default()).unwrap();
            backend.ensure_schema().unwrap();
            // Row written without its index mirror
            backend.execute(&memory("m1", "episodic", "orphaned words", 1)).unwrap();
        }

        let mut backend = SqliteBackend::open(Some(&path), SqliteOptions::default()).unwrap();
        backend.ensure_schema().unwrap();
        let hits = backend
            .search_full_text("\"orphaned\"", &[Tier::Episodic], 5)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(backend.capabilities().wal);
        assert!(backend.capabilities().durable);
    }

    #[test]
    fn test_insert_sql_shapes() {
        assert_eq!(
            insert_sql(Table::MemoryMeta, &["key", "value"]),
            "INSERT INTO memory_meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value"
        );
        assert!(!insert_sql(Table::MemoriesFts, &["id", "content"]).contains("CONFLICT"));
    }
}

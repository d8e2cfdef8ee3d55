//! `FallbackBackend` - In-Process Tables
//!
//! `TigerStyle`: Same command surface as SQLite, deterministic, fault
//! injection for DST.
//!
//! Used when the SQLite driver is missing or the database cannot be opened.
//! Provides no transactions, no full-text index and no durability: every
//! table lives in a `BTreeMap` keyed by the row's key column.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::backend::{BackendKind, Capabilities, RankedId, StorageBackend};
use super::command::{Command, Order, Predicate, Row, SqlValue, Table};
use super::error::{StorageError, StorageResult};
use crate::dst::{FaultInjector, FaultType};
use crate::memory::Tier;

/// Reason reported by `index_error`.
const NO_INDEX_REASON: &str = "full-text index is not available on the fallback backend";

/// Payload substituted into text columns by an injected corruption fault.
const CORRUPTED_PAYLOAD: &str = "\u{fffd}corrupted";

// =============================================================================
// FallbackBackend
// =============================================================================

/// In-memory backend.
///
/// `TigerStyle`:
/// - Deterministic iteration (ordered maps)
/// - Fault injection via shared `FaultInjector`
/// - Upsert semantics identical to SQLite
#[derive(Debug, Default)]
pub struct FallbackBackend {
    tables: BTreeMap<Table, BTreeMap<String, Row>>,
    faults: Option<Arc<FaultInjector>>,
}

impl FallbackBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fault injector.
    ///
    /// Operations are labelled `insert:memories`, `select:session_deltas`,
    /// `schema`, etc. so faults can be filtered per command.
    #[must_use]
    pub fn with_fault_injector(mut self, faults: Arc<FaultInjector>) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Row count of a table.
    #[must_use]
    pub fn row_count(&self, table: Table) -> usize {
        self.tables.get(&table).map_or(0, BTreeMap::len)
    }

    fn maybe_inject_fault(&self, operation: &str) -> Option<FaultType> {
        self.faults
            .as_ref()
            .and_then(|faults| faults.should_inject(operation))
    }

    fn fault_error(fault: FaultType, operation: &str) -> StorageError {
        StorageError::simulated_fault(format!("{} during {operation}", fault.as_str()))
    }

    fn table_mut(&mut self, table: Table) -> &mut BTreeMap<String, Row> {
        self.tables.entry(table).or_default()
    }

    fn insert(
        &mut self,
        table: Table,
        columns: &[&'static str],
        values: &[SqlValue],
    ) -> StorageResult<()> {
        let key_index = columns
            .iter()
            .position(|c| *c == table.key_column())
            .ok_or_else(|| StorageError::invalid_command("insert without key column"))?;
        let key = key_string(&values[key_index]);

        let rows = self.table_mut(table);
        let row = rows.entry(key).or_insert_with(|| Row::empty(table));
        for (column, value) in columns.iter().zip(values) {
            row.set(column, value.clone())?;
        }
        Ok(())
    }

    fn select(&self, table: Table, predicate: &Predicate, order: Order) -> Vec<Row> {
        let Some(rows) = self.tables.get(&table) else {
            return Vec::new();
        };

        let mut selected: Vec<Row> = rows
            .values()
            .filter(|row| match predicate {
                Predicate::All => true,
                Predicate::Eq(column, value) => row.get(column) == value,
            })
            .cloned()
            .collect();

        match order {
            Order::Unordered => {}
            Order::Asc(column) => {
                selected.sort_by(|a, b| compare_values(a.get(column), b.get(column)));
            }
            Order::Desc(column) => {
                selected.sort_by(|a, b| compare_values(b.get(column), a.get(column)));
            }
        }
        selected
    }
}

impl StorageBackend for FallbackBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn ensure_schema(&mut self) -> StorageResult<()> {
        if let Some(fault) = self.maybe_inject_fault("schema") {
            return Err(Self::fault_error(fault, "schema"));
        }
        for table in Table::ALL {
            self.table_mut(table);
        }
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> StorageResult<Vec<Row>> {
        command.validate()?;

        let label = command.label();
        let fault = self.maybe_inject_fault(&label);
        if let Some(fault) = fault {
            // Corruption garbles what a read returns instead of failing it
            if !(fault == FaultType::StorageCorruption && matches!(command, Command::Select { .. }))
            {
                debug!(operation = %label, fault = fault.as_str(), "injected fault");
                return Err(Self::fault_error(fault, &label));
            }
        }

        match command {
            Command::Insert {
                table,
                columns,
                values,
            } => {
                self.insert(*table, columns, values)?;
                Ok(Vec::new())
            }
            Command::Delete { table, key } => {
                self.table_mut(*table).remove(&key_string(key));
                Ok(Vec::new())
            }
            Command::Select {
                table,
                predicate,
                order,
            } => {
                let mut rows = self.select(*table, predicate, *order);
                if fault == Some(FaultType::StorageCorruption) {
                    for row in &mut rows {
                        corrupt(row);
                    }
                }
                Ok(rows)
            }
            Command::Truncate { table } => {
                self.table_mut(*table).clear();
                Ok(Vec::new())
            }
        }
    }

    fn search_full_text(
        &mut self,
        _query: &str,
        _tiers: &[Tier],
        _limit: usize,
    ) -> StorageResult<Vec<RankedId>> {
        Err(StorageError::index_unavailable(NO_INDEX_REASON))
    }

    fn begin(&mut self) -> StorageResult<()> {
        Err(StorageError::Unsupported {
            backend: "fallback",
            operation: "begin",
        })
    }

    fn commit(&mut self) -> StorageResult<()> {
        Err(StorageError::Unsupported {
            backend: "fallback",
            operation: "commit",
        })
    }

    fn rollback(&mut self) -> StorageResult<()> {
        Err(StorageError::Unsupported {
            backend: "fallback",
            operation: "rollback",
        })
    }

    fn checkpoint(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn index_error(&self) -> Option<String> {
        Some(NO_INDEX_REASON.to_string())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn key_string(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => String::new(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s.clone(),
    }
}

/// SQLite-like ordering: NULL < numbers < text.
fn compare_values(a: &SqlValue, b: &SqlValue) -> Ordering {
    fn class(v: &SqlValue) -> u8 {
        match v {
            SqlValue::Null => 0,
            SqlValue::Integer(_) | SqlValue::Real(_) => 1,
            SqlValue::Text(_) => 2,
        }
    }

    match (a, b) {
        (SqlValue::Integer(x), SqlValue::Integer(y)) => x.cmp(y),
        (SqlValue::Integer(x), SqlValue::Real(y)) => (*x as f64).total_cmp(y),
        (SqlValue::Real(x), SqlValue::Integer(y)) => x.total_cmp(&(*y as f64)),
        (SqlValue::Real(x), SqlValue::Real(y)) => x.total_cmp(y),
        (SqlValue::Text(x), SqlValue::Text(y)) => x.cmp(y),
        _ => class(a).cmp(&class(b)),
    }
}

/// Garble the JSON-carrying columns of a memories row.
fn corrupt(row: &mut Row) {
    if row.table() != Table::Memories {
        return;
    }
    for column in ["metadata", "embedding"] {
        if !row.get(column).is_null() {
            // Column names come from the table definition, so set cannot fail
            let _ = row.set(column, SqlValue::from(CORRUPTED_PAYLOAD));
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dst::{DeterministicRng, FaultConfig, FaultInjectorBuilder};

    fn meta(key: &str, value: &str) -> Command {
        Command::upsert(
            Table::MemoryMeta,
            vec![("key", key.into()), ("value", value.into())],
        )
    }

    #[test]
    fn test_upsert_and_select() {
        let mut backend = FallbackBackend::new();
        backend.ensure_schema().unwrap();

        backend.execute(&meta("a", "1")).unwrap();
        backend.execute(&meta("a", "2")).unwrap();
        backend.execute(&meta("b", "3")).unwrap();

        let rows = backend
            .execute(&Command::select_all(Table::MemoryMeta))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text("value").unwrap(), "2");
    }

    #[test]
    fn test_partial_upsert_keeps_other_columns() {
        let mut backend = FallbackBackend::new();
        backend
            .execute(&Command::upsert(
                Table::SessionDeltas,
                vec![
                    ("session_id", "s1".into()),
                    ("last_indexed_turn", 3_i64.into()),
                    ("last_indexed_at", 10_i64.into()),
                    ("pending_turns", 0_i64.into()),
                ],
            ))
            .unwrap();
        backend
            .execute(&Command::upsert(
                Table::SessionDeltas,
                vec![("session_id", "s1".into()), ("pending_turns", 2_i64.into())],
            ))
            .unwrap();

        let rows = backend
            .execute(&Command::select_all(Table::SessionDeltas))
            .unwrap();
        assert_eq!(rows[0].integer("last_indexed_turn").unwrap(), 3);
        assert_eq!(rows[0].integer("pending_turns").unwrap(), 2);
    }

    #[test]
    fn test_select_filter_and_order() {
        let mut backend = FallbackBackend::new();
        for (id, tier, ts) in [("m1", "episodic", 5), ("m2", "semantic", 9), ("m3", "episodic", 7)] {
            backend
                .execute(&Command::upsert(
                    Table::Memories,
                    vec![
                        ("id", id.into()),
                        ("tier", tier.into()),
                        ("timestamp", SqlValue::Integer(ts)),
                    ],
                ))
                .unwrap();
        }

        let rows = backend
            .execute(&Command::Select {
                table: Table::Memories,
                predicate: Predicate::Eq("tier", "episodic".into()),
                order: Order::Desc("timestamp"),
            })
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.text("id").unwrap()).collect();
        assert_eq!(ids, vec!["m3", "m1"]);
    }

    #[test]
    fn test_delete_and_truncate() {
        let mut backend = FallbackBackend::new();
        backend.execute(&meta("a", "1")).unwrap();
        backend.execute(&meta("b", "2")).unwrap();

        backend
            .execute(&Command::delete(Table::MemoryMeta, "a"))
            .unwrap();
        assert_eq!(backend.row_count(Table::MemoryMeta), 1);

        backend
            .execute(&Command::Truncate {
                table: Table::MemoryMeta,
            })
            .unwrap();
        assert_eq!(backend.row_count(Table::MemoryMeta), 0);
    }

    #[test]
    fn test_no_transactions_or_index() {
        let mut backend = FallbackBackend::new();
        assert!(!backend.capabilities().transactions);
        assert!(backend.begin().is_err());
        assert!(backend.search_full_text("x", &[Tier::Episodic], 5).is_err());
        assert!(backend.index_error().is_some());
    }

    #[test]
    fn test_invalid_command_rejected() {
        let mut backend = FallbackBackend::new();
        let bad = Command::upsert(Table::MemoryMeta, vec![("value", "v".into())]);
        assert!(matches!(
            backend.execute(&bad),
            Err(StorageError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn test_fault_injection_filtered() {
        let faults = Arc::new(
            FaultInjectorBuilder::new(DeterministicRng::new(42))
                .with_fault(
                    FaultConfig::new(FaultType::StorageWriteFail, 1.0).with_filter("insert:"),
                )
                .build(),
        );
        let mut backend = FallbackBackend::new().with_fault_injector(Arc::clone(&faults));

        assert!(matches!(
            backend.execute(&meta("a", "1")),
            Err(StorageError::SimulatedFault { .. })
        ));
        assert!(backend
            .execute(&Command::select_all(Table::MemoryMeta))
            .is_ok());
        assert_eq!(faults.total_injections(), 1);
    }

    #[test]
    fn test_corruption_garbles_reads() {
        let faults = Arc::new(
            FaultInjectorBuilder::new(DeterministicRng::new(1))
                .with_fault(
                    FaultConfig::new(FaultType::StorageCorruption, 1.0)
                        .with_filter("select:memories"),
                )
                .build(),
        );
        let mut backend = FallbackBackend::new().with_fault_injector(faults);
        backend
            .execute(&Command::upsert(
                Table::Memories,
                vec![("id", "m1".into()), ("metadata", "{}".into())],
            ))
            .unwrap();

        let rows = backend.execute(&Command::select_all(Table::Memories)).unwrap();
        assert_eq!(rows[0].opt_text("metadata"), Some(CORRUPTED_PAYLOAD));
        assert!(rows[0].get("embedding").is_null());
    }
}

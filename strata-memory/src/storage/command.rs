//! Commands - Typed Statements for Every Backend
//!
//! TigerStyle: Call sites build explicit commands; backends translate them.
//! No backend ever parses statement text back out.
//!
//! # Design
//!
//! ```text
//! Command::Insert   → INSERT .. ON CONFLICT(key) DO UPDATE    (upsert)
//! Command::Delete   → DELETE FROM table WHERE key = ?
//! Command::Select   → SELECT <all columns> WHERE .. ORDER BY ..
//! Command::Truncate → DELETE FROM table
//! ```

use std::fmt;

use super::error::{StorageError, StorageResult};

// =============================================================================
// Tables
// =============================================================================

/// Logical tables known to every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    /// Episodic and semantic entries
    Memories,
    /// Full-text index mirror of `memories.content`
    MemoriesFts,
    /// Per-session transcript watermarks
    SessionDeltas,
    /// Key/value engine metadata (`schema_version`)
    MemoryMeta,
}

impl Table {
    /// Every table, in creation order.
    pub const ALL: [Table; 4] = [
        Table::Memories,
        Table::MemoriesFts,
        Table::SessionDeltas,
        Table::MemoryMeta,
    ];

    /// SQL table name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memories => "memories",
            Self::MemoriesFts => "memories_fts",
            Self::SessionDeltas => "session_deltas",
            Self::MemoryMeta => "memory_meta",
        }
    }

    /// Column that identifies a row.
    #[must_use]
    pub fn key_column(&self) -> &'static str {
        self.columns()[0]
    }

    /// Legal columns, key first.
    #[must_use]
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Memories => &[
                "id",
                "tier",
                "content",
                "type",
                "timestamp",
                "metadata",
                "embedding",
                "hash",
                "created_at",
                "updated_at",
            ],
            Self::MemoriesFts => &["id", "tier", "type", "content"],
            Self::SessionDeltas => &[
                "session_id",
                "last_indexed_turn",
                "last_indexed_at",
                "pending_turns",
            ],
            Self::MemoryMeta => &["key", "value"],
        }
    }

    /// Position of `column`, if legal.
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns().iter().position(|c| *c == column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Values and Rows
// =============================================================================

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// 64-bit integer
    Integer(i64),
    /// 64-bit float
    Real(f64),
    /// UTF-8 text
    Text(String),
}

impl SqlValue {
    /// Text payload, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether this is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        Self::Real(f)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// One row of a table, values in `Table::columns` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    table: Table,
    values: Vec<SqlValue>,
}

impl Row {
    /// Build a row from a full value list.
    ///
    /// # Panics
    /// Panics if `values` does not have one value per table column.
    #[must_use]
    pub fn new(table: Table, values: Vec<SqlValue>) -> Self {
        // Precondition
        assert_eq!(
            values.len(),
            table.columns().len(),
            "row for {table} needs {} values",
            table.columns().len()
        );
        Self { table, values }
    }

    /// An all-NULL row.
    #[must_use]
    pub fn empty(table: Table) -> Self {
        Self::new(table, vec![SqlValue::Null; table.columns().len()])
    }

    /// Table this row belongs to.
    #[must_use]
    pub fn table(&self) -> Table {
        self.table
    }

    /// Value of a column (NULL for unknown columns).
    #[must_use]
    pub fn get(&self, column: &str) -> &SqlValue {
        self.table
            .column_index(column)
            .map_or(&SqlValue::Null, |i| &self.values[i])
    }

    /// Overwrite a column.
    ///
    /// # Errors
    /// Returns error if the column does not belong to the table.
    pub fn set(&mut self, column: &str, value: SqlValue) -> StorageResult<()> {
        let index = self.table.column_index(column).ok_or_else(|| {
            StorageError::invalid_command(format!("{} has no column {column}", self.table))
        })?;
        self.values[index] = value;
        Ok(())
    }

    /// The key value.
    #[must_use]
    pub fn key(&self) -> &SqlValue {
        &self.values[0]
    }

    /// Required text column.
    ///
    /// # Errors
    /// Returns a malformed-row error if the column is not text.
    pub fn text(&self, column: &str) -> StorageResult<&str> {
        self.get(column).as_text().ok_or_else(|| {
            StorageError::malformed(format!("{}.{column} is not text", self.table))
        })
    }

    /// Optional text column (NULL → None).
    #[must_use]
    pub fn opt_text(&self, column: &str) -> Option<&str> {
        self.get(column).as_text()
    }

    /// Required integer column.
    ///
    /// # Errors
    /// Returns a malformed-row error if the column is not an integer.
    pub fn integer(&self, column: &str) -> StorageResult<i64> {
        self.get(column).as_integer().ok_or_else(|| {
            StorageError::malformed(format!("{}.{column} is not an integer", self.table))
        })
    }

    /// All values in column order.
    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Row filter for `Select`.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every row
    All,
    /// `column = value`
    Eq(&'static str, SqlValue),
}

/// Row order for `Select`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Backend order
    Unordered,
    /// Ascending by column
    Asc(&'static str),
    /// Descending by column
    Desc(&'static str),
}

/// A statement every backend can execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Insert, or update the listed columns when the key already exists
    Insert {
        /// Target table
        table: Table,
        /// Columns to write (must include the key)
        columns: Vec<&'static str>,
        /// One value per column
        values: Vec<SqlValue>,
    },
    /// Delete the row with this key
    Delete {
        /// Target table
        table: Table,
        /// Key value
        key: SqlValue,
    },
    /// Read rows
    Select {
        /// Source table
        table: Table,
        /// Filter
        predicate: Predicate,
        /// Ordering
        order: Order,
    },
    /// Delete every row
    Truncate {
        /// Target table
        table: Table,
    },
}

impl Command {
    /// Build an `Insert` from column/value pairs.
    #[must_use]
    pub fn upsert(table: Table, pairs: Vec<(&'static str, SqlValue)>) -> Self {
        let (columns, values) = pairs.into_iter().unzip();
        Self::Insert {
            table,
            columns,
            values,
        }
    }

    /// Build a `Delete` by key.
    #[must_use]
    pub fn delete(table: Table, key: impl Into<SqlValue>) -> Self {
        Self::Delete {
            table,
            key: key.into(),
        }
    }

    /// Select every row of a table.
    #[must_use]
    pub fn select_all(table: Table) -> Self {
        Self::Select {
            table,
            predicate: Predicate::All,
            order: Order::Unordered,
        }
    }

    /// Target table.
    #[must_use]
    pub fn table(&self) -> Table {
        match self {
            Self::Insert { table, .. }
            | Self::Delete { table, .. }
            | Self::Select { table, .. }
            | Self::Truncate { table } => *table,
        }
    }

    /// Short operation label, e.g. `insert:memories` (used by fault filters).
    #[must_use]
    pub fn label(&self) -> String {
        let verb = match self {
            Self::Insert { .. } => "insert",
            Self::Delete { .. } => "delete",
            Self::Select { .. } => "select",
            Self::Truncate { .. } => "truncate",
        };
        format!("{verb}:{}", self.table())
    }

    /// Check columns against the table.
    ///
    /// # Errors
    /// Returns an invalid-command error for unknown columns, a missing key
    /// column on insert, or mismatched column/value counts.
    pub fn validate(&self) -> StorageResult<()> {
        let table = self.table();
        let check_column = |column: &str| {
            if table.column_index(column).is_some() {
                Ok(())
            } else {
                Err(StorageError::invalid_command(format!(
                    "{table} has no column {column}"
                )))
            }
        };

        match self {
            Self::Insert {
                columns, values, ..
            } => {
                if columns.len() != values.len() {
                    return Err(StorageError::invalid_command(format!(
                        "{} columns but {} values for {table}",
                        columns.len(),
                        values.len()
                    )));
                }
                if !columns.contains(&table.key_column()) {
                    return Err(StorageError::invalid_command(format!(
                        "insert into {table} without key column {}",
                        table.key_column()
                    )));
                }
                for column in columns {
                    check_column(column)?;
                }
                Ok(())
            }
            Self::Select {
                predicate, order, ..
            } => {
                if let Predicate::Eq(column, _) = predicate {
                    check_column(column)?;
                }
                if let Order::Asc(column) | Order::Desc(column) = order {
                    check_column(column)?;
                }
                Ok(())
            }
            Self::Delete { .. } | Self::Truncate { .. } => Ok(()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_layout() {
        assert_eq!(Table::Memories.key_column(), "id");
        assert_eq!(Table::SessionDeltas.key_column(), "session_id");
        assert_eq!(Table::MemoryMeta.columns(), &["key", "value"]);
        assert_eq!(Table::Memories.column_index("hash"), Some(7));
        assert_eq!(Table::MemoriesFts.column_index("hash"), None);
    }

    #[test]
    fn test_row_access() {
        let mut row = Row::empty(Table::MemoryMeta);
        row.set("key", "schema_version".into()).unwrap();
        row.set("value", "2".into()).unwrap();

        assert_eq!(row.text("key").unwrap(), "schema_version");
        assert_eq!(row.key(), &SqlValue::from("schema_version"));
        assert!(row.integer("value").is_err());
        assert!(row.set("nope", SqlValue::Null).is_err());
        assert!(row.get("nope").is_null());
    }

    #[test]
    fn test_validate_insert() {
        let ok = Command::upsert(
            Table::MemoryMeta,
            vec![("key", "k".into()), ("value", "v".into())],
        );
        assert!(ok.validate().is_ok());

        let no_key = Command::upsert(Table::MemoryMeta, vec![("value", "v".into())]);
        assert!(no_key.validate().is_err());

        let bad_column = Command::upsert(
            Table::MemoryMeta,
            vec![("key", "k".into()), ("extra", "v".into())],
        );
        assert!(bad_column.validate().is_err());

        let mismatched = Command::Insert {
            table: Table::MemoryMeta,
            columns: vec!["key", "value"],
            values: vec!["k".into()],
        };
        assert!(mismatched.validate().is_err());
    }

    #[test]
    fn test_validate_select() {
        let ok = Command::Select {
            table: Table::Memories,
            predicate: Predicate::Eq("tier", "episodic".into()),
            order: Order::Desc("timestamp"),
        };
        assert!(ok.validate().is_ok());

        let bad = Command::Select {
            table: Table::Memories,
            predicate: Predicate::All,
            order: Order::Asc("nope"),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            Command::delete(Table::Memories, "mem_1").label(),
            "delete:memories"
        );
        assert_eq!(
            Command::select_all(Table::SessionDeltas).label(),
            "select:session_deltas"
        );
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Integer(3));
    }
}

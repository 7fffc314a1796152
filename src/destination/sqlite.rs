use std::path::Path;

use itertools::Itertools;
use log::debug;
use rusqlite::{
    Connection, OptionalExtension, params_from_iter,
    types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef},
};

use crate::{
    data::{DestinationRow, Value},
    destination::{DestinationError, DestinationWriter, SchemaOracle},
};

/// A SQLite database as seeding destination.
pub struct SqliteDestination {
    conn: Connection,
}

impl SqliteDestination {
    pub fn open(path: &Path) -> Result<Self, DestinationError> {
        let conn = Connection::open(path)?;
        debug!("Opened SQLite database {path:?}");
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, DestinationError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SchemaOracle for SqliteDestination {
    fn table_exists(&self, table: &str) -> Result<bool, DestinationError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn columns_of(&self, table: &str) -> Result<Vec<String>, DestinationError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

impl DestinationWriter for SqliteDestination {
    fn truncate(&mut self, table: &str) -> Result<(), DestinationError> {
        let removed = self
            .conn
            .execute(&format!("DELETE FROM {}", quote_identifier(table)), [])?;
        debug!("Truncated {table} ({removed} row(s) removed)");
        Ok(())
    }

    fn supports_integrity_toggle(&self) -> bool {
        true
    }

    fn set_integrity_checks(&mut self, enabled: bool) -> Result<(), DestinationError> {
        let state = if enabled { "ON" } else { "OFF" };
        self.conn
            .execute_batch(&format!("PRAGMA foreign_keys = {state}"))?;
        Ok(())
    }

    fn insert_batch(
        &mut self,
        table: &str,
        rows: &[DestinationRow],
    ) -> Result<(), DestinationError> {
        if rows.is_empty() {
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for row in rows {
            let columns = row.columns().collect::<Vec<_>>();
            let mut stmt = tx.prepare_cached(&insert_statement(table, &columns))?;
            stmt.execute(params_from_iter(row.iter().map(|(_, value)| value)))?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Bytes(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
        })
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn insert_statement(table: &str, columns: &[&str]) -> String {
    let names = columns.iter().map(|c| quote_identifier(c)).join(", ");
    let placeholders = (1..=columns.len()).map(|idx| format!("?{idx}")).join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_identifier(table)
    )
}

//! A destination held entirely in memory.
//!
//! Tables are registered up front with their columns. Inserts are checked against
//! those columns like a real database would, every mutation is appended to an
//! event log, and truncates or specific inserts can be scripted to fail.

use std::collections::BTreeMap;

use crate::{
    data::DestinationRow,
    destination::{DestinationError, DestinationWriter, SchemaOracle},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEvent {
    Truncate(String),
    IntegrityChecks(bool),
    Insert { table: String, rows: usize },
}

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: Vec<DestinationRow>,
}

#[derive(Debug)]
pub struct MemoryDestination {
    tables: BTreeMap<String, MemoryTable>,
    events: Vec<WriteEvent>,
    integrity_toggle: bool,
    integrity_enabled: bool,
    fail_truncate: bool,
    fail_insert_call: Option<usize>,
    insert_calls: usize,
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self {
            tables: BTreeMap::new(),
            events: Vec::new(),
            integrity_toggle: false,
            integrity_enabled: true,
            fail_truncate: false,
            fail_insert_call: None,
            insert_calls: 0,
        }
    }
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table<S: AsRef<str>>(mut self, table: &str, columns: &[S]) -> Self {
        self.add_table(table, columns);
        self
    }

    pub fn add_table<S: AsRef<str>>(&mut self, table: &str, columns: &[S]) {
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    pub fn with_integrity_toggle(mut self) -> Self {
        self.integrity_toggle = true;
        self
    }

    pub fn fail_truncate(mut self) -> Self {
        self.fail_truncate = true;
        self
    }

    /// Makes the `call`-th insert (1-based) fail without writing anything.
    pub fn fail_on_insert(mut self, call: usize) -> Self {
        self.fail_insert_call = Some(call);
        self
    }

    pub fn rows(&self, table: &str) -> &[DestinationRow] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default()
    }

    pub fn events(&self) -> &[WriteEvent] {
        &self.events
    }

    /// Sizes of the inserts that were attempted, in order.
    pub fn insert_sizes(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter_map(|event| match event {
                WriteEvent::Insert { rows, .. } => Some(*rows),
                _ => None,
            })
            .collect()
    }

    pub fn integrity_checks_enabled(&self) -> bool {
        self.integrity_enabled
    }

    fn table_mut(&mut self, table: &str) -> Result<&mut MemoryTable, DestinationError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| DestinationError::Rejected(format!("no such table: {table}")))
    }
}

impl SchemaOracle for MemoryDestination {
    fn table_exists(&self, table: &str) -> Result<bool, DestinationError> {
        Ok(self.tables.contains_key(table))
    }

    fn columns_of(&self, table: &str) -> Result<Vec<String>, DestinationError> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }
}

impl DestinationWriter for MemoryDestination {
    fn truncate(&mut self, table: &str) -> Result<(), DestinationError> {
        self.events.push(WriteEvent::Truncate(table.to_string()));
        if self.fail_truncate {
            return Err(DestinationError::Rejected(format!(
                "truncate of {table} refused"
            )));
        }
        self.table_mut(table)?.rows.clear();
        Ok(())
    }

    fn supports_integrity_toggle(&self) -> bool {
        self.integrity_toggle
    }

    fn set_integrity_checks(&mut self, enabled: bool) -> Result<(), DestinationError> {
        if self.integrity_toggle {
            self.events.push(WriteEvent::IntegrityChecks(enabled));
            self.integrity_enabled = enabled;
        }
        Ok(())
    }

    fn insert_batch(
        &mut self,
        table: &str,
        rows: &[DestinationRow],
    ) -> Result<(), DestinationError> {
        self.insert_calls += 1;
        self.events.push(WriteEvent::Insert {
            table: table.to_string(),
            rows: rows.len(),
        });
        if self.fail_insert_call == Some(self.insert_calls) {
            return Err(DestinationError::Rejected(format!(
                "insert #{} into {table} refused",
                self.insert_calls
            )));
        }
        let target = self.table_mut(table)?;
        for row in rows {
            if let Some(unknown) = row
                .columns()
                .find(|column| !target.columns.iter().any(|c| c == column))
            {
                return Err(DestinationError::Rejected(format!(
                    "table {table} has no column named {unknown}"
                )));
            }
        }
        target.rows.extend_from_slice(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn row(id: &str) -> DestinationRow {
        [("id", Value::from(id))].into_iter().collect()
    }

    #[test]
    fn inserts_are_atomic_per_batch() {
        let mut dest = MemoryDestination::new().with_table("users", &["id"]);
        dest.insert_batch("users", &[row("1"), row("2")]).unwrap();
        let bad: DestinationRow = [("nickname", Value::from("x"))].into_iter().collect();
        assert!(dest.insert_batch("users", &[row("3"), bad]).is_err());
        assert_eq!(dest.rows("users").len(), 2);
        assert_eq!(dest.insert_sizes(), vec![2, 2]);
    }

    #[test]
    fn scripted_insert_failure_hits_only_that_call() {
        let mut dest = MemoryDestination::new()
            .with_table("users", &["id"])
            .fail_on_insert(2);
        assert!(dest.insert_batch("users", &[row("1")]).is_ok());
        assert!(dest.insert_batch("users", &[row("2")]).is_err());
        assert!(dest.insert_batch("users", &[row("3")]).is_ok());
        assert_eq!(dest.rows("users").len(), 2);
    }

    #[test]
    fn schema_lookups_report_registered_tables() {
        let dest = MemoryDestination::new().with_table("users", &["id", "name"]);
        assert!(dest.table_exists("users").unwrap());
        assert!(!dest.table_exists("roles").unwrap());
        assert_eq!(dest.columns_of("users").unwrap(), vec!["id", "name"]);
        assert!(dest.columns_of("roles").unwrap().is_empty());
    }
}

//! Destination tables: schema lookups and batched writes.
//!
//! The loader talks to a destination through two traits. [`SchemaOracle`]
//! answers which tables and columns exist and never mutates anything;
//! [`DestinationWriter`] truncates, toggles referential-integrity checks and
//! inserts batches, each batch as one atomic operation.

pub mod memory;
pub mod sqlite;

use log::{debug, warn};
use thiserror::Error;

use crate::data::DestinationRow;

pub use memory::MemoryDestination;
pub use sqlite::SqliteDestination;

#[derive(Debug, Error)]
pub enum DestinationError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("{0}")]
    Rejected(String),
}

pub trait SchemaOracle {
    fn table_exists(&self, table: &str) -> Result<bool, DestinationError>;

    /// Column names of `table` in declaration order.
    fn columns_of(&self, table: &str) -> Result<Vec<String>, DestinationError>;
}

pub trait DestinationWriter {
    fn truncate(&mut self, table: &str) -> Result<(), DestinationError>;

    /// Whether [`set_integrity_checks`](Self::set_integrity_checks) does anything.
    fn supports_integrity_toggle(&self) -> bool {
        false
    }

    fn set_integrity_checks(&mut self, _enabled: bool) -> Result<(), DestinationError> {
        Ok(())
    }

    /// Writes all of `rows` or none of them.
    fn insert_batch(&mut self, table: &str, rows: &[DestinationRow])
    -> Result<(), DestinationError>;
}

/// Anything the loader can both inspect and write to.
pub trait Destination: SchemaOracle + DestinationWriter {}

impl<T: SchemaOracle + DestinationWriter + ?Sized> Destination for T {}

/// Referential-integrity checks switched off for as long as the guard lives.
///
/// Checks are switched back on by [`restore`](Self::restore) or, failing that,
/// when the guard is dropped.
pub struct IntegritySuspension<'a, W: DestinationWriter + ?Sized> {
    writer: &'a mut W,
    restored: bool,
}

impl<'a, W: DestinationWriter + ?Sized> IntegritySuspension<'a, W> {
    pub fn begin(writer: &'a mut W) -> Result<Self, DestinationError> {
        writer.set_integrity_checks(false)?;
        debug!("Integrity checks suspended");
        Ok(Self {
            writer,
            restored: false,
        })
    }

    pub fn writer(&mut self) -> &mut W {
        self.writer
    }

    pub fn restore(mut self) -> Result<(), DestinationError> {
        self.restored = true;
        self.writer.set_integrity_checks(true)?;
        debug!("Integrity checks restored");
        Ok(())
    }
}

impl<W: DestinationWriter + ?Sized> Drop for IntegritySuspension<'_, W> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(err) = self.writer.set_integrity_checks(true) {
            warn!("Restoring integrity checks failed: {err}");
        }
    }
}

/// Empties `table`. With `suspend_integrity` set, and only on writers that can
/// toggle it, integrity checks are off during the truncate and back on
/// afterwards whether or not the truncate succeeded.
pub fn truncate_table<W: DestinationWriter + ?Sized>(
    writer: &mut W,
    table: &str,
    suspend_integrity: bool,
) -> Result<(), DestinationError> {
    if !suspend_integrity || !writer.supports_integrity_toggle() {
        return writer.truncate(table);
    }
    let mut suspension = IntegritySuspension::begin(writer)?;
    let truncated = suspension.writer().truncate(table);
    let restored = suspension.restore();
    truncated?;
    restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::memory::WriteEvent;

    fn destination() -> MemoryDestination {
        MemoryDestination::new()
            .with_table("users", &["id"])
            .with_integrity_toggle()
    }

    #[test]
    fn truncate_suspends_and_restores_integrity_checks() {
        let mut dest = destination();
        truncate_table(&mut dest, "users", true).unwrap();
        assert_eq!(
            dest.events(),
            &[
                WriteEvent::IntegrityChecks(false),
                WriteEvent::Truncate("users".into()),
                WriteEvent::IntegrityChecks(true),
            ]
        );
        assert!(dest.integrity_checks_enabled());
    }

    #[test]
    fn failed_truncate_still_restores_integrity_checks() {
        let mut dest = destination().fail_truncate();
        assert!(truncate_table(&mut dest, "users", true).is_err());
        assert_eq!(dest.events().last(), Some(&WriteEvent::IntegrityChecks(true)));
        assert!(dest.integrity_checks_enabled());
    }

    #[test]
    fn toggle_is_skipped_when_not_requested_or_unsupported() {
        let mut dest = destination();
        truncate_table(&mut dest, "users", false).unwrap();
        assert_eq!(dest.events(), &[WriteEvent::Truncate("users".into())]);

        let mut dest = MemoryDestination::new().with_table("users", &["id"]);
        truncate_table(&mut dest, "users", true).unwrap();
        assert_eq!(dest.events(), &[WriteEvent::Truncate("users".into())]);
    }

    #[test]
    fn dropped_guard_restores_checks() {
        let mut dest = destination();
        {
            let _suspension = IntegritySuspension::begin(&mut dest).unwrap();
        }
        assert!(dest.integrity_checks_enabled());
    }
}

use std::{error::Error as StdError, io, iter, path::PathBuf};

use itertools::Itertools;
use thiserror::Error;

use crate::destination::DestinationError;

/// Failures that end a seeding run.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("{0}")]
    Config(String),

    #[error("File \"{}\" could not be found or is not readable", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Table \"{table}\" could not be found in database")]
    Schema { table: String },

    /// The resolved header left nothing to load. Reported, never raised.
    #[error("No columns of the source file match table \"{table}\"")]
    EmptyMapping { table: String },

    #[error("Reading record {record} failed")]
    Source {
        record: u64,
        #[source]
        source: csv::Error,
    },

    #[error("Destination \"{table}\" rejected {operation}")]
    Destination {
        table: String,
        operation: &'static str,
        #[source]
        source: DestinationError,
    },

    #[error("Database {} could not be opened", path.display())]
    Database {
        path: PathBuf,
        #[source]
        source: DestinationError,
    },

    #[error("Rows {first_record}..={last_record} of the file failed to insert into \"{table}\"")]
    Write {
        table: String,
        first_record: u64,
        last_record: u64,
        #[source]
        source: DestinationError,
    },
}

impl SeedError {
    pub fn config(message: impl Into<String>) -> Self {
        SeedError::Config(message.into())
    }
}

pub type SeedResult<T> = Result<T, SeedError>;

/// Marks a failure whose message already went out through a diagnostic sink, so
/// the binary exits without printing it again.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct AlreadyReported(pub String);

/// The error's message followed by each of its causes, joined by `": "`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    iter::successors(Some(err), |&err| err.source())
        .map(ToString::to_string)
        .dedup()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_chain_includes_causes() {
        let err = SeedError::Write {
            table: "users".into(),
            first_record: 3,
            last_record: 4,
            source: DestinationError::Rejected("UNIQUE constraint failed: users.id".into()),
        };
        assert_eq!(
            error_chain(&err),
            "Rows 3..=4 of the file failed to insert into \"users\": \
             UNIQUE constraint failed: users.id"
        );
        let schema = SeedError::Schema {
            table: "roles".into(),
        };
        assert_eq!(error_chain(&schema), schema.to_string());
    }
}

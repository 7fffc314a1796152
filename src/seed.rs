//! The load loop: schema check, truncate, header resolution, then records streamed
//! through the row transformer and written in bounded batches.

use std::{collections::BTreeMap, io::Read};

use anyhow::Result;
use log::{debug, info};

use crate::{
    cli::SeedArgs,
    config::{SeedConfig, SeedPlan},
    data::DestinationRow,
    destination::{self, Destination, DestinationWriter, SqliteDestination},
    diagnostics::{self, DiagnosticSink, LogSink, Severity},
    error::{AlreadyReported, SeedError, SeedResult, error_chain},
    header::{self, HeaderMapping},
    source::{CsvRecordStream, RecordSource},
    transform::{RowOutcome, RowTransformer, TransformRules},
};

pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// Where the column names of the source come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSource {
    /// The first record of the file.
    File,
    /// An explicit list. With `skip_file_header` the file's own header record is
    /// read and discarded, otherwise every record is data.
    Explicit {
        columns: Vec<String>,
        skip_file_header: bool,
    },
}

impl HeaderSource {
    fn consumes_file_header(&self) -> bool {
        match self {
            HeaderSource::File => true,
            HeaderSource::Explicit {
                skip_file_header, ..
            } => *skip_file_header,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub table: String,
    pub truncate: bool,
    pub suspend_integrity: bool,
    pub header: HeaderSource,
    pub aliases: BTreeMap<String, String>,
    pub skip_prefix: Option<String>,
    pub offset: u64,
    pub chunk: usize,
}

impl LoadOptions {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            truncate: true,
            suspend_integrity: false,
            header: HeaderSource::File,
            aliases: BTreeMap::new(),
            skip_prefix: Some("%".to_string()),
            offset: 0,
            chunk: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub inserted: u64,
    /// Data records in the source, header excluded.
    pub total: u64,
    pub rejected: u64,
    pub skipped: u64,
    pub batches: u64,
}

impl LoadReport {
    pub fn summary(&self) -> String {
        format!(
            "{} of {} rows has been seeded in table \"{}\"",
            self.inserted, self.total, self.table
        )
    }
}

enum Finish {
    Completed(LoadReport),
    NothingToLoad(LoadReport),
}

/// Rows waiting to be written, with the source record numbers they came from.
struct Batch {
    rows: Vec<DestinationRow>,
    first_record: u64,
    last_record: u64,
}

impl Batch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            first_record: 0,
            last_record: 0,
        }
    }

    fn push(&mut self, record: u64, row: DestinationRow) {
        if self.rows.is_empty() {
            self.first_record = record;
        }
        self.last_record = record;
        self.rows.push(row);
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn clear(&mut self) {
        self.rows.clear();
    }
}

pub struct LoadController<'a> {
    options: &'a LoadOptions,
    rules: &'a TransformRules,
    sink: Option<&'a dyn DiagnosticSink>,
}

impl<'a> LoadController<'a> {
    pub fn new(options: &'a LoadOptions, rules: &'a TransformRules) -> Self {
        Self {
            options,
            rules,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn DiagnosticSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Runs one load. The source is closed before this returns, whatever the
    /// outcome, and exactly one diagnostic describes how the run ended.
    pub fn run<S, D>(&self, source: &mut S, destination: &mut D) -> SeedResult<LoadReport>
    where
        S: RecordSource + ?Sized,
        D: Destination + ?Sized,
    {
        let outcome = self.load(source, destination);
        source.close();
        match outcome {
            Ok(Finish::Completed(report)) => {
                diagnostics::emit(self.sink, &report.summary(), Severity::Info);
                Ok(report)
            }
            Ok(Finish::NothingToLoad(report)) => {
                let reason = SeedError::EmptyMapping {
                    table: report.table.clone(),
                };
                diagnostics::emit(self.sink, &reason.to_string(), Severity::Error);
                Ok(report)
            }
            Err(err) => {
                diagnostics::emit(self.sink, &error_chain(&err), Severity::Error);
                Err(err)
            }
        }
    }

    fn load<S, D>(&self, source: &mut S, destination: &mut D) -> SeedResult<Finish>
    where
        S: RecordSource + ?Sized,
        D: Destination + ?Sized,
    {
        let table = self.options.table.as_str();
        let exists = destination
            .table_exists(table)
            .map_err(|source| destination_error(table, "schema lookup", source))?;
        if !exists {
            return Err(SeedError::Schema {
                table: table.to_string(),
            });
        }
        let schema_columns = destination
            .columns_of(table)
            .map_err(|source| destination_error(table, "schema lookup", source))?;

        if self.options.truncate {
            destination::truncate_table(destination, table, self.options.suspend_integrity)
                .map_err(|source| destination_error(table, "truncate", source))?;
            info!("Truncated table \"{table}\"");
        }

        let header_rows = u64::from(self.options.header.consumes_file_header());
        let known_total = source
            .total_records()?
            .map(|total| total.saturating_sub(header_rows));

        let mut report = LoadReport {
            table: table.to_string(),
            total: known_total.unwrap_or_default(),
            ..LoadReport::default()
        };

        let mapping = self.read_header_mapping(source, &schema_columns)?;
        if mapping.is_empty() {
            return Ok(Finish::NothingToLoad(report));
        }
        debug!(
            "Resolved {} source column(s), {} dropped",
            mapping.len(),
            mapping.dropped_count()
        );

        let transformer = RowTransformer::new(&mapping, self.rules);
        let chunk = self.options.chunk.max(1);
        let mut batch = Batch::with_capacity(chunk);
        let mut record_number = 0u64;

        while let Some(record) = source.next_record()? {
            record_number += 1;
            if record_number <= self.options.offset {
                report.skipped += 1;
                continue;
            }
            match transformer.transform(&record) {
                RowOutcome::Accepted(row) => {
                    batch.push(record_number, row);
                    if batch.len() >= chunk {
                        self.flush(destination, &mut batch, &mut report)?;
                    }
                }
                RowOutcome::Rejected(reason) => {
                    debug!("Record {record_number} skipped: {reason}");
                    report.rejected += 1;
                }
            }
        }
        self.flush(destination, &mut batch, &mut report)?;

        if known_total.is_none() {
            report.total = record_number;
        }
        Ok(Finish::Completed(report))
    }

    /// Reads the header record when the file has one and resolves the column
    /// names in effect against `schema_columns`.
    pub fn read_header_mapping<S>(
        &self,
        source: &mut S,
        schema_columns: &[String],
    ) -> SeedResult<HeaderMapping>
    where
        S: RecordSource + ?Sized,
    {
        let file_header = if self.options.header.consumes_file_header() {
            source.next_record()?.unwrap_or_default()
        } else {
            Vec::new()
        };
        let raw_header = match &self.options.header {
            HeaderSource::File => file_header,
            HeaderSource::Explicit { columns, .. } => columns.clone(),
        };
        Ok(header::resolve_header(
            &raw_header,
            schema_columns,
            &self.options.aliases,
            self.options.skip_prefix.as_deref(),
        ))
    }

    fn flush<D>(
        &self,
        destination: &mut D,
        batch: &mut Batch,
        report: &mut LoadReport,
    ) -> SeedResult<()>
    where
        D: DestinationWriter + ?Sized,
    {
        if batch.rows.is_empty() {
            return Ok(());
        }
        destination
            .insert_batch(&self.options.table, &batch.rows)
            .map_err(|source| SeedError::Write {
                table: self.options.table.clone(),
                first_record: batch.first_record,
                last_record: batch.last_record,
                source,
            })?;
        report.inserted += batch.len() as u64;
        report.batches += 1;
        debug!(
            "Inserted records {}..={} into \"{}\"",
            batch.first_record, batch.last_record, self.options.table
        );
        batch.clear();
        Ok(())
    }
}

fn destination_error(
    table: &str,
    operation: &'static str,
    source: destination::DestinationError,
) -> SeedError {
    SeedError::Destination {
        table: table.to_string(),
        operation,
        source,
    }
}

struct Prepared {
    plan: SeedPlan,
    source: CsvRecordStream<Box<dyn Read>>,
    destination: SqliteDestination,
}

/// Compiles the configuration and opens the source and the database. Failures
/// here abort the run before anything is written.
fn prepare(args: &SeedArgs) -> SeedResult<Prepared> {
    let plan = SeedConfig::from_args(args.config.as_deref(), &args.overrides)?.compile()?;
    let source = CsvRecordStream::open(&plan.file, plan.delimiter, plan.rules.encoding)?;
    let destination =
        SqliteDestination::open(&args.database).map_err(|source| SeedError::Database {
            path: args.database.clone(),
            source,
        })?;
    Ok(Prepared {
        plan,
        source,
        destination,
    })
}

/// Runs `seed`. Every failure is reported once through the log sink and comes
/// back as [`AlreadyReported`].
pub fn execute(args: &SeedArgs) -> Result<()> {
    let sink = LogSink;
    let Prepared {
        plan,
        mut source,
        mut destination,
    } = match prepare(args) {
        Ok(prepared) => prepared,
        Err(err) => {
            let message = error_chain(&err);
            sink.report(&message, Severity::Error);
            return Err(AlreadyReported(message).into());
        }
    };
    info!(
        "Seeding {:?} into table \"{}\" of {:?}",
        plan.file, plan.options.table, args.database
    );

    let report = LoadController::new(&plan.options, &plan.rules)
        .with_sink(&sink)
        .run(&mut source, &mut destination)
        .map_err(|err| AlreadyReported(error_chain(&err)))?;
    debug!(
        "{} rejected, {} skipped by offset, {} batch(es)",
        report.rejected, report.skipped, report.batches
    );
    Ok(())
}

use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};

use crate::{
    cli::PreviewArgs,
    config::SeedConfig,
    data::DestinationRow,
    destination::{SchemaOracle, SqliteDestination},
    error::SeedError,
    seed::LoadController,
    source::{CsvRecordStream, RecordSource},
    table,
    transform::{RowOutcome, RowTransformer},
};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let plan = SeedConfig::from_args(args.config.as_deref(), &args.overrides)?.compile()?;
    let table_name = plan.options.table.as_str();
    let destination = SqliteDestination::open(&args.database)
        .with_context(|| format!("Opening database {:?}", args.database))?;
    if !destination.table_exists(table_name)? {
        return Err(SeedError::Schema {
            table: table_name.to_string(),
        }
        .into());
    }
    let schema_columns = destination.columns_of(table_name)?;

    let mut source = CsvRecordStream::open(&plan.file, plan.delimiter, plan.rules.encoding)?;
    let controller = LoadController::new(&plan.options, &plan.rules);
    let mapping = controller.read_header_mapping(&mut source, &schema_columns)?;
    if mapping.is_empty() {
        source.close();
        warn!(
            "{}",
            SeedError::EmptyMapping {
                table: table_name.to_string()
            }
        );
        return Ok(());
    }

    let transformer = RowTransformer::new(&mapping, &plan.rules);
    let mut previewed: Vec<(u64, Option<DestinationRow>, String)> = Vec::new();
    let mut record_number = 0u64;
    while previewed.len() < args.rows {
        let Some(record) = source.next_record()? else {
            break;
        };
        record_number += 1;
        if record_number <= plan.options.offset {
            continue;
        }
        match transformer.transform(&record) {
            RowOutcome::Accepted(row) => previewed.push((record_number, Some(row), "ok".into())),
            RowOutcome::Rejected(reason) => {
                previewed.push((record_number, None, reason.to_string()))
            }
        }
    }
    source.close();

    let columns = preview_columns(
        &schema_columns,
        previewed.iter().filter_map(|(_, row, _)| row.as_ref()),
    );
    let mut headers = Vec::with_capacity(columns.len() + 2);
    headers.push("#".to_string());
    headers.extend(columns.iter().cloned());
    headers.push("status".to_string());

    let rows = previewed
        .iter()
        .map(|(number, row, status)| {
            let mut cells = Vec::with_capacity(headers.len());
            cells.push(number.to_string());
            cells.extend(columns.iter().map(|column| {
                row.as_ref()
                    .and_then(|row| row.get(column))
                    .map(|value| value.to_string())
                    .unwrap_or_default()
            }));
            cells.push(status.clone());
            cells
        })
        .collect::<Vec<_>>();

    table::print_table(&headers, &rows);
    info!(
        "Previewed {} record(s) of {:?} against table \"{}\"",
        rows.len(),
        plan.file,
        table_name
    );
    Ok(())
}

/// Schema columns that any row fills, in schema order, followed by columns the
/// rows carry that the schema does not know.
fn preview_columns<'a>(
    schema_columns: &[String],
    rows: impl Iterator<Item = &'a DestinationRow> + Clone,
) -> Vec<String> {
    let mut columns = schema_columns
        .iter()
        .filter(|column| rows.clone().any(|row| row.contains(column)))
        .cloned()
        .collect::<Vec<_>>();
    columns.extend(
        rows.flat_map(|row| row.columns())
            .filter(|column| !schema_columns.iter().any(|known| known.as_str() == *column))
            .sorted()
            .dedup()
            .map(str::to_string),
    );
    columns
}

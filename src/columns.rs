//! Column listing for a destination table.

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::ColumnsArgs,
    destination::{SchemaOracle, SqliteDestination},
    error::SeedError,
    table,
};

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let destination = SqliteDestination::open(&args.database)
        .with_context(|| format!("Opening database {:?}", args.database))?;
    let rendered = render_columns(&destination, &args.table)?;
    print!("{rendered}");
    info!("Listed columns of table \"{}\" in {:?}", args.table, args.database);
    Ok(())
}

pub fn render_columns<O: SchemaOracle + ?Sized>(oracle: &O, table_name: &str) -> Result<String> {
    if !oracle.table_exists(table_name)? {
        return Err(SeedError::Schema {
            table: table_name.to_string(),
        }
        .into());
    }
    let columns = oracle
        .columns_of(table_name)
        .with_context(|| format!("Reading columns of \"{table_name}\""))?;
    let rows = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| vec![(idx + 1).to_string(), name.clone()])
        .collect::<Vec<_>>();
    let headers = vec!["#".to_string(), "name".to_string()];
    Ok(table::render_table(&headers, &rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::MemoryDestination;

    #[test]
    fn lists_columns_in_schema_order() {
        let dest = MemoryDestination::new().with_table("users", &["id", "email"]);
        let rendered = render_columns(&dest, "users").unwrap();
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "#  name");
        assert_eq!(lines[2], "1  id");
        assert_eq!(lines[3], "2  email");
    }

    #[test]
    fn unknown_table_is_a_schema_error() {
        let dest = MemoryDestination::new();
        let err = render_columns(&dest, "users").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Table \"users\" could not be found in database"
        );
    }
}

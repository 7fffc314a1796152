use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Seed database tables from CSV files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a CSV file into a database table
    Seed(SeedArgs),
    /// Show the rows a seed run would insert, without writing them
    Preview(PreviewArgs),
    /// List the columns of a database table
    Columns(ColumnsArgs),
}

#[derive(Debug, Args)]
pub struct SeedArgs {
    /// SQLite database to seed
    #[arg(short = 'd', long = "database")]
    pub database: PathBuf,
    /// YAML seeding configuration; flags below override its values
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub overrides: SeedOverrides,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// SQLite database whose schema the rows are resolved against
    #[arg(short = 'd', long = "database")]
    pub database: PathBuf,
    /// YAML seeding configuration; flags below override its values
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Number of source records to transform
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    #[command(flatten)]
    pub overrides: SeedOverrides,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    /// SQLite database to inspect
    #[arg(short = 'd', long = "database")]
    pub database: PathBuf,
    /// Table to list
    #[arg(short, long)]
    pub table: String,
}

/// Flags shared by `seed` and `preview`.
#[derive(Debug, Default, Args)]
pub struct SeedOverrides {
    /// CSV file to load
    #[arg(short = 'i', long = "input")]
    pub file: Option<PathBuf>,
    /// Destination table (defaults to the file name without extension)
    #[arg(short, long)]
    pub table: Option<String>,
    /// Keep existing rows instead of truncating the table first
    #[arg(long = "no-truncate")]
    pub no_truncate: bool,
    /// Switch foreign key checks off while truncating
    #[arg(long = "suspend-foreign-keys")]
    pub suspend_foreign_keys: bool,
    /// The file has no header row; requires --mapping
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// The file has a header row even though --mapping names the columns; it is skipped
    #[arg(long = "skip-header", conflicts_with = "no_header")]
    pub skip_header: bool,
    /// Explicit comma-separated column names used instead of the file header
    #[arg(long = "mapping", value_delimiter = ',')]
    pub mapping: Vec<String>,
    /// Rename a header column before it is matched, as `from=to`
    #[arg(long = "alias", action = clap::ArgAction::Append)]
    pub aliases: Vec<String>,
    /// Header columns starting with this prefix are not loaded (default `%`)
    #[arg(long)]
    pub skipper: Option<String>,
    /// Load every header column regardless of prefix
    #[arg(long = "no-skipper", conflicts_with = "skipper")]
    pub no_skipper: bool,
    /// Per-column transform expressions such as `email=lowercase(trim(value))`
    #[arg(long = "transform", action = clap::ArgAction::Append)]
    pub transforms: Vec<String>,
    /// Columns whose values are stored as salted bcrypt hashes (replaces the default `password`)
    #[arg(long = "hash", action = clap::ArgAction::Append)]
    pub hashable: Vec<String>,
    /// Hash no columns at all
    #[arg(long = "no-hash", conflicts_with = "hashable")]
    pub no_hash: bool,
    /// bcrypt cost factor for hashed columns (4 to 31)
    #[arg(long = "hash-cost")]
    pub hash_cost: Option<u32>,
    /// Validation rules such as `email=required` or `age=max:3`
    #[arg(long = "validate", action = clap::ArgAction::Append)]
    pub validate: Vec<String>,
    /// Store empty fields as empty strings instead of NULL
    #[arg(long = "keep-empty-strings")]
    pub keep_empty_strings: bool,
    /// Default values for absent or empty columns, as `column=value`
    #[arg(long = "default", action = clap::ArgAction::Append)]
    pub defaults: Vec<String>,
    /// Do not stamp created_at and updated_at
    #[arg(long = "no-timestamps")]
    pub no_timestamps: bool,
    /// Fixed value for created_at and updated_at instead of the current time
    #[arg(long = "timestamp", conflicts_with = "no_timestamps")]
    pub timestamp: Option<String>,
    /// Number of leading data records to skip
    #[arg(long)]
    pub offset: Option<u64>,
    /// Rows per insert batch
    #[arg(long)]
    pub chunk: Option<usize>,
    /// Leave invalid UTF-8 as replacement characters instead of transcoding it
    #[arg(long = "no-encode")]
    pub no_encode: bool,
    /// CSV delimiter character (supports ';', ',', 'tab', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Encoding assumed for fields that are not valid UTF-8 (defaults to windows-1252)
    #[arg(long = "fallback-encoding")]
    pub fallback_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_delimiter_accepts_names_and_single_characters() {
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert_eq!(parse_delimiter("semicolon"), Ok(b';'));
        assert_eq!(parse_delimiter(":"), Ok(b':'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter("ab").is_err());
        assert!(parse_delimiter("§").is_err());
    }

    #[test]
    fn seed_flags_parse_repeatable_overrides() {
        let cli = Cli::try_parse_from([
            "csv-seeder",
            "seed",
            "-d",
            "app.db",
            "-i",
            "users.csv",
            "--alias",
            "Name=name",
            "--alias",
            "Mail=email",
            "--mapping",
            "id,name",
            "--delimiter",
            ",",
        ])
        .unwrap();
        let Commands::Seed(args) = cli.command else {
            panic!("expected seed command");
        };
        assert_eq!(args.overrides.aliases.len(), 2);
        assert_eq!(args.overrides.mapping, vec!["id", "name"]);
        assert_eq!(args.overrides.delimiter, Some(b','));
    }
}

pub mod cli;
pub mod columns;
pub mod config;
pub mod data;
pub mod destination;
pub mod diagnostics;
pub mod error;
pub mod header;
pub mod io_utils;
pub mod preview;
pub mod seed;
pub mod source;
pub mod table;
pub mod transform;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::{
    data::{DestinationRow, Value},
    error::{SeedError, SeedResult},
    seed::{LoadController, LoadOptions, LoadReport},
    transform::{RowTransformer, TransformRules},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_seeder", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Seed(args) => seed::execute(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Columns(args) => columns::execute(&args),
    }
}

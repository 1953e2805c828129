use std::path::PathBuf;

use clap::{command, Parser};

use tracing::info;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

use crate::{
    archive::SevenZip,
    cmd::{Config, Tolerance},
    error::Category,
};

mod archive;
mod cmd;
mod document;
mod error;
mod forum;
mod ingest;
mod mapper;
mod models;
mod schema;
mod sqlite_mapping;
mod walker;

/// Imports a WikiComma export into a SQLite database.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The directory where the export resides.
    #[arg(short = 'd', long, alias = "wikicomma-directory")]
    directory: PathBuf,
    /// The SQLite database to write to.
    #[arg(short = 'o', long, env)]
    database_url: String,
    /// Whether files use underscores instead of colons in filenames.
    #[arg(short = 'k', long, alias = "colon")]
    replace_colons: bool,
    /// Exit with an error when more than this many units fail.
    #[arg(long)]
    max_failures: Option<usize>,
    /// Exit with an error when any unit fails with one of these categories.
    #[arg(long, value_enum, value_delimiter = ',')]
    fail_on: Vec<Category>,
    /// Set logging level to debug.
    #[arg(short = 'D', long)]
    debug: bool,
    /// Don't output to standard out.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::registry()
        .with((!args.quiet).then(fmt::layer))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    info!(
        "Importing {} into {}",
        args.directory.display(),
        args.database_url
    );

    let report = cmd::import(
        &Config {
            src: &args.directory,
            database_url: &args.database_url,
            replace_colons: args.replace_colons,
        },
        &SevenZip,
    )?;

    Tolerance {
        max_failures: args.max_failures,
        fail_on: args.fail_on,
    }
    .check(&report)
}

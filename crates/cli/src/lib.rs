pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "datachat",
    about = "Datachat operator CLI",
    long_about = "Prepare the document store, load documents, and inspect collections, schemas, and configuration.",
    after_help = "Examples:\n  datachat migrate\n  datachat import orders ./orders.json\n  datachat schema orders --limit 100\n  datachat config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load a JSON array of documents into a collection (upserts by `_id`)")]
    Import {
        #[arg(help = "Target collection name")]
        collection: String,
        #[arg(help = "Path to a JSON file holding an array of objects")]
        file: PathBuf,
    },
    #[command(about = "List collections in the document store")]
    Collections,
    #[command(about = "Infer and print the schema of a collection")]
    Schema {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(long, help = "Maximum documents to inspect (defaults to pipeline.fetch_limit)")]
        limit: Option<u32>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Import { collection, file } => commands::import::run(&collection, &file),
        Command::Collections => commands::collections::run(),
        Command::Schema { collection, limit } => commands::schema::run(&collection, limit),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

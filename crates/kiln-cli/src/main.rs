//! Kiln CLI - Command-line interface for importing export batches

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{fetch, import, schema};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Rebuild engine assets from JSON export batches", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import export files or directories of export files
    Import {
        /// Export files or directories
        #[arg(required = true)]
        paths: Vec<String>,

        /// Type catalog directories (added to the configured ones)
        #[arg(long)]
        schemas: Vec<String>,

        /// Config file to use instead of the layered lookup
        #[arg(long)]
        config: Option<String>,

        /// Keep outcomes out of the report
        #[arg(long)]
        suppress: bool,

        /// Remote export service URL (enables the remote tier)
        #[arg(long)]
        remote: Option<String>,

        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Show a type descriptor from the type catalogs
    Schema {
        /// Type, struct or enum name
        name: String,

        /// Path to type catalog directory
        #[arg(long, default_value = "types")]
        schemas: String,
    },

    /// Fetch the exports of one object from the remote export service
    Fetch {
        /// Object path (e.g., /Game/Textures/T_Rock.T_Rock)
        object_path: String,

        /// Export service URL (defaults to the configured one)
        #[arg(long)]
        url: Option<String>,

        /// Write the response to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("KILN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            paths,
            schemas,
            config,
            suppress,
            remote,
            format,
        } => import::run(import::ImportArgs {
            paths,
            schemas,
            config,
            suppress,
            remote,
            format,
        }),
        Commands::Schema { name, schemas } => schema::run(&name, &schemas),
        Commands::Fetch {
            object_path,
            url,
            output,
        } => fetch::run(&object_path, url.as_deref(), output.as_deref()),
    }
}

//! netsnap CLI tool
//!
//! ## Commands
//!
//! - `parse <file>`: Parse one capture and print its blocks
//! - `ingest <root>`: Ingest every device capture under a directory into a new snapshot

use clap::{Parser, Subcommand};
use netsnap_core::{
    codec::{ParserRegistry, ParsingEngine},
    config::{ConfigProvider, NetsnapConfig, TomlConfigProvider, DEFAULT_CONFIG_FILE},
    db::DbConnection,
    pipeline::{run_batch, RunSummary},
    store::MemoryStore,
    NetsnapError,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "netsnap")]
#[command(author, version, about = "Parse and ingest network device command captures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a single capture file and display its blocks
    Parse {
        /// Path to the capture file
        path: PathBuf,

        /// Print the parsed blocks as JSON
        #[arg(long)]
        json: bool,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Ingest every device under a capture root into a new snapshot
    Ingest {
        /// Directory holding one folder (or file) per device
        root: PathBuf,

        /// SQLite database; overrides the configured one
        #[arg(long)]
        db: Option<PathBuf>,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Snapshot label
        #[arg(short, long)]
        label: Option<String>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<NetsnapConfig, NetsnapError> {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    TomlConfigProvider::new(path).load()
}

async fn parse(path: &Path, json: bool, config: &NetsnapConfig) -> Result<(), NetsnapError> {
    let registry = ParserRegistry::with_enabled(config.enabled_parsers);
    let file = tokio::fs::File::open(path).await?;
    let run = ParsingEngine::new(&registry, config.max_consecutive_errors)
        .parse_reader(tokio::io::BufReader::new(file))
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run.blocks)?);
        return Ok(());
    }

    println!("\n=== Parse Results ===");
    println!("Lines scanned: {}", run.lines_scanned);
    if let Some(hostname) = &run.prompt_hostname {
        println!("Prompt hostname: {hostname}");
    }
    println!("Blocks: {}", run.blocks.len());
    for block in run.blocks.iter() {
        println!(
            "  {:<20} {:>5} records {:>3} errors {:>3} warnings {:>5.1}% matched",
            block.block_type.as_str(),
            block.record_count(),
            block.errors.len(),
            block.warnings.len(),
            block.stats.success_rate() * 100.0
        );
        for diag in block.errors.iter() {
            println!("      error: {} [{}]", diag.message, diag.excerpt);
        }
        for diag in block.warnings.iter() {
            println!("      warning: {} [{}]", diag.message, diag.excerpt);
        }
    }
    if let Some(reason) = &run.aborted {
        println!("Capture abandoned early: {reason}");
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<(), NetsnapError> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Parse { path, json, config } => {
            let config = load_config(config)?;
            runtime.block_on(parse(&path, json, &config))?;
            Ok(())
        }

        Commands::Ingest {
            root,
            db,
            config,
            label,
            json,
        } => {
            let config = load_config(config)?;
            let summary = runtime.block_on(async {
                match db.or_else(|| config.database.clone()) {
                    Some(db_path) => {
                        let store = DbConnection::open(&db_path).await?;
                        run_batch(&root, &config, store, label).await
                    }
                    None => run_batch(&root, &config, MemoryStore::new(), label).await,
                }
            })?;
            print_summary(&summary, json)?;
            if summary.failed_devices() > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

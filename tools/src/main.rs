//! rand-report: renders the randomization tutorial and exports
//! assignment tables for upload.
//!
//! Usage:
//!   rand-report render --source docs/randomization_tutorial.md --output output/report.html
//!   rand-report export --config data/report.json --csv assignments.csv --db upload.db

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use randomization_core::{
    config::ReportConfig,
    export::{write_csv, UploadStore},
    generator::{generate, Strata},
    report::RenderJob,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rand-report")]
#[command(version, about = "Clinical trial randomization tutorial and assignment tables")]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Master seed (overrides the configuration)
    #[arg(short, long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the narrative document to HTML
    Render {
        /// Narrative source document
        #[arg(long)]
        source: Option<PathBuf>,

        /// HTML output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a stratified assignment table and write upload files
    Export {
        /// CSV output path
        #[arg(long)]
        csv: Option<PathBuf>,

        /// SQLite output path
        #[arg(long)]
        db: Option<String>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    match cli.command {
        Commands::Render { source, output } => {
            let job = RenderJob {
                source: source.unwrap_or_else(|| PathBuf::from(&config.source)),
                output: output.unwrap_or_else(|| PathBuf::from(&config.output)),
                seed:   config.seed,
            };
            let summary = job.run()?;
            println!("=== RENDER ===");
            println!("  source:    {}", job.source.display());
            println!("  output:    {}", summary.output.display());
            println!("  seed:      {}", job.seed);
            println!("  snippets:  {}", summary.snippets);
            println!("  bytes:     {}", summary.bytes);
        }
        Commands::Export { csv, db } => {
            if csv.is_none() && db.is_none() {
                bail!("export needs at least one of --csv or --db");
            }
            run_export(&config, csv, db)?;
        }
    }
    Ok(())
}

fn run_export(config: &ReportConfig, csv: Option<PathBuf>, db: Option<String>) -> Result<()> {
    let strata = if config.export.factors.is_empty() {
        Strata::Unstratified
    } else {
        Strata::cross(&config.export.factors)?
    };
    let table = generate(&config.export.params(), &strata, config.seed)?;

    println!("=== EXPORT ===");
    println!("  seed:      {}", config.seed);
    println!("  rows:      {}", table.len());
    for stratum in table.partitions() {
        let counts = table.arm_counts(stratum);
        println!(
            "  {:<20} intervention={} control={}",
            stratum.unwrap_or("(all)"),
            counts.intervention,
            counts.control
        );
    }

    if let Some(path) = csv {
        let file = File::create(&path)
            .map_err(|e| anyhow::anyhow!("Cannot create {}: {e}", path.display()))?;
        write_csv(&table, BufWriter::new(file))?;
        println!("  csv:       {}", path.display());
    }
    if let Some(path) = db {
        let mut store = UploadStore::open(&path)?;
        store.migrate()?;
        store.write_table(&table)?;
        println!("  db:        {path}");
    }
    log::info!("export complete");
    Ok(())
}

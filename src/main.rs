use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use sks_import::{
    count_current, count_current_by_type, count_history, count_invalidated, latest_modified_date,
    logging, open_database, validate_input_structure, ImporterConfig, InstitutionType,
    SksImporter, SqliteRecordSink, SqliteRunAudit,
};

#[derive(Parser)]
#[command(name = "sks-import")]
#[command(about = "Import SKS hospital/department register files", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the single SHAKCOMPLETE.TXT or SHAKDELTA.TXT in a directory
    Import {
        /// Directory holding exactly one register file
        dir: PathBuf,
        /// SQLite database (defaults to $SKS_DB_PATH, then sks.db)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Run identifier recorded in the audit trail
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Check a directory against the input contract without importing
    Validate {
        dir: PathBuf,
    },
    /// Show row counts of the register tables
    Status {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import { dir, db, run_id } => run_import(dir, ImporterConfig::from_env(db, run_id)),
        Commands::Validate { dir } => run_validate(dir),
        Commands::Status { db } => run_status(ImporterConfig::from_env(db, None)),
    }
}

fn run_import(dir: PathBuf, config: ImporterConfig) -> Result<()> {
    let conn = open_database(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let conn = Arc::new(Mutex::new(conn));

    let mut importer = SksImporter::new(
        SqliteRecordSink::new(conn.clone()),
        SqliteRunAudit::new(conn),
    );

    let summary = importer
        .process(&dir, &config.run_id)
        .with_context(|| format!("Import of {} failed", dir.display()))?;

    println!("✓ Imported {} ({})", summary.input_path.display(), summary.input_kind.as_str());
    println!("✓ Records processed: {}", summary.records_processed);
    println!("✓ Lines skipped: {}", summary.lines_skipped);
    println!(
        "✓ History: {} inserted, {} updated",
        summary.stats.history_inserted, summary.stats.history_updated
    );
    println!(
        "✓ Current: {} inserted, {} updated",
        summary.stats.current_inserted, summary.stats.current_updated
    );
    println!("✓ Unchanged rows: {}", summary.stats.unchanged);

    Ok(())
}

fn run_validate(dir: PathBuf) -> Result<()> {
    if validate_input_structure(&dir)? {
        println!("✓ {} is a valid SKS input directory", dir.display());
        Ok(())
    } else {
        anyhow::bail!(
            "{} must contain exactly one SHAKCOMPLETE.TXT or SHAKDELTA.TXT",
            dir.display()
        )
    }
}

fn run_status(config: ImporterConfig) -> Result<()> {
    let conn = open_database(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    let now = Utc::now();

    println!("Database: {}", config.database_path.display());
    println!("  Current rows:      {}", count_current(&conn)?);
    println!("    Sygehus:         {}", count_current_by_type(&conn, InstitutionType::Hospital)?);
    println!("    Afdeling:        {}", count_current_by_type(&conn, InstitutionType::HospitalDepartment)?);
    println!("  History rows:      {}", count_history(&conn)?);
    println!("  Invalidated (now): {}", count_invalidated(&conn, &now)?);
    match latest_modified_date(&conn)? {
        Some(modified) => println!("  Last modified:     {}", modified.to_rfc3339()),
        None => println!("  Last modified:     never"),
    }

    Ok(())
}

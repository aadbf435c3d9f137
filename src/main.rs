//! CLI entry point for the GWAS library tool.

use anyhow::{Context, Result, bail};
use clap::Parser;
use gwas_library::{
    Database, EntryQuery, Library, ManifestParser, PhenotypeCatalog, Seeder, validate_entries,
};
use serde::Serialize;
use tracing::{debug, info};

mod app_config;
mod cli;

use app_config::{CliOverrides, Settings, load_config};
use cli::{Args, Command};

/// Machine-readable `inspect` output.
#[derive(Serialize)]
struct InspectReport<'a> {
    manifest: String,
    rows: usize,
    row_errors: Vec<String>,
    rows_without_filename: usize,
    total: usize,
    valid: usize,
    invalid: usize,
    issues: &'a [gwas_library::RejectedEntry],
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    if let Command::Inspect {
        manifest,
        max_issues,
    } = &args.command
    {
        return inspect(manifest, *max_issues);
    }

    let loaded = load_config(args.config.as_deref())?;
    if let Some(path) = loaded.path.as_deref()
        && loaded.config.is_some()
    {
        debug!(path = %path.display(), "Loaded config file");
    }

    let (manifest_override, catalog_override) = match &args.command {
        Command::Seed { manifest, catalog } => (manifest.clone(), catalog.clone()),
        _ => (None, None),
    };
    let settings = Settings::resolve(
        loaded.config.as_ref(),
        CliOverrides {
            database_path: args.db.clone(),
            manifest_path: manifest_override,
            catalog_path: catalog_override,
        },
    );
    debug!(?settings, "Resolved settings");

    let db = Database::with_options(&settings.database_path, settings.database)
        .await
        .with_context(|| {
            format!(
                "Failed to open database '{}'",
                settings.database_path.display()
            )
        })?;

    let result = run(&args.command, &db, &settings).await;
    db.close().await;
    result
}

async fn run(command: &Command, db: &Database, settings: &Settings) -> Result<()> {
    let library = Library::new(db.clone());

    match command {
        Command::Seed { .. } => {
            info!("GWAS library starting seed");
            let seeder = Seeder::new(library, PhenotypeCatalog::new(db.clone()))
                .manifest_path(settings.manifest_path.clone())
                .catalog_path(settings.catalog_path.clone());
            let report = seeder.seed_all().await;

            println!("gwas_library: {}", report.gwas_library);
            println!("phenotypes: {}", report.phenotypes);
            if report.has_failures() {
                bail!("Seeding failed; see log output for details");
            }
        }
        Command::List {
            search,
            sex,
            limit,
            offset,
        } => {
            let mut query = EntryQuery::new().limit(*limit).offset(*offset);
            if let Some(term) = search {
                query = query.search(term.clone());
            }
            if let Some(sex) = sex {
                query = query.sex(*sex);
            }

            let total = library.count(&query.filter).await?;
            let entries = library.list(&query).await?;
            for entry in &entries {
                println!("{entry}");
            }
            println!("Showing {} of {total} entries", entries.len());
        }
        Command::Popular { limit } => {
            for (rank, entry) in library.most_popular(*limit).await?.iter().enumerate() {
                println!("{:>3}. {entry}", rank + 1);
            }
        }
        Command::Show { file_id } => {
            let Some(entry) = library.get(file_id).await? else {
                bail!("No library entry with file_id '{file_id}'");
            };
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Command::Inspect {
            manifest,
            max_issues,
        } => inspect(manifest, *max_issues)?,
    }

    Ok(())
}

fn inspect(manifest: &std::path::Path, max_issues: usize) -> Result<()> {
    let parsed = ManifestParser::new()
        .parse_path(manifest)
        .with_context(|| format!("Failed to parse manifest '{}'", manifest.display()))?;
    let validation = validate_entries(&parsed.entries);
    let report = &validation.report;

    let shown = report.issues.len().min(max_issues);
    let output = InspectReport {
        manifest: manifest.display().to_string(),
        rows: parsed.len(),
        row_errors: parsed.row_errors.iter().map(ToString::to_string).collect(),
        rows_without_filename: parsed.rows_without_filename,
        total: report.total,
        valid: report.valid,
        invalid: report.invalid,
        issues: &report.issues[..shown],
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

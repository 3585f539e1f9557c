mod delegate;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use shelfmark_core::{import_csv, import_csv_path, AppConfig, CatalogRepository, SourceRecord, SqliteCatalogRepository};
use shelfmark_match::{
    CallNumberGenerator, CallNumberOrigin, CatalogIndex, DelegatedMerge, DuplicateDetector, FieldMerger, Ingestor,
    MatchThresholds, NormalizedKey, Verdict,
};

use crate::delegate::CommandDelegate;

/// Exit status when a book was rejected as a duplicate of a catalog entry.
const EXIT_DUPLICATE: i32 = 7;

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "shelfmark",
    about = "Merge book metadata from several sources and keep the catalog free of duplicates",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format. Also enabled by setting SHELFMARK_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge source records into one canonical record.
    Merge {
        /// JSON files holding one source record or an array of them ("-" for stdin).
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Report which source supplied each field.
        #[arg(long)]
        provenance: bool,
    },

    /// Merge source records and propose a call number for the book.
    CallNumber {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge source records and report whether the book is already catalogued.
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge source records and add the book to the catalog unless it is a duplicate.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Import an existing catalog spreadsheet (CSV or TSV).
    Import {
        file: PathBuf,
        /// Field delimiter; defaults to tab for .tsv files and comma otherwise.
        #[arg(long)]
        delimiter: Option<char>,
        /// Skip rows that duplicate an entry already in the catalog.
        #[arg(long)]
        dedup: bool,
    },

    /// List catalog entries.
    List {
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Print the config file location.
    Path,
    /// Write the default configuration to the config file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_logging();

    // ── Env var overrides ──────────────────────────────────────────────────
    let json_output = cli.json || std::env::var("SHELFMARK_JSON").as_deref() == Ok("1");

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::load_from(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    if let Ok(db_path) = std::env::var("SHELFMARK_DATABASE") {
        config.set_database_path(db_path.into());
    }

    match cli.command {
        Commands::Merge { files, provenance } => {
            let sources = read_sources(&files)?;
            let merger = build_merger(&config)?.with_provenance(provenance || config.merge.provenance);
            let outcome = merger.merge(&sources);
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":outcome,"meta":{"duration_ms":dur,"sources":sources.len()}}))?;
            } else {
                if let shelfmark_match::MergeOutcome::Fallback { reason, .. } = &outcome {
                    eprintln!("rule-based merge ({reason})");
                }
                println!("{}", serde_json::to_string_pretty(outcome.merged())?);
            }
        }

        Commands::CallNumber { files } => {
            let sources = read_sources(&files)?;
            let outcome = build_merger(&config)?.merge(&sources);
            let call_number = build_call_numbers(&config).assign(&outcome.merged().record);
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":call_number,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("{}", call_number.value);
                if let CallNumberOrigin::Provisional { reason } = &call_number.origin {
                    eprintln!("provisional call number ({reason})");
                }
            }
        }

        Commands::Check { files } => {
            let sources = read_sources(&files)?;
            let ingestor = open_ingestor(&config)?;
            let outcome = ingestor.merger().merge(&sources);
            let verdict = ingestor.check(&outcome.merged().record);
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":{"verdict":verdict,"merge":outcome},"meta":{"duration_ms":dur}}))?;
            } else {
                match &verdict {
                    Verdict::Duplicate(found) => println!(
                        "Duplicate of {} \"{}\" ({})",
                        accession_label(found.accession_no),
                        found.title,
                        found.reason
                    ),
                    Verdict::Unique => println!("Not in catalog."),
                }
            }
            if verdict.is_duplicate() {
                std::process::exit(EXIT_DUPLICATE);
            }
        }

        Commands::Ingest { files } => {
            let sources = read_sources(&files)?;
            let ingestor = open_ingestor(&config)?;
            let report = ingestor.ingest(&sources)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":report,"meta":{"duration_ms":dur}}))?;
            } else {
                match &report.decision {
                    shelfmark_match::IngestDecision::Appended { accession_no } => {
                        println!("Added {accession_no}: {}", report.entry.title);
                    }
                    shelfmark_match::IngestDecision::Rejected { duplicate_of } => {
                        println!(
                            "Rejected: duplicate of {} \"{}\"",
                            accession_label(duplicate_of.accession_no),
                            duplicate_of.title
                        );
                    }
                }
            }
            if report.is_rejected() {
                std::process::exit(EXIT_DUPLICATE);
            }
        }

        Commands::Import { file, delimiter, dedup } => {
            let report = match delimiter {
                Some(d) => {
                    let delimiter = u8::try_from(d).context("delimiter must be a single-byte character")?;
                    let reader = std::fs::File::open(&file)
                        .with_context(|| format!("opening {}", file.display()))?;
                    import_csv(reader, delimiter, &file.to_string_lossy())?
                }
                None => import_csv_path(&file)?,
            };

            let repo = open_repository(&config)?;
            let detector = DuplicateDetector::new(MatchThresholds::from_config(&config.matching));
            let mut index = if dedup {
                CatalogIndex::build(&repo.fetch_all_entries()?)
            } else {
                CatalogIndex::new()
            };

            let mut added = 0usize;
            let mut duplicates = 0usize;
            for entry in report.entries {
                if dedup && detector.is_duplicate(&NormalizedKey::from_entry(&entry), &index) {
                    duplicates += 1;
                    continue;
                }
                let mut stored = entry.clone();
                stored.accession_no = Some(repo.append_entry(entry)?);
                index.insert(&stored);
                added += 1;
            }
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status":"ok",
                    "data":{"added":added,"duplicates":duplicates,"skipped_rows":report.skipped_rows},
                    "meta":{"duration_ms":dur}
                }))?;
            } else {
                println!("Imported {added} entries from {}", file.display());
                if duplicates > 0 {
                    println!("  {duplicates} duplicates skipped");
                }
                if report.skipped_rows > 0 {
                    println!("  {} unreadable or blank rows skipped", report.skipped_rows);
                }
            }
        }

        Commands::List { limit } => {
            let repo = open_repository(&config)?;
            let entries = repo.fetch_all_entries()?;
            let total = entries.len();
            let shown: Vec<_> = entries.into_iter().rev().take(limit).collect();
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": shown, "total": total, "limit": limit },
                    "meta": { "duration_ms": dur }
                }))?;
            } else if shown.is_empty() {
                println!("Catalog is empty. Use `shelfmark ingest` or `shelfmark import` to add books.");
            } else {
                for entry in &shown {
                    println!(
                        "{no}  {title:<40}  {author:<25}  {year}",
                        no = accession_label(entry.accession_no),
                        title = entry.title,
                        author = entry.author,
                        year = entry.year,
                    );
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":config,"meta":{"path":config_path}}))?;
                } else {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }
            ConfigAction::Path => {
                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":{"path":config_path,"exists":config_path.exists()}}))?;
                } else {
                    println!("{}", config_path.display());
                }
            }
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", config_path.display());
                }
                AppConfig::default().save_to(&config_path)?;
                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":{"path":config_path}}))?;
                } else {
                    println!("Wrote {}", config_path.display());
                }
            }
        },
    }

    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_logging() {
    let filter = std::env::var("SHELFMARK_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn accession_label(no: Option<shelfmark_core::AccessionNo>) -> String {
    no.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceFile {
    Many(Vec<SourceRecord>),
    One(SourceRecord),
}

fn parse_sources(text: &str, origin: &Path) -> Result<Vec<SourceRecord>> {
    let parsed: SourceFile = serde_json::from_str(text)
        .with_context(|| format!("{} is not a source record or list of source records", origin.display()))?;
    Ok(match parsed {
        SourceFile::Many(records) => records,
        SourceFile::One(record) => vec![record],
    })
}

fn read_sources(files: &[PathBuf]) -> Result<Vec<SourceRecord>> {
    let mut sources = Vec::new();
    for path in files {
        let text = if path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        };
        sources.extend(parse_sources(&text, path)?);
    }
    tracing::debug!(count = sources.len(), "source records loaded");
    Ok(sources)
}

fn build_merger(config: &AppConfig) -> Result<FieldMerger> {
    let merger = FieldMerger::from_config(&config.merge)?;
    Ok(match &config.merge.delegate {
        Some(delegate) => merger.with_preferred(DelegatedMerge::new(CommandDelegate::from_config(delegate))),
        None => merger,
    })
}

fn build_call_numbers(config: &AppConfig) -> CallNumberGenerator {
    match &config.call_number.delegate {
        Some(delegate) => CallNumberGenerator::new().with_delegate(CommandDelegate::from_config(delegate)),
        None => CallNumberGenerator::new(),
    }
}

fn open_repository(config: &AppConfig) -> Result<SqliteCatalogRepository> {
    let db_path = config.database_path();
    SqliteCatalogRepository::open(&db_path).with_context(|| format!("opening catalog {}", db_path.display()))
}

fn open_ingestor(config: &AppConfig) -> Result<Ingestor<SqliteCatalogRepository>> {
    let ingestor = Ingestor::from_config(open_repository(config)?, config)?;
    Ok(ingestor.with_merger(build_merger(config)?))
}

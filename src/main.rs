mod config;
mod db;
mod error;
mod location;
mod model;
mod parser;
mod stats;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use tracing::{info, warn};

use config::{ClassifierConfig, Settings};
use db::TimeRange;
use model::ActivityRecord;

#[derive(Parser)]
#[command(name = "takeout_parser", about = "Parse Google Takeout activity history into records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// SQLite file (default: $TAKEOUT_DB_PATH or data/takeout.sqlite)
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Args)]
struct PeriodArgs {
    /// Restrict to one year
    #[arg(short, long)]
    year: Option<i32>,
    /// Restrict to one month of --year
    #[arg(short, long, requires = "year")]
    month: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an activity export and write the records as JSON
    Parse {
        /// Path to the exported "My Activity" HTML file
        html: PathBuf,
        /// Output JSON file
        #[arg(short, long, default_value = "results.json")]
        out: PathBuf,
        /// Also print every record
        #[arg(long)]
        print: bool,
    },
    /// Parse an activity export and store the records
    Import {
        html: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
        /// Fail on the first record that is already stored
        #[arg(long)]
        strict: bool,
    },
    /// Delete the records of an activity export from the store
    Remove {
        html: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Import (or remove) a location history JSON export
    Locations {
        json: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
        /// Delete these locations instead of storing them
        #[arg(long)]
        remove: bool,
        /// Also print every location
        #[arg(long)]
        print: bool,
    },
    /// List stored records
    List {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        period: PeriodArgs,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Most frequent items
    TopItems {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
    /// Most frequent channels
    TopChannels {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
    /// Find records whose item contains NEEDLE
    Search {
        needle: String,
        #[command(flatten)]
        store: StoreArgs,
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Yearly (or per-month) activity summary
    Summary {
        year: i32,
        #[arg(long)]
        monthly: bool,
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let load_settings = || Settings::load().context("Failed to load settings");

    let result = match cli.command {
        Commands::Parse { html, out, print } => {
            let config = ClassifierConfig::load().context("Failed to load parse settings")?;
            let records = parse(&config, &html)?;
            let json = serde_json::to_string_pretty(&records)?;
            std::fs::write(&out, json)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            if print {
                for r in &records {
                    println!("{}", r);
                }
            }
            println!("Wrote {} records to {}", records.len(), out.display());
            Ok(())
        }
        Commands::Import {
            html,
            store,
            strict,
        } => {
            let settings = load_settings()?;
            let records = parse(&settings.classifier(), &html)?;
            let conn = open_store(&settings, &store)?;
            let valid: Vec<ActivityRecord> = records
                .iter()
                .filter(|r| match r.validate(settings.max_item_len) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(title = %r.title, item = %r.item, "Skipping record: {}", e);
                        false
                    }
                })
                .cloned()
                .collect();
            let inserted = if strict {
                db::insert_all_strict(&conn, &valid)?
            } else {
                import_records(&conn, &valid)?
            };
            println!(
                "Parsed {} records ({} valid), stored {} new.",
                records.len(),
                valid.len(),
                inserted
            );
            Ok(())
        }
        Commands::Remove { html, store } => {
            let settings = load_settings()?;
            let records = parse(&settings.classifier(), &html)?;
            let conn = open_store(&settings, &store)?;
            let mut removed = 0;
            for r in &records {
                removed += db::delete(&conn, r)?;
            }
            println!("Parsed {} records, removed {}.", records.len(), removed);
            Ok(())
        }
        Commands::Locations {
            json,
            store,
            remove,
            print,
        } => {
            let data = location::load_locations(&json)
                .with_context(|| format!("Failed to load {}", json.display()))?;
            let conn = open_store(&load_settings()?, &store)?;
            if print {
                for loc in &data.locations {
                    println!("{}", loc);
                }
            }
            if remove {
                let mut removed = 0;
                for loc in &data.locations {
                    removed += db::delete_location(&conn, loc)?;
                }
                println!("Removed {} of {} locations.", removed, data.locations.len());
            } else {
                let inserted = db::insert_locations(&conn, &data.locations)?;
                println!(
                    "Loaded {} locations, stored {} new ({} total).",
                    data.locations.len(),
                    inserted,
                    db::fetch_locations(&conn)?.len()
                );
            }
            Ok(())
        }
        Commands::List {
            store,
            period,
            limit,
        } => {
            let conn = open_store(&load_settings()?, &store)?;
            let records = match period.range()? {
                Some(range) => db::fetch_range(&conn, &range, Some(limit))?,
                None => db::fetch_all(&conn, Some(limit))?,
            };
            if records.is_empty() {
                println!("No records found.");
                return Ok(());
            }
            print_records(&records);
            Ok(())
        }
        Commands::TopItems {
            store,
            period,
            limit,
        } => {
            let conn = open_store(&load_settings()?, &store)?;
            let range = period.range()?;
            print_counts("Item", &db::top_items(&conn, range.as_ref(), limit)?);
            Ok(())
        }
        Commands::TopChannels {
            store,
            period,
            limit,
        } => {
            let conn = open_store(&load_settings()?, &store)?;
            let range = period.range()?;
            print_counts("Channel", &db::top_channels(&conn, range.as_ref(), limit)?);
            Ok(())
        }
        Commands::Search {
            needle,
            store,
            limit,
        } => {
            let conn = open_store(&load_settings()?, &store)?;
            let records = db::search_items(&conn, &needle, Some(limit))?;
            if records.is_empty() {
                println!("No items match {:?}.", needle);
                return Ok(());
            }
            print_records(&records);
            Ok(())
        }
        Commands::Summary {
            year,
            monthly,
            store,
        } => {
            let conn = open_store(&load_settings()?, &store)?;
            if monthly {
                for s in stats::monthly(&conn, year)? {
                    println!("{}", s);
                }
            }
            println!("{}", stats::yearly(&conn, year)?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

impl PeriodArgs {
    fn range(&self) -> anyhow::Result<Option<TimeRange>> {
        let range = match (self.year, self.month) {
            (Some(y), Some(m)) => Some(TimeRange::month(y, m)?),
            (Some(y), None) => Some(TimeRange::year(y)?),
            _ => None,
        };
        Ok(range)
    }
}

fn parse(config: &ClassifierConfig, html: &Path) -> anyhow::Result<Vec<ActivityRecord>> {
    parser::parse_file(html, config).with_context(|| format!("Failed to parse {}", html.display()))
}

fn open_store(settings: &Settings, args: &StoreArgs) -> anyhow::Result<Connection> {
    let path = args
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.db_path));
    let conn = db::connect(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    db::init_schema(&conn)?;
    info!("Using store {}", path.display());
    Ok(conn)
}

fn import_records(conn: &Connection, records: &[ActivityRecord]) -> anyhow::Result<usize> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut inserted = 0;
    for chunk in records.chunks(500) {
        inserted += db::insert_all(conn, chunk)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(inserted)
}

fn print_records(records: &[ActivityRecord]) {
    println!(
        "{:>3} | {:<19} | {:<12} | {:<40} | {:<20}",
        "#", "Date", "Action", "Item", "Channel"
    );
    println!("{}", "-".repeat(106));
    for (i, r) in records.iter().enumerate() {
        println!(
            "{:>3} | {:<19} | {:<12} | {:<40} | {:<20}",
            i + 1,
            r.date,
            truncate(&r.action, 12),
            truncate(&r.item, 40),
            truncate(r.channel.as_deref().unwrap_or("-"), 20)
        );
    }
    println!("\n{} records", records.len());
}

fn print_counts(heading: &str, rows: &[(String, usize)]) {
    if rows.is_empty() {
        println!("Nothing recorded.");
        return;
    }
    println!("{:>3} | {:<50} | {:>6}", "#", heading, "Count");
    println!("{}", "-".repeat(66));
    for (i, (name, n)) in rows.iter().enumerate() {
        println!("{:>3} | {:<50} | {:>6}", i + 1, truncate(name, 50), n);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(year: Option<i32>, month: Option<u32>) -> PeriodArgs {
        PeriodArgs { year, month }
    }

    #[test]
    fn period_windows() {
        assert!(period(None, None).range().unwrap().is_none());

        let y = period(Some(2020), None).range().unwrap().unwrap();
        assert_eq!(y.start, "2020-01-01T00:00:00");
        assert_eq!(y.end, "2021-01-01T00:00:00");

        let m = period(Some(2020), Some(12)).range().unwrap().unwrap();
        assert_eq!(m.label, "2020-12");
        assert_eq!(m.end, "2021-01-01T00:00:00");

        assert!(period(Some(2020), Some(13)).range().is_err());
    }

    #[test]
    fn month_requires_year() {
        assert!(Cli::try_parse_from(["takeout_parser", "list", "-m", "3"]).is_err());
        let cli = Cli::try_parse_from(["takeout_parser", "list", "-y", "2020", "-m", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List { ref period, .. } if period.month == Some(3)
        ));
    }

    #[test]
    fn strict_import_flag() {
        let cli = Cli::try_parse_from(["takeout_parser", "import", "a.html", "--strict"]).unwrap();
        assert!(matches!(cli.command, Commands::Import { strict: true, .. }));
    }
}

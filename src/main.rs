use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use school_report_export::aggregate;
use school_report_export::cache;
use school_report_export::config::AppConfig;
use school_report_export::export::{ExportDialog, ExportRequest};
use school_report_export::filter;
use school_report_export::models::{
    ClassFilter, DateRange, ReportFilters, ReportKind, ReportType, SubjectFilter,
};
use school_report_export::render::{ExportFormat, Orientation, RenderOptions};
use school_report_export::report;

#[derive(Parser)]
#[command(name = "school-report-export")]
#[command(about = "Filter, summarize and export school records from the offline cache", long_about = None)]
struct Cli {
    /// Offline cache file (defaults to SCHOOL_CACHE_PATH or school-cache.json)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("window")
        .args(["since_days", "from"])
        .multiple(false)
))]
struct FilterArgs {
    /// Restrict to one class; omit for all classes
    #[arg(long)]
    class: Option<String>,
    /// Restrict to one subject; omit for all subjects
    #[arg(long)]
    subject: Option<String>,
    /// First day included (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day included (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Trailing window ending today
    #[arg(long, conflicts_with = "to")]
    since_days: Option<i64>,
    #[arg(long, value_enum, default_value_t = ReportType::Summary)]
    report_type: ReportType,
}

impl FilterArgs {
    fn into_filters(self, today: NaiveDate) -> ReportFilters {
        let date_range = match self.since_days {
            Some(days) => DateRange::last_days(days, today),
            None => DateRange {
                from: self.from,
                to: self.to,
            },
        };

        ReportFilters {
            date_range,
            class: ClassFilter::from_option(self.class),
            subject: SubjectFilter::from_option(self.subject),
            report_type: self.report_type,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres mirror schema
    InitDb,
    /// Load realistic seed data into the Postgres mirror
    Seed,
    /// Refresh the offline cache from the Postgres mirror
    Sync,
    /// Export a report document
    Export {
        #[arg(long, value_enum)]
        kind: ReportKind,
        #[arg(long, value_enum, default_value_t = ExportFormat::Pdf)]
        format: ExportFormat,
        #[command(flatten)]
        filters: FilterArgs,
        /// PDF page orientation
        #[arg(long, value_enum, default_value_t = Orientation::Portrait)]
        orientation: Orientation,
        /// Output file name; the extension always matches the format
        #[arg(long)]
        filename: Option<String>,
        /// Leave out the report header block
        #[arg(long)]
        no_metadata: bool,
        /// Directory the file is written to (defaults to REPORT_OUTPUT_DIR or .)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Print a per-student summary for the selected filters
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(config.require_database_url()?)
        .await
        .context("failed to connect to Postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    let config = AppConfig::from_env();
    let cache_path = cli.cache.unwrap_or_else(|| config.cache_path.clone());
    let today = Utc::now().date_naive();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            cache::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            cache::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Sync => {
            let pool = connect(&config).await?;
            let snapshot = cache::fetch_snapshot(&pool).await?;
            cache::save_snapshot(&cache_path, &snapshot)?;
            println!(
                "Cached {} students, {} attendance and {} grade records in {}.",
                snapshot.students.len(),
                snapshot.attendance.len(),
                snapshot.grades.len(),
                cache_path.display()
            );
        }
        Commands::Export {
            kind,
            format,
            filters,
            orientation,
            filename,
            no_metadata,
            out_dir,
        } => {
            let snapshot = cache::load_snapshot(&cache_path)?;
            let filters = filters.into_filters(today);
            let filtered = filter::apply_filters(&snapshot, &filters);
            if filtered.is_empty() {
                warn!("no cached records match the selected filters");
            }

            let rows = aggregate::rows_for(kind, &filtered);
            let mut options = RenderOptions::new(kind.title(), today);
            options.orientation = orientation;
            options.include_metadata = !no_metadata;
            options.metadata = report::metadata_lines(kind, &filters, &filtered, &rows);

            let out_dir = out_dir.unwrap_or_else(|| config.output_dir.clone());
            let mut dialog = ExportDialog::open(kind, rows, &out_dir);
            info!(rows = dialog.row_count(), format = format.label(), "starting export");

            let request = ExportRequest {
                filename,
                options: Some(options),
            };
            match dialog.export(format, request).await {
                Ok(artifact) => println!(
                    "Exported {} rows to {} ({}, {} bytes).",
                    dialog.row_count(),
                    artifact.path.display(),
                    artifact.mime_type,
                    artifact.bytes
                ),
                Err(err) => anyhow::bail!("{}", err.user_notice()),
            }
        }
        Commands::Summary { filters, limit } => {
            let snapshot = cache::load_snapshot(&cache_path)?;
            let filters = filters.into_filters(today);
            let filtered = filter::apply_filters(&snapshot, &filters);
            print!("{}", report::build_summary(&filters, &filtered, limit));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser)]
    struct FilterCli {
        #[command(flatten)]
        filters: FilterArgs,
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn parse(args: &[&str]) -> Result<ReportFilters, clap::Error> {
        let argv = std::iter::once("export").chain(args.iter().copied());
        FilterCli::try_parse_from(argv).map(|cli| cli.filters.into_filters(today()))
    }

    #[test]
    fn since_days_builds_a_trailing_window() {
        let filters = parse(&["--since-days", "7", "--class", "4B"]).unwrap();
        assert_eq!(filters.date_range.from, NaiveDate::from_ymd_opt(2026, 10, 12));
        assert_eq!(filters.date_range.to, Some(today()));
        assert_eq!(filters.class, ClassFilter::SpecificClass("4B".to_string()));
        assert_eq!(filters.subject, SubjectFilter::AllSubjects);
    }

    #[test]
    fn explicit_bounds_pass_through() {
        let filters = parse(&["--from", "2026-02-01", "--to", "2026-02-28"]).unwrap();
        assert_eq!(filters.date_range.from, NaiveDate::from_ymd_opt(2026, 2, 1));
        assert_eq!(filters.date_range.to, NaiveDate::from_ymd_opt(2026, 2, 28));

        let open_ended = parse(&["--to", "2026-02-28"]).unwrap();
        assert_eq!(open_ended.date_range.from, None);
        assert!(parse(&[]).unwrap().date_range.is_unbounded());
    }

    #[test]
    fn since_days_conflicts_with_explicit_bounds() {
        for args in [
            ["--since-days", "7", "--to", "2026-01-01"],
            ["--since-days", "7", "--from", "2026-01-01"],
        ] {
            let err = parse(&args).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
        }
    }

    #[test]
    fn oversized_since_days_does_not_panic() {
        let filters = parse(&["--since-days", "1000000000000"]).unwrap();
        assert_eq!(filters.date_range.from, Some(NaiveDate::MIN));
    }
}

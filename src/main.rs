use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ftth_survey_dashboard::config::Config;
use ftth_survey_dashboard::dashboard::{self, DashboardState};
use ftth_survey_dashboard::filter::FilterRequest;
use ftth_survey_dashboard::models::Month;
use ftth_survey_dashboard::report;
use ftth_survey_dashboard::store::UploadStore;
use ftth_survey_dashboard::summary::Summaries;

#[derive(Parser)]
#[command(name = "ftth-survey-dashboard")]
#[command(about = "Summarize FTTH field-survey exports by technician and month", long_about = None)]
struct Cli {
    /// TOML file overriding column names and the upload directory
    #[arg(long, global = true, env = "FTTH_DASHBOARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the values available for each filter
    Facets {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print survey counts by technician and by technician and month
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Write a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Dump the dashboard state as JSON for a chart front end
    Export {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        filters: FilterArgs,
        /// Defaults to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Survey workbook (xlsx, xlsm, xls) or a CSV export of its first sheet
    #[arg(long)]
    input: PathBuf,
    /// Keep a copy of the input in the upload directory
    #[arg(long)]
    keep_upload: bool,
    #[arg(long, env = "FTTH_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,
}

#[derive(Args, Default)]
struct FilterArgs {
    #[arg(long = "tech")]
    techs: Vec<String>,
    #[arg(long = "month")]
    months: Vec<Month>,
    #[arg(long = "day")]
    days: Vec<NaiveDate>,
    #[arg(long = "year")]
    years: Vec<i32>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
    #[arg(long)]
    min_drop: Option<f64>,
    #[arg(long)]
    max_drop: Option<f64>,
    #[arg(long)]
    min_hours: Option<f64>,
    #[arg(long)]
    max_hours: Option<f64>,
}

impl FilterArgs {
    fn into_request(self) -> FilterRequest {
        FilterRequest {
            technicians: given(self.techs),
            months: given(self.months),
            days: given(self.days),
            years: given(self.years),
            from: self.from,
            to: self.to,
            min_drop_length: self.min_drop,
            max_drop_length: self.max_drop,
            min_prep_hours: self.min_hours,
            max_prep_hours: self.max_hours,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ftth_survey_dashboard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Facets { source } => {
            let state = load(&source, FilterArgs::default(), &config)?;
            let facets = &state.ingest.facets;
            println!("Techs: {}", join(&facets.technicians));
            println!("Months: {}", join(&facets.months));
            println!("Days: {}", join(&facets.days));
            println!("Years: {}", join(&facets.years));
            if let Some((lo, hi)) = facets.drop_length_span {
                println!("Drop length: {lo} to {hi}");
            }
            if let Some((lo, hi)) = facets.prep_hours_span {
                println!("Prep hours: {lo} to {hi}");
            }
        }
        Commands::Summary { source, filters } => {
            let state = load(&source, filters, &config)?;
            let tables = match &state.view.summaries {
                Summaries::NoMatchingRecords => {
                    println!("No matching records.");
                    return Ok(());
                }
                Summaries::Tables(tables) => tables,
            };

            println!("Survey counts by tech:");
            for (tech, count) in &tables.by_technician {
                println!("- {tech}: {count}");
            }
            println!();
            print!("{}", report::render_pivot(&tables.pivot));
        }
        Commands::Report {
            source,
            filters,
            out,
        } => {
            let state = load(&source, filters, &config)?;
            let report = report::build_report(&display_name(&source.input), &state);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            source,
            filters,
            out,
        } => {
            let state = load(&source, filters, &config)?;
            let json = serde_json::to_string_pretty(&state)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Dashboard state written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn load(source: &SourceArgs, filters: FilterArgs, config: &Config) -> anyhow::Result<DashboardState> {
    let bytes = std::fs::read(&source.input)
        .with_context(|| format!("failed to read {}", source.input.display()))?;

    let state = dashboard::compute_dashboard_state(&bytes, &filters.into_request(), config)
        .with_context(|| format!("cannot build dashboard from {}", source.input.display()))?;

    // rejected uploads are never stored
    if source.keep_upload {
        let dir = source.upload_dir.as_ref().unwrap_or(&config.upload_dir);
        UploadStore::new(dir).save(&display_name(&source.input), &bytes)?;
    }

    Ok(state)
}

/// An omitted repeatable flag keeps the full domain for that facet.
fn given<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn join<T: std::fmt::Display>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

mod aggregate;
mod export;
mod loader;
mod models;
mod pipeline;
mod report;

use models::Dataset;

#[derive(Parser)]
#[command(name = "audience-insights")]
#[command(about = "Demographic analytics over a social-network audience dataset", long_about = None)]
struct Cli {
    /// Source dataset (CSV, or TSV for .tsv/.txt files)
    #[arg(long, global = true, default_value = "pseudo_facebook.csv")]
    csv: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Earliest birth date to keep (inclusive, YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Latest birth date to keep (inclusive, YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Gender to keep; repeat the flag to keep several (default: all)
    #[arg(long)]
    gender: Vec<String>,
    /// Minimum age to keep (inclusive)
    #[arg(long)]
    min_age: Option<u32>,
    /// Maximum age to keep (inclusive)
    #[arg(long)]
    max_age: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an overview of the filtered dataset
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
        /// Emit machine-readable JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write the overview to a markdown file
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write one of the summary tables as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum)]
        table: TableKind,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print binned counts of a numeric column
    Distribution {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value = "age")]
        column: MetricColumn,
        #[arg(long, default_value_t = 30)]
        bins: usize,
    },
    /// Print the first rows of the filtered dataset
    Preview {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TableKind {
    Gender,
    Age,
    TimeSeries,
    GenderAge,
    Pivot,
    Records,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MetricColumn {
    Age,
    FriendCount,
    Likes,
    LikesReceived,
    MobileLikes,
    Tenure,
    EngagementRate,
    ClickThroughRate,
}

impl MetricColumn {
    fn value_column(self) -> aggregate::ValueColumn {
        match self {
            MetricColumn::Age => aggregate::ValueColumn::Age,
            MetricColumn::FriendCount => aggregate::ValueColumn::FriendCount,
            MetricColumn::Likes => aggregate::ValueColumn::Likes,
            MetricColumn::LikesReceived => aggregate::ValueColumn::LikesReceived,
            MetricColumn::MobileLikes => aggregate::ValueColumn::MobileLikes,
            MetricColumn::Tenure => aggregate::ValueColumn::Tenure,
            MetricColumn::EngagementRate => aggregate::ValueColumn::EngagementRate,
            MetricColumn::ClickThroughRate => aggregate::ValueColumn::ClickThroughRate,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    // One invocation is one complete pipeline run: load, clean, derive,
    // then answer the query against the frozen dataset.
    let raw = loader::load(&cli.csv)
        .with_context(|| format!("failed to load {}", cli.csv.display()))?;
    let dataset = pipeline::derive(pipeline::clean(raw));

    match cli.command {
        Commands::Summary { filters, json } => {
            let filtered = apply_filters(&dataset, &filters);
            let stats = report::summarize(&dataset, &filtered);
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print!("{}", report::build_summary(&stats));
            }
        }
        Commands::Report { filters, out } => {
            let filtered = apply_filters(&dataset, &filters);
            let stats = report::summarize(&dataset, &filtered);
            std::fs::write(&out, report::build_summary(&stats))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            filters,
            table,
            out,
        } => {
            let filtered = apply_filters(&dataset, &filters);
            let blob = match table {
                TableKind::Gender => export::table_to_csv(&aggregate::gender_totals(&filtered))?,
                TableKind::Age => export::table_to_csv(&aggregate::age_totals(&filtered))?,
                TableKind::TimeSeries => {
                    export::table_to_csv(&aggregate::monthly_series(&filtered))?
                }
                TableKind::GenderAge => {
                    export::table_to_csv(&aggregate::gender_age_totals(&filtered))?
                }
                TableKind::Pivot => export::pivot_to_csv(&aggregate::month_pivot(&filtered))?,
                TableKind::Records => export::records_to_csv(&filtered)?,
            };
            std::fs::write(&out, blob)?;
            println!("Export written to {}.", out.display());
        }
        Commands::Distribution {
            filters,
            column,
            bins,
        } => {
            let filtered = apply_filters(&dataset, &filters);
            let histogram = aggregate::histogram(&filtered, column.value_column(), bins);
            if histogram.bins.is_empty() {
                println!("No records match the active filters.");
            } else {
                println!("Distribution of {}:", histogram.value_column);
                print!("{}", export::histogram_to_csv(&histogram)?);
            }
        }
        Commands::Preview { filters, rows } => {
            let filtered = apply_filters(&dataset, &filters);
            let head = Dataset::new(
                filtered
                    .records()
                    .iter()
                    .take(rows)
                    .cloned()
                    .collect(),
            );
            print!("{}", export::records_to_csv(&head)?);
        }
    }

    Ok(())
}

fn apply_filters(dataset: &Dataset, args: &FilterArgs) -> Dataset {
    let criteria = pipeline::resolve_criteria(
        dataset,
        args.start,
        args.end,
        args.gender.clone(),
        args.min_age,
        args.max_age,
    );
    pipeline::filter(dataset, &criteria)
}

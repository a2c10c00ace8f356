use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use eventsieve::config::{LoggingConfig, SieveConfig};
use eventsieve::filter::{group_by_time, QueryFilter};
use eventsieve::model::Severity;
use eventsieve::pipeline::{Pipeline, PipelineReport, RunOptions};

#[derive(Parser)]
#[command(
    name = "eventsieve",
    about = "Classification, deduplication, severity escalation and correlation of Kubernetes incident streams",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (defaults to $EVENTSIEVE_CONFIG, then /etc/eventsieve/eventsieve.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service hosting the pipeline
    Serve {
        /// Bind address (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run the pipeline once over a JSON file of incident records
    Process {
        /// Input file: a record array or an object with an events/incidents array
        #[arg(long)]
        input: PathBuf,

        /// Deduplication window in minutes (overrides dedup.window_minutes)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        window_minutes: Option<u32>,

        /// Only records in this namespace
        #[arg(long)]
        namespace: Option<String>,

        /// Only records with this incoming severity
        #[arg(long)]
        severity: Option<Severity>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show event counts per fixed time period
    Timeline {
        #[arg(long)]
        input: PathBuf,

        /// Period length in minutes
        #[arg(long, default_value = "5", value_parser = clap::value_parser!(i64).range(1..))]
        period_minutes: i64,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SieveConfig::load(path)?,
        None => SieveConfig::load_or_default(),
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            tracing::info!(%bind, "Starting eventsieve service");
            eventsieve::serve(&bind, config).await?;
        }
        Commands::Process {
            input,
            window_minutes,
            namespace,
            severity,
            json,
        } => {
            let records = eventsieve::load_records(&input)?;
            tracing::info!(path = %input.display(), records = records.len(), "Processing incident records");
            let options = RunOptions {
                query: Some(QueryFilter {
                    namespace,
                    severity,
                    ..Default::default()
                }),
                window_minutes,
                ..Default::default()
            };
            let report = Pipeline::new(config).run_with(&records, &options);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Timeline { input, period_minutes } => {
            let records = eventsieve::load_records(&input)?;
            let groups = group_by_time(&records, chrono::Duration::minutes(period_minutes));
            if groups.is_empty() {
                println!("No timestamped records.");
            } else {
                println!("{:<25} | Events", "Period start");
                println!("{:-<25}-|-{:-<6}", "", "");
                for (start, events) in &groups {
                    println!("{:<25} | {}", start, events.len());
                }
            }
        }
    }

    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("\n=== eventsieve report ({}) ===", report.run_id);
    println!(
        "Records: {}   Aggregates: {}   Occurrences: {}   Alerts: {}",
        report.input_records,
        report.summary.total,
        report.summary.occurrences,
        report.classified.len()
    );

    if report.events.is_empty() {
        println!("\nNo events.");
        return;
    }

    println!(
        "\n{:<9} | {:<5} | {:<16} | {:<32} | Tag",
        "Severity", "Count", "Namespace", "Resource"
    );
    println!("{:-<9}-|-{:-<5}-|-{:-<16}-|-{:-<32}-|-{:-<24}", "", "", "", "", "");
    for aggregate in &report.events {
        let event = &aggregate.event;
        println!(
            "{:<9} | {:<5} | {:<16} | {:<32} | {}",
            event.severity.as_str(),
            aggregate.count,
            event.namespace_or_default(),
            event.resource_name,
            event.tag().unwrap_or("-")
        );
    }

    if !report.alerts.is_empty() {
        println!("\n=== Alerts ===");
        for alert in &report.alerts {
            println!(
                " - [{}] {}/{} {} ({}x): {}",
                alert.event.severity.as_str(),
                alert.event.family,
                alert.event.details.subtype(),
                alert.event.resource,
                alert.count,
                alert.event.message
            );
        }
    }

    if !report.buckets.is_empty() {
        println!("\n=== Correlated ===");
        for bucket in &report.buckets {
            println!(" - {} [{}] {}", bucket.key, bucket.severity, bucket.summary);
            println!("   -> Likely cause: {}", bucket.root_cause);
            for correlation in &bucket.correlations {
                println!(
                    "   -> {:?} ({:.0}%): {}",
                    correlation.kind,
                    correlation.confidence * 100.0,
                    correlation.event_ids.join(", ")
                );
            }
        }
    }
    println!();
}

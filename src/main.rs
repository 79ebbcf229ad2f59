//! CLI entry point for the FAP log analyser.
//!
//! Provides subcommands for analyzing a single log, analyzing a directory of
//! logs concurrently, and averaging previously written analyses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fap_log_analyser::{
    analyzers::aggregate::average_values,
    analyzers::analyzer::analyze_log,
    analyzers::types::{AnalysisResult, AverageResult},
    config::AnalysisConfig,
    fetch::{BasicClient, load_source},
    output::{SegmentSummary, append_record, write_json},
    response::{Response, guard},
};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Instrument;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fap_log_analyser")]
#[command(about = "Analyze diesel engine and particulate filter logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one log from a file, a storage id or a URL
    Analyze {
        /// Path, storage id, or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// JSON file to write the response to (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// CSV file to append one summary row per segment to
        #[arg(long)]
        summary_csv: Option<String>,
    },
    /// Analyze every .csv / .csv.gz log in a directory
    AnalyzeDir {
        /// Directory containing the logs
        #[arg(short = 'd', long)]
        dir: String,

        /// Directory to write one JSON response per log to
        #[arg(short, long, default_value = "analyses")]
        output_dir: String,

        /// Maximum number of logs analyzed at once
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Average analyses written by `analyze` into one summary
    Average {
        /// Analysis JSON files (responses, single results or arrays of results)
        #[arg(value_name = "ANALYSIS_JSON", required = true)]
        inputs: Vec<String>,

        /// JSON file to write the response to (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/fap_log_analyser.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fap_log_analyser.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(AnalysisConfig::from_env()?);

    match cli.command {
        Commands::Analyze {
            source,
            output,
            summary_csv,
        } => {
            let response = analyze_source(&source, config).await;

            if let (Some(path), Some(results)) = (&summary_csv, &response.result) {
                for (i, result) in results.iter().enumerate() {
                    append_record(path, &SegmentSummary::from_result(&source, i, result))?;
                }
            }
            write_json(output.as_deref(), &response)?;
        }
        Commands::AnalyzeDir {
            dir,
            output_dir,
            concurrency,
        } => {
            analyze_dir(&dir, &output_dir, concurrency, config).await?;
        }
        Commands::Average { inputs, output } => {
            let response = average_files(&inputs)?;
            write_json(output.as_deref(), &response)?;
        }
    }

    Ok(())
}

/// Loads and analyzes one log. Failures at any step become a failed response.
#[tracing::instrument(skip(config))]
async fn analyze_source(
    source: &str,
    config: Arc<AnalysisConfig>,
) -> Response<Vec<AnalysisResult>> {
    let client = BasicClient::new();
    let bytes = match load_source(&client, source).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Log fetch failed");
            return Response::failed(source, format!("{e:#}"));
        }
    };
    debug!(bytes = bytes.len(), "Log bytes received, analyzing");

    // CPU-bound; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || guard(|| analyze_log(&bytes, &config))).await;
    match outcome {
        Ok(outcome) => Response::from_outcome(source, outcome),
        Err(e) => Response::failed(source, format!("analysis task failed: {e}")),
    }
}

/// Analyzes every log in `dir` with at most `concurrency` running at once and
/// writes `<output_dir>/<stem>.json` for each.
#[tracing::instrument(skip(config))]
async fn analyze_dir(
    dir: &str,
    output_dir: &str,
    concurrency: usize,
    config: Arc<AnalysisConfig>,
) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {output_dir}"))?;

    let logs = list_logs(dir)?;
    info!(log_count = logs.len(), "Logs ready for analysis");

    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut tasks = vec![];

    for path in logs {
        let sem = semaphore.clone();
        let config = config.clone();
        let target = PathBuf::from(output_dir).join(format!("{}.json", log_stem(&path)));
        let source = path.display().to_string();

        let log_span = tracing::info_span!("process_log", log = %source);

        let task = tokio::spawn(
            async move {
                let Ok(_permit) = sem.acquire().await else {
                    error!("Semaphore closed");
                    return false;
                };

                let response = analyze_source(&source, config).await;
                let ok = response.is_success();
                match write_json(target.to_str(), &response) {
                    Ok(()) if ok => info!("Log analyzed successfully"),
                    Ok(()) => warn!(reason = ?response.message, "Log analysis failed"),
                    Err(e) => error!(error = %e, "Failed to write analysis"),
                }
                ok
            }
            .instrument(log_span),
        );

        tasks.push(task);
    }

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for task in tasks {
        match task.await {
            Ok(true) => succeeded += 1,
            _ => failed += 1,
        }
    }

    info!(succeeded, failed, output_dir, "Finished analyzing directory");
    Ok(())
}

fn list_logs(dir: &str) -> Result<Vec<PathBuf>> {
    let mut logs = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read {dir}"))? {
        let path = entry?.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if path.is_file() && (name.ends_with(".csv") || name.ends_with(".csv.gz")) {
            logs.push(path);
        }
    }
    logs.sort();
    Ok(logs)
}

/// `trip.csv.gz` -> `trip`
fn log_stem(path: &Path) -> String {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("log");
    let name = name.strip_suffix(".gz").unwrap_or(name);
    name.strip_suffix(".csv").unwrap_or(name).to_string()
}

/// Reads analysis files and averages every segment they contain.
#[tracing::instrument(skip(inputs), fields(files = inputs.len()))]
fn average_files(inputs: &[String]) -> Result<Response<AverageResult>> {
    let mut analyses = Vec::new();
    for input in inputs {
        let content = std::fs::read_to_string(input)
            .with_context(|| format!("failed to read {input}"))?;
        let value: Value =
            serde_json::from_str(&content).with_context(|| format!("invalid JSON in {input}"))?;
        collect_analyses(input, value, &mut analyses);
    }
    info!(analyses = analyses.len(), "Analyses loaded");

    let label = inputs.join(",");
    Ok(Response::from_outcome(
        label,
        guard(|| average_values(analyses)),
    ))
}

/// Accepts a response envelope, an array of results, or a single result.
fn collect_analyses(input: &str, value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => out.extend(items),
        Value::Object(mut map) if map.contains_key("status") => {
            match map.remove("result") {
                Some(Value::Array(items)) => out.extend(items),
                Some(Value::Null) | None => warn!(file = input, "Skipping failed analysis"),
                Some(other) => out.push(other),
            }
        }
        other => out.push(other),
    }
}

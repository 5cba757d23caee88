use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use label_check::config::AppConfig;
use label_check::models::job::{JobStatus, UploadFile};
use label_check::services::client::HttpAnalysisClient;
use label_check::services::presenter::{ConsoleObserver, Observers, TracingObserver};
use label_check::Orchestrator;

/// Check food labels against nutrition requirements.
#[derive(Debug, Parser)]
#[command(name = "label-check", version)]
struct Cli {
    /// Label images to upload. Files that are not images are skipped.
    files: Vec<PathBuf>,

    /// Analysis service base URL (overrides SERVER_URL)
    #[arg(long)]
    server_url: Option<String>,

    /// Only log, do not print the result table
    #[arg(long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so the result table owns stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let mut config = AppConfig::from_env()?;
    if let Some(url) = cli.server_url {
        config.server_url = url;
    }

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr.parse()?;
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(%addr, "Prometheus exporter listening");
    }

    metrics::describe_counter!("label_check_jobs_submitted_total", "Image files accepted for upload");
    metrics::describe_counter!("label_check_jobs_succeeded_total", "Jobs that received a verdict");
    metrics::describe_counter!("label_check_jobs_failed_total", "Jobs that ended in failure");
    metrics::describe_counter!("label_check_files_rejected_total", "Submitted files skipped as non-images");
    metrics::describe_counter!("label_check_polls_total", "Status queries for deferred tasks");
    metrics::describe_gauge!("label_check_queue_depth", "Jobs waiting for upload");
    metrics::describe_histogram!("label_check_upload_seconds", "Duration of a single upload request");

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        match UploadFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Cannot read file"),
        }
    }

    tracing::info!(server_url = %config.server_url, files = files.len(), "Starting label check");

    let client = HttpAnalysisClient::new(&config.server_url, config.request_timeout())?;
    let mut observers = Observers::default().with(TracingObserver);
    if !cli.quiet {
        observers = observers.with(ConsoleObserver::new(std::io::stdout()));
    }
    let orchestrator = Orchestrator::with_client(config.orchestrator(), client, Arc::new(observers));

    orchestrator.submit(files);
    orchestrator.settled().await;

    let jobs = orchestrator.snapshot();
    let failed = orchestrator.count(JobStatus::Failed);
    let passed = jobs
        .iter()
        .filter(|j| j.result.as_ref().is_some_and(|r| r.verdict))
        .count();
    tracing::info!(total = jobs.len(), passed, failed, "Label check finished");

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

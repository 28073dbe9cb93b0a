use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use feedharvest::output::write_json_lines;
use feedharvest::{Assembler, Config, FailurePolicy, Harvester, HttpSource, Query, Record};

/// Get the config directory path (~/.config/feedharvest/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("feedharvest");
    Ok(config_dir)
}

#[derive(Parser, Debug)]
#[command(
    name = "feedharvest",
    about = "Harvest every page of an Atom feed search into JSON lines"
)]
struct Args {
    /// Search parameters, e.g. AGENCY_CODE=7504 LAST_MOD_DATE="[2022/01/01, 2022/05/01]"
    #[arg(value_name = "FIELD=VALUE", required = true)]
    params: Vec<String>,

    /// Config file (default: ~/.config/feedharvest/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write records to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Keep going when a page fails and list the failures at the end
    #[arg(long)]
    collect_failures: bool,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn write_records(records: &[Record], output: Option<&Path>) -> Result<usize> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file '{}'", path.display()))?;
            write_json_lines(records, BufWriter::new(file))
                .with_context(|| format!("Failed to write records to '{}'", path.display()))
        }
        None => {
            let stdout = std::io::stdout();
            write_json_lines(records, BufWriter::new(stdout.lock()))
                .context("Failed to write records to stdout")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for records
    let default_filter = if args.verbose {
        "feedharvest=debug"
    } else {
        "feedharvest=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;
    if args.collect_failures {
        config.failure_policy = FailurePolicy::Collect;
    }
    if let Some(secs) = args.timeout {
        config.request_timeout_secs = secs;
    }

    let settings = config.harvest_settings().context("Invalid configuration")?;
    let query = Query::from_args(&args.params).context("Invalid search parameters")?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedharvest/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let source = HttpSource::new(client)
        .with_timeout(config.request_timeout())
        .with_max_bytes(config.max_page_bytes);
    let assembler = Assembler::new(config.workers)?;
    let harvester = Harvester::new(source, settings, assembler);

    let (progress_tx, mut progress_rx) = mpsc::channel::<(usize, usize)>(32);
    let progress = tokio::spawn(async move {
        while let Some((done, total)) = progress_rx.recv().await {
            tracing::info!(done = done, total = total, "Pages fetched");
        }
    });

    let result = harvester.run(&query, Some(progress_tx)).await;
    // The sender was dropped with the run, so the logger drains and exits
    let _ = progress.await;
    let harvest = result.context("Harvest failed")?;

    let written = write_records(&harvest.records, args.output.as_deref())?;
    tracing::info!(records = written, pages = harvest.pages, "Records written");

    if !harvest.failures.is_empty() {
        let mut stderr = std::io::stderr().lock();
        writeln!(stderr, "Warning: {} page(s) failed:", harvest.failures.len())?;
        for failure in &harvest.failures {
            writeln!(stderr, "  {}", failure)?;
        }
        std::process::exit(2);
    }

    Ok(())
}

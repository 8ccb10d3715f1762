//! # Lead Enricher CLI
//!
//! Command-line interface for the lead enricher library (`lead_enricher_core`).
//! Parses arguments, builds configuration, and either enriches every ready row of
//! a JSON sheet or resolves a single lead given on the command line.

use lead_enricher_core::store::{JsonSheetStore, LeadStore};
use lead_enricher_core::{
    check_smtp_connectivity, enrich_single_lead, initialize_enricher, AppError, Config,
    ConfigBuilder, EmailStatus, LeadEnricher, RowOutcome, RowState, RunSummary,
};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Finds and verifies corporate email addresses for lead rows.",
    long_about = "Lead Enricher resolves a company domain from website fields, generates candidate addresses from the person's name, and verifies them with MX lookups and non-sending SMTP probes."
)]
struct AppArgs {
    /// JSON sheet (array of row objects) to enrich in place (file mode).
    #[arg(short, long, env = "LEAD_ENRICHER_INPUT", required_unless_present = "name")]
    input: Option<String>,

    /// Write results here instead of back into the input sheet.
    #[arg(short, long, env = "LEAD_ENRICHER_OUTPUT")]
    output: Option<String>,

    /// Full name of a single lead (enables single lead mode). Requires --website.
    #[arg(long, env = "LEAD_ENRICHER_NAME", requires = "website")]
    name: Option<String>,

    /// Company website or domain of the single lead. Requires --name.
    #[arg(long, env = "LEAD_ENRICHER_WEBSITE", requires = "name")]
    website: Option<String>,

    /// Print a human-readable result instead of JSON (single lead mode).
    #[arg(long, default_value = "false", env = "LEAD_ENRICHER_STDOUT")]
    stdout: bool,

    /// Path to a configuration file (TOML format). CLI args override file settings.
    #[arg(long, env = "LEAD_ENRICHER_CONFIG")]
    config_file: Option<String>,

    /// Skip SMTP probing entirely; results are heuristic.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "LEAD_ENRICHER_DISABLE_SMTP")]
    disable_smtp: Option<bool>,

    /// Do not test outbound SMTP connectivity at startup.
    #[arg(long, default_value = "false", env = "LEAD_ENRICHER_SKIP_CONNECTIVITY_CHECK")]
    skip_connectivity_check: bool,

    /// Sender for `MAIL FROM`. Defaults to the null reverse-path.
    #[arg(long, env = "LEAD_ENRICHER_SMTP_SENDER")]
    smtp_sender: Option<String>,

    /// SMTP connection/command timeout in seconds.
    #[arg(long, env = "LEAD_ENRICHER_SMTP_TIMEOUT")]
    smtp_timeout: Option<u64>,

    /// SMTP port to probe.
    #[arg(long, env = "LEAD_ENRICHER_SMTP_PORT")]
    smtp_port: Option<u16>,

    /// Name announced in EHLO.
    #[arg(long, env = "LEAD_ENRICHER_HELO_NAME")]
    helo_name: Option<String>,

    /// Attempts per candidate before a host counts as unreachable.
    #[arg(long, env = "LEAD_ENRICHER_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Exchanges tried per domain, in preference order.
    #[arg(long, env = "LEAD_ENRICHER_MAX_MX_HOSTS")]
    max_mx_hosts: Option<usize>,

    /// Lower bound of the pacing delay before each SMTP connection, in ms.
    #[arg(long, env = "LEAD_ENRICHER_MIN_DELAY_MS", requires = "max_delay_ms")]
    min_delay_ms: Option<u64>,

    /// Upper bound of the pacing delay before each SMTP connection, in ms.
    #[arg(long, env = "LEAD_ENRICHER_MAX_DELAY_MS", requires = "min_delay_ms")]
    max_delay_ms: Option<u64>,

    /// DNS resolution timeout in seconds.
    #[arg(long, env = "LEAD_ENRICHER_DNS_TIMEOUT")]
    dns_timeout: Option<u64>,

    /// Comma-separated list of DNS servers to use for lookups.
    #[arg(long, value_delimiter = ',', env = "LEAD_ENRICHER_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,

    /// Treat a domain with an address record but no MX as its own exchange.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "LEAD_ENRICHER_A_RECORD_FALLBACK")]
    a_record_fallback: Option<bool>,

    /// Status value marking rows as ready for enrichment.
    #[arg(long, env = "LEAD_ENRICHER_READY_STATUS")]
    ready_status: Option<String>,
}

/// JSON shape printed in single lead mode.
#[derive(Serialize)]
struct SingleLeadReport<'a> {
    name: &'a str,
    website: &'a str,
    email: Option<&'a str>,
    status: Option<EmailStatus>,
    skipped: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!(
        "Lead Enricher CLI v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let config = match build_config(&args) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(anyhow::anyhow!("Failed to build configuration: {}", e));
        }
    };
    tracing::debug!("Effective configuration loaded: {:?}", *config);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing without writing the current row.");
            ctrl_c_token.cancel();
        }
    });

    let enricher = initialize_enricher(Arc::clone(&config), cancel.clone())
        .context("Failed to initialize enricher")?;

    if config.smtp_enabled && !args.skip_connectivity_check {
        match check_smtp_connectivity(&config).await {
            Ok(_) => tracing::info!(
                "SMTP connectivity test passed (outbound port {} likely open).",
                config.smtp_port
            ),
            Err(e) => {
                tracing::error!("SMTP connectivity test failed: {}", e);
                tracing::warn!("SMTP verification may fail; affected rows will be MX_UNVERIFIABLE.");
                tracing::warn!("Check firewall rules or ISP restrictions, or run with --disable-smtp.");
            }
        }
    }

    let start_time = Instant::now();
    let execution_result = match (args.name.as_deref(), args.website.as_deref()) {
        (Some(name), Some(website)) => process_single_mode(&enricher, &args, name, website).await,
        _ => process_file_mode(&enricher, &args, start_time).await,
    };

    if let Err(e) = execution_result {
        tracing::error!("Execution failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn build_config(args: &AppArgs) -> lead_enricher_core::Result<Config> {
    let mut config_builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if args.disable_smtp == Some(true) {
        config_builder = config_builder.smtp_enabled(false);
    }
    if let Some(ref s) = args.smtp_sender {
        config_builder = config_builder.smtp_sender_email(s);
    }
    if let Some(t) = args.smtp_timeout {
        config_builder = config_builder.smtp_timeout(Duration::from_secs(t));
    }
    if let Some(port) = args.smtp_port {
        config_builder = config_builder.smtp_port(port);
    }
    if let Some(ref helo) = args.helo_name {
        config_builder = config_builder.helo_name(helo);
    }
    if let Some(n) = args.max_attempts {
        config_builder = config_builder.max_verification_attempts(n);
    }
    if let Some(n) = args.max_mx_hosts {
        config_builder = config_builder.max_mx_hosts(n);
    }
    if let (Some(min), Some(max)) = (args.min_delay_ms, args.max_delay_ms) {
        config_builder = config_builder.probe_delay_ms(min, max);
    }
    if let Some(t) = args.dns_timeout {
        config_builder = config_builder.dns_timeout(Duration::from_secs(t));
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            config_builder = config_builder.dns_servers(servers.clone());
        }
    }
    if args.a_record_fallback == Some(true) {
        config_builder = config_builder.a_record_fallback(true);
    }
    if let Some(ref status) = args.ready_status {
        config_builder = config_builder.ready_status(status);
    }

    config_builder.build()
}

async fn process_single_mode(
    enricher: &LeadEnricher,
    args: &AppArgs,
    name: &str,
    website: &str,
) -> Result<()> {
    tracing::info!("Running in single lead mode.");
    let start_time = Instant::now();

    let state = enrich_single_lead(enricher, name, website).await;
    let mut report = SingleLeadReport {
        name,
        website,
        email: None,
        status: None,
        skipped: None,
    };
    match state {
        RowState::Classified(ref result) => {
            report.email = Some(result.email.as_str());
            report.status = Some(result.status);
        }
        RowState::Skipped(reason) => report.skipped = Some(reason.to_string()),
        RowState::Cancelled => return Err(AppError::Cancelled.into()),
        ref other => return Err(anyhow::anyhow!("Lead stopped in unexpected state {:?}", other)),
    }

    if args.stdout {
        print_single_result(&report);
    } else {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize result")?;
        match args.output {
            Some(ref output) => {
                std::fs::write(output, json)
                    .with_context(|| format!("Failed to write result to '{}'", output))?;
                tracing::info!("Result saved to '{}'.", output);
            }
            None => println!("{}", json),
        }
    }

    tracing::info!("Single lead mode finished. Duration: {:.2?}", start_time.elapsed());
    Ok(())
}

async fn process_file_mode(enricher: &LeadEnricher, args: &AppArgs, start_time: Instant) -> Result<()> {
    let input = args
        .input
        .as_deref()
        .context("--input is required unless --name and --website are given")?;
    let input_path = Path::new(input);
    if !input_path.is_file() {
        return Err(anyhow::anyhow!("Input file not found or is not a file: {}", input));
    }

    tracing::info!(
        "Running in file mode. Input: '{}', Output: '{}'",
        input,
        args.output.as_deref().unwrap_or(input)
    );

    let mut store = JsonSheetStore::open(input_path, enricher.config().sheet.clone())
        .with_context(|| format!("Failed to load sheet '{}'", input))?;
    if let Some(ref output) = args.output {
        if let Some(parent_dir) = Path::new(output).parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                tracing::debug!("Creating output directory: {}", parent_dir.display());
                std::fs::create_dir_all(parent_dir).with_context(|| {
                    format!("Failed to create output directory '{}'", parent_dir.display())
                })?;
            }
        }
        store = store.with_output(output);
        // the output starts as a copy of the input so unprocessed rows survive
        store
            .persist()
            .with_context(|| format!("Cannot write to output file '{}'", output))?;
    }

    let ready = store.ready_leads().context("Failed to read ready rows")?.len();
    if ready == 0 {
        tracing::warn!("No rows with status '{}' to process.", enricher.config().sheet.ready_status);
        return Ok(());
    }

    let pb = ProgressBar::new(ready as u64);
    pb.set_style(ProgressStyle::default_bar()
         .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | ETA: {eta} | {msg}")
         .context("Failed to set progress bar template")?
         .progress_chars("=> "));
    pb.set_message("Enriching rows...");

    let summary = enricher
        .run(&mut store, |lead, outcome| {
            let label = match outcome {
                RowOutcome::Written(result) => result.status.to_string(),
                RowOutcome::Skipped(reason) => format!("skipped ({})", reason),
                RowOutcome::Cancelled => "cancelled".to_string(),
                RowOutcome::Failed(_) => "failed".to_string(),
            };
            pb.set_message(format!("{}: {}", lead.row, label));
            pb.inc(1);
        })
        .await
        .context("Enrichment run failed")?;

    pb.finish_with_message(format!("Processed {} rows", summary.written + summary.skipped + summary.failed));
    log_summary(&summary, start_time.elapsed());

    if summary.cancelled {
        tracing::warn!("Run was cancelled; remaining rows were left untouched.");
    }
    Ok(())
}

/// Logs a summary of the run to the console using `tracing::info`.
fn log_summary(summary: &RunSummary, duration: Duration) {
    let handled = summary.written + summary.skipped + summary.failed;

    tracing::info!("-------------------- Enrichment Summary --------------------");
    tracing::info!("Ready Rows                  : {}", summary.total);
    tracing::info!("Rows Handled                : {}", handled);
    tracing::info!("  - Written                 : {}", summary.written);
    for status in EmailStatus::ALL {
        tracing::info!("      {:<22}: {}", status.as_str(), summary.count(status));
    }
    tracing::info!("  - Skipped (No Domain/Name): {}", summary.skipped);
    tracing::info!("  - Failed Writes           : {}", summary.failed);
    tracing::info!("Total Time Taken            : {:.2?}", duration);
    if duration.as_secs_f64() > 0.01 && handled > 0 {
        let rate = (handled as f64) / duration.as_secs_f64();
        tracing::info!("Processing Rate             : {:.2} rows/sec", rate);
    }
    tracing::info!("------------------------------------------------------------");
}

/// Prints the single lead result to standard output.
fn print_single_result(report: &SingleLeadReport<'_>) {
    const BLUE: &str = "\x1b[34m";
    const GREEN: &str = "\x1b[32m";
    const YELLOW: &str = "\x1b[33m";
    const RED: &str = "\x1b[31m";
    const RESET: &str = "\x1b[0m";

    println!("\n{BLUE}===== Lead Enricher Result ====={RESET}");
    println!("Name:    {}", report.name);
    println!("Website: {}", report.website);

    if let Some(ref reason) = report.skipped {
        println!("\n{YELLOW}Status: SKIPPED{RESET}");
        println!("Reason: {}", reason);
    } else if let Some(status) = report.status {
        let colour = match status {
            EmailStatus::Deliverable => GREEN,
            EmailStatus::Undeliverable => RED,
            _ => YELLOW,
        };
        println!("\n{colour}Status: {}{RESET}", status);
        match report.email {
            Some(email) if !email.is_empty() => println!("Email:  {colour}{}{RESET}", email),
            _ => println!("Email:  (none)"),
        }
    }

    println!("{BLUE}================================{RESET}\n");
}

//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use amendwatch_core::{PartitionReport, Pipeline, ProgressReporter, RunSummary};
use amendwatch_shared::{
    AppConfig, Partition, expand_home, init_config, load_config, load_config_from,
    with_env_overrides,
};
use amendwatch_storage::{RecordStore, Storage};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AmendWatch: track new legislative amendments.
#[derive(Parser)]
#[command(
    name = "amendwatch",
    version,
    about = "Scrape amendment listings, record new amendments and resolve their bills.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.amendwatch/amendwatch.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one ingestion pass.
    Run {
        /// Partition to process (repeatable). Defaults to senate and house.
        #[arg(long = "partition")]
        partitions: Vec<Partition>,

        /// Database path (overrides [storage] db_path).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Do not resolve bill documents.
        #[arg(long)]
        skip_bills: bool,

        /// Do not queue a digest.
        #[arg(long)]
        no_notify: bool,
    },

    /// Print stored amendments for a partition.
    List {
        #[arg(long)]
        partition: Partition,

        #[arg(long)]
        db: Option<PathBuf>,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Print resolved bills.
    Bills {
        #[arg(long)]
        db: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "amendwatch=info,amendwatch_core=info,amendwatch_listing=info,amendwatch_storage=info,amendwatch_shared=info",
        1 => "amendwatch=debug,amendwatch_core=debug,amendwatch_listing=debug,amendwatch_storage=debug,amendwatch_shared=debug",
        _ => "amendwatch=trace,amendwatch_core=trace,amendwatch_listing=trace,amendwatch_storage=trace,amendwatch_shared=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run {
            partitions,
            db,
            skip_bills,
            no_notify,
        } => {
            let config = resolve_config(config_path)?;
            cmd_run(&config, &partitions, db.as_deref(), skip_bills, no_notify).await
        }
        Command::List {
            partition,
            db,
            json,
        } => {
            let config = resolve_config(config_path)?;
            cmd_list(&config, partition, db.as_deref(), json).await
        }
        Command::Bills { db, json } => {
            let config = resolve_config(config_path)?;
            cmd_bills(&config, db.as_deref(), json).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => with_env_overrides(
            load_config_from(path)
                .wrap_err_with(|| format!("loading config from {}", path.display()))?,
        ),
        None => load_config().wrap_err("loading config")?,
    };
    Ok(config)
}

fn db_path(config: &AppConfig, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| expand_home(&config.storage.db_path))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config: &AppConfig,
    partitions: &[Partition],
    db: Option<&Path>,
    skip_bills: bool,
    no_notify: bool,
) -> Result<()> {
    let partitions = if partitions.is_empty() {
        Partition::ALL.to_vec()
    } else {
        partitions.to_vec()
    };

    let path = db_path(config, db);
    let store: Arc<dyn RecordStore> = Arc::new(
        Storage::open(&path)
            .await
            .wrap_err_with(|| format!("opening database {}", path.display()))?,
    );

    let mut pipeline = Pipeline::from_config(config, store).wrap_err("building pipeline")?;
    if skip_bills {
        pipeline = pipeline.without_resolver();
    }
    if no_notify {
        pipeline = pipeline.without_sink();
    }

    info!(
        partitions = ?partitions,
        db = %path.display(),
        skip_bills,
        no_notify,
        "starting run"
    );

    let progress = Arc::new(CliProgress::new());
    let summary = pipeline.run(&partitions, progress).await;

    println!();
    for report in &summary.reports {
        print_report(report);
    }
    println!("  Total new: {}", summary.total_new());
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn print_report(report: &PartitionReport) {
    println!("  [{}]", report.partition);
    match report.fetched {
        Some(rows) => println!("    Listing rows:   {rows}"),
        None => println!("    Listing rows:   fetch failed"),
    }
    if report.reconcile.read_failed {
        println!("    Known set:      scan failed");
    } else {
        println!("    Known:          {}", report.reconcile.known);
    }
    println!("    New:            {}", report.new_records.len());
    if report.reconcile.chunks_failed > 0 {
        println!(
            "    Batches failed: {}/{}",
            report.reconcile.chunks_failed,
            report.reconcile.chunks_failed + report.reconcile.chunks_written
        );
    }
    if report.bills.total() > 0 {
        println!(
            "    Bills:          {} stored, {} known, {} without documents, {} failed",
            report.bills.stored,
            report.bills.already_known,
            report.bills.no_documents,
            report.bills.failed
        );
    }
    println!("    Digest queued:  {}", if report.notified { "yes" } else { "no" });
}

async fn cmd_list(
    config: &AppConfig,
    partition: Partition,
    db: Option<&Path>,
    json: bool,
) -> Result<()> {
    let path = db_path(config, db);
    let storage = Storage::open_readonly(&path)
        .await
        .wrap_err_with(|| format!("opening database {}", path.display()))?;
    let records = storage.scan_amendments(partition).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No {partition} amendments stored.");
        return Ok(());
    }

    println!("{:<8} {:<12} {:<12} {}", "Cal #", "LCO #", "Bill #", "Date");
    for r in &records {
        println!(
            "{:<8} {:<12} {:<12} {}",
            r.calendar_number.trim(),
            r.lco_number.trim(),
            r.bill_number.trim(),
            r.date.trim()
        );
    }
    println!();
    println!("{} {partition} amendment(s)", records.len());
    Ok(())
}

async fn cmd_bills(config: &AppConfig, db: Option<&Path>, json: bool) -> Result<()> {
    let path = db_path(config, db);
    let storage = Storage::open_readonly(&path)
        .await
        .wrap_err_with(|| format!("opening database {}", path.display()))?;
    let bills = storage.list_bills().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&bills)?);
        return Ok(());
    }

    if bills.is_empty() {
        println!("No bills resolved.");
        return Ok(());
    }

    for bill in &bills {
        println!("{}  {}", bill.bill_number, bill.bill_link);
        for link in &bill.document_links {
            println!("    {link}");
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("static template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, partition: Partition, name: &str) {
        self.spinner.set_message(format!("[{partition}] {name}"));
    }

    fn partition_done(&self, report: &PartitionReport) {
        self.spinner.println(format!(
            "  {} done: {} new",
            report.partition,
            report.new_records.len()
        ));
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

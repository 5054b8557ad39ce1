//! Forum-Harvest main entry point
//!
//! This is the command-line interface for the resumable forum crawler.

use clap::{Parser, ValueEnum};
use forum_harvest::config::{load_config_with_hash, Config};
use forum_harvest::output::{load_journal, print_journal, print_run_summary};
use forum_harvest::storage::{RunJournal, RunMode};
use forum_harvest::Harvester;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Forum-Harvest: a resumable forum crawler
///
/// `discover` walks the forum's listing pages and collects topic links into
/// the topic list. `extract` fetches every page of every listed topic and
/// writes the posts into numbered CSV batches. Both modes pick up where an
/// interrupted run left off.
#[derive(Parser, Debug)]
#[command(name = "forum-harvest")]
#[command(version)]
#[command(about = "A resumable forum crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Which pipeline to run
    #[arg(value_enum, required_unless_present = "stats")]
    mode: Option<Mode>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be done without any requests
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show the run journal and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Collect topic links from the listing pages
    Discover,
    /// Fetch every listed topic and save its posts
    Extract,
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Discover => RunMode::Discovery,
            Mode::Extract => RunMode::Extraction,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.stats {
        return handle_stats(&config);
    }

    // Presence is enforced by clap unless --stats was given
    let Some(mode) = cli.mode.map(RunMode::from) else {
        return Err("a mode (discover or extract) is required".into());
    };

    let harvester = Harvester::new(config)?.with_config_hash(config_hash);
    if cli.dry_run {
        handle_dry_run(&harvester, mode)
    } else {
        handle_run(&harvester, mode).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("forum_harvest=info,warn"),
            1 => EnvFilter::new("forum_harvest=debug,info"),
            2 => EnvFilter::new("forum_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the configuration and pending work
fn handle_dry_run(harvester: &Harvester, mode: RunMode) -> Result<(), Box<dyn std::error::Error>> {
    let config = harvester.config();
    print_config(config);

    let plan = harvester.plan(mode)?;
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would run {} over {} units ({} already completed, {} to do)",
        plan.mode,
        plan.total,
        plan.skipped,
        plan.remaining()
    );

    Ok(())
}

fn print_config(config: &Config) {
    println!("=== Forum-Harvest Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  Listing pages: {}..={}", crawler.start_page, crawler.end_page);
    println!("  Max concurrency: {}", crawler.max_concurrency);
    println!("  Batch size: {}", crawler.batch_size);
    println!("  Max attempts: {}", crawler.max_attempts);
    println!("  Request timeout: {}s", crawler.request_timeout_secs);
    println!(
        "  Inter-request delay: {}-{}ms",
        crawler.inter_request_delay.min_ms, crawler.inter_request_delay.max_ms
    );
    println!(
        "  Retry backoff: {}-{}ms",
        crawler.retry_backoff.min_ms, crawler.retry_backoff.max_ms
    );

    println!("\nSite:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Listing page 1: {}", config.site.listing_page_url(1));

    println!("\nOutput:");
    println!("  Topic list: {}", config.output.topic_list);
    println!("  Data directory: {}", config.output.data_dir);
    println!("  Page progress: {}", config.output.pages_progress);
    println!("  Topic progress: {}", config.output.topics_progress);
    if let Some(journal) = &config.output.journal_path {
        println!("  Journal: {}", journal);
    }

    println!("\nUser agents: {}", config.identity.user_agents.len());
}

/// Handles the --stats mode: shows the run journal
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = config.output.journal_path.as_deref() else {
        println!("No journal-path configured; nothing recorded.");
        return Ok(());
    };
    println!("Journal: {}\n", path);

    let journal = RunJournal::open(Path::new(path))?;
    let entries = load_journal(&journal)?;
    print_journal(&entries);

    Ok(())
}

/// Handles a real run; unit failures are reported, not returned
async fn handle_run(harvester: &Harvester, mode: RunMode) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting {} run", mode);

    match harvester.run(mode).await {
        Ok(summary) => {
            if !summary.is_clean() {
                tracing::info!(
                    "{} units still outstanding; run again to retry them",
                    summary.outstanding()
                );
            }
            print_run_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Run failed to start: {}", e);
            Err(e.into())
        }
    }
}

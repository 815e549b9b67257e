//! Quote-Harvester main entry point
//!
//! This is the command-line interface for the Quote-Harvester crawler.

use clap::Parser;
use quote_harvester::config::{load_config_with_hash, Config};
use quote_harvester::jobs::harvest;
use quote_harvester::output::{load_statistics, print_report, print_statistics, write_json};
use quote_harvester::storage::open_storage;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Quote-Harvester: an authenticated quote crawler
///
/// Quote-Harvester logs into a quotes site through its CSRF-protected login
/// form, walks every listing page and stores the extracted quotes with their
/// authors and tags.
#[derive(Parser, Debug)]
#[command(name = "quote-harvester")]
#[command(version)]
#[command(about = "An authenticated quote crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Login name
    #[arg(long, env = "QUOTES_USERNAME")]
    username: Option<String>,

    /// Login password
    #[arg(long, env = "QUOTES_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Also export the records of this run to a JSON file
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Do not write to the database
    #[arg(long)]
    no_store: bool,
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

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        let (Some(username), Some(password)) = (cli.username.as_deref(), cli.password.as_deref())
        else {
            return Err("credentials required: pass --username/--password or set \
                        QUOTES_USERNAME/QUOTES_PASSWORD"
                .into());
        };
        handle_crawl(
            &config,
            &config_hash,
            username,
            password,
            cli.json.as_deref(),
            cli.no_store,
        )
        .await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quote_harvester=info,warn"),
            1 => EnvFilter::new("quote_harvester=debug,info"),
            2 => EnvFilter::new("quote_harvester=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Quote-Harvester Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Login path: {}", config.site.login_path);
    println!("  First page: {}", config.site.first_page_path);
    println!("  Session probe: {}", config.site.probe_path);
    println!("  CSRF field: {}", config.site.csrf_field);
    println!("  Logout marker: {}", config.site.logout_marker);

    println!("\nReference Domains ({}):", config.site.reference_domains.len());
    for pattern in &config.site.reference_domains {
        println!("  - {}", pattern);
    }

    println!("\nRetry:");
    println!("  Max retries: {}", config.retry.max_retries);
    println!("  Base delay: {}ms", config.retry.base_delay_ms);
    println!("  Max delay: {}ms", config.retry.max_delay_ms);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Timeout: {}s", config.http.timeout_secs);

    println!("\nLimits:");
    match config.crawl.page_limit() {
        Some(limit) => println!("  Max pages: {}", limit),
        None => println!("  Max pages: unlimited"),
    }
    match config.crawl.deadline() {
        Some(deadline) => println!("  Deadline: {}s", deadline.as_secs()),
        None => println!("  Deadline: none"),
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    username: &str,
    password: &str,
    json_path: Option<&Path>,
    no_store: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            signal_token.cancel();
        }
    });

    let store = if no_store {
        tracing::info!("Running without a database");
        None
    } else {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        Some(tokio::sync::Mutex::new(storage))
    };

    let summary = match harvest(config, config_hash, username, password, store.as_ref(), cancel)
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    print_report(&summary.report);
    if let Some(run_id) = summary.stored_run {
        println!(
            "  Stored in run #{} ({} saved, {} skipped)",
            run_id, summary.saved, summary.skipped
        );
    }

    if let Some(path) = json_path {
        write_json(&summary.report, path)?;
        println!("✓ Records exported to: {}", path.display());
    }

    Ok(())
}

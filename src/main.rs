//! Lemma-Search main entry point
//!
//! This is the command-line interface for indexing the configured sites and
//! querying the resulting index.

use anyhow::Context;
use clap::Parser;
use lemma_search::config::{load_config_with_hash, Config};
use lemma_search::output::{load_statistics, print_statistics};
use lemma_search::storage::open_storage;
use lemma_search::{
    IndexingGate, IndexingService, SearchEngineError, SearchOutcome, SearchQuery, SearchRanker,
    Storage, TextAnalyzer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Lemma-Search: a language-aware site search engine
///
/// Lemma-Search crawls the configured sites, indexes their text by
/// dictionary root forms and answers ranked queries against that index.
#[derive(Parser, Debug)]
#[command(name = "lemma-search")]
#[command(version = "1.0.0")]
#[command(about = "A language-aware site search engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Index every configured site and wait for the run to finish (default)
    #[arg(long, conflicts_with_all = ["page", "search", "stats", "dry_run"])]
    index: bool,

    /// Stop indexing after this many seconds
    #[arg(long, value_name = "SECS", conflicts_with_all = ["page", "search", "stats", "dry_run"])]
    stop_after: Option<u64>,

    /// Index or re-index a single page
    #[arg(long, value_name = "URL", conflicts_with_all = ["search", "stats", "dry_run"])]
    page: Option<String>,

    /// Search the index
    #[arg(long, value_name = "QUERY", conflicts_with_all = ["stats", "dry_run"])]
    search: Option<String>,

    /// Restrict the search to one site root URL
    #[arg(long, value_name = "URL", requires = "search")]
    site: Option<String>,

    /// Number of results to skip
    #[arg(long, default_value_t = 0, requires = "search")]
    offset: usize,

    /// Maximum number of results to return
    #[arg(long, requires = "search")]
    limit: Option<usize>,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Validate config and show what would be indexed without indexing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let storage: Arc<dyn Storage> = Arc::new(
        open_storage(Path::new(&config.storage.database_path))
            .with_context(|| format!("Failed to open database {}", config.storage.database_path))?,
    );
    let analyzer = Arc::new(TextAnalyzer::new()?);
    let config = Arc::new(config);

    if cli.stats {
        let stats = load_statistics(storage.as_ref(), &config.sites, false, &analyzer)?;
        print_statistics(&stats);
    } else if let Some(query) = cli.search {
        let query = SearchQuery {
            query,
            site: cli.site,
            offset: cli.offset,
            limit: cli.limit,
        };
        handle_search(&config, storage, analyzer, &query)?;
    } else {
        let service = IndexingService::new(
            Arc::clone(&config),
            Arc::clone(&storage),
            Arc::clone(&analyzer),
            Arc::new(IndexingGate::new()),
        )?;

        match cli.page {
            Some(url) => handle_page(&service, &url).await?,
            None => {
                if !cli.index {
                    tracing::debug!("No mode given, indexing every configured site");
                }
                handle_index(&service, cli.stop_after).await?;
                let stats = load_statistics(
                    storage.as_ref(),
                    &config.sites,
                    service.is_indexing(),
                    &analyzer,
                )?;
                print_statistics(&stats);
            }
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("lemma_search=info,warn"),
            1 => EnvFilter::new("lemma_search=debug,info"),
            2 => EnvFilter::new("lemma_search=trace,debug"),
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

/// Handles the --dry-run mode: shows the validated configuration
fn handle_dry_run(config: &Config) {
    println!("=== Lemma-Search Dry Run ===\n");

    let indexing = &config.indexing;
    println!("Indexing Configuration:");
    println!("  Max concurrent fetches: {}", indexing.max_concurrent_fetches);
    println!("  Fetch timeout: {}ms", indexing.fetch_timeout_ms);
    println!("  Connect timeout: {}ms", indexing.connect_timeout_ms);
    println!("  Stop grace period: {}ms", indexing.stop_grace_period_ms);
    println!("  Contention retries: {}", indexing.contention_retries);
    println!("  User agent: {}", indexing.user_agent);

    println!("\nSearch:");
    println!("  Stop-word fraction: {}", config.search.stop_word_fraction);
    println!("  Snippet context: {} words", config.search.snippet_context_words);
    println!("  Default limit: {}", config.search.default_limit);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        println!("  - {} ({})", site.name, site.url);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --search mode: prints one page of ranked results
fn handle_search(
    config: &Config,
    storage: Arc<dyn Storage>,
    analyzer: Arc<TextAnalyzer>,
    query: &SearchQuery,
) -> anyhow::Result<()> {
    let ranker = SearchRanker::new(storage, analyzer, config.search.clone());

    match ranker.search(query)? {
        SearchOutcome::NoSignificantTerms => {
            println!("The query has no significant words");
        }
        SearchOutcome::Matches { total, results } => {
            println!("Found {} matching pages\n", total);
            for result in results {
                println!("[{:.3}] {}{}", result.relevance, result.site_url, result.path);
                println!("  {} - {}", result.site_name, result.title);
                if !result.snippet.is_empty() {
                    println!("  {}", result.snippet);
                }
                println!();
            }
        }
    }

    Ok(())
}

/// Handles the --page mode: re-indexes one page
async fn handle_page(service: &IndexingService, url: &str) -> anyhow::Result<()> {
    let update = service.index_or_reindex_page(url).await;
    if update.ok {
        println!("✓ Indexed {}", url);
        Ok(())
    } else {
        anyhow::bail!(
            "Page update rejected: {}",
            update.error.unwrap_or_default()
        )
    }
}

/// Handles the default mode: a full indexing run
///
/// Ctrl-C or the optional time limit stops the run early.
async fn handle_index(service: &IndexingService, stop_after: Option<u64>) -> anyhow::Result<()> {
    if !service.start_indexing() {
        return Err(SearchEngineError::IndexingInProgress.into());
    }

    let time_limit = async {
        match stop_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = service.wait_for_completion() => {
            tracing::info!("Indexing completed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping indexing");
            service.stop_indexing().await;
        }
        _ = time_limit => {
            tracing::info!("Time limit reached, stopping indexing");
            service.stop_indexing().await;
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use bloomsig::index::stats::show_stats;
use bloomsig::index::{CountingStore, FileStore, IndexConfig, IndexMeta, build_index, load_labels};
use bloomsig::query::{AccessStrategy, BloomIndex, CancelToken};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "bloomsig")]
#[command(about = "Bit-sliced Bloom signature index for multi-term candidate search")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Config file with an [index] section
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index directory
    #[arg(long, global = true, default_value = "bloomsig-index")]
    index: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an index from a file (one document per line) or a directory
    Build {
        /// Corpus file or directory
        corpus: PathBuf,

        /// Replace an existing index
        #[arg(short, long)]
        force: bool,

        /// Buckets per block
        #[arg(long)]
        bloom_size: Option<u32>,

        /// Hash functions per gram
        #[arg(long)]
        num_hashes: Option<u8>,

        /// Gram length terms are split into
        #[arg(long)]
        gram_size: Option<usize>,

        /// Rows per write commit
        #[arg(long)]
        commit_batch_size: Option<usize>,

        /// Hide progress bars
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print candidate documents containing every term
    Search {
        /// Query terms
        #[arg(required = true)]
        terms: Vec<String>,

        /// Bucket fetch strategy
        #[arg(long, value_enum)]
        strategy: Option<AccessStrategy>,

        /// Scan blocks on a worker pool
        #[arg(long)]
        parallel: bool,

        /// Worker threads for --parallel (default: storage_concurrency)
        #[arg(long)]
        threads: Option<usize>,

        /// Cancel the query after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print round trips and timing to stderr
        #[arg(long)]
        stats: bool,

        /// Print each candidate's source label
        #[arg(long)]
        labels: bool,
    },
    /// Show index statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            corpus,
            force,
            bloom_size,
            num_hashes,
            gram_size,
            commit_batch_size,
            quiet,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(v) = bloom_size {
                config.bloom_size = v;
            }
            if let Some(v) = num_hashes {
                config.num_hashes = v;
            }
            if let Some(v) = gram_size {
                config.gram_size = v;
            }
            if let Some(v) = commit_batch_size {
                config.commit_batch_size = v;
            }
            config.validate().context("Invalid index configuration")?;

            let summary = build_index(&corpus, &cli.index, &config, force, quiet)
                .with_context(|| format!("Failed to build index from {}", corpus.display()))?;

            if !quiet {
                println!(
                    "Indexed {} documents into {} blocks ({} rows) at {}",
                    summary.doc_count,
                    summary.block_count,
                    summary.row_count,
                    cli.index.display()
                );
            }
        }
        Commands::Search {
            terms,
            strategy,
            parallel,
            threads,
            timeout_ms,
            stats,
            labels,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(strategy) = strategy {
                config.strategy = strategy;
            }
            if let Some(threads) = threads {
                config.storage_concurrency = threads;
            }
            let query = SearchArgs {
                terms,
                parallel,
                timeout: timeout_ms.map(Duration::from_millis),
                stats,
                labels,
            };
            run_search(&cli.index, &config, &query)?;
        }
        Commands::Stats => {
            show_stats(&cli.index)
                .with_context(|| format!("Failed to read index at {}", cli.index.display()))?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<IndexConfig> {
    IndexConfig::load(path).context("Failed to load configuration")
}

struct SearchArgs {
    terms: Vec<String>,
    parallel: bool,
    timeout: Option<Duration>,
    stats: bool,
    labels: bool,
}

fn run_search(index_dir: &Path, config: &IndexConfig, args: &SearchArgs) -> Result<()> {
    let (index, meta) = BloomIndex::<FileStore>::open(index_dir)
        .with_context(|| format!("Failed to open index at {}", index_dir.display()))?;

    // Query-time knobs from the config; hashing parameters come from meta.json
    let mut effective = config.clone();
    meta.apply_to(&mut effective);
    let strategy = effective.strategy;
    let threads = effective.effective_storage_concurrency();

    let hasher = index.hasher().clone();
    let mut index = BloomIndex::new(CountingStore::new(index.into_store()), hasher)
        .context("Failed to wrap bucket store")?;
    if args.parallel {
        index = index
            .with_concurrency(threads)
            .context("Failed to start scan workers")?;
    }

    let cancel = CancelToken::new();
    let _watchdog = args.timeout.map(|timeout| cancel.cancel_after(timeout));

    let start = Instant::now();
    let outcome = if args.parallel {
        index.search_parallel(&args.terms, strategy, &cancel)
    } else {
        index.search_with_cancel(&args.terms, strategy, &cancel)
    }
    .context("Search failed")?;
    let elapsed = start.elapsed();

    let labels = if args.labels {
        Some(load_labels(index_dir).context("Failed to read document labels")?)
    } else {
        None
    };

    for id in &outcome.doc_ids {
        match labels.as_ref().and_then(|l| l.get(*id as usize)) {
            Some(label) => println!("{}\t{}", id, label),
            None => println!("{}", id),
        }
    }

    if args.stats {
        print_stats(&meta, &index, &outcome, strategy, elapsed);
    }

    Ok(())
}

fn print_stats(
    meta: &IndexMeta,
    index: &BloomIndex<CountingStore<FileStore>>,
    outcome: &bloomsig::query::SearchOutcome,
    strategy: AccessStrategy,
    elapsed: Duration,
) {
    eprintln!("strategy:       {}", strategy);
    eprintln!("candidates:     {}", outcome.doc_ids.len());
    eprintln!(
        "blocks:         {} scanned, {} matched (of {})",
        outcome.blocks_scanned, outcome.blocks_matched, meta.block_count
    );
    eprintln!("round trips:    {}", index.store().round_trips());
    eprintln!("rows requested: {}", index.store().rows_requested());
    eprintln!("elapsed:        {:.2?}", elapsed);
}

use anyhow::{Context, Result};
use book_enricher::config::{load_config, Config, ENV_VARS};
use book_enricher::pipeline::{EnrichmentPipeline, PipelineError, RunSummary};
use book_enricher::store::{MemoryBookStore, PgBookStore};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Book Enricher - Backfill page counts, genres and descriptions from public catalogs
#[derive(Parser, Debug)]
#[command(name = "book-enricher")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Backfill missing book metadata from Open Library and Google Books", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the enrichment pipeline against the database (default)
    Run(RunArgs),

    /// Look up one ISBN in the catalogs and print the merged result as JSON
    Lookup {
        /// ISBN-10 or ISBN-13, hyphens and spaces allowed
        isbn: String,
    },

    /// Print the effective configuration (secrets redacted)
    Config,
}

#[derive(clap::Args, Debug, Default, Clone)]
struct RunArgs {
    /// Candidates selected and committed per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop after this many candidates (0 = no cap)
    #[arg(long)]
    max_books: Option<usize>,

    /// Pause after each candidate's lookups, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Minutes before a record is attempted again
    #[arg(long)]
    cooldown_minutes: Option<u32>,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(batch_size) = self.batch_size {
            config.enrichment.batch_size = batch_size.max(1);
        }
        if let Some(max_books) = self.max_books {
            config.enrichment.max_books = (max_books > 0).then_some(max_books);
        }
        if let Some(delay_ms) = self.delay_ms {
            config.enrichment.request_delay_ms = delay_ms;
        }
        if let Some(minutes) = self.cooldown_minutes {
            config.enrichment.attempt_cooldown_minutes = minutes;
        }
    }
}

/// Print all recognized environment variables
fn print_env_vars() {
    println!("Book Enricher - Environment Variables");
    println!();
    for (name, alternate, description) in ENV_VARS {
        let names = match alternate {
            Some(alt) => format!("{} / {}", name, alt),
            None => name.to_string(),
        };
        println!("  {:<28} {}", names, description);
    }
    println!();
    println!("Other Settings:");
    println!("  {:<28} Rust logging filter (e.g., debug, book_enricher=trace)", "RUST_LOG");
    println!();
    println!("A .env file in the working directory is loaded at startup.");
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("book_enricher={}", level)));

    let fmt_layer = if config.logging.is_json() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Drive a run to completion unless `interrupt` resolves first, which is an error
async fn run_or_interrupt<R, I>(run: R, interrupt: I) -> Result<RunSummary>
where
    R: Future<Output = Result<RunSummary, PipelineError>>,
    I: Future,
{
    tokio::select! {
        result = run => result.context("Enrichment run failed"),
        _ = interrupt => {
            tracing::warn!("Interrupted, the batch in progress was not committed");
            Err(anyhow::anyhow!("Interrupted before the run finished"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show environment variables and exit if requested
    if cli.env {
        print_env_vars();
        return Ok(());
    }

    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(Commands::Run(args)) = &cli.command {
        args.apply(&mut config);
    }

    init_tracing(&cli, &config);
    if let Ok(path) = dotenv {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let show_progress = !cli.quiet && std::io::stderr().is_terminal();

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(_) => {
            let store = PgBookStore::connect(&config.database)
                .await
                .context("Failed to connect to PostgreSQL")?;

            let pipeline = EnrichmentPipeline::from_config(store, &config)
                .context("Failed to set up catalog sources")?
                .with_progress(show_progress);

            let summary = run_or_interrupt(pipeline.run(), tokio::signal::ctrl_c()).await?;
            if !cli.quiet {
                eprintln!(
                    "Done: {} processed in {} batches, {} updated, {} invalid ISBNs, {} failed lookups",
                    summary.processed,
                    summary.batches,
                    summary.updated,
                    summary.invalid_isbns,
                    summary.lookup_failures
                );
            }
        }

        Commands::Lookup { isbn } => {
            // Lookups never touch the database
            let pipeline = EnrichmentPipeline::from_config(MemoryBookStore::new(), &config)
                .context("Failed to set up catalog sources")?;

            let report = pipeline
                .lookup(&isbn)
                .await
                .with_context(|| format!("Not a valid ISBN: {}", isbn))?;

            if !cli.quiet {
                eprintln!("Normalized ISBN: {}", report.isbn13);
                if report.fallback.is_none() {
                    eprintln!("Primary source answer was complete, fallback skipped");
                }
            }
            println!("{}", serde_json::to_string_pretty(&report.merged)?);
        }

        Commands::Config => {
            let rendered = toml::to_string_pretty(&config.redacted())
                .context("Failed to render configuration")?;
            println!("{}", rendered);
        }
    }

    Ok(())
}

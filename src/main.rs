//! # Postmind CLI
//!
//! The `postmind` binary drives the service: database initialization,
//! feed synchronization, retrieval, one-shot grounded answers, and the
//! HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! postmind --config ./config/postmind.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `postmind init` | Create the SQLite database and run schema migrations |
//! | `postmind sync` | Ingest the remote feed, embedding what changed |
//! | `postmind search "<query>"` | Retrieve the posts most similar to a query |
//! | `postmind ask "<question>"` | Answer a question grounded in retrieved posts |
//! | `postmind models` | List supported generation model ids |
//! | `postmind serve` | Start the HTTP API server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use postmind::{answer, config, db, embedding, llm, migrate, search, server, sync};

/// Postmind — retrieval-augmented answering over a social post feed.
#[derive(Parser)]
#[command(
    name = "postmind",
    about = "Retrieval-augmented answering over a social post feed",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/postmind.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file and the documents/document_vectors tables.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Synchronize the remote feed into the local store.
    ///
    /// Fetches the feed, classifies each record as new/updated/unchanged,
    /// re-embeds only what changed, and upserts records with their
    /// vectors. Re-running against unchanged source data is a no-op.
    Sync,

    /// Retrieve the posts most similar to a query.
    Search {
        /// The query text.
        query: String,

        /// Number of results to return.
        #[arg(long)]
        k: Option<usize>,
    },

    /// Ask a question and print the grounded answer.
    Ask {
        /// The question text.
        question: String,

        /// Logical model id (see `postmind models`).
        #[arg(long)]
        model: Option<String>,

        /// Number of posts to ground the answer on.
        #[arg(long)]
        k: Option<usize>,
    },

    /// List supported generation model ids and their providers.
    Models,

    /// Start the HTTP API server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // No config needed to print the static route table.
    if matches!(cli.command, Commands::Models) {
        llm::list_models();
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync => {
            sync::run_sync(&cfg).await?;
        }
        Commands::Search { query, k } => {
            search::run_search(&cfg, &query, k).await?;
        }
        Commands::Ask { question, model, k } => {
            server::init_tracing();
            run_ask(&cfg, &question, model, k).await?;
        }
        Commands::Models => unreachable!(),
        Commands::Serve => {
            server::init_tracing();
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

/// One-shot grounded answer on stdout: the HTTP flow without the HTTP hop.
async fn run_ask(
    cfg: &config::Config,
    question: &str,
    model: Option<String>,
    k: Option<usize>,
) -> anyhow::Result<()> {
    migrate::run_migrations(cfg).await?;

    let pool = db::connect(cfg).await?;
    let provider = embedding::create_provider(&cfg.embedding)?;
    let model_id = model.unwrap_or_else(|| cfg.generation.default_model_id.clone());
    let k = k.unwrap_or(cfg.retrieval.default_k);

    let result =
        answer::answer_question(&pool, cfg, provider.as_ref(), question, &model_id, k).await?;

    println!("model: {}", result.model_id);
    println!("grounded on {} post(s)", result.retrieved.len());
    println!();
    println!("{}", result.answer);

    pool.close().await;
    Ok(())
}

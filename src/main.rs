//! # semdex CLI
//!
//! ## Usage
//!
//! ```bash
//! semdex --config ./config/semdex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `semdex init` | Create the SQLite database and run schema migrations |
//! | `semdex index [PATH]` | Index a directory tree in the foreground |
//! | `semdex upload FILE...` | Store files in the blob store and index them |
//! | `semdex search "<query>"` | Semantic search |
//! | `semdex stats` | Document count and classification facets |
//! | `semdex list` | List stored documents |
//! | `semdex delete <id>` | Delete one document |
//! | `semdex clear` | Delete every document |
//! | `semdex serve` | Start the HTTP API |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use semdex::progress::ProgressMode;
use semdex::{commands, config, logging, server};

/// semdex: document ingestion, AI enrichment, and semantic search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/semdex.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "semdex",
    about = "semdex: index documents with embeddings and AI labels, then search them semantically",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/semdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Index every supported file under a directory.
    ///
    /// Runs in the foreground; Ctrl-C stops scheduling new files and
    /// prints what was indexed so far.
    Index {
        /// Directory to index. Defaults to `[indexing].root`.
        path: Option<PathBuf>,

        /// Delete all stored documents before indexing.
        #[arg(long)]
        reindex: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Upload files to the blob store and index them.
    Upload {
        /// Files to upload.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search indexed documents.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show document count and distinct categories, teams, and projects.
    Stats,

    /// List stored documents, newest first.
    List,

    /// Delete one document by id.
    Delete {
        /// Document id.
        id: String,
    },

    /// Delete every stored document.
    Clear,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            logging::init();
            return Err(e);
        }
    };
    logging::init_with_config(&cfg.logging);

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Index {
            path,
            reindex,
            progress,
        } => {
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            commands::run_index(&cfg, path, reindex, progress).await?;
        }
        Commands::Upload { files } => commands::run_upload(&cfg, &files).await?,
        Commands::Search { query, limit } => commands::run_search(&cfg, &query, limit).await?,
        Commands::Stats => commands::run_stats(&cfg).await?,
        Commands::List => commands::run_list(&cfg).await?,
        Commands::Delete { id } => commands::run_delete(&cfg, &id).await?,
        Commands::Clear => commands::run_clear(&cfg).await?,
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}

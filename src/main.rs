//! # msearch
//!
//! Command-line client for the media search service.
//!
//! ## Usage
//!
//! ```bash
//! msearch --config ./config/msearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `msearch search [TERM]` | Run one search and print the results |
//! | `msearch resolve [TERM]` | Show the request a query maps to, offline |
//! | `msearch browse` | Interactive session over stdin |

use clap::{Args, Parser, Subcommand};
use media_search::config::{self, Config};
use media_search::core::{ScrollMode, SearchMode};
use media_search::logging;
use media_search::render::OutputFormat;
use media_search::search::{self as search_cmd, QueryArgs, SearchOptions};
use media_search::session;
use std::path::PathBuf;

/// msearch: search a media archive by text, identifier, photographer, or
/// date range, with paginated or infinite scrolling.
#[derive(Parser)]
#[command(name = "msearch", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/msearch.toml")]
    config: PathBuf,

    /// Log at debug level (overrides RUST_LOG and `[logging].level`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search and print the results.
    ///
    /// In paginated mode, fetches page 1 and then `--page`. In infinite
    /// mode, fetches up to `--chunks` consecutive chunks.
    Search {
        #[command(flatten)]
        query: QueryFlags,

        /// Page to show (paginated mode).
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Scroll mode; defaults to `[search].scroll_mode`.
        #[arg(long, value_parser = parse_scroll)]
        scroll: Option<ScrollMode>,

        /// Number of chunks to load (infinite mode).
        #[arg(long, default_value_t = 1)]
        chunks: u32,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the request URL and dedupe key for a query without sending it.
    Resolve {
        #[command(flatten)]
        query: QueryFlags,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Continuation cursor (implies infinite scroll).
        #[arg(long)]
        cursor: Option<String>,

        #[arg(long, value_parser = parse_scroll)]
        scroll: Option<ScrollMode>,
    },

    /// Interactive session: type `help` for commands.
    Browse,
}

#[derive(Args)]
struct QueryFlags {
    /// Search term (text, identifier, or photographer name).
    term: Option<String>,

    /// Search mode: `default`, `id`, `author`, or `date`.
    #[arg(long = "by", default_value = "default", value_parser = parse_mode)]
    mode: SearchMode,

    /// Start date for `--by date` (YYYY-MM-DD).
    #[arg(long)]
    from: Option<String>,

    /// End date for `--by date` (YYYY-MM-DD).
    #[arg(long)]
    to: Option<String>,
}

impl From<QueryFlags> for QueryArgs {
    fn from(f: QueryFlags) -> Self {
        QueryArgs {
            term: f.term,
            mode: f.mode,
            from: f.from,
            to: f.to,
        }
    }
}

fn parse_mode(s: &str) -> Result<SearchMode, String> {
    s.parse().map_err(|e: media_search::core::QueryError| e.to_string())
}

fn parse_scroll(s: &str) -> Result<ScrollMode, String> {
    match s.to_ascii_lowercase().as_str() {
        "paginated" | "pages" => Ok(ScrollMode::Paginated),
        "infinite" => Ok(ScrollMode::Infinite),
        other => Err(format!("unknown scroll mode '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `resolve` is offline and works without a config file
    let cfg = match &cli.command {
        Commands::Resolve { .. } => {
            config::load_config(&cli.config).unwrap_or_else(|_| Config::minimal())
        }
        _ => config::load_config(&cli.config)?,
    };
    logging::init_logging(&cfg.logging, cli.verbose);

    match cli.command {
        Commands::Search {
            query,
            page,
            scroll,
            chunks,
            format,
        } => {
            let opts = SearchOptions {
                page,
                scroll,
                chunks,
                format,
            };
            search_cmd::run_search(&cfg, &query.into(), &opts).await?;
        }
        Commands::Resolve {
            query,
            page,
            cursor,
            scroll,
        } => {
            search_cmd::run_resolve(&cfg, &query.into(), page, cursor, scroll)?;
        }
        Commands::Browse => {
            session::run_browse(&cfg).await?;
        }
    }

    Ok(())
}

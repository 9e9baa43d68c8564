//! One-shot commands: `msearch search` and `msearch resolve`.
//!
//! `search` runs a complete session against the configured service and
//! prints the final state. `resolve` only shows what would be requested.

use anyhow::{bail, Result};
use media_search_core::{
    resolve, Cursor, DateRange, DedupeKey, PageContext, Query, ScrollMode, SearchMode,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::render::{self, OutputFormat};
use crate::session::{connect, scroll_to_end};
use crate::transport::request_url;

/// What to search for, as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub term: Option<String>,
    pub mode: SearchMode,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl QueryArgs {
    /// Build the query. Only date parsing can fail here; invariants are
    /// checked later by the synchronizer.
    pub fn to_query(&self) -> Result<Query> {
        match self.mode {
            SearchMode::ByDateRange => {
                let range = DateRange::parse(
                    self.from.as_deref().unwrap_or(""),
                    self.to.as_deref().unwrap_or(""),
                )?;
                Ok(Query::by_date_range(range))
            }
            mode => Ok(Query::new(mode, self.term.clone().unwrap_or_default())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub page: u32,
    pub scroll: Option<ScrollMode>,
    pub chunks: u32,
    pub format: OutputFormat,
}

/// Run one search session and print the result.
///
/// Fails when a fetch exhausted its retries; the final state is printed
/// first so partial results are not lost.
pub async fn run_search(config: &Config, args: &QueryArgs, opts: &SearchOptions) -> Result<()> {
    let query = args.to_query()?;
    let scroll_mode = opts.scroll.unwrap_or(config.search.scroll_mode);
    let mut sync = connect(config, scroll_mode)?;

    if let Err(e) = sync.new_search(query) {
        warn!(error = %e, "query not sent");
        print!("{}", render::render(sync.state(), opts.format));
        return Ok(());
    }
    sync.settle().await;

    if sync.state().error.is_none() {
        match scroll_mode {
            ScrollMode::Paginated if opts.page > 1 => {
                sync.change_page(opts.page);
                sync.settle().await;
            }
            ScrollMode::Paginated => {}
            ScrollMode::Infinite => {
                for chunk in 1..opts.chunks.max(1) {
                    if !scroll_to_end(&mut sync) {
                        info!(chunk, "no further chunks");
                        break;
                    }
                    sync.settle().await;
                    if sync.state().error.is_some() {
                        break;
                    }
                }
            }
        }
    }

    print!("{}", render::render(sync.state(), opts.format));
    if let Some(ref err) = sync.state().error {
        bail!("{}", err);
    }
    Ok(())
}

/// Print the request URL and dedupe key for a query without sending it.
pub fn run_resolve(
    config: &Config,
    args: &QueryArgs,
    page: u32,
    cursor: Option<String>,
    scroll: Option<ScrollMode>,
) -> Result<()> {
    let query = args.to_query()?;
    let (ctx, default_scroll) = match cursor {
        Some(c) => (PageContext::after(Cursor::new(c)), ScrollMode::Infinite),
        None => (PageContext::page(page), config.search.scroll_mode),
    };
    let scroll_mode = scroll.unwrap_or(default_scroll);

    let descriptor = resolve(&query, &ctx, scroll_mode, config.search.page_size)?;
    let url = request_url(&config.base_url()?, &descriptor).map_err(anyhow::Error::msg)?;

    println!("GET {}", url);
    println!("key: {}", DedupeKey::new(&query, &ctx));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_args_date_range() {
        let args = QueryArgs {
            mode: SearchMode::ByDateRange,
            from: Some("2020-01-01".into()),
            to: Some("2020-02-01".into()),
            ..Default::default()
        };
        let q = args.to_query().unwrap();
        assert!(q.validate().is_ok());

        let bad = QueryArgs {
            mode: SearchMode::ByDateRange,
            from: Some("01.01.2020".into()),
            ..Default::default()
        };
        assert!(bad.to_query().is_err());
    }

    #[test]
    fn test_query_args_term_optional() {
        let args = QueryArgs {
            mode: SearchMode::ByAuthor,
            ..Default::default()
        };
        let q = args.to_query().unwrap();
        assert_eq!(q.mode(), SearchMode::ByAuthor);
        assert!(q.validate().is_err());
    }
}

//! Interactive browse session (`msearch browse`).
//!
//! Reads one command per line and drives a [`Synchronizer`]. Input lines
//! and fetch completions are multiplexed with `tokio::select!`, so the
//! prompt stays responsive while requests are in flight and a new command
//! can supersede a slow one.

use anyhow::Result;
use media_search_core::{DateRange, Query, ScrollMode, SentinelHandle, SyncState};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::config::Config;
use crate::coordinator::RequestCoordinator;
use crate::render;
use crate::sync::{Synchronizer, Transition};
use crate::transport::HttpTransport;

const HELP: &str = "\
commands:
  search <text>        full-text search
  id <id>              look up an image identifier
  author <name>        search by photographer
  date <from> <to>     search a date range (YYYY-MM-DD)
  page <n> | next | prev
  mode                 toggle paginated / infinite scroll
  more                 load the next chunk (infinite scroll)
  show                 print the current results
  retry                repeat the last failed fetch
  help | quit";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(Query),
    Page(u32),
    Next,
    Prev,
    Mode,
    More,
    Show,
    Retry,
    Help,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "search" | "s" => Command::Search(Query::text_search(rest)),
        "id" => Command::Search(Query::by_id(rest)),
        "author" => Command::Search(Query::by_author(rest)),
        "date" => {
            let mut bounds = rest.split_whitespace();
            let from = bounds.next().unwrap_or("");
            let to = bounds.next().unwrap_or("");
            let range = DateRange::parse(from, to).map_err(|e| e.to_string())?;
            Command::Search(Query::by_date_range(range))
        }
        "page" | "p" => {
            let n = rest
                .parse::<u32>()
                .map_err(|_| format!("invalid page number '{}'", rest))?;
            Command::Page(n)
        }
        "next" | "n" => Command::Next,
        "prev" => Command::Prev,
        "mode" | "m" => Command::Mode,
        "more" => Command::More,
        "show" | "ls" => Command::Show,
        "retry" | "r" => Command::Retry,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{}' (try 'help')", other)),
    };
    Ok(cmd)
}

/// Build a synchronizer talking HTTP to the configured service.
pub fn connect(config: &Config, scroll_mode: ScrollMode) -> Result<Synchronizer> {
    let transport = HttpTransport::new(config.timeout())?;
    let coordinator = RequestCoordinator::new(
        Arc::new(transport),
        config.base_url()?,
        config.retry.policy(),
    );
    Ok(Synchronizer::new(
        Arc::new(coordinator),
        config.search.page_size,
        scroll_mode,
    ))
}

/// Make the last result the sentinel and report it visible.
///
/// Returns whether a chunk load was issued.
pub fn scroll_to_end(sync: &mut Synchronizer) -> bool {
    let Some(key) = sync.state().last_key() else {
        return false;
    };
    let handle = SentinelHandle::new(key);
    sync.set_sentinel(Some(handle.clone()));
    sync.sentinel_visibility(&handle, false);
    sync.sentinel_visibility(&handle, true)
}

pub async fn run_browse(config: &Config) -> Result<()> {
    let mut sync = connect(config, config.search.scroll_mode)?;
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    writeln!(stdout, "msearch browse ({} scroll). Type 'help' for commands.", config.search.scroll_mode)?;
    run_session(&mut sync, stdin, &mut stdout).await
}

/// Drive `sync` from `input` until `quit` or end of input.
///
/// At end of input, pending fetches are allowed to finish and the final
/// state is printed.
pub async fn run_session<R, W>(sync: &mut Synchronizer, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    for t in sync.settle().await {
                        report(sync, &t, out)?;
                    }
                    write!(out, "{}", render::render_text(sync.state()))?;
                    break;
                };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(cmd) => handle(sync, cmd, out)?,
                    Err(e) => writeln!(out, "{}", e)?,
                }
            }
            t = sync.next_transition(), if sync.pending() > 0 => {
                report(sync, &t, out)?;
            }
        }
        out.flush()?;
    }
    Ok(())
}

fn handle<W: Write>(sync: &mut Synchronizer, cmd: Command, out: &mut W) -> Result<()> {
    debug!(?cmd, "browse command");
    match cmd {
        Command::Search(query) => {
            if let Err(e) = sync.new_search(query) {
                writeln!(out, "{}", e)?;
            }
        }
        Command::Page(n) => {
            if !sync.change_page(n) {
                writeln!(out, "page changes need a search in paginated mode")?;
            }
        }
        Command::Next => match next_page(sync.state()) {
            Some(target) if sync.change_page(target) => {}
            _ => writeln!(out, "no next page")?,
        },
        Command::Prev => match prev_page(sync.state()) {
            Some(target) if sync.change_page(target) => {}
            _ => writeln!(out, "no previous page")?,
        },
        Command::Mode => {
            let mode = sync.toggle_mode();
            writeln!(out, "scroll mode: {}", mode)?;
        }
        Command::More => {
            if !scroll_to_end(sync) {
                writeln!(out, "nothing more to load")?;
            }
        }
        Command::Show => write!(out, "{}", render::render_text(sync.state()))?,
        Command::Retry => {
            if !sync.retry_last() {
                writeln!(out, "nothing to retry")?;
            }
        }
        Command::Help => writeln!(out, "{}", HELP)?,
        Command::Quit | Command::Empty => {}
    }
    Ok(())
}

/// Page after the current one, if the server reported one.
fn next_page(state: &SyncState) -> Option<u32> {
    let target = state.page.checked_add(1)?;
    (target <= state.total_pages).then_some(target)
}

fn prev_page(state: &SyncState) -> Option<u32> {
    state.page.checked_sub(1).filter(|p| *p >= 1)
}

fn report<W: Write>(sync: &Synchronizer, transition: &Transition, out: &mut W) -> Result<()> {
    match transition {
        Transition::Succeeded { received } => {
            writeln!(out, "received {} items", received)?;
            writeln!(out, "{}", render::footer(sync.state()))?;
        }
        Transition::Failed { error } => writeln!(out, "error: {}", error)?,
        Transition::Superseded => {}
    }
    Ok(())
}

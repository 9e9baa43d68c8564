//! Output rendering for search results.
//!
//! Two formats, mirroring how the CLI is used:
//!
//! - **Text**: one block per item with German fallbacks for missing
//!   attributes, followed by a status footer.
//! - **JSON**: one object with `results`, `page`, `total_pages`, `cursor`
//!   and `error`, for scripts.
//!
//! Everything goes to stdout; logs stay on stderr.

use clap::ValueEnum;
use media_search_core::{MediaItem, ScrollMode, SyncState};
use std::fmt::Write as _;

/// Longest description excerpt shown in text output.
pub const DESCRIPTION_EXCERPT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn render(state: &SyncState, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(state),
        OutputFormat::Json => render_json(state),
    }
}

pub fn render_text(state: &SyncState) -> String {
    let mut out = String::new();

    if state.results.is_empty() {
        out.push_str("No results.\n");
    }
    for (i, item) in state.results.iter().enumerate() {
        let _ = writeln!(out, "{}. {} / {}", i + 1, identifier(item), date(item));
        let _ = writeln!(out, "    author: {}", author(item));
        if let Some(url) = item.best_image() {
            let _ = writeln!(out, "    image: {}", url);
        }
        let _ = writeln!(out, "    {}", description(item));
    }

    let _ = writeln!(out, "{}", footer(state));
    out
}

pub fn render_json(state: &SyncState) -> String {
    let obj = serde_json::json!({
        "results": state.results,
        "page": state.page,
        "total_pages": state.total_pages,
        "cursor": state.cursor.as_ref().map(|c| c.as_str()),
        "error": state.error,
    });
    format!("{}\n", obj)
}

/// One-line status: position, counts, and any error.
pub fn footer(state: &SyncState) -> String {
    let mut line = match state.scroll_mode {
        ScrollMode::Paginated => format!(
            "-- page {} of {} ({} shown)",
            state.page,
            state.total_pages,
            state.results.len()
        ),
        ScrollMode::Infinite => format!(
            "-- {} shown, {}",
            state.results.len(),
            if state.has_more() { "more available" } else { "end of results" }
        ),
    };
    if state.loading {
        line.push_str(", loading...");
    }
    if let Some(ref err) = state.error {
        let _ = write!(line, "\nerror: {}", err);
    }
    line
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

pub fn identifier(item: &MediaItem) -> &str {
    non_empty(item.id.as_ref()).unwrap_or("Unbekannt")
}

pub fn date(item: &MediaItem) -> String {
    match non_empty(item.date.as_ref()) {
        Some(d) => d.chars().take(10).collect(),
        None => "Datum unbekannt".to_string(),
    }
}

pub fn author(item: &MediaItem) -> &str {
    non_empty(item.author.as_ref()).unwrap_or("Fotograf nicht angegeben")
}

pub fn description(item: &MediaItem) -> String {
    match non_empty(item.description.as_ref()) {
        Some(text) if text.chars().count() > DESCRIPTION_EXCERPT => {
            let excerpt: String = text.chars().take(DESCRIPTION_EXCERPT).collect();
            format!("{}...", excerpt)
        }
        Some(text) => text.to_string(),
        None => "Keine Beschreibung verfügbar".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_search_core::Cursor;

    fn item(id: Option<&str>, date: Option<&str>, desc: Option<&str>) -> MediaItem {
        MediaItem {
            db: Some("stock".into()),
            id: id.map(String::from),
            date: date.map(String::from),
            description: desc.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_fallbacks() {
        let bare = item(None, None, None);
        assert_eq!(identifier(&bare), "Unbekannt");
        assert_eq!(date(&bare), "Datum unbekannt");
        assert_eq!(author(&bare), "Fotograf nicht angegeben");
        assert_eq!(description(&bare), "Keine Beschreibung verfügbar");

        let blank = item(Some("  "), Some(""), Some(" "));
        assert_eq!(identifier(&blank), "Unbekannt");
        assert_eq!(date(&blank), "Datum unbekannt");
    }

    #[test]
    fn test_date_truncated_to_day() {
        let it = item(Some("1"), Some("2021-03-04T10:11:12Z"), None);
        assert_eq!(date(&it), "2021-03-04");
    }

    #[test]
    fn test_description_excerpt() {
        let long = "ä".repeat(150);
        let it = item(None, None, Some(&long));
        let d = description(&it);
        assert!(d.ends_with("..."));
        assert_eq!(d.chars().count(), DESCRIPTION_EXCERPT + 3);

        let short = item(None, None, Some("Sonnenuntergang am Meer"));
        assert_eq!(description(&short), "Sonnenuntergang am Meer");
    }

    #[test]
    fn test_text_empty_state() {
        let state = SyncState::new(ScrollMode::Paginated);
        let out = render_text(&state);
        assert!(out.starts_with("No results.\n"));
        assert!(out.contains("page 1 of 0"));
    }

    #[test]
    fn test_text_footer_reports_error() {
        let mut state = SyncState::new(ScrollMode::Infinite);
        state.results.push(item(Some("42"), None, None));
        state.error = Some("search failed after 3 attempts".into());
        let out = render_text(&state);
        assert!(out.contains("1. 42 / Datum unbekannt"));
        assert!(out.contains("end of results"));
        assert!(out.contains("error: search failed after 3 attempts"));
    }

    #[test]
    fn test_json_shape() {
        let mut state = SyncState::new(ScrollMode::Infinite);
        state.results.push(item(Some("42"), None, None));
        state.cursor = Some(Cursor::new("abc"));
        let v: serde_json::Value = serde_json::from_str(&render_json(&state)).unwrap();
        assert_eq!(v["results"][0]["id"], "42");
        assert_eq!(v["page"], 1);
        assert_eq!(v["total_pages"], 0);
        assert_eq!(v["cursor"], "abc");
        assert!(v["error"].is_null());
    }
}

//! Endpoint resolution: `Query` + page context → request descriptor.
//!
//! | Mode | Path | Params |
//! |------|------|--------|
//! | default | `/search/` | `q, page, page_size[, search_after]` |
//! | by-id | `/search/by-id/` | `id` |
//! | by-author | `/search/by-author/` | `author, page, page_size[, search_after]` |
//! | by-date-range | `/search/by-date/` | `date_from, date_to, page, page_size[, search_after]` |
//!
//! `search_after` is only sent in [`ScrollMode::Infinite`] when a cursor is
//! present. Resolution is pure; URL assembly against a base URL happens in
//! the transport layer.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Cursor;
use crate::query::{Query, QueryError, SearchMode};

/// Discrete pages or cursor-driven incremental loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMode {
    Paginated,
    #[default]
    Infinite,
}

impl ScrollMode {
    pub fn toggled(self) -> Self {
        match self {
            ScrollMode::Paginated => ScrollMode::Infinite,
            ScrollMode::Infinite => ScrollMode::Paginated,
        }
    }
}

impl fmt::Display for ScrollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollMode::Paginated => f.write_str("paginated"),
            ScrollMode::Infinite => f.write_str("infinite"),
        }
    }
}

/// Where in a result stream a request starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// 1-based page number.
    pub page: u32,
    pub cursor: Option<Cursor>,
}

impl PageContext {
    pub fn first() -> Self {
        Self::page(1)
    }

    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            cursor: None,
        }
    }

    pub fn after(cursor: Cursor) -> Self {
        Self {
            page: 1,
            cursor: Some(cursor),
        }
    }
}

/// A resolved GET request: path relative to the API base plus parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub path: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl RequestDescriptor {
    /// Value of the first parameter named `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Identifies "the same logical request" for de-duplication.
///
/// Derived from mode, term, page, date bounds, and cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupeKey(String);

impl DedupeKey {
    pub fn new(query: &Query, ctx: &PageContext) -> Self {
        let range = query.date_range().unwrap_or_default();
        let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        let cursor = ctx.cursor.as_ref().map(Cursor::as_str).unwrap_or("");
        Self(format!(
            "{}|{}|{}|{}|{}|{}",
            query.mode(),
            query.text(),
            ctx.page,
            date(range.start),
            date(range.end),
            cursor
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map a query and page context to a request descriptor.
///
/// Rejects queries that violate their invariants instead of producing a
/// malformed request.
pub fn resolve(
    query: &Query,
    ctx: &PageContext,
    scroll_mode: ScrollMode,
    page_size: u32,
) -> Result<RequestDescriptor, QueryError> {
    query.validate()?;

    let paging = |params: &mut Vec<(&'static str, String)>| {
        params.push(("page", ctx.page.max(1).to_string()));
        params.push(("page_size", page_size.to_string()));
        if scroll_mode == ScrollMode::Infinite {
            if let Some(cursor) = &ctx.cursor {
                params.push(("search_after", cursor.as_str().to_string()));
            }
        }
    };

    let descriptor = match query.mode() {
        SearchMode::Default => {
            let mut params = vec![("q", query.text().to_string())];
            paging(&mut params);
            RequestDescriptor {
                path: "/search/",
                params,
            }
        }
        SearchMode::ById => RequestDescriptor {
            path: "/search/by-id/",
            params: vec![("id", query.text().to_string())],
        },
        SearchMode::ByAuthor => {
            let mut params = vec![("author", query.text().to_string())];
            paging(&mut params);
            RequestDescriptor {
                path: "/search/by-author/",
                params,
            }
        }
        SearchMode::ByDateRange => {
            // validate() guarantees both bounds
            let range = query.date_range().unwrap_or_default();
            let (Some(start), Some(end)) = (range.start, range.end) else {
                return Err(QueryError::MissingDateBound);
            };
            let mut params = vec![
                ("date_from", start.format("%Y-%m-%d").to_string()),
                ("date_to", end.format("%Y-%m-%d").to_string()),
            ];
            paging(&mut params);
            RequestDescriptor {
                path: "/search/by-date/",
                params,
            }
        }
    };

    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::DateRange;

    #[test]
    fn test_default_mode_paginated() {
        let d = resolve(
            &Query::text_search("sunset"),
            &PageContext::page(3),
            ScrollMode::Paginated,
            10,
        )
        .unwrap();
        assert_eq!(d.path, "/search/");
        assert_eq!(
            d.params,
            vec![
                ("q", "sunset".to_string()),
                ("page", "3".to_string()),
                ("page_size", "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_cursor_only_in_infinite_mode() {
        let ctx = PageContext::after(Cursor::new("abc"));
        let q = Query::text_search("sunset");

        let infinite = resolve(&q, &ctx, ScrollMode::Infinite, 10).unwrap();
        assert_eq!(infinite.param("search_after"), Some("abc"));

        let paginated = resolve(&q, &ctx, ScrollMode::Paginated, 10).unwrap();
        assert_eq!(paginated.param("search_after"), None);
    }

    #[test]
    fn test_by_id_ignores_paging_and_cursor() {
        let d = resolve(
            &Query::by_id("12345"),
            &PageContext::after(Cursor::new("abc")),
            ScrollMode::Infinite,
            10,
        )
        .unwrap();
        assert_eq!(d.path, "/search/by-id/");
        assert_eq!(d.params, vec![("id", "12345".to_string())]);
    }

    #[test]
    fn test_by_author() {
        let d = resolve(
            &Query::by_author("Jane Doe"),
            &PageContext::after(Cursor::new("[5]")),
            ScrollMode::Infinite,
            20,
        )
        .unwrap();
        assert_eq!(d.path, "/search/by-author/");
        assert_eq!(d.param("author"), Some("Jane Doe"));
        assert_eq!(d.param("page_size"), Some("20"));
        assert_eq!(d.param("search_after"), Some("[5]"));
    }

    #[test]
    fn test_by_date_range() {
        let range = DateRange::parse("2024-01-01", "2024-01-31").unwrap();
        let d = resolve(
            &Query::by_date_range(range),
            &PageContext::first(),
            ScrollMode::Infinite,
            10,
        )
        .unwrap();
        assert_eq!(d.path, "/search/by-date/");
        assert_eq!(d.param("date_from"), Some("2024-01-01"));
        assert_eq!(d.param("date_to"), Some("2024-01-31"));
        assert_eq!(d.param("page"), Some("1"));
        assert_eq!(d.param("search_after"), None);
    }

    #[test]
    fn test_invalid_query_rejected() {
        let err = resolve(
            &Query::text_search(""),
            &PageContext::first(),
            ScrollMode::Paginated,
            10,
        )
        .unwrap_err();
        assert_eq!(err, QueryError::EmptyTerm(SearchMode::Default));
    }

    #[test]
    fn test_page_zero_clamped() {
        assert_eq!(PageContext::page(0).page, 1);
    }

    #[test]
    fn test_dedupe_key_distinguishes_page_and_cursor() {
        let q = Query::text_search("sunset");
        let p1 = DedupeKey::new(&q, &PageContext::page(1));
        let p2 = DedupeKey::new(&q, &PageContext::page(2));
        let c1 = DedupeKey::new(&q, &PageContext::after(Cursor::new("c1")));
        assert_ne!(p1, p2);
        assert_ne!(p1, c1);
        assert_eq!(p1, DedupeKey::new(&Query::text_search(" sunset "), &PageContext::first()));
    }

    #[test]
    fn test_dedupe_key_distinguishes_mode() {
        let ctx = PageContext::first();
        assert_ne!(
            DedupeKey::new(&Query::text_search("Doe"), &ctx),
            DedupeKey::new(&Query::by_author("Doe"), &ctx)
        );
    }

    #[test]
    fn test_toggle() {
        assert_eq!(ScrollMode::Infinite.toggled(), ScrollMode::Paginated);
        assert_eq!(ScrollMode::Paginated.toggled().toggled(), ScrollMode::Paginated);
    }
}

//! Query model: what the user asked for.
//!
//! A [`Query`] is immutable once built. Construction never fails; the
//! invariants are checked by [`Query::validate`], which the endpoint
//! resolver and the synchronizer call before any request is issued.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest free-text term the search service accepts.
pub const MAX_TERM_LEN: usize = 100;

/// Which search endpoint a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Full-text search over descriptions and photographers.
    #[default]
    Default,
    /// Exact lookup by image identifier. Never cursor-continued.
    ById,
    /// Search by photographer name.
    ByAuthor,
    /// All media created within a date range.
    ByDateRange,
}

impl SearchMode {
    /// Stable name used in dedupe keys and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Default => "default",
            SearchMode::ById => "by-id",
            SearchMode::ByAuthor => "by-author",
            SearchMode::ByDateRange => "by-date-range",
        }
    }

    /// Whether results for this mode may be continued with a cursor.
    pub fn supports_cursor(&self) -> bool {
        !matches!(self, SearchMode::ById)
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "default" | "all" => Ok(SearchMode::Default),
            "id" | "by-id" | "bildnummer" => Ok(SearchMode::ById),
            "author" | "by-author" | "photographer" | "fotograf" => Ok(SearchMode::ByAuthor),
            "date" | "by-date" | "date-range" | "by-date-range" => Ok(SearchMode::ByDateRange),
            other => Err(QueryError::UnknownMode(other.to_string())),
        }
    }
}

/// Inclusive date bounds for [`SearchMode::ByDateRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Parse `YYYY-MM-DD` bounds. Empty strings mean "not set".
    pub fn parse(start: &str, end: &str) -> Result<Self, QueryError> {
        Ok(Self {
            start: parse_date(start)?,
            end: parse_date(end)?,
        })
    }
}

fn parse_date(s: &str) -> Result<Option<NaiveDate>, QueryError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| QueryError::InvalidDate(s.to_string()))
}

/// Reasons a query cannot be sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("search term must not be empty for {0} search")]
    EmptyTerm(SearchMode),
    #[error("search term is longer than {} characters", MAX_TERM_LEN)]
    TermTooLong,
    #[error("date range search needs both a start and an end date")]
    MissingDateBound,
    #[error("date range starts ({start}) after it ends ({end})")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("unknown search mode '{0}'")]
    UnknownMode(String),
}

/// An immutable description of one search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    text: String,
    mode: SearchMode,
    date_range: Option<DateRange>,
}

impl Query {
    /// A term-based query (default, identifier, or author search).
    ///
    /// Passing [`SearchMode::ByDateRange`] here yields a query without
    /// bounds, which fails validation.
    pub fn new(mode: SearchMode, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode,
            date_range: None,
        }
    }

    pub fn text_search(text: impl Into<String>) -> Self {
        Self::new(SearchMode::Default, text)
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(SearchMode::ById, id)
    }

    pub fn by_author(author: impl Into<String>) -> Self {
        Self::new(SearchMode::ByAuthor, author)
    }

    pub fn by_date_range(range: DateRange) -> Self {
        Self {
            text: String::new(),
            mode: SearchMode::ByDateRange,
            date_range: Some(range),
        }
    }

    pub fn text(&self) -> &str {
        self.text.trim()
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    /// Check the invariants that must hold before a fetch.
    pub fn validate(&self) -> Result<(), QueryError> {
        match self.mode {
            SearchMode::ByDateRange => {
                let range = self.date_range.unwrap_or_default();
                match (range.start, range.end) {
                    (Some(start), Some(end)) if start > end => {
                        Err(QueryError::InvertedDateRange { start, end })
                    }
                    (Some(_), Some(_)) => Ok(()),
                    _ => Err(QueryError::MissingDateBound),
                }
            }
            mode => {
                let text = self.text();
                if text.is_empty() {
                    Err(QueryError::EmptyTerm(mode))
                } else if text.chars().count() > MAX_TERM_LEN {
                    Err(QueryError::TermTooLong)
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_text_query_requires_term() {
        assert_eq!(
            Query::text_search("   ").validate(),
            Err(QueryError::EmptyTerm(SearchMode::Default))
        );
        assert!(Query::text_search("sunset").validate().is_ok());
        assert_eq!(
            Query::by_id("").validate(),
            Err(QueryError::EmptyTerm(SearchMode::ById))
        );
    }

    #[test]
    fn test_term_is_trimmed() {
        assert_eq!(Query::by_author("  Doe ").text(), "Doe");
    }

    #[test]
    fn test_term_length_cap() {
        let long = "x".repeat(MAX_TERM_LEN + 1);
        assert_eq!(
            Query::text_search(long).validate(),
            Err(QueryError::TermTooLong)
        );
        assert!(Query::text_search("x".repeat(MAX_TERM_LEN))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_date_range_needs_both_bounds() {
        let half = DateRange::new(Some(date("2024-01-01")), None);
        assert_eq!(
            Query::by_date_range(half).validate(),
            Err(QueryError::MissingDateBound)
        );
        assert_eq!(
            Query::new(SearchMode::ByDateRange, "ignored").validate(),
            Err(QueryError::MissingDateBound)
        );
    }

    #[test]
    fn test_date_range_order() {
        let inverted = DateRange::new(Some(date("2024-02-01")), Some(date("2024-01-01")));
        assert!(matches!(
            Query::by_date_range(inverted).validate(),
            Err(QueryError::InvertedDateRange { .. })
        ));
        let same_day = DateRange::new(Some(date("2024-01-01")), Some(date("2024-01-01")));
        assert!(Query::by_date_range(same_day).validate().is_ok());
    }

    #[test]
    fn test_date_range_text_not_required() {
        let range = DateRange::parse("2023-05-01", "2023-05-31").unwrap();
        let q = Query::by_date_range(range);
        assert_eq!(q.text(), "");
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_parse_dates() {
        assert_eq!(DateRange::parse("", "").unwrap(), DateRange::default());
        assert_eq!(
            DateRange::parse("2024-13-01", ""),
            Err(QueryError::InvalidDate("2024-13-01".to_string()))
        );
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!("".parse::<SearchMode>().unwrap(), SearchMode::Default);
        assert_eq!("bildnummer".parse::<SearchMode>().unwrap(), SearchMode::ById);
        assert_eq!(
            "Photographer".parse::<SearchMode>().unwrap(),
            SearchMode::ByAuthor
        );
        assert_eq!("date".parse::<SearchMode>().unwrap(), SearchMode::ByDateRange);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }

    #[test]
    fn test_cursor_support() {
        assert!(!SearchMode::ById.supports_cursor());
        assert!(SearchMode::Default.supports_cursor());
        assert!(SearchMode::ByDateRange.supports_cursor());
    }
}

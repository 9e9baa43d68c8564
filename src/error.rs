//! Fetch error taxonomy.
//!
//! Query validation errors live in the core crate ([`QueryError`]). The
//! types here cover what can go wrong once a request is issued:
//!
//! - [`AttemptError`]: one attempt failed; always retryable.
//! - [`FetchError::Cancelled`]: superseded; never shown to the user.
//! - [`FetchError::Exhausted`]: every attempt failed; user-visible.
//!
//! [`QueryError`]: media_search_core::QueryError

use thiserror::Error;

/// A single failed attempt. All variants are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("search service returned HTTP {status}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response body: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Superseded by a newer request under the same key, a new search, or
    /// a scroll-mode switch.
    #[error("request superseded")]
    Cancelled,
    #[error("search failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: AttemptError },
    #[error("cannot build request URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}

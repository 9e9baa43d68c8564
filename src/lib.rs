//! # media-search
//!
//! Client-side search-result synchronization for a media search service.
//!
//! Turns user intent (a query, a page change, a scroll-mode switch, the end
//! of the list coming into view) into requests against the service, and
//! keeps one consistent result list despite overlapping requests, retries,
//! and cancellations.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌─────────────┐   ┌───────────┐
//! │  Session  │──▶│ Synchronizer │──▶│ Coordinator │──▶│ Transport │
//! │ CLI/stdin │   │  SyncState   │   │ dedupe/retry│   │  reqwest  │
//! └───────────┘   └──────┬───────┘   └─────────────┘   └───────────┘
//!                        │ resolve()
//!                        ▼
//!               media-search-core (pure)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! msearch search "sunset" --scroll paginated --page 2
//! msearch search "Müller" --by author --chunks 3 --format json
//! msearch resolve --by date --from 2020-01-01 --to 2020-12-31
//! msearch browse
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`error`] | Fetch error types |
//! | [`transport`] | HTTP and scripted transports |
//! | [`coordinator`] | Request de-duplication, cancellation, retry |
//! | [`sync`] | Result synchronizer state machine |
//! | [`render`] | Text and JSON output |
//! | [`search`] | One-shot `search` / `resolve` commands |
//! | [`session`] | Interactive `browse` session |
//!
//! The pure building blocks (query model, endpoint resolver, retry policy,
//! state, scroll trigger) live in [`media_search_core`] and are re-exported
//! as [`core`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod render;
pub mod search;
pub mod session;
pub mod sync;
pub mod transport;

pub use media_search_core as core;

//! # Media Search Core
//!
//! Runtime-free logic shared by the media-search client: the query model,
//! endpoint resolution, the wire data model, the retry policy state machine,
//! the scroll trigger, and the result-merging rules of the synchronizer state.
//!
//! This crate contains no tokio, reqwest, or other I/O dependencies. Every
//! function here is deterministic and can be tested without a network.

pub mod endpoint;
pub mod models;
pub mod query;
pub mod retry;
pub mod state;
pub mod trigger;

pub use endpoint::{resolve, DedupeKey, PageContext, RequestDescriptor, ScrollMode};
pub use models::{Cursor, ItemKey, MediaItem, SearchPage};
pub use query::{DateRange, Query, QueryError, SearchMode};
pub use retry::{RetryPolicy, RetryState, RetryStep};
pub use state::SyncState;
pub use trigger::{ScrollTrigger, SentinelHandle, TriggerGate};

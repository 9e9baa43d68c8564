//! Observable synchronizer state and its merge rules.
//!
//! [`SyncState`] is mutated only by the synchronizer's handlers; this module
//! holds the pure transitions so they can be tested without a runtime.

use serde::Serialize;
use std::collections::HashSet;

use crate::endpoint::ScrollMode;
use crate::models::{Cursor, ItemKey, MediaItem, SearchPage};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncState {
    pub results: Vec<MediaItem>,
    pub page: u32,
    pub total_pages: u32,
    pub cursor: Option<Cursor>,
    pub loading: bool,
    pub error: Option<String>,
    pub scroll_mode: ScrollMode,
}

impl SyncState {
    pub fn new(scroll_mode: ScrollMode) -> Self {
        Self {
            results: Vec::new(),
            page: 1,
            total_pages: 0,
            cursor: None,
            loading: false,
            error: None,
            scroll_mode,
        }
    }

    /// Clear everything a new search replaces. Scroll mode is kept.
    pub fn reset_for_search(&mut self) {
        self.results.clear();
        self.page = 1;
        self.total_pages = 0;
        self.cursor = None;
        self.error = None;
    }

    /// Merge a successful response.
    ///
    /// `append` concatenates (skipping items whose composite key is already
    /// present); otherwise the results are replaced.
    pub fn apply_page(
        &mut self,
        response: SearchPage,
        requested_page: u32,
        append: bool,
        page_size: u32,
    ) {
        self.page = response.page.unwrap_or(requested_page).max(1);
        self.total_pages = total_pages(response.total_count(), page_size);
        self.cursor = response.next_cursor;
        self.error = None;

        if append {
            let mut seen: HashSet<ItemKey> = self
                .results
                .iter()
                .enumerate()
                .map(|(i, item)| item.key(i))
                .filter(|k| matches!(k, ItemKey::Composite { .. }))
                .collect();
            for item in response.results {
                let key = item.key(self.results.len());
                if matches!(key, ItemKey::Composite { .. }) && !seen.insert(key) {
                    continue;
                }
                self.results.push(item);
            }
        } else {
            self.results = response.results;
        }
    }

    /// Keep only the first page of results, as when leaving infinite scroll.
    ///
    /// Idempotent: applying it again never truncates further.
    pub fn truncate_to_first_page(&mut self, page_size: u32) {
        self.results.truncate(page_size as usize);
        self.page = 1;
    }

    /// Whether the server indicated more data after the last chunk.
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// Key of the last result, which is what the sentinel watches.
    pub fn last_key(&self) -> Option<ItemKey> {
        let last = self.results.len().checked_sub(1)?;
        Some(self.results[last].key(last))
    }
}

/// `ceil(count / page_size)`.
pub fn total_pages(count: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    let pages = count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

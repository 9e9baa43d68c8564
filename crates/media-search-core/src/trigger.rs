//! Scroll trigger: edge-detecting watch on a sentinel.
//!
//! The sentinel is the last rendered result. The presentation layer
//! registers its handle whenever the last item changes and reports
//! visibility changes; the trigger answers whether a visibility report
//! should load the next chunk.
//!
//! The trigger fires at most once per not-visible → visible transition of
//! the registered handle. Reports for any other handle, or after
//! [`ScrollTrigger::unregister`], are ignored.

use crate::endpoint::ScrollMode;
use crate::models::ItemKey;
use crate::query::SearchMode;

/// Handle of the element being watched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SentinelHandle(ItemKey);

impl SentinelHandle {
    pub fn new(key: ItemKey) -> Self {
        Self(key)
    }

    pub fn key(&self) -> &ItemKey {
        &self.0
    }
}

impl From<ItemKey> for SentinelHandle {
    fn from(key: ItemKey) -> Self {
        Self(key)
    }
}

/// Conditions under which a visible sentinel may load more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerGate {
    pub scroll_mode: ScrollMode,
    pub loading: bool,
    pub has_cursor: bool,
    pub search_mode: Option<SearchMode>,
}

impl TriggerGate {
    pub fn permits(&self) -> bool {
        self.scroll_mode == ScrollMode::Infinite
            && !self.loading
            && self.has_cursor
            && self.search_mode.is_some_and(|m| m.supports_cursor())
    }
}

#[derive(Debug, Default)]
pub struct ScrollTrigger {
    watched: Option<SentinelHandle>,
    visible: bool,
}

impl ScrollTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch `handle`, replacing any previous sentinel.
    ///
    /// Re-registering the current handle keeps its visibility state, so a
    /// repeated registration cannot produce a second edge.
    pub fn register(&mut self, handle: SentinelHandle) {
        if self.watched.as_ref() == Some(&handle) {
            return;
        }
        self.watched = Some(handle);
        self.visible = false;
    }

    /// Tear down the watch. Later reports are ignored until a new register.
    pub fn unregister(&mut self) {
        self.watched = None;
        self.visible = false;
    }

    pub fn sentinel(&self) -> Option<&SentinelHandle> {
        self.watched.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.watched.is_some()
    }

    /// Record a visibility report; `true` means "load the next chunk now".
    ///
    /// The rising edge is consumed even when the gate refuses, so a sentinel
    /// that stays visible does not fire later on its own.
    pub fn observe(&mut self, handle: &SentinelHandle, visible: bool, gate: TriggerGate) -> bool {
        if self.watched.as_ref() != Some(handle) {
            return false;
        }
        let rising = visible && !self.visible;
        self.visible = visible;
        rising && gate.permits()
    }
}

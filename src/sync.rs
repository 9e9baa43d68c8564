//! Result synchronizer: the state machine behind a search session.
//!
//! Owns the observable [`SyncState`] and exposes the handlers the
//! presentation layer calls: [`new_search`](Synchronizer::new_search),
//! [`change_page`](Synchronizer::change_page),
//! [`toggle_mode`](Synchronizer::toggle_mode), and the sentinel hooks that
//! drive [`load_more`](Synchronizer::load_more).
//!
//! # Concurrency
//!
//! Handlers take `&mut self` and never block. Each fetch is registered with
//! the [`RequestCoordinator`] synchronously, then spawned onto the tokio
//! runtime; its outcome comes back over a channel and is applied by
//! [`next_transition`](Synchronizer::next_transition) or
//! [`settle`](Synchronizer::settle) on the owning task. State is therefore
//! only ever mutated by the owner.
//!
//! A fetch is *pending* from issue until its completion is applied. Issuing
//! under a key drops any older pending fetch for that key. A new search drops
//! all of them, and leaving infinite scroll drops the chunk loads. Completions
//! for dropped fetches are discarded as [`Transition::Superseded`] even if
//! they were already queued.
//!
//! ```text
//! IDLE ──handler──▶ LOADING ──ok──────▶ SUCCESS ─▶ IDLE
//!                      │   └──failed──▶ FAILED  ─▶ IDLE
//!                      └──cancelled───▶ (superseded, no change)
//! ```

use media_search_core::{
    resolve, DedupeKey, PageContext, Query, QueryError, ScrollMode, ScrollTrigger, SearchMode,
    SearchPage, SentinelHandle, SyncState, TriggerGate,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::coordinator::RequestCoordinator;
use crate::error::FetchError;

/// Result of applying one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Results merged; carries the number of items received.
    Succeeded { received: usize },
    /// Retries exhausted; `error` is set and results are unchanged.
    Failed { error: String },
    /// The fetch was cancelled or replaced; nothing changed.
    Superseded,
}

/// What a fetch was issued for.
#[derive(Debug, Clone)]
struct FetchPlan {
    ctx: PageContext,
    append: bool,
}

#[derive(Debug)]
struct Pending {
    key: DedupeKey,
    plan: FetchPlan,
}

/// A finished fetch, sent back from its task.
#[derive(Debug)]
struct Completion {
    ticket: u64,
    outcome: Result<SearchPage, FetchError>,
}

pub struct Synchronizer {
    coordinator: Arc<RequestCoordinator>,
    page_size: u32,
    state: SyncState,
    query: Option<Query>,
    trigger: ScrollTrigger,
    pending: HashMap<u64, Pending>,
    last_issued: Option<FetchPlan>,
    next_ticket: u64,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl Synchronizer {
    pub fn new(
        coordinator: Arc<RequestCoordinator>,
        page_size: u32,
        scroll_mode: ScrollMode,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            coordinator,
            page_size: page_size.max(1),
            state: SyncState::new(scroll_mode),
            query: None,
            trigger: ScrollTrigger::new(),
            pending: HashMap::new(),
            last_issued: None,
            next_ticket: 1,
            tx,
            rx,
        }
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn sentinel(&self) -> Option<&SentinelHandle> {
        self.trigger.sentinel()
    }

    /// Number of fetches whose completion has not been applied yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    // ── handlers ────────────────────────────────────────────────────────

    /// Start a new search, superseding everything in flight.
    ///
    /// An invalid query is a no-op: the error is returned, no state changes,
    /// and no request is made.
    pub fn new_search(&mut self, query: Query) -> Result<(), QueryError> {
        query.validate()?;

        self.supersede_all();
        self.state.reset_for_search();
        self.trigger.unregister();
        info!(mode = %query.mode(), term = query.text(), "new search");
        self.query = Some(query);
        self.issue(FetchPlan {
            ctx: PageContext::first(),
            append: false,
        });
        Ok(())
    }

    /// Jump to page `page`. Only meaningful in paginated mode with an
    /// active query; returns whether a fetch was issued.
    pub fn change_page(&mut self, page: u32) -> bool {
        if self.state.scroll_mode != ScrollMode::Paginated || self.query.is_none() || page == 0 {
            debug!(page, "page change ignored");
            return false;
        }
        self.issue(FetchPlan {
            ctx: PageContext::page(page),
            append: false,
        })
    }

    /// Flip between paginated and infinite scroll.
    ///
    /// Leaving infinite scroll supersedes in-flight chunk loads and truncates
    /// the results to the first page. A page fetch already in flight (the
    /// first page of a new search, or a retry) still lands. Entering infinite
    /// scroll only enables the trigger.
    pub fn toggle_mode(&mut self) -> ScrollMode {
        let next = self.state.scroll_mode.toggled();
        if self.state.scroll_mode == ScrollMode::Infinite {
            self.supersede_appends();
            self.state.truncate_to_first_page(self.page_size);
        }
        self.trigger.unregister();
        self.state.scroll_mode = next;
        debug!(mode = %next, "scroll mode toggled");
        next
    }

    /// Register (or clear) the sentinel the trigger watches.
    pub fn set_sentinel(&mut self, handle: Option<SentinelHandle>) {
        match handle {
            Some(h) => self.trigger.register(h),
            None => self.trigger.unregister(),
        }
    }

    /// Report a visibility change of `handle`; loads the next chunk on a
    /// rising edge when conditions allow. Returns whether a fetch was issued.
    pub fn sentinel_visibility(&mut self, handle: &SentinelHandle, visible: bool) -> bool {
        let gate = self.gate();
        if self.trigger.observe(handle, visible, gate) {
            self.load_more()
        } else {
            false
        }
    }

    /// Fetch the next chunk after the current cursor.
    ///
    /// Fires only in infinite mode, when not loading, with a cursor, with a
    /// sentinel registered, and never for identifier searches.
    pub fn load_more(&mut self) -> bool {
        if !self.gate().permits() || !self.trigger.is_watching() {
            return false;
        }
        let Some(cursor) = self.state.cursor.clone() else {
            return false;
        };
        self.issue(FetchPlan {
            ctx: PageContext::after(cursor),
            append: true,
        })
    }

    /// Re-issue the most recent fetch after a failure.
    pub fn retry_last(&mut self) -> bool {
        if self.state.error.is_none() || self.state.loading {
            return false;
        }
        match self.last_issued.clone() {
            Some(plan) => self.issue(plan),
            None => false,
        }
    }

    // ── completion handling ─────────────────────────────────────────────

    /// Wait for the next completion and apply it.
    ///
    /// Waits forever when nothing is in flight; callers normally use this
    /// in a `select!` or check [`pending`](Self::pending) first.
    pub async fn next_transition(&mut self) -> Transition {
        match self.rx.recv().await {
            Some(completion) => self.apply(completion),
            // unreachable while `self.tx` is alive
            None => Transition::Superseded,
        }
    }

    /// Apply completions until no fetch is pending.
    pub async fn settle(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::new();
        while !self.pending.is_empty() {
            transitions.push(self.next_transition().await);
        }
        transitions
    }

    /// Apply one completion to the state.
    fn apply(&mut self, completion: Completion) -> Transition {
        let Completion { ticket, outcome } = completion;
        let Some(pending) = self.pending.remove(&ticket) else {
            debug!(ticket, "discarding completion of superseded fetch");
            return Transition::Superseded;
        };

        let transition = match outcome {
            Ok(page) => {
                let received = page.results.len();
                self.state.apply_page(
                    page,
                    pending.plan.ctx.page,
                    pending.plan.append,
                    self.page_size,
                );
                debug!(
                    key = %pending.key,
                    received,
                    total = self.state.results.len(),
                    more = self.state.has_more(),
                    "fetch applied"
                );
                Transition::Succeeded { received }
            }
            Err(FetchError::Cancelled) => Transition::Superseded,
            Err(err) => {
                let error = err.to_string();
                warn!(key = %pending.key, error = %error, "fetch failed");
                self.state.error = Some(error.clone());
                Transition::Failed { error }
            }
        };

        self.state.loading = !self.pending.is_empty();
        transition
    }

    // ── internals ───────────────────────────────────────────────────────

    fn gate(&self) -> TriggerGate {
        TriggerGate {
            scroll_mode: self.state.scroll_mode,
            loading: self.state.loading,
            has_cursor: self.state.cursor.is_some(),
            search_mode: self.query.as_ref().map(Query::mode),
        }
    }

    fn supersede_all(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "superseding in-flight fetches");
        }
        self.coordinator.cancel_all();
        self.pending.clear();
        self.state.loading = false;
    }

    fn supersede_appends(&mut self) {
        let tickets: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, p)| p.plan.append)
            .map(|(ticket, _)| *ticket)
            .collect();
        for ticket in tickets {
            if let Some(p) = self.pending.remove(&ticket) {
                debug!(key = %p.key, "superseding chunk load");
                self.coordinator.cancel(&p.key);
            }
        }
        self.state.loading = !self.pending.is_empty();
    }

    fn issue(&mut self, plan: FetchPlan) -> bool {
        let Some(query) = self.query.as_ref() else {
            return false;
        };
        // identifier lookups are never cursor-continued
        if plan.append && query.mode() == SearchMode::ById {
            return false;
        }

        let descriptor = match resolve(query, &plan.ctx, self.state.scroll_mode, self.page_size) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "query rejected by endpoint resolver");
                return false;
            }
        };
        let key = DedupeKey::new(query, &plan.ctx);

        self.pending.retain(|_, p| p.key != key);
        let in_flight = self.coordinator.begin(key.clone());

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.insert(
            ticket,
            Pending {
                key,
                plan: plan.clone(),
            },
        );
        self.last_issued = Some(plan);
        self.state.loading = true;
        self.state.error = None;

        let coordinator = self.coordinator.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = coordinator.run(in_flight, &descriptor).await;
            // receiver gone means the session ended
            let _ = tx.send(Completion { ticket, outcome });
        });
        true
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.coordinator.cancel_all();
    }
}

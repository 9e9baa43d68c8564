//! Request coordinator: de-duplication, cancellation, and retry.
//!
//! Issuing a request is split in two so that cancellation is synchronous
//! with issuance:
//!
//! 1. [`RequestCoordinator::begin`] runs inside the caller's handler. It
//!    cancels any live request under the same [`DedupeKey`] and registers a
//!    fresh cancellation token, so there is never a window in which two
//!    requests for one key are both live.
//! 2. [`RequestCoordinator::run`] is the async part, typically spawned. It
//!    performs up to `max_retries + 1` attempts with exponential backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 2xx with a decodable body → success, no retry
//! - Any non-2xx status → retry
//! - Network errors and undecodable bodies → retry
//! - Cancellation → stop immediately, never retried
//! - Backoff after failed attempt `k`: `base_delay * 2^k` (300ms, 600ms by default)
//!
//! A cancelled request resolves to [`FetchError::Cancelled`] whatever the
//! network returned, including a success that raced the cancellation.

use media_search_core::{DedupeKey, RequestDescriptor, RetryPolicy, RetryStep, SearchPage};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AttemptError, FetchError};
use crate::transport::{request_url, Transport};

struct Slot {
    id: u64,
    token: CancellationToken,
}

/// A registered, not yet resolved request.
#[derive(Debug)]
pub struct InFlight {
    key: DedupeKey,
    id: u64,
    token: CancellationToken,
}

impl InFlight {
    pub fn key(&self) -> &DedupeKey {
        &self.key
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct RequestCoordinator {
    transport: Arc<dyn Transport>,
    base_url: Url,
    policy: RetryPolicy,
    slots: Mutex<HashMap<DedupeKey, Slot>>,
    next_id: AtomicU64,
}

impl RequestCoordinator {
    pub fn new(transport: Arc<dyn Transport>, base_url: Url, policy: RetryPolicy) -> Self {
        Self {
            transport,
            base_url,
            policy,
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<DedupeKey, Slot>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a request under `key`, cancelling the one it supersedes.
    pub fn begin(&self, key: DedupeKey) -> InFlight {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.slots().insert(
            key.clone(),
            Slot {
                id,
                token: token.clone(),
            },
        );
        if let Some(prev) = previous {
            debug!(key = %key, superseded = prev.id, by = id, "cancelling duplicate request");
            prev.token.cancel();
        }
        InFlight { key, id, token }
    }

    /// Cancel the live request under `key`, if any.
    pub fn cancel(&self, key: &DedupeKey) {
        let removed = self.slots().remove(key);
        if let Some(slot) = removed {
            debug!(key = %key, id = slot.id, "cancelling request");
            slot.token.cancel();
        }
    }

    /// Cancel every live request.
    pub fn cancel_all(&self) {
        let drained: Vec<(DedupeKey, Slot)> = self.slots().drain().collect();
        for (key, slot) in drained {
            debug!(key = %key, id = slot.id, "cancelling request");
            slot.token.cancel();
        }
    }

    /// Number of keys with a live request.
    pub fn in_flight(&self) -> usize {
        self.slots().len()
    }

    /// Release `req`'s slot, unless a newer request already took the key.
    fn release(&self, req: &InFlight) {
        let mut slots = self.slots();
        if slots.get(&req.key).map(|s| s.id) == Some(req.id) {
            slots.remove(&req.key);
        }
    }

    /// Register and run in one step.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        key: DedupeKey,
    ) -> Result<SearchPage, FetchError> {
        let req = self.begin(key);
        self.run(req, descriptor).await
    }

    /// Perform the attempts for a registered request.
    pub async fn run(
        &self,
        req: InFlight,
        descriptor: &RequestDescriptor,
    ) -> Result<SearchPage, FetchError> {
        let result = self.run_attempts(&req, descriptor).await;
        self.release(&req);
        match result {
            Err(FetchError::Cancelled) => {
                debug!(key = %req.key, id = req.id, "request superseded");
                Err(FetchError::Cancelled)
            }
            // a success racing a cancellation is still suppressed
            Ok(_) if req.token.is_cancelled() => Err(FetchError::Cancelled),
            other => other,
        }
    }

    async fn run_attempts(
        &self,
        req: &InFlight,
        descriptor: &RequestDescriptor,
    ) -> Result<SearchPage, FetchError> {
        let url = request_url(&self.base_url, descriptor).map_err(FetchError::InvalidUrl)?;
        let mut retry = self.policy.start();

        loop {
            let outcome = tokio::select! {
                biased;
                _ = req.token.cancelled() => return Err(FetchError::Cancelled),
                outcome = self.attempt(&url) => outcome,
            };

            let err = match outcome {
                Ok(page) => {
                    debug!(
                        key = %req.key,
                        attempt = retry.attempt(),
                        results = page.results.len(),
                        "search request succeeded"
                    );
                    return Ok(page);
                }
                Err(err) => err,
            };

            match retry.on_failure() {
                RetryStep::Backoff(delay) => {
                    warn!(
                        key = %req.key,
                        attempt = retry.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "search attempt failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = req.token.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RetryStep::Exhausted => {
                    warn!(
                        key = %req.key,
                        attempts = retry.attempts_made(),
                        error = %err,
                        "search failed after retries"
                    );
                    return Err(FetchError::Exhausted {
                        attempts: retry.attempts_made(),
                        last: err,
                    });
                }
            }
        }
    }

    /// Exactly one network call.
    async fn attempt(&self, url: &Url) -> Result<SearchPage, AttemptError> {
        let response = self.transport.get(url).await?;
        if !response.is_success() {
            return Err(AttemptError::Status {
                status: response.status,
                body: response.body,
            });
        }
        serde_json::from_str(&response.body).map_err(|e| AttemptError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Scripted, ScriptedTransport};
    use media_search_core::{resolve, PageContext, Query, ScrollMode};
    use serde_json::json;
    use std::time::Duration;

    fn setup(script: Vec<Scripted>) -> (Arc<ScriptedTransport>, Arc<RequestCoordinator>) {
        let transport = Arc::new(ScriptedTransport::new(script));
        let coordinator = Arc::new(RequestCoordinator::new(
            transport.clone(),
            Url::parse("http://stub").unwrap(),
            RetryPolicy::default(),
        ));
        (transport, coordinator)
    }

    fn request(term: &str) -> (RequestDescriptor, DedupeKey) {
        let q = Query::text_search(term);
        let ctx = PageContext::first();
        (
            resolve(&q, &ctx, ScrollMode::Paginated, 10).unwrap(),
            DedupeKey::new(&q, &ctx),
        )
    }

    fn ok_body(n: usize) -> Scripted {
        let results: Vec<_> = (0..n).map(|i| json!({"db": "s", "id": i})).collect();
        Scripted::json(json!({"results": results, "count": n, "page": 1}))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_releases_slot() {
        let (transport, c) = setup(vec![ok_body(3)]);
        let (d, key) = request("sunset");
        let page = c.execute(&d, key).await.unwrap();
        assert_eq!(page.results.len(), 3);
        assert_eq!(c.in_flight(), 0);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds() {
        let (transport, c) = setup(vec![Scripted::status(500), Scripted::status(502), ok_body(1)]);
        let (d, key) = request("sunset");
        assert!(c.execute(&d, key).await.is_ok());

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].at - calls[0].at, Duration::from_millis(300));
        assert_eq!(calls[2].at - calls[1].at, Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_after_all_attempts() {
        let (transport, c) = setup(vec![
            Scripted::status(503),
            Scripted::NetworkError("reset".into()),
            Scripted::status(404),
        ]);
        let (d, key) = request("sunset");
        let err = c.execute(&d, key).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Exhausted {
                attempts: 3,
                last: AttemptError::Status {
                    status: 404,
                    body: String::new()
                }
            }
        );
        assert_eq!(transport.call_count(), 3);
        assert_eq!(c.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_body_is_retried() {
        let (transport, c) = setup(vec![
            Scripted::Respond {
                status: 200,
                body: "<html>".into(),
                delay: Duration::ZERO,
            },
            ok_body(2),
        ]);
        let (d, key) = request("sunset");
        assert_eq!(c.execute(&d, key).await.unwrap().results.len(), 2);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_key_supersedes() {
        let (transport, c) = setup(vec![ok_body(1).after(Duration::from_millis(100)), ok_body(2)]);
        let (d, key) = request("sunset");

        let first = c.begin(key.clone());
        let first_task = {
            let c = c.clone();
            let d = d.clone();
            tokio::spawn(async move { c.run(first, &d).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = c.begin(key);
        assert_eq!(c.in_flight(), 1);
        let page = c.run(second, &d).await.unwrap();
        assert_eq!(page.results.len(), 2);

        assert_eq!(first_task.await.unwrap(), Err(FetchError::Cancelled));
        assert_eq!(transport.call_count(), 2);
        assert_eq!(c.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_attempt_makes_no_call() {
        let (transport, c) = setup(vec![ok_body(1)]);
        let (d, key) = request("sunset");
        let stale = c.begin(key.clone());
        let fresh = c.begin(key);
        assert!(stale.is_cancelled());
        assert!(!fresh.is_cancelled());

        assert_eq!(c.run(stale, &d).await, Err(FetchError::Cancelled));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(c.in_flight(), 1, "stale run must not release the fresh slot");
        assert!(c.run(fresh, &d).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let (transport, c) = setup(vec![Scripted::status(500), ok_body(1)]);
        let (d, key) = request("sunset");
        let req = c.begin(key);
        let task = {
            let c = c.clone();
            tokio::spawn(async move { c.run(req, &d).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        c.cancel_all();
        assert_eq!(task.await.unwrap(), Err(FetchError::Cancelled));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_hung_request() {
        let (_transport, c) = setup(vec![Scripted::Hang]);
        let (d, key) = request("sunset");
        let req = c.begin(key);
        let task = {
            let c = c.clone();
            tokio::spawn(async move { c.run(req, &d).await })
        };
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(c.in_flight(), 1);
        c.cancel_all();
        assert_eq!(task.await.unwrap(), Err(FetchError::Cancelled));
        assert_eq!(c.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_single_key() {
        let (_transport, c) = setup(vec![]);
        let a = c.begin(request("a").1);
        let b = c.begin(request("b").1);
        c.cancel(a.key());
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert_eq!(c.in_flight(), 1);

        c.cancel(a.key());
        assert_eq!(c.in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_do_not_cancel() {
        let (_transport, c) = setup(vec![ok_body(1), ok_body(1)]);
        let a = c.begin(request("a").1);
        let b = c.begin(request("b").1);
        assert!(!a.is_cancelled());
        assert!(!b.is_cancelled());
        assert_eq!(c.in_flight(), 2);
    }
}

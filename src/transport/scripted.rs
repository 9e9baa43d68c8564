//! In-memory transport that replays scripted responses.
//!
//! Responses are consumed in FIFO order, one per [`Transport::get`] call,
//! regardless of the URL. Every call is recorded with the URL and the
//! (tokio) instant it started, so tests can assert on request parameters
//! and on backoff timing under a paused clock.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::{Transport, TransportResponse};
use crate::error::AttemptError;

/// One scripted reaction to a request.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Respond with this status and body after `delay`.
    Respond {
        status: u16,
        body: String,
        delay: Duration,
    },
    /// Fail at the connection level.
    NetworkError(String),
    /// Never respond.
    Hang,
}

impl Scripted {
    pub fn json(value: Value) -> Self {
        Scripted::Respond {
            status: 200,
            body: value.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: u16) -> Self {
        Scripted::Respond {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    /// Delay an existing `Respond`; other variants are returned unchanged.
    pub fn after(self, delay: Duration) -> Self {
        match self {
            Scripted::Respond { status, body, .. } => Scripted::Respond {
                status,
                body,
                delay,
            },
            other => other,
        }
    }
}

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: Url,
    pub at: Instant,
}

impl RecordedCall {
    /// Decoded value of query parameter `name`.
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reaction: Scripted) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reaction);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, AttemptError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCall {
                url: url.clone(),
                at: Instant::now(),
            });

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(Scripted::Respond {
                status,
                body,
                delay,
            }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(TransportResponse { status, body })
            }
            Some(Scripted::NetworkError(msg)) => Err(AttemptError::Network(msg)),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(AttemptError::Network(format!(
                "no scripted response for {}",
                url
            ))),
        }
    }
}

//! Usage: Registry of in-flight login exchanges keyed by nonce.

use crate::shared::error::{AppError, AppResult};
use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::mask_token;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

pub type ExchangeOutcome = Result<String, AppError>;

/// Map of pending exchanges. Settling an entry moves its sender out of the
/// map first, so each nonce can be resolved or rejected at most once.
#[derive(Default)]
pub struct PendingExchanges {
    entries: Mutex<HashMap<String, oneshot::Sender<ExchangeOutcome>>>,
}

impl PendingExchanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new exchange and hand back the receiver to await.
    /// Refuses duplicate nonces rather than silently replacing the earlier
    /// waiter.
    pub fn register(&self, nonce: &str) -> AppResult<oneshot::Receiver<ExchangeOutcome>> {
        let mut entries = self.entries.lock_or_recover();
        if entries.contains_key(nonce) {
            return Err(AppError::new(
                "INTERNAL_ERROR",
                format!("duplicate login nonce: {}", mask_token(nonce)),
            ));
        }
        let (tx, rx) = oneshot::channel();
        entries.insert(nonce.to_string(), tx);
        Ok(rx)
    }

    /// Deliver a token to the waiter for `nonce`. Returns false when no such
    /// exchange exists (already settled, removed, or never registered).
    pub fn resolve(&self, nonce: &str, token: String) -> bool {
        self.settle(nonce, Ok(token))
    }

    /// Fail the waiter for `nonce`. Returns false when no such exchange
    /// exists.
    pub fn reject(&self, nonce: &str, error: AppError) -> bool {
        self.settle(nonce, Err(error))
    }

    fn settle(&self, nonce: &str, outcome: ExchangeOutcome) -> bool {
        let sender = self.entries.lock_or_recover().remove(nonce);
        match sender {
            Some(tx) => {
                // Send fails only when the waiter already dropped its
                // receiver (cancellation race); nothing left to notify.
                let _ = tx.send(outcome);
                true
            }
            None => {
                tracing::debug!(nonce = %mask_token(nonce), "no pending exchange for nonce");
                false
            }
        }
    }

    /// Drop the entry for `nonce` without settling it. Used when the waiter
    /// itself gives up (cancel, timeout, failed browser launch).
    pub fn remove(&self, nonce: &str) -> bool {
        self.entries.lock_or_recover().remove(nonce).is_some()
    }

    /// Fail every pending exchange with the same error. Used on teardown and
    /// when an inbound activation is too broken to attribute to one nonce.
    pub fn reject_all(&self, error: &AppError) {
        let drained: Vec<_> = self.entries.lock_or_recover().drain().collect();
        if drained.is_empty() {
            return;
        }
        tracing::warn!(count = drained.len(), code = error.code(), "rejecting all pending logins");
        for (_, tx) in drained {
            let _ = tx.send(Err(error.clone()));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.entries.lock_or_recover().len()
    }
}

//! Correlation Registry - the table of calls waiting for a reply.
//!
//! Maps correlation tokens to the oneshot sender of a waiting caller. It is
//! the only shared mutable state of the bridge; removal from the map is the
//! single point where ownership of a pending call moves, so a call is
//! completed by a reply, by a timeout, or discarded, and never more than once.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::RegistryError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// What a waiting caller receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// Raw reply body, not yet decoded.
    Reply(Vec<u8>),
    /// The deadline passed without a reply.
    TimedOut,
}

/// A call waiting for its reply
struct PendingCall {
    /// Single-assignment result slot
    sender: oneshot::Sender<CallOutcome>,
    /// When the call was registered
    created_at: Instant,
    /// Absolute deadline
    deadline: Instant,
    /// Request kind or destination (for logging)
    label: String,
    /// Expected response type (for logging)
    response_type: &'static str,
}

/// Statistics for the correlation registry
#[derive(Debug, Default)]
struct RegistryStats {
    /// Total calls registered
    pub total_registered: AtomicU64,
    /// Total calls completed with a reply
    pub total_resolved: AtomicU64,
    /// Total calls that hit their deadline
    pub total_timeouts: AtomicU64,
    /// Total calls dropped without an outcome (publish failure, caller gone)
    pub total_discarded: AtomicU64,
    /// Replies whose token matched no pending call
    pub total_stale_replies: AtomicU64,
}

/// Point-in-time copy of the registry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub pending: usize,
    pub registered: u64,
    pub resolved: u64,
    pub timeouts: u64,
    pub discarded: u64,
    pub stale_replies: u64,
}

/// Correlation registry for the RPC bridge.
///
/// Flow:
/// 1. RPC client generates a `CorrelationId`
/// 2. Client calls `register()` to get a oneshot receiver
/// 3. Client publishes the request carrying the token
/// 4. Reply listener receives the reply and calls `resolve()`
/// 5. Client awaits the receiver until its deadline, then calls `cancel()`
#[derive(Default)]
pub struct CorrelationRegistry {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: RegistryStats,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending call and get the receiver its outcome arrives on.
    ///
    /// Fails if the token is already registered; the existing call is left
    /// untouched.
    pub fn register(
        &self,
        token: CorrelationId,
        label: &str,
        response_type: &'static str,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<CallOutcome>, RegistryError> {
        let (tx, rx) = oneshot::channel();

        match self.pending.entry(token) {
            Entry::Occupied(_) => return Err(RegistryError::DuplicateToken(token)),
            Entry::Vacant(slot) => {
                slot.insert(PendingCall {
                    sender: tx,
                    created_at: Instant::now(),
                    deadline,
                    label: label.to_string(),
                    response_type,
                });
            }
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %token,
            kind = label,
            response_type = response_type,
            "Registered pending call"
        );

        Ok(rx)
    }

    /// Complete a pending call with a raw reply body.
    ///
    /// Returns true if a pending call was found. An unknown token (never
    /// issued, already resolved, or already timed out) is a no-op.
    pub fn resolve(&self, token: CorrelationId, body: Vec<u8>) -> bool {
        let Some((_, call)) = self.pending.remove(&token) else {
            self.stats.total_stale_replies.fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %token,
                "Reply for unknown or expired correlation token, dropped"
            );
            return false;
        };

        let elapsed = call.created_at.elapsed();
        match call.sender.send(CallOutcome::Reply(body)) {
            Ok(()) => {
                self.stats.total_resolved.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %token,
                    kind = %call.label,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Resolved pending call"
                );
            }
            Err(_) => {
                // Caller stopped waiting between removal and send
                self.stats.total_discarded.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %token, kind = %call.label, "Caller gone before reply");
            }
        }
        true
    }

    /// Remove a pending call and signal its caller with a timeout.
    ///
    /// Returns false if the call was already resolved or removed.
    pub fn cancel(&self, token: &CorrelationId) -> bool {
        match self.pending.remove(token) {
            Some((_, call)) => {
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                let _ = call.sender.send(CallOutcome::TimedOut);
                true
            }
            None => false,
        }
    }

    /// Remove a pending call without signalling anyone.
    pub fn discard(&self, token: &CorrelationId) -> bool {
        match self.pending.remove(token) {
            Some((_, call)) => {
                self.stats.total_discarded.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %token, kind = %call.label, "Discarded pending call");
                true
            }
            None => false,
        }
    }

    /// Time out every call whose deadline is at or before `now`.
    ///
    /// Returns the number of calls removed.
    pub fn remove_expired(&self, now: Instant) -> usize {
        let expired: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for token in expired {
            // Re-checked under the shard lock: a concurrent resolve may have won
            if let Some((_, call)) = self.pending.remove_if(&token, |_, call| call.deadline <= now)
            {
                warn!(
                    correlation_id = %token,
                    kind = %call.label,
                    response_type = call.response_type,
                    overdue_ms = now.saturating_duration_since(call.deadline).as_millis() as u64,
                    "Expiring overdue pending call"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                let _ = call.sender.send(CallOutcome::TimedOut);
                removed += 1;
            }
        }
        removed
    }

    /// Number of calls currently waiting
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check if a token is pending
    pub fn is_pending(&self, token: &CorrelationId) -> bool {
        self.pending.contains_key(token)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            pending: self.pending_count(),
            registered: self.stats.total_registered.load(Ordering::Relaxed),
            resolved: self.stats.total_resolved.load(Ordering::Relaxed),
            timeouts: self.stats.total_timeouts.load(Ordering::Relaxed),
            discarded: self.stats.total_discarded.load(Ordering::Relaxed),
            stale_replies: self.stats.total_stale_replies.load(Ordering::Relaxed),
        }
    }
}

/// Background task that expires overdue calls.
///
/// A backstop only: callers enforce their own deadline.
pub async fn sweep_task(registry: Arc<CorrelationRegistry>, interval: Duration) {
    let mut sweep_interval = tokio::time::interval(interval);
    sweep_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        sweep_interval.tick().await;
        let removed = registry.remove_expired(Instant::now());
        if removed > 0 {
            debug!(removed = removed, "Swept expired pending calls");
        }
    }
}

//! # Admission Policies
//!
//! Pluggable checks the engine consults before it even loads a container.
//! They are not part of the escrow core: the engine works with
//! [`AllowAll`], and the core's tests never depend on any other policy.
//!
//! Shipped policies:
//!
//! - [`RateLimiter`]: at most `limit` admissions per (identity, category)
//!   in a rolling window of `window_blocks` heights.
//! - [`CircuitBreaker`]: manually tripped per category; a tripped
//!   category rejects everything until reset.
//! - [`PolicyChain`]: runs several policies in order, first rejection wins.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use holdfast_protocol::Identity;
use thiserror::Error;
use tracing::{debug, warn};

use crate::operation::{OperationCategory, OperationKind};

/// Why a policy refused an operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyRejection {
    #[error("rate limit of {limit} per {window_blocks} blocks reached for {category}")]
    RateLimited {
        category: OperationCategory,
        limit: u32,
        window_blocks: u64,
    },

    #[error("circuit open for {category}: {reason}")]
    CircuitOpen {
        category: OperationCategory,
        reason: String,
    },
}

/// Strategy consulted before every engine operation.
pub trait AdmissionPolicy: Send + Sync {
    fn admit(&self, actor: &Identity, operation: OperationKind, height: u64)
        -> Result<(), PolicyRejection>;
}

/// Admits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AdmissionPolicy for AllowAll {
    fn admit(&self, _: &Identity, _: OperationKind, _: u64) -> Result<(), PolicyRejection> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Counter {
    window_start: u64,
    count: u32,
}

/// Fixed-window counter keyed by (identity, category).
pub struct RateLimiter {
    limit: u32,
    window_blocks: u64,
    counters: DashMap<(Identity, OperationCategory), Counter>,
}

impl RateLimiter {
    pub fn new(limit: u32, window_blocks: u64) -> Self {
        Self {
            limit,
            window_blocks: window_blocks.max(1),
            counters: DashMap::new(),
        }
    }

    /// Admissions counted for `actor` in the window containing `height`.
    pub fn count(&self, actor: &Identity, category: OperationCategory, height: u64) -> u32 {
        self.counters
            .get(&(actor.clone(), category))
            .filter(|c| height < c.window_start.saturating_add(self.window_blocks))
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window_blocks", &self.window_blocks)
            .field("tracked", &self.counters.len())
            .finish()
    }
}

impl AdmissionPolicy for RateLimiter {
    fn admit(
        &self,
        actor: &Identity,
        operation: OperationKind,
        height: u64,
    ) -> Result<(), PolicyRejection> {
        let category = operation.category();
        let mut entry = self
            .counters
            .entry((actor.clone(), category))
            .or_insert(Counter {
                window_start: height,
                count: 0,
            });

        if height >= entry.window_start.saturating_add(self.window_blocks) {
            entry.window_start = height;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            debug!(%actor, %category, limit = self.limit, "rate limit hit");
            return Err(PolicyRejection::RateLimited {
                category,
                limit: self.limit,
                window_blocks: self.window_blocks,
            });
        }
        entry.count += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CircuitBreaker
// ---------------------------------------------------------------------------

/// Manual per-category kill switch.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    open: DashMap<OperationCategory, String>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every operation in `category` until [`reset`](Self::reset).
    pub fn trip(&self, category: OperationCategory, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(%category, %reason, "circuit breaker tripped");
        self.open.insert(category, reason);
    }

    pub fn reset(&self, category: OperationCategory) {
        if self.open.remove(&category).is_some() {
            debug!(%category, "circuit breaker reset");
        }
    }

    pub fn is_open(&self, category: OperationCategory) -> bool {
        self.open.contains_key(&category)
    }
}

impl AdmissionPolicy for CircuitBreaker {
    fn admit(&self, _: &Identity, operation: OperationKind, _: u64) -> Result<(), PolicyRejection> {
        let category = operation.category();
        match self.open.get(&category) {
            Some(reason) => Err(PolicyRejection::CircuitOpen {
                category,
                reason: reason.value().clone(),
            }),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyChain
// ---------------------------------------------------------------------------

/// Runs policies in order; the first rejection wins.
#[derive(Default, Clone)]
pub struct PolicyChain {
    policies: Vec<Arc<dyn AdmissionPolicy>>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, policy: Arc<dyn AdmissionPolicy>) -> Self {
        self.policies.push(policy);
        self
    }
}

impl AdmissionPolicy for PolicyChain {
    fn admit(
        &self,
        actor: &Identity,
        operation: OperationKind,
        height: u64,
    ) -> Result<(), PolicyRejection> {
        self.policies
            .iter()
            .try_for_each(|p| p.admit(actor, operation, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("alice")
    }

    #[test]
    fn rate_limiter_resets_each_window() {
        let rl = RateLimiter::new(2, 10);
        rl.admit(&alice(), OperationKind::Distribute, 100).unwrap();
        rl.admit(&alice(), OperationKind::Cancel, 101).unwrap();
        let err = rl.admit(&alice(), OperationKind::Retrieve, 105).unwrap_err();
        assert!(matches!(err, PolicyRejection::RateLimited { limit: 2, .. }));

        // Other categories and other identities are independent.
        rl.admit(&alice(), OperationKind::Freeze, 105).unwrap();
        rl.admit(&Identity::new("bob"), OperationKind::Distribute, 105).unwrap();

        // New window.
        rl.admit(&alice(), OperationKind::Distribute, 110).unwrap();
        assert_eq!(rl.count(&alice(), OperationCategory::Release, 110), 1);
    }

    #[test]
    fn circuit_breaker_trips_and_resets() {
        let cb = CircuitBreaker::new();
        cb.trip(OperationCategory::Release, "ledger incident");
        assert!(cb.is_open(OperationCategory::Release));
        assert!(cb.admit(&alice(), OperationKind::Distribute, 1).is_err());
        assert!(cb.admit(&alice(), OperationKind::Create, 1).is_ok());

        cb.reset(OperationCategory::Release);
        assert!(cb.admit(&alice(), OperationKind::Distribute, 1).is_ok());
    }

    #[test]
    fn chain_stops_at_first_rejection() {
        let cb = Arc::new(CircuitBreaker::new());
        let rl = Arc::new(RateLimiter::new(1, 100));
        let chain = PolicyChain::new().with(cb.clone()).with(rl.clone());

        cb.trip(OperationCategory::Funding, "maintenance");
        assert!(matches!(
            chain.admit(&alice(), OperationKind::Create, 1),
            Err(PolicyRejection::CircuitOpen { .. })
        ));
        // The breaker rejected first, so the limiter never counted it.
        assert_eq!(rl.count(&alice(), OperationCategory::Funding, 1), 0);
    }
}

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-IP fixed-window rate limiting.
//!
//! One actor task per client IP owns that IP's `{count, reset_at}` counter.
//! Because the actor drains its mailbox strictly one message at a time, the
//! read-modify-write of `check_and_increment` is atomic by construction:
//! there is no TOCTOU window for two concurrent requests to both observe
//! `count == 9`. If an actor cannot be reached the limiter fails open:
//! letting a request through beats cascading an outage.

#![deny(unsafe_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Fixed window length.
pub const WINDOW: Duration = Duration::from_secs(60);
/// Allowed requests per window per IP.
pub const LIMIT: u32 = 10;

/// How long an idle per-IP actor lingers before shutting down.
const IDLE_SHUTDOWN: Duration = Duration::from_secs(180);

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome of one `check_and_increment`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window after this decision.
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, clamped to `[1, 60]` for the
    /// `Retry-After` header.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = (self.reset_at - Utc::now()).num_seconds();
        secs.clamp(1, WINDOW.as_secs() as i64) as u64
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Check {
    reply: oneshot::Sender<RateLimitDecision>,
}

/// The per-IP counter loop. Messages are processed strictly in order.
async fn counter_actor(mut inbox: mpsc::Receiver<Check>, window: Duration, limit: u32) {
    let mut count: u32 = 0;
    let mut reset_at = Utc::now() + ChronoDuration::from_std(window).unwrap_or_default();

    loop {
        let check = match tokio::time::timeout(IDLE_SHUTDOWN, inbox.recv()).await {
            Ok(Some(check)) => check,
            // Channel closed or idle long enough; let the registry respawn.
            Ok(None) | Err(_) => return,
        };

        let now = Utc::now();
        if now >= reset_at {
            count = 0;
            reset_at = now + ChronoDuration::from_std(window).unwrap_or_default();
        }

        let allowed = count < limit;
        if allowed {
            count += 1;
        }
        let decision = RateLimitDecision {
            allowed,
            remaining: limit.saturating_sub(count),
            reset_at,
        };
        // A dropped caller is not the actor's problem.
        let _ = check.reply.send(decision);
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Spawns and addresses the per-IP counter actors.
pub struct RateLimiter {
    actors: DashMap<IpAddr, mpsc::Sender<Check>>,
    window: Duration,
    limit: u32,
}

impl RateLimiter {
    /// Limiter with the production window and limit.
    pub fn new() -> Arc<Self> {
        Self::with_policy(WINDOW, LIMIT)
    }

    /// Limiter with a custom window and limit (tests shrink the window).
    pub fn with_policy(window: Duration, limit: u32) -> Arc<Self> {
        Arc::new(Self {
            actors: DashMap::new(),
            window,
            limit,
        })
    }

    /// Atomically check and count one request from `ip`.
    pub async fn check_and_increment(&self, ip: IpAddr) -> RateLimitDecision {
        // Two attempts: the first may race an actor that just idled out.
        for _ in 0..2 {
            let sender = self.sender_for(ip);
            let (reply, response) = oneshot::channel();
            if sender.send(Check { reply }).await.is_err() {
                self.actors.remove(&ip);
                continue;
            }
            match response.await {
                Ok(decision) => return decision,
                Err(_) => {
                    self.actors.remove(&ip);
                    continue;
                }
            }
        }

        warn!(%ip, "rate-limit actor unreachable; failing open");
        RateLimitDecision {
            allowed: true,
            remaining: self.limit,
            reset_at: Utc::now() + ChronoDuration::from_std(self.window).unwrap_or_default(),
        }
    }

    fn sender_for(&self, ip: IpAddr) -> mpsc::Sender<Check> {
        if let Some(sender) = self.actors.get(&ip) {
            return sender.clone();
        }
        let (tx, rx) = mpsc::channel(64);
        // entry() arbitrates a race between two first requests from one IP:
        // only the winning sender is kept and spawned against.
        let entry = self.actors.entry(ip).or_insert_with(|| {
            tokio::spawn(counter_actor(rx, self.window, self.limit));
            tx
        });
        entry.clone()
    }

    /// Number of live actors (for the monitoring endpoint).
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 0, 2, last))
    }

    #[tokio::test]
    async fn eleventh_request_in_window_is_denied() {
        let limiter = RateLimiter::new();
        for i in 0..10 {
            let decision = limiter.check_and_increment(ip(1)).await;
            assert!(decision.allowed, "request {i} should pass");
        }
        let eleventh = limiter.check_and_increment(ip(1)).await;
        assert!(!eleventh.allowed);
        assert_eq!(eleventh.remaining, 0);
        let retry = eleventh.retry_after_secs();
        assert!((1..=60).contains(&retry));
    }

    #[tokio::test]
    async fn remaining_counts_down() {
        let limiter = RateLimiter::new();
        let first = limiter.check_and_increment(ip(2)).await;
        assert_eq!(first.remaining, 9);
        let second = limiter.check_and_increment(ip(2)).await;
        assert_eq!(second.remaining, 8);
    }

    #[tokio::test]
    async fn distinct_ips_have_independent_windows() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            limiter.check_and_increment(ip(3)).await;
        }
        assert!(!limiter.check_and_increment(ip(3)).await.allowed);
        assert!(limiter.check_and_increment(ip(4)).await.allowed);
        assert_eq!(limiter.actor_count(), 2);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_counter() {
        let limiter = RateLimiter::with_policy(Duration::from_millis(100), 2);
        assert!(limiter.check_and_increment(ip(5)).await.allowed);
        assert!(limiter.check_and_increment(ip(5)).await.allowed);
        assert!(!limiter.check_and_increment(ip(5)).await.allowed);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let after = limiter.check_and_increment(ip(5)).await;
        assert!(after.allowed);
        assert_eq!(after.remaining, 1);
    }

    #[tokio::test]
    async fn concurrent_burst_admits_exactly_the_limit() {
        let limiter = RateLimiter::new();
        let checks = (0..25).map(|_| {
            let limiter = Arc::clone(&limiter);
            async move { limiter.check_and_increment(ip(6)).await }
        });
        let decisions = futures::future::join_all(checks).await;
        let allowed = decisions.iter().filter(|d| d.allowed).count();
        assert_eq!(allowed, 10, "mailbox serialization must close the race");
    }
}

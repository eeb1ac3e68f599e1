// SPDX-License-Identifier: MIT OR Apache-2.0
//! Job auth tokens.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Token lifetime.
pub const TOKEN_TTL: Duration = Duration::from_secs(2 * 60 * 60);
/// Refresh is allowed only inside the last half hour of validity.
pub const REFRESH_WINDOW: Duration = Duration::from_secs(30 * 60);

/// The opaque bearer token a client presents to attach to a job. One token
/// is active per job at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Issue a fresh token valid for [`TOKEN_TTL`].
    pub fn issue() -> Self {
        Self::issue_at(Utc::now())
    }

    /// Issue relative to an explicit instant (tests pin the clock).
    pub fn issue_at(now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            expires_at: now + ChronoDuration::from_std(TOKEN_TTL).unwrap_or_default(),
        }
    }

    /// A token is valid strictly before its expiry; at `expires_at` it is
    /// already dead.
    pub fn is_valid(&self, presented: Uuid, now: DateTime<Utc>) -> bool {
        self.token == presented && now < self.expires_at
    }

    /// Refresh is allowed in `[expires_at − 30 min, expires_at)`.
    pub fn can_refresh(&self, presented: Uuid, now: DateTime<Utc>) -> bool {
        let window_opens =
            self.expires_at - ChronoDuration::from_std(REFRESH_WINDOW).unwrap_or_default();
        self.token == presented && now >= window_opens && now < self.expires_at
    }

    /// Issue the replacement token: new UUID, two more hours.
    pub fn refreshed(&self, now: DateTime<Utc>) -> Self {
        Self::issue_at(now)
    }

    /// Seconds until expiry, clamped at zero.
    pub fn expires_in_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_valid() {
        let now = Utc::now();
        let t = AuthToken::issue_at(now);
        assert!(t.is_valid(t.token, now));
        assert!(t.is_valid(t.token, now + ChronoDuration::minutes(119)));
    }

    #[test]
    fn token_at_exact_expiry_is_invalid() {
        let now = Utc::now();
        let t = AuthToken::issue_at(now);
        assert!(!t.is_valid(t.token, t.expires_at));
        assert!(!t.is_valid(t.token, t.expires_at + ChronoDuration::seconds(1)));
    }

    #[test]
    fn wrong_uuid_is_invalid() {
        let now = Utc::now();
        let t = AuthToken::issue_at(now);
        assert!(!t.is_valid(Uuid::new_v4(), now));
    }

    #[test]
    fn refresh_window_opens_at_t_minus_30() {
        let now = Utc::now();
        let t = AuthToken::issue_at(now);
        // 31 minutes before expiry: refused.
        assert!(!t.can_refresh(t.token, t.expires_at - ChronoDuration::minutes(31)));
        // 30 minutes before: allowed.
        assert!(t.can_refresh(t.token, t.expires_at - ChronoDuration::minutes(30)));
        // 1 second before: allowed.
        assert!(t.can_refresh(t.token, t.expires_at - ChronoDuration::seconds(1)));
        // At expiry: refused.
        assert!(!t.can_refresh(t.token, t.expires_at));
    }

    #[test]
    fn refresh_rotates_the_uuid_and_extends() {
        let now = Utc::now();
        let t = AuthToken::issue_at(now);
        let refresh_time = t.expires_at - ChronoDuration::minutes(10);
        let next = t.refreshed(refresh_time);
        assert_ne!(next.token, t.token);
        assert!(next.expires_at > t.expires_at);
        assert_eq!(next.expires_in_secs(refresh_time), 2 * 60 * 60);
    }
}

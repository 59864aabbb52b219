// ============================
// crates/authgate-lib/src/auth/rate_limit.rs
// ============================
//! Lockout of clients that keep failing to log in.

use crate::config::RateLimitSettings;
use crate::metrics::LOGIN_THROTTLED;
use dashmap::DashMap;
use metrics::counter;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of failed attempts before rate limiting
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration (5 minutes)
const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// Entries idle for this long are forgotten by `cleanup`
const ENTRY_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Entry in the rate limit map
#[derive(Debug, Clone)]
struct RateLimitEntry {
    /// Number of failed attempts
    failed_attempts: u32,
    /// Time of the last failed attempt
    last_failure: Instant,
    /// Set once the client is locked out
    lockout: Option<Lockout>,
}

#[derive(Debug, Clone, Copy)]
enum Lockout {
    Until(Instant),
    /// The expiry could not be represented; held until the entry is removed
    UntilCleared,
}

impl Lockout {
    fn starting_at(now: Instant, duration: Duration) -> Self {
        now.checked_add(duration)
            .map_or(Lockout::UntilCleared, Lockout::Until)
    }

    fn is_active(&self, now: Instant) -> bool {
        match self {
            Lockout::Until(expiry) => now < *expiry,
            Lockout::UntilCleared => true,
        }
    }
}

/// Rate limiter for authentication attempts
#[derive(Debug, Clone)]
pub struct AuthRateLimiter {
    /// Map of IP addresses to rate limit entries
    attempts: Arc<DashMap<IpAddr, RateLimitEntry>>,
    /// Maximum number of failed attempts before lockout
    max_attempts: u32,
    /// Duration of lockout period
    lockout_duration: Duration,
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_DURATION)
    }
}

impl AuthRateLimiter {
    /// Create a new auth rate limiter
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts: max_attempts.max(1),
            lockout_duration,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_secs(settings.lockout_secs),
        )
    }

    /// Record a failed authentication attempt
    pub fn record_failed_attempt(&self, ip: IpAddr) {
        let now = Instant::now();

        let mut entry = self.attempts.entry(ip).or_insert_with(|| RateLimitEntry {
            failed_attempts: 0,
            last_failure: now,
            lockout: None,
        });

        // A served lockout starts the count afresh
        if entry.lockout.is_some_and(|lockout| !lockout.is_active(now)) {
            entry.failed_attempts = 0;
            entry.lockout = None;
        }

        entry.failed_attempts += 1;
        entry.last_failure = now;

        if entry.failed_attempts >= self.max_attempts && entry.lockout.is_none() {
            entry.lockout = Some(Lockout::starting_at(now, self.lockout_duration));
            tracing::warn!(%ip, attempts = entry.failed_attempts, "client locked out after failed logins");
        }
    }

    /// Record a successful authentication
    pub fn record_success(&self, ip: IpAddr) {
        self.attempts.remove(&ip);
    }

    /// Check if an IP is allowed to attempt authentication
    pub fn check_rate_limit(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let locked = self
            .attempts
            .get(&ip)
            .and_then(|entry| entry.lockout)
            .is_some_and(|lockout| lockout.is_active(now));

        if locked {
            counter!(LOGIN_THROTTLED).increment(1);
        }
        !locked
    }

    /// Clean up expired lockouts and stale entries
    pub fn cleanup(&self) {
        let now = Instant::now();

        self.attempts.retain(|_, entry| {
            if let Some(lockout) = entry.lockout {
                return lockout.is_active(now);
            }
            now.duration_since(entry.last_failure) < ENTRY_RETENTION
        });
    }

    /// Number of tracked clients
    pub fn tracked_clients(&self) -> usize {
        self.attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn test_lockout_after_max_attempts() {
        let limiter = AuthRateLimiter::new(3, Duration::from_secs(60));

        for _ in 0..2 {
            limiter.record_failed_attempt(IP);
            assert!(limiter.check_rate_limit(IP));
        }

        limiter.record_failed_attempt(IP);
        assert!(!limiter.check_rate_limit(IP));
        assert!(limiter.check_rate_limit(OTHER));
    }

    #[test]
    fn test_success_resets() {
        let limiter = AuthRateLimiter::new(2, Duration::from_secs(60));

        limiter.record_failed_attempt(IP);
        limiter.record_success(IP);
        limiter.record_failed_attempt(IP);

        assert!(limiter.check_rate_limit(IP));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_unrepresentable_lockout_holds_until_cleared() {
        let limiter = AuthRateLimiter::new(1, Duration::MAX);

        limiter.record_failed_attempt(IP);
        assert!(!limiter.check_rate_limit(IP));

        limiter.record_failed_attempt(IP);
        limiter.cleanup();
        assert!(!limiter.check_rate_limit(IP));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_lockout_expires() {
        let limiter = AuthRateLimiter::new(1, Duration::from_millis(20));

        limiter.record_failed_attempt(IP);
        assert!(!limiter.check_rate_limit(IP));

        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.check_rate_limit(IP));

        limiter.cleanup();
        assert_eq!(limiter.tracked_clients(), 0);
    }
}

/// Login Rate Limiting
///
/// Caps login attempts per account: the key is the submitted username, or the
/// client IP when no username was sent. Successful and failed attempts both
/// count.

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::AppError;

/// Keys tracked before stale entries are swept.
const SWEEP_THRESHOLD: usize = 10_000;

pub struct LoginRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl LoginRateLimiter {
    /// Allow a burst of `attempts` per key, replenished over one minute.
    pub fn per_minute(attempts: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_minute(attempts)),
        }
    }

    /// Build from the configured attempt count; zero falls back to one.
    pub fn from_attempts(attempts: u32) -> Self {
        Self::per_minute(NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN))
    }

    /// Rate-limit key for a login request.
    pub fn key_for(username: &str, client_ip: Option<&str>) -> String {
        let username = username.trim();
        if username.is_empty() {
            format!("ip:{}", client_ip.unwrap_or("unknown"))
        } else {
            format!("user:{}", username)
        }
    }

    /// Record one attempt for `key`.
    ///
    /// # Errors
    /// Returns `AppError::RateLimited` once the key has used up its quota
    pub fn check(&self, key: &str) -> Result<(), AppError> {
        if self.limiter.len() > SWEEP_THRESHOLD {
            self.limiter.retain_recent();
        }

        self.limiter.check_key(&key.to_string()).map_err(|_| {
            tracing::warn!(rate_limit_key = %key, "Login rate limit exceeded");
            AppError::RateLimited("Too many login attempts, please try again later")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(attempts: u32) -> LoginRateLimiter {
        LoginRateLimiter::from_attempts(attempts)
    }

    #[test]
    fn test_sixth_attempt_within_a_minute_is_rejected() {
        let limiter = limiter(5);
        let key = LoginRateLimiter::key_for("john", None);

        for _ in 0..5 {
            assert!(limiter.check(&key).is_ok());
        }
        assert!(matches!(limiter.check(&key), Err(AppError::RateLimited(_))));
    }

    #[test]
    fn test_keys_are_limited_independently() {
        let limiter = limiter(1);

        assert!(limiter.check("user:john").is_ok());
        assert!(limiter.check("user:john").is_err());
        assert!(limiter.check("user:jane").is_ok());
    }

    #[test]
    fn test_key_falls_back_to_client_ip() {
        assert_eq!(LoginRateLimiter::key_for("john", Some("10.0.0.1")), "user:john");
        assert_eq!(LoginRateLimiter::key_for("  ", Some("10.0.0.1")), "ip:10.0.0.1");
        assert_eq!(LoginRateLimiter::key_for("", None), "ip:unknown");
    }
}

//! Rate limiting for the authentication endpoints.
//!
//! Login and password changes sit behind a per-IP token bucket so
//! credential guessing is throttled. Configured via:
//!
//! - `RATE_LIMIT_ENABLED`: turn the limiter off entirely (default: true)
//! - `RATE_LIMIT_AUTH_PER_SECOND`: token replenishment interval in seconds (default: 10)
//! - `RATE_LIMIT_AUTH_BURST_SIZE`: bucket size (default: 5)
//!
//! The limiter keys on the peer address, so the server must be started with
//! `into_make_service_with_connect_info::<SocketAddr>()`.
//!
//! # Example
//!
//! ```ignore
//! let config = RateLimitConfig::from_env();
//!
//! if let Some(governor) = config.auth_governor_config() {
//!     auth_router = auth_router.layer(GovernorLayer::new(governor));
//! }
//! ```

use std::sync::Arc;

use tower_governor::governor::{GovernorConfig, GovernorConfigBuilder};
use tower_governor::key_extractor::PeerIpKeyExtractor;

use crate::{env_lookup, lookup_bool, lookup_parsed};

pub type AuthGovernorConfig =
    GovernorConfig<PeerIpKeyExtractor, ::governor::middleware::NoOpMiddleware>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Seconds between token replenishments.
    pub auth_per_second: u64,

    /// Maximum tokens that can accumulate.
    pub auth_burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth_per_second: 10,
            auth_burst_size: 5,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            enabled: lookup_bool(&lookup, "RATE_LIMIT_ENABLED", defaults.enabled),
            auth_per_second: lookup_parsed(
                &lookup,
                "RATE_LIMIT_AUTH_PER_SECOND",
                defaults.auth_per_second,
            ),
            auth_burst_size: lookup_parsed(
                &lookup,
                "RATE_LIMIT_AUTH_BURST_SIZE",
                defaults.auth_burst_size,
            ),
        }
    }

    /// Governor config for the auth routes, or `None` when limiting is
    /// disabled or the configured values are zero.
    #[must_use]
    pub fn auth_governor_config(&self) -> Option<Arc<AuthGovernorConfig>> {
        if !self.enabled {
            return None;
        }

        GovernorConfigBuilder::default()
            .per_second(self.auth_per_second)
            .burst_size(self.auth_burst_size)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.auth_per_second, 10);
        assert_eq!(config.auth_burst_size, 5);
        assert_eq!(RateLimitConfig::from_lookup(vars(&[])), config);
    }

    #[test]
    fn test_disabled_has_no_governor() {
        let config = RateLimitConfig::from_lookup(vars(&[("RATE_LIMIT_ENABLED", "false")]));
        assert!(!config.enabled);
        assert!(config.auth_governor_config().is_none());
    }

    #[test]
    fn test_enabled_builds_governor() {
        assert!(RateLimitConfig::default().auth_governor_config().is_some());
    }

    #[test]
    fn test_zero_burst_is_rejected() {
        let config = RateLimitConfig {
            auth_burst_size: 0,
            ..RateLimitConfig::default()
        };
        assert!(config.auth_governor_config().is_none());
    }
}

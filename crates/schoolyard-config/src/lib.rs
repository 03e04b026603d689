//! # Schoolyard Config
//!
//! Configuration types for the Schoolyard API, loaded from environment
//! variables (after `dotenvy` has read `.env`):
//!
//! - [`database`]: connection string and pool size
//! - [`server`]: bind address
//! - [`cors`]: allowed origins
//! - [`session`]: session cookie and lifetime
//! - [`rate_limit`]: limits for the auth endpoints
//! - [`media`]: media host credentials or local fallback
//!
//! Each config has a `from_env()` constructor backed by `from_lookup()`,
//! which takes the variable source as a closure so tests never touch the
//! process environment.
//!
//! # Example
//!
//! ```ignore
//! use schoolyard_config::{CorsConfig, SessionConfig};
//!
//! let cors = CorsConfig::from_env();
//! let session = SessionConfig::from_lookup(|key| match key {
//!     "SESSION_TTL_SECONDS" => Some("3600".to_string()),
//!     _ => None,
//! });
//! ```

use std::str::FromStr;

pub mod cors;
pub mod database;
pub mod media;
pub mod rate_limit;
pub mod server;
pub mod session;

pub use cors::CorsConfig;
pub use database::DatabaseConfig;
pub use media::{MediaBackend, MediaConfig};
pub use rate_limit::RateLimitConfig;
pub use server::ServerConfig;
pub use session::SessionConfig;

pub(crate) fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Reads `key` through `lookup`, ignoring blank values.
pub(crate) fn lookup_string<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses `key`, falling back to `default` when unset or unparsable.
pub(crate) fn lookup_parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup_string(lookup, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub(crate) fn lookup_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup_string(lookup, key).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
pub(crate) fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let owned: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| {
        owned
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_parsed_falls_back() {
        let lookup = vars(&[("A", "12"), ("B", "twelve"), ("C", "  ")]);
        assert_eq!(lookup_parsed(&lookup, "A", 1u32), 12);
        assert_eq!(lookup_parsed(&lookup, "B", 1u32), 1);
        assert_eq!(lookup_parsed(&lookup, "C", 1u32), 1);
        assert_eq!(lookup_parsed(&lookup, "D", 1u32), 1);
    }

    #[test]
    fn test_lookup_bool() {
        let lookup = vars(&[("A", "TRUE"), ("B", "off"), ("C", "maybe")]);
        assert!(lookup_bool(&lookup, "A", false));
        assert!(!lookup_bool(&lookup, "B", true));
        assert!(lookup_bool(&lookup, "C", true));
    }
}

//! Session cookie settings.
//!
//! - `SESSION_COOKIE_NAME`: cookie carrying the session token (default: `sid`)
//! - `SESSION_TTL_SECONDS`: session lifetime (default: 86400)
//! - `SESSION_COOKIE_SECURE`: set the `Secure` attribute (default: false)

use crate::{env_lookup, lookup_bool, lookup_parsed, lookup_string};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_seconds: i64,
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sid".to_string(),
            ttl_seconds: 86_400,
            secure: false,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            cookie_name: lookup_string(&lookup, "SESSION_COOKIE_NAME")
                .unwrap_or(defaults.cookie_name),
            ttl_seconds: lookup_parsed(&lookup, "SESSION_TTL_SECONDS", defaults.ttl_seconds)
                .max(60),
            secure: lookup_bool(&lookup, "SESSION_COOKIE_SECURE", defaults.secure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;

    #[test]
    fn test_defaults() {
        assert_eq!(SessionConfig::from_lookup(vars(&[])), SessionConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = SessionConfig::from_lookup(vars(&[
            ("SESSION_COOKIE_NAME", "schoolyard_sid"),
            ("SESSION_TTL_SECONDS", "3600"),
            ("SESSION_COOKIE_SECURE", "true"),
        ]));
        assert_eq!(config.cookie_name, "schoolyard_sid");
        assert_eq!(config.ttl_seconds, 3600);
        assert!(config.secure);
    }

    #[test]
    fn test_ttl_has_floor() {
        let config = SessionConfig::from_lookup(vars(&[("SESSION_TTL_SECONDS", "5")]));
        assert_eq!(config.ttl_seconds, 60);
    }
}

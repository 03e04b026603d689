//! Database connection settings.
//!
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)

use anyhow::{Result, anyhow};

use crate::{env_lookup, lookup_parsed, lookup_string};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup_string(&lookup, "DATABASE_URL")
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            url,
            max_connections: lookup_parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32).max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;

    #[test]
    fn test_url_is_required() {
        let err = DatabaseConfig::from_lookup(vars(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_defaults_and_overrides() {
        let config =
            DatabaseConfig::from_lookup(vars(&[("DATABASE_URL", "postgres://localhost/school")]))
                .unwrap();
        assert_eq!(config.max_connections, 10);

        let config = DatabaseConfig::from_lookup(vars(&[
            ("DATABASE_URL", "postgres://localhost/school"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.max_connections, 1);
    }
}

use crate::{env_lookup, lookup_parsed, lookup_string};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup_string(&lookup, "SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup_parsed(&lookup, "SERVER_PORT", 3000),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;

    #[test]
    fn test_bind_address() {
        assert_eq!(ServerConfig::from_lookup(vars(&[])).bind_address(), "0.0.0.0:3000");
        let config = ServerConfig::from_lookup(vars(&[("SERVER_HOST", "127.0.0.1"), ("SERVER_PORT", "8080")]));
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }
}

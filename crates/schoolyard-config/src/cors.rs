use crate::{env_lookup, lookup_string};

#[derive(Clone, Debug)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let allowed_origins = lookup_string(&lookup, "ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:5173".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self { allowed_origins }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;

    #[test]
    fn test_default_origins() {
        let config = CorsConfig::from_lookup(vars(&[]));
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "http://localhost:5173"]
        );
    }

    #[test]
    fn test_origins_are_trimmed() {
        let config =
            CorsConfig::from_lookup(vars(&[("ALLOWED_ORIGINS", " https://a.school , ,https://b.school")]));
        assert_eq!(config.allowed_origins, vec!["https://a.school", "https://b.school"]);
    }
}

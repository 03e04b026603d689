//! Media host configuration.
//!
//! When `MEDIA_CLOUD_NAME`, `MEDIA_API_KEY` and `MEDIA_API_SECRET` are all set,
//! uploads go to the hosted API at `MEDIA_BASE_URL`. Otherwise files are
//! written under `MEDIA_LOCAL_DIR` and served from `MEDIA_PUBLIC_URL`.

use crate::{env_lookup, lookup_parsed, lookup_string};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaBackend {
    Hosted {
        base_url: String,
        cloud_name: String,
        api_key: String,
        api_secret: String,
    },
    Local {
        dir: String,
        public_url: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaConfig {
    pub backend: MediaBackend,
    pub folder: String,
    pub max_bytes: usize,
}

impl MediaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let hosted = (
            lookup_string(&lookup, "MEDIA_CLOUD_NAME"),
            lookup_string(&lookup, "MEDIA_API_KEY"),
            lookup_string(&lookup, "MEDIA_API_SECRET"),
        );

        let backend = match hosted {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => MediaBackend::Hosted {
                base_url: lookup_string(&lookup, "MEDIA_BASE_URL")
                    .unwrap_or_else(|| "https://api.cloudinary.com".to_string()),
                cloud_name,
                api_key,
                api_secret,
            },
            _ => MediaBackend::Local {
                dir: lookup_string(&lookup, "MEDIA_LOCAL_DIR")
                    .unwrap_or_else(|| "storage/media".to_string()),
                public_url: lookup_string(&lookup, "MEDIA_PUBLIC_URL")
                    .unwrap_or_else(|| "http://localhost:3000/media".to_string()),
            },
        };

        Self {
            backend,
            folder: lookup_string(&lookup, "MEDIA_FOLDER")
                .unwrap_or_else(|| "schoolyard".to_string()),
            max_bytes: lookup_parsed(&lookup, "MEDIA_MAX_BYTES", 5 * 1024 * 1024),
        }
    }

    /// Local directory to serve under `/media`, if any.
    pub fn local_dir(&self) -> Option<&str> {
        match &self.backend {
            MediaBackend::Local { dir, .. } => Some(dir),
            MediaBackend::Hosted { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars;

    #[test]
    fn test_falls_back_to_local() {
        let config = MediaConfig::from_lookup(vars(&[("MEDIA_CLOUD_NAME", "demo")]));
        assert_eq!(
            config.backend,
            MediaBackend::Local {
                dir: "storage/media".to_string(),
                public_url: "http://localhost:3000/media".to_string(),
            }
        );
        assert_eq!(config.local_dir(), Some("storage/media"));
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_hosted_when_credentials_present() {
        let config = MediaConfig::from_lookup(vars(&[
            ("MEDIA_CLOUD_NAME", "demo"),
            ("MEDIA_API_KEY", "key"),
            ("MEDIA_API_SECRET", "secret"),
            ("MEDIA_FOLDER", "greenfield"),
        ]));
        assert!(matches!(
            config.backend,
            MediaBackend::Hosted { ref base_url, .. } if base_url == "https://api.cloudinary.com"
        ));
        assert_eq!(config.folder, "greenfield");
        assert_eq!(config.local_dir(), None);
    }
}

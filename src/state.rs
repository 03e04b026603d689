use std::path::PathBuf;
use std::sync::Arc;

use schoolyard_config::{
    CorsConfig, MediaBackend, MediaConfig, RateLimitConfig, SessionConfig,
};
use schoolyard_core::MediaStore;
use schoolyard_core::media::{CloudinaryStore, LocalMediaStore, MediaRules};
use schoolyard_observability::MetricsHandle;
use sqlx::PgPool;

/// Settings the router and handlers read, loaded once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            session: SessionConfig::from_env(),
            cors: CorsConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            media: MediaConfig::from_env(),
        }
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            session: SessionConfig::from_lookup(&lookup),
            cors: CorsConfig::from_lookup(&lookup),
            rate_limit: RateLimitConfig::from_lookup(&lookup),
            media: MediaConfig::from_lookup(&lookup),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub session_config: SessionConfig,
    pub cors_config: CorsConfig,
    pub rate_limit_config: RateLimitConfig,
    pub media_config: MediaConfig,
    pub media: Arc<dyn MediaStore>,
    pub metrics: Option<MetricsHandle>,
}

impl AppState {
    pub fn new(db: PgPool, config: AppConfig, metrics: Option<MetricsHandle>) -> Self {
        let media = build_media_store(&config.media);
        Self {
            db,
            session_config: config.session,
            cors_config: config.cors,
            rate_limit_config: config.rate_limit,
            media_config: config.media,
            media,
            metrics,
        }
    }
}

/// Picks the hosted media API when credentials are configured, the local
/// disk otherwise.
pub fn build_media_store(config: &MediaConfig) -> Arc<dyn MediaStore> {
    let rules = MediaRules {
        max_bytes: config.max_bytes,
        ..MediaRules::default()
    };

    match &config.backend {
        MediaBackend::Hosted {
            base_url,
            cloud_name,
            api_key,
            api_secret,
        } => Arc::new(CloudinaryStore::new(
            base_url.clone(),
            cloud_name.clone(),
            api_key.clone(),
            api_secret.clone(),
            config.folder.clone(),
            rules,
        )),
        MediaBackend::Local { dir, public_url } => Arc::new(LocalMediaStore::new(
            PathBuf::from(dir),
            public_url.clone(),
            rules,
        )),
    }
}

pub fn init_app_state(db: PgPool, metrics: Option<MetricsHandle>) -> AppState {
    AppState::new(db, AppConfig::from_env(), metrics)
}

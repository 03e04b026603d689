use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Console-only logging, used when observability is compiled out or
/// switched off with `OBSERVABILITY_ENABLED=false`.
///
/// `LOG_LEVEL` sets the level for the application (default: `info`);
/// `RUST_LOG` overrides the whole filter.
pub fn init_basic_console_logging() {
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "schoolyard={},schoolyard_db={},tower_http=warn,hyper=warn,sqlx=warn",
            log_level, log_level
        ))
    });

    let console_layer = fmt::layer()
        .compact()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    // try_init: the CLI and tests may initialise more than once.
    let _ = tracing_subscriber::registry().with(console_layer).try_init();
}

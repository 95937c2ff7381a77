pub mod authorization; // Subject-level access gate
pub mod commands;
pub mod config;
pub mod core_state; // Transport-agnostic state
pub mod db;
pub mod division_cache;
pub mod forecasting;
pub mod models;

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise [`config::default_log_filter`].
/// Safe to call more than once: later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
}

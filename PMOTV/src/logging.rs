use pmotvconfig::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global subscriber.
///
/// The level comes from `host.logger.min_level`; `RUST_LOG` overrides it.
pub fn init_logging(config: &Config) {
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string())
        .to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let enable_console = config.get_log_enable_console().unwrap_or(true);

    let registry = tracing_subscriber::registry().with(filter);
    if enable_console {
        registry
            .with(fmt::layer().with_target(true).with_level(true).with_ansi(true))
            .init();
    } else {
        registry.init();
    }
}

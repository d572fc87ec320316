//! Log subscriber initialization.

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// Initialize the global tracing subscriber from configuration.
///
/// The `RUST_LOG` environment variable wins over the configured level when
/// it is set. Safe to call once per process; repeated calls from tests
/// should use `try_init` semantics at the call site instead.
pub fn init_tracing_from_config(logging_config: Option<&LoggingConfig>) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = logging_config.map(|c| c.level.as_str()).unwrap_or("info");
            EnvFilter::new(level)
        }
    };

    let default_config = LoggingConfig::default();
    let config = logging_config.unwrap_or(&default_config);

    fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number)
        .with_env_filter(env_filter)
        .init();
}

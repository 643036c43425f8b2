use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::configs::LoggingConfig;

/// Initialise the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the filter is built from the logging
/// config, silencing the chatty `log` bridge by default.
pub fn init(config: Option<&LoggingConfig>) {
    let log_level = config
        .and_then(|l| l.level.as_deref())
        .unwrap_or("info");

    let filters = config
        .and_then(|l| l.filters.as_deref())
        .unwrap_or("");

    let filter_str = if filters.is_empty() {
        format!("{},log=error", log_level)
    } else {
        format!("{},log=error,{}", log_level, filters)
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    let timer = fmt::time::LocalTime::new(time::macros::format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let stdout_layer = fmt::layer().with_timer(timer).with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .try_init();
}

use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes logging to stdout and to a daily-rolling JSON file under `logs/`.
/// `RUST_LOG` adds to the default `listing_pricer=info` directive.
pub fn init_logging() {
    let _ = fs::create_dir_all("logs");

    let file_appender = tracing_appender::rolling::daily("logs", "pricer.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "listing_pricer=info".parse() {
        filter = filter.add_directive(directive);
    }

    // A subscriber may already be installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    // The guard flushes the file writer on drop; keep it for the process lifetime
    std::mem::forget(guard);
}

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One short line per event, for a terminal.
    Compact,
    /// JSON lines for log collectors running next to the server.
    Json,
}

/// Install the global subscriber. `RUST_LOG` wins over `verbose` when set.
pub fn init_logger(format: LogFormat, verbose: bool) {
    let fmt = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    let registry = tracing_subscriber::registry().with(filter(verbose));

    match format {
        LogFormat::Compact => registry.with(fmt.compact()).init(),
        LogFormat::Json => registry.with(fmt.json()).init(),
    }
}

fn filter(verbose: bool) -> EnvFilter {
    let default = if verbose {
        "splitnotes_stream=debug,info"
    } else {
        "splitnotes_stream=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

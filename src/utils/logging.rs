use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Log output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text with timestamp, level, target and message
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "text" => Some(LogFormat::Text),
            _ => None,
        }
    }

    /// Reads `LOG_FORMAT`, falling back to `Text` when unset or unknown.
    pub fn from_env_or_default() -> Self {
        std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|s| Self::parse(&s))
            .unwrap_or(LogFormat::Text)
    }
}

/// Installs the global subscriber. Calling it twice is harmless.
///
/// `RUST_LOG` drives the filter (default `info`); records emitted through the
/// `log` facade are bridged into tracing.
pub fn init_logging(format: LogFormat) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_log::LogTracer;
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let text_layer = (format == LogFormat::Text).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });
    let json_layer = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer);

    // Both globals are set at most once per process; later calls keep the first.
    let _ = LogTracer::init();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Tracing subscriber already initialized: {}", e);
    }
    Ok(())
}

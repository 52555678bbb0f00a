use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Stderr rendering for the wirelink binary's log stream.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line events.
    Text,
    /// Newline-delimited JSON events.
    Json,
}

/// Verbosity floor for connection, session, and intake events.
///
/// `Info` covers lifecycle transitions and per-message traffic; `Warn`
/// keeps only checksum mismatches and intake drops; `Debug` adds
/// displacement and shutdown detail.
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Install the process-wide subscriber. Logs go to stderr so produce and
/// consume output can be piped independently of the log stream.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::from(level))
        .with_ansi(false)
        .with_target(false);

    // try_init: tests may install a subscriber first.
    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

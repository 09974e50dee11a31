//! Log verbosity parsing and tracing subscriber setup

use strum_macros::{Display, EnumString};
use tracing::{Level, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::sentry::sentry_layer;

/// Verbosity accepted from `--log-level` or `LOG_LEVEL`.
///
/// Parsing is case-insensitive and understands the conventional `WARNING`
/// and `CRITICAL` names next to the tracing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[strum(to_string = "WARNING", serialize = "WARN")]
    Warning,
    Error,
    #[strum(to_string = "CRITICAL", serialize = "FATAL")]
    Critical,
}

impl LogLevel {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            // tracing has nothing above ERROR
            LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        }
    }

    /// Whether an event at `level` should be emitted under this verbosity.
    pub fn enables(self, level: Level) -> bool {
        level <= self.level_filter()
    }

    pub fn env_filter(self) -> EnvFilter {
        EnvFilter::default().add_directive(self.level_filter().into())
    }
}

/// Install the process-wide subscriber: human-readable events on stderr plus
/// the sentry layer.
///
/// stdout is never written to because it carries the MCP stdio transport.
pub fn init_tracing(level: LogLevel) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(level.env_filter()),
        )
        .with(sentry_layer())
        .init();
}

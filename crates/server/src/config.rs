//! Command-line and environment configuration
//!
//! Every switch can also be set through an environment variable, which is
//! how MCP clients usually pass settings to stdio servers.

use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use executors::{BridgeConfig, launcher::DEFAULT_INTERPRETER, request::DEFAULT_TIMEOUT_SECS};
use utils::logging::LogLevel;

#[derive(Debug, Clone, Parser)]
#[command(name = "applescript-mcp", version, about = "MCP server that runs AppleScript through osascript")]
pub struct Cli {
    /// Log verbosity: TRACE, DEBUG, INFO, WARNING, ERROR or CRITICAL
    #[arg(long, env = "LOG_LEVEL", default_value = "INFO")]
    pub log_level: String,

    /// Interpreter invoked with the staged script as its only argument
    #[arg(long, env = "APPLESCRIPT_INTERPRETER", default_value = DEFAULT_INTERPRETER)]
    pub interpreter: PathBuf,

    /// Timeout in seconds for calls that do not set `timeout_seconds`
    #[arg(
        long,
        env = "APPLESCRIPT_DEFAULT_TIMEOUT",
        default_value_t = DEFAULT_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub default_timeout: u64,

    /// Directory for staged scripts; the system temp directory when unset
    #[arg(long, env = "APPLESCRIPT_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub log_level: LogLevel,
    /// The raw `--log-level` value when it was not recognized and INFO was used.
    pub unrecognized_log_level: Option<String>,
    pub interpreter: PathBuf,
    pub default_timeout_secs: u64,
    pub staging_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_args() -> Self {
        Cli::parse().into()
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            staging_dir: self.staging_dir.clone(),
            default_timeout_secs: self.default_timeout_secs,
            log_level: self.log_level,
        }
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        let (log_level, unrecognized_log_level) = match LogLevel::from_str(cli.log_level.trim()) {
            Ok(level) => (level, None),
            Err(_) => (LogLevel::default(), Some(cli.log_level)),
        };

        Self {
            log_level,
            unrecognized_log_level,
            interpreter: cli.interpreter,
            default_timeout_secs: cli.default_timeout,
            staging_dir: cli.staging_dir.unwrap_or_else(std::env::temp_dir),
        }
    }
}

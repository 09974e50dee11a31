use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use command_group::{AsyncCommandGroup, AsyncGroupChild};
use thiserror::Error;
use tokio::process::Command;

/// The host automation interpreter on macOS.
pub const DEFAULT_INTERPRETER: &str = "/usr/bin/osascript";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Failed to launch {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Starts the interpreter on a staged script.
///
/// Implementations must pipe stdout and stderr and put the child in its own
/// process group so the whole tree can be killed on timeout.
#[async_trait]
pub trait ScriptLauncher: Send + Sync {
    async fn launch(&self, script_path: &Path) -> Result<AsyncGroupChild, LaunchError>;

    fn program(&self) -> &Path;
}

/// Runs `<program> <script_path>` with no further arguments.
#[derive(Debug, Clone)]
pub struct InterpreterLauncher {
    program: PathBuf,
}

impl InterpreterLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for InterpreterLauncher {
    fn default() -> Self {
        Self::new(DEFAULT_INTERPRETER)
    }
}

#[async_trait]
impl ScriptLauncher for InterpreterLauncher {
    async fn launch(&self, script_path: &Path) -> Result<AsyncGroupChild, LaunchError> {
        let mut command = Command::new(&self.program);
        command
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .arg(script_path);

        command.group_spawn().map_err(|source| LaunchError::Spawn {
            program: self.program.clone(),
            source,
        })
    }

    fn program(&self) -> &Path {
        &self.program
    }
}

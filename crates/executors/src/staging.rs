//! On-disk staging of script bodies for the interpreter

use std::{
    io::{self, Write},
    path::Path,
};

use tempfile::TempPath;
use tracing::Level;
use utils::logging::LogLevel;

pub const STAGED_PREFIX: &str = "applescript-";
pub const STAGED_SUFFIX: &str = ".scpt";

/// A uniquely named script file owned by a single execution.
///
/// The file is removed when the value is dropped, whichever way the
/// execution ended. Removal errors are logged at `warn` when `log_level`
/// allows it and are otherwise ignored.
#[derive(Debug)]
pub struct StagedScript {
    path: Option<TempPath>,
    log_level: LogLevel,
}

impl StagedScript {
    /// Write `body` to a fresh `applescript-*.scpt` file inside `dir`.
    pub fn create(dir: &Path, body: &str) -> io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(STAGED_PREFIX)
            .suffix(STAGED_SUFFIX)
            .tempfile_in(dir)?;
        file.write_all(body.as_bytes())?;
        file.flush()?;

        // Closes our handle; the path keeps ownership of the file.
        Ok(Self {
            path: Some(file.into_temp_path()),
            log_level: LogLevel::default(),
        })
    }

    /// Verbosity for the removal warning emitted on drop.
    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn path(&self) -> &Path {
        match &self.path {
            Some(path) => &**path,
            None => Path::new(""),
        }
    }
}

impl Drop for StagedScript {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let staged_path = path.display().to_string();
        if let Err(err) = path.close() {
            if self.log_level.enables(Level::WARN) {
                tracing::warn!(path = %staged_path, error = %err, "Failed to remove staged script");
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Ok,
    Failed,
    TimedOut,
    InvalidRequest,
}

/// Outcome of one bridge call. Every call yields exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    /// Caller-facing diagnostic, present for every status except `Ok`.
    pub message: Option<String>,
}

impl ExecutionResult {
    pub fn ok(stdout: String, stderr: String) -> Self {
        Self {
            status: ExecutionStatus::Ok,
            stdout,
            stderr,
            exit_code: Some(0),
            message: None,
        }
    }

    /// The interpreter ran and exited unsuccessfully.
    pub fn failed(stdout: String, stderr: String, exit_code: Option<i32>) -> Self {
        let message = format!("AppleScript execution failed: {}", stderr);
        Self {
            status: ExecutionStatus::Failed,
            stdout,
            stderr,
            exit_code,
            message: Some(message),
        }
    }

    /// The interpreter could not be launched or waited on.
    pub fn launch_failed(error: impl std::fmt::Display) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            message: Some(format!("Error executing AppleScript: {}", error)),
        }
    }

    pub fn timed_out(timeout_secs: u64, stdout: String, stderr: String) -> Self {
        Self {
            status: ExecutionStatus::TimedOut,
            stdout,
            stderr,
            exit_code: None,
            message: Some(format!(
                "AppleScript execution timed out after {} seconds",
                timeout_secs
            )),
        }
    }

    pub fn invalid_request(reason: impl std::fmt::Display) -> Self {
        Self {
            status: ExecutionStatus::InvalidRequest,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            message: Some(format!("Error: {}", reason)),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExecutionStatus::Ok
    }

    /// The single text block handed back to the protocol layer: stdout on
    /// success, the diagnostic otherwise.
    pub fn text(&self) -> &str {
        match self.status {
            ExecutionStatus::Ok => &self.stdout,
            _ => self.message.as_deref().unwrap_or_default(),
        }
    }
}

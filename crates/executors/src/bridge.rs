//! Translates one tool call into one interpreter run and back.
//!
//! Each call validates its request, stages the script under a unique name,
//! runs the interpreter under a hard wall-clock budget and classifies the
//! outcome. Nothing is shared between calls, so a single bridge can serve
//! concurrent requests.

use std::{
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use command_group::AsyncGroupChild;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    task::JoinHandle,
    time::timeout,
};
use tracing::Instrument;
use utils::logging::LogLevel;
use uuid::Uuid;

use crate::{
    launcher::{InterpreterLauncher, ScriptLauncher},
    request::{DEFAULT_TIMEOUT_SECS, ExecutionRequest, ValidatedRequest},
    result::ExecutionResult,
    staging::StagedScript,
};

/// How long output readers may keep going once the process is gone.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Emits a tracing event only when the bridge's own verbosity allows it.
macro_rules! bridge_event {
    ($bridge:expr, $level:ident, $($arg:tt)+) => {
        if $bridge.config.log_level.enables(tracing::Level::$level) {
            tracing::event!(tracing::Level::$level, $($arg)+);
        }
    };
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Directory that receives staged scripts. Must be writable.
    pub staging_dir: PathBuf,
    /// Budget for requests that do not specify `timeout_seconds`.
    pub default_timeout_secs: u64,
    pub log_level: LogLevel,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir(),
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_level: LogLevel::default(),
        }
    }
}

pub struct ExecutionBridge {
    launcher: Arc<dyn ScriptLauncher>,
    config: BridgeConfig,
}

impl fmt::Debug for ExecutionBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionBridge")
            .field("program", &self.launcher.program())
            .field("config", &self.config)
            .finish()
    }
}

impl ExecutionBridge {
    /// Bridge to the default host interpreter.
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_launcher(config, Arc::new(InterpreterLauncher::default()))
    }

    pub fn with_launcher(config: BridgeConfig, launcher: Arc<dyn ScriptLauncher>) -> Self {
        Self { launcher, config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Run one request to completion. Never fails: every problem is reported
    /// through the returned result.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let execution_id = Uuid::new_v4();
        let span = tracing::info_span!("applescript_execute", %execution_id);
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: ExecutionRequest) -> ExecutionResult {
        let request = match request.validate(self.config.default_timeout_secs) {
            Ok(request) => request,
            Err(err) => {
                bridge_event!(self, WARN, error = %err, "Rejected invalid request");
                return ExecutionResult::invalid_request(err);
            }
        };

        bridge_event!(
            self,
            INFO,
            script_len = request.script.len(),
            timeout_secs = request.timeout_secs,
            "Executing AppleScript"
        );

        let staged = match StagedScript::create(&self.config.staging_dir, &request.script) {
            Ok(staged) => staged.with_log_level(self.config.log_level),
            Err(err) => {
                bridge_event!(
                    self,
                    ERROR,
                    staging_dir = %self.config.staging_dir.display(),
                    error = %err,
                    "Failed to stage script"
                );
                return ExecutionResult::launch_failed(format!("Failed to stage script: {}", err));
            }
        };
        bridge_event!(self, DEBUG, path = %staged.path().display(), "Staged script");

        let result = self.invoke(&staged, &request).await;
        drop(staged);
        result
    }

    async fn invoke(&self, staged: &StagedScript, request: &ValidatedRequest) -> ExecutionResult {
        let mut child = match self.launcher.launch(staged.path()).await {
            Ok(child) => child,
            Err(err) => {
                bridge_event!(self, ERROR, error = %err, "Failed to launch interpreter");
                return ExecutionResult::launch_failed(err);
            }
        };

        // The leader's pid doubles as the group id and is gone from `child`
        // once it has been reaped.
        let pgid = child.id();
        bridge_event!(
            self,
            DEBUG,
            pid = ?pgid,
            program = %self.launcher.program().display(),
            "Spawned interpreter"
        );

        let stdout = OutputReader::spawn(child.inner().stdout.take());
        let stderr = OutputReader::spawn(child.inner().stderr.take());

        match timeout(request.timeout(), child.wait()).await {
            Ok(Ok(status)) => {
                self.kill_leftovers(pgid);
                let stdout = self.collect(stdout).await;
                let stderr = self.collect(stderr).await;

                if status.success() {
                    bridge_event!(
                        self,
                        INFO,
                        stdout_len = stdout.len(),
                        "AppleScript executed successfully"
                    );
                    ExecutionResult::ok(stdout, stderr)
                } else {
                    bridge_event!(
                        self,
                        ERROR,
                        exit_code = ?status.code(),
                        stderr = %stderr,
                        "AppleScript execution failed"
                    );
                    ExecutionResult::failed(stdout, stderr, status.code())
                }
            }
            Ok(Err(err)) => {
                bridge_event!(self, ERROR, error = %err, "Failed waiting for interpreter");
                self.terminate(&mut child).await;
                stdout.task.abort();
                stderr.task.abort();
                ExecutionResult::launch_failed(err)
            }
            Err(_) => {
                bridge_event!(
                    self,
                    WARN,
                    timeout_secs = request.timeout_secs,
                    "AppleScript execution timed out, killing process group"
                );
                self.terminate(&mut child).await;
                let stdout = self.collect(stdout).await;
                let stderr = self.collect(stderr).await;
                ExecutionResult::timed_out(request.timeout_secs, stdout, stderr)
            }
        }
    }

    /// Kill the whole process group and reap it.
    async fn terminate(&self, child: &mut AsyncGroupChild) {
        if let Err(err) = child.kill().await {
            bridge_event!(self, WARN, error = %err, "Failed to kill interpreter process group");
        }
    }

    /// Kill anything the interpreter left running in its group after it
    /// exited, so background jobs release the output pipes.
    #[cfg(unix)]
    fn kill_leftovers(&self, pgid: Option<u32>) {
        use nix::{
            errno::Errno,
            sys::signal::{Signal, killpg},
            unistd::Pid,
        };

        let Some(pgid) = pgid.and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => bridge_event!(self, DEBUG, pgid, "Killed processes left behind by interpreter"),
            Err(Errno::ESRCH) => {}
            Err(err) => {
                bridge_event!(self, WARN, pgid, error = %err, "Failed to kill leftover processes")
            }
        }
    }

    #[cfg(not(unix))]
    fn kill_leftovers(&self, _pgid: Option<u32>) {}

    /// Wait briefly for a reader to hit EOF, then take whatever it has read.
    async fn collect(&self, mut reader: OutputReader) -> String {
        match timeout(OUTPUT_DRAIN_GRACE, &mut reader.task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                bridge_event!(self, WARN, error = %err, "Output reader task failed");
            }
            Err(_) => {
                reader.task.abort();
                bridge_event!(
                    self,
                    WARN,
                    "Output stream still open after interpreter exit, keeping what was read"
                );
            }
        }
        reader.take()
    }
}

/// Reads a child pipe to EOF on its own task into a shared buffer, so bytes
/// already read survive if the task has to be abandoned.
struct OutputReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl OutputReader {
    fn spawn<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => append(&sink, &chunk[..n]),
                }
            }
        });
        Self { buf, task }
    }

    fn take(self) -> String {
        let bytes = match self.buf.lock() {
            Ok(mut buf) => std::mem::take(&mut *buf),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn append(buf: &Mutex<Vec<u8>>, bytes: &[u8]) {
    match buf.lock() {
        Ok(mut buf) => buf.extend_from_slice(bytes),
        Err(poisoned) => poisoned.into_inner().extend_from_slice(bytes),
    }
}

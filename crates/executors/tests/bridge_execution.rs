//! End-to-end bridge tests against `/bin/sh` standing in for the interpreter.

#![cfg(unix)]

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use command_group::{AsyncCommandGroup, AsyncGroupChild};
use executors::{
    BridgeConfig, ExecutionBridge, ExecutionRequest, ExecutionStatus, InterpreterLauncher,
    LaunchError, ScriptLauncher,
};
use nix::{
    errno::Errno,
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use tempfile::TempDir;
use tokio::process::Command;
use utils::logging::LogLevel;

/// Records every launch before delegating to a real interpreter.
struct SpyLauncher {
    inner: InterpreterLauncher,
    launches: AtomicUsize,
    pids: Mutex<Vec<u32>>,
    scripts: Mutex<Vec<PathBuf>>,
}

impl SpyLauncher {
    fn new(program: &str) -> Self {
        Self {
            inner: InterpreterLauncher::new(program),
            launches: AtomicUsize::new(0),
            pids: Mutex::new(Vec::new()),
            scripts: Mutex::new(Vec::new()),
        }
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptLauncher for SpyLauncher {
    async fn launch(&self, script_path: &Path) -> Result<AsyncGroupChild, LaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.scripts.lock().unwrap().push(script_path.to_path_buf());
        let child = self.inner.launch(script_path).await?;
        if let Some(pid) = child.id() {
            self.pids.lock().unwrap().push(pid);
        }
        Ok(child)
    }

    fn program(&self) -> &Path {
        self.inner.program()
    }
}

/// Understands exactly one statement, `return <arithmetic>`, and prints the value.
struct ReturnEvaluator;

#[async_trait]
impl ScriptLauncher for ReturnEvaluator {
    async fn launch(&self, script_path: &Path) -> Result<AsyncGroupChild, LaunchError> {
        Command::new("/bin/sh")
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .arg("-c")
            .arg(r#"expr=$(sed 's/^return //' "$1"); printf '%s' "$(($expr))""#)
            .arg("return-evaluator")
            .arg(script_path)
            .group_spawn()
            .map_err(|source| LaunchError::Spawn {
                program: PathBuf::from("/bin/sh"),
                source,
            })
    }

    fn program(&self) -> &Path {
        Path::new("/bin/sh")
    }
}

fn config(staging: &TempDir) -> BridgeConfig {
    BridgeConfig {
        staging_dir: staging.path().to_path_buf(),
        default_timeout_secs: 60,
        log_level: LogLevel::Debug,
    }
}

fn sh_bridge(staging: &TempDir) -> (ExecutionBridge, Arc<SpyLauncher>) {
    let spy = Arc::new(SpyLauncher::new("/bin/sh"));
    let bridge = ExecutionBridge::with_launcher(config(staging), spy.clone());
    (bridge, spy)
}

fn staged_leftovers(staging: &TempDir) -> Vec<PathBuf> {
    std::fs::read_dir(staging.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with("applescript-") && name.ends_with(".scpt")
        })
        .collect()
}

async fn process_gone(pid: u32) -> bool {
    let pid = Pid::from_raw(pid as i32);
    for _ in 0..40 {
        if kill(pid, None::<Signal>) == Err(Errno::ESRCH) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn successful_script_returns_stdout_verbatim() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, spy) = sh_bridge(&staging);

    let result = bridge
        .execute(ExecutionRequest::new("printf 'hello\\nworld\\n'").with_timeout(5))
        .await;

    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(result.stdout, "hello\nworld\n");
    assert_eq!(result.text(), "hello\nworld\n");
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(spy.launches(), 1);
    assert!(staged_leftovers(&staging).is_empty());
}

#[tokio::test]
async fn return_expression_is_evaluated() {
    let staging = tempfile::tempdir().unwrap();
    let bridge = ExecutionBridge::with_launcher(config(&staging), Arc::new(ReturnEvaluator));

    let result = bridge
        .execute(ExecutionRequest::new("return 2+2").with_timeout(5))
        .await;

    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(result.stdout, "4");
}

#[tokio::test]
async fn stderr_is_kept_on_success() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, _) = sh_bridge(&staging);

    let result = bridge
        .execute(ExecutionRequest::new("echo 'just a warning' >&2; printf done"))
        .await;

    assert!(result.is_ok());
    assert_eq!(result.stdout, "done");
    assert_eq!(result.stderr, "just a warning\n");
}

#[tokio::test]
async fn large_output_is_fully_captured() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, _) = sh_bridge(&staging);

    let result = bridge
        .execute(ExecutionRequest::new(
            "head -c 300000 /dev/zero | tr '\\0' 'a'; head -c 100000 /dev/zero | tr '\\0' 'e' >&2",
        ))
        .await;

    assert!(result.is_ok(), "{:?}", result.message);
    assert_eq!(result.stdout.len(), 300_000);
    assert_eq!(result.stderr.len(), 100_000);
}

#[tokio::test]
async fn missing_script_spawns_nothing() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, spy) = sh_bridge(&staging);

    let result = bridge.execute(ExecutionRequest::default()).await;

    assert_eq!(result.status, ExecutionStatus::InvalidRequest);
    assert_eq!(result.text(), "Error: Missing script argument");
    assert_eq!(spy.launches(), 0);
    assert!(staged_leftovers(&staging).is_empty());
}

#[tokio::test]
async fn empty_script_spawns_nothing() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, spy) = sh_bridge(&staging);

    let result = bridge.execute(ExecutionRequest::new("")).await;

    assert_eq!(result.status, ExecutionStatus::InvalidRequest);
    assert_eq!(spy.launches(), 0);
}

#[tokio::test]
async fn non_positive_timeout_spawns_nothing() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, spy) = sh_bridge(&staging);

    let result = bridge
        .execute(ExecutionRequest::new("printf hi").with_timeout(0))
        .await;

    assert_eq!(result.status, ExecutionStatus::InvalidRequest);
    assert!(result.text().contains("timeout_seconds"));
    assert_eq!(spy.launches(), 0);
}

#[tokio::test]
async fn non_zero_exit_surfaces_stderr() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, _) = sh_bridge(&staging);

    let result = bridge
        .execute(ExecutionRequest::new(
            "echo 'execution error: Notes got an error (-1728)' >&2; exit 3",
        ))
        .await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.exit_code, Some(3));
    assert!(
        result
            .text()
            .starts_with("AppleScript execution failed: execution error: Notes got an error")
    );
    assert!(staged_leftovers(&staging).is_empty());
}

#[tokio::test]
async fn timeout_kills_process_group_near_deadline() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, spy) = sh_bridge(&staging);

    let started = Instant::now();
    let result = bridge
        .execute(ExecutionRequest::new("printf partial; sleep 30").with_timeout(1))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, ExecutionStatus::TimedOut);
    assert_eq!(result.text(), "AppleScript execution timed out after 1 seconds");
    // Only reaches EOF once every holder of the pipe, `sleep` included, is dead.
    assert_eq!(result.stdout, "partial");
    assert!(elapsed >= Duration::from_secs(1), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "returned late: {elapsed:?}");

    let pid = spy.pids.lock().unwrap()[0];
    assert!(process_gone(pid).await, "interpreter {pid} survived");
    assert!(staged_leftovers(&staging).is_empty());
}

#[tokio::test]
async fn background_job_does_not_swallow_output() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, _) = sh_bridge(&staging);

    let started = Instant::now();
    let result = bridge
        .execute(ExecutionRequest::new("printf result; sleep 30 &").with_timeout(10))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(result.status, ExecutionStatus::Ok);
    assert_eq!(result.stdout, "result");
    // The backgrounded `sleep` held stdout open until it was killed with the group.
    assert!(elapsed < Duration::from_millis(1500), "drained late: {elapsed:?}");
    assert!(staged_leftovers(&staging).is_empty());
}

#[tokio::test]
async fn missing_interpreter_is_a_failure_not_a_panic() {
    let staging = tempfile::tempdir().unwrap();
    let bridge = ExecutionBridge::with_launcher(
        config(&staging),
        Arc::new(InterpreterLauncher::new("/nonexistent/osascript")),
    );

    let result = bridge.execute(ExecutionRequest::new("beep")).await;

    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.exit_code, None);
    assert!(
        result
            .text()
            .starts_with("Error executing AppleScript: Failed to launch /nonexistent/osascript")
    );
    assert!(staged_leftovers(&staging).is_empty());

    // The bridge stays usable after a failed call.
    let (healthy, _) = sh_bridge(&staging);
    assert!(healthy.execute(ExecutionRequest::new("true")).await.is_ok());
}

#[tokio::test]
async fn repeated_requests_stage_independent_files() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, spy) = sh_bridge(&staging);
    let request = ExecutionRequest::new("printf same").with_timeout(5);

    let first = bridge.execute(request.clone()).await;
    assert!(staged_leftovers(&staging).is_empty());
    let second = bridge.execute(request).await;
    assert!(staged_leftovers(&staging).is_empty());

    assert_eq!(first, second);
    let scripts = spy.scripts.lock().unwrap().clone();
    assert_eq!(scripts.len(), 2);
    assert_ne!(scripts[0], scripts[1]);
    assert!(scripts.iter().all(|path| !path.exists()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_do_not_cross_talk() {
    let staging = tempfile::tempdir().unwrap();
    let (bridge, spy) = sh_bridge(&staging);
    let bridge = Arc::new(bridge);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let bridge = bridge.clone();
            tokio::spawn(async move {
                let script = format!("sleep 0.2; printf 'result-{i}'");
                (i, bridge.execute(ExecutionRequest::new(script).with_timeout(10)).await)
            })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.await.unwrap();
        assert!(result.is_ok(), "request {i}: {:?}", result.message);
        assert_eq!(result.stdout, format!("result-{i}"));
    }
    assert_eq!(spy.launches(), 8);
    assert!(staged_leftovers(&staging).is_empty());
}

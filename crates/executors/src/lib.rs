//! AppleScript execution bridge
//!
//! Stages a script body to a temporary file, runs the host interpreter on it
//! under a timeout and turns the outcome into an [`ExecutionResult`].

pub mod bridge;
pub mod launcher;
pub mod request;
pub mod result;
pub mod staging;

pub use bridge::{BridgeConfig, ExecutionBridge};
pub use launcher::{InterpreterLauncher, LaunchError, ScriptLauncher};
pub use request::{ExecutionRequest, RequestError};
pub use result::{ExecutionResult, ExecutionStatus};

//! Error types.

use thiserror::Error;

/// Failure reported by a host capability (breakpoint store or command).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("Breakpoint store error: {0}")]
    Breakpoints(String),
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },
}

/// Failure of a custom request sent to a debug adapter.
///
/// Never propagated out of the state machine; logged and swallowed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Request '{command}' failed: {message}")]
    Request { command: String, message: String },
    #[error("Session has ended")]
    SessionEnded,
    #[error("Custom requests are not supported by this session")]
    Unsupported,
}

/// Force-run operation error.
#[derive(Debug, Error)]
pub enum ForceRunError {
    #[error("Host error: {0}")]
    Host(#[from] HostError),
    #[error("Run to cursor failed: {0}")]
    RunToCursor(HostError),
}

//! Host capability traits.
//!
//! The host IDE owns breakpoints, commands, notifications and debug
//! sessions. Force-run only talks to them through these seams.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::{HostError, ProtocolError},
    types::Breakpoint,
};

/// Trait for the host's breakpoint store.
#[async_trait]
pub trait BreakpointStore: Send + Sync {
    /// All breakpoints, in host order.
    async fn list(&self) -> Result<Vec<Breakpoint>, HostError>;

    /// Add breakpoints.
    async fn add(&self, breakpoints: &[Breakpoint]) -> Result<(), HostError>;

    /// Remove breakpoints.
    async fn remove(&self, breakpoints: &[Breakpoint]) -> Result<(), HostError>;
}

/// Trait for executing host commands by name.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute a command, e.g. the built-in run to cursor action.
    async fn execute(&self, command: &str) -> Result<Value, HostError>;
}

/// Trait for user-facing notifications.
pub trait Notifier: Send + Sync {
    /// Show an informational message.
    fn show_info(&self, message: &str);

    /// Show a warning.
    fn show_warning(&self, message: &str);
}

/// Notifier that writes user messages to the log.
///
/// Useful for headless hosts and tests.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show_info(&self, message: &str) {
        tracing::info!(target: "force_run::notify", "{message}");
    }

    fn show_warning(&self, message: &str) {
        tracing::warn!(target: "force_run::notify", "{message}");
    }
}

/// A live debug session.
#[async_trait]
pub trait DebugSession: Send + Sync {
    /// Session identifier.
    fn id(&self) -> &str;

    /// Whether `custom_request` can be used on this session.
    fn supports_custom_requests(&self) -> bool {
        true
    }

    /// Send a request straight to the debug adapter.
    async fn custom_request(&self, command: &str, arguments: Value) -> Result<Value, ProtocolError>;
}

/// Dependency bundle handed to every force-run operation.
#[derive(Clone)]
pub struct HostServices {
    /// Command execution.
    pub commands: Arc<dyn CommandExecutor>,
    /// User notifications.
    pub notifier: Arc<dyn Notifier>,
    /// Breakpoint store.
    pub breakpoints: Arc<dyn BreakpointStore>,
}

impl HostServices {
    /// Bundle host capabilities.
    #[must_use]
    pub fn new(
        commands: Arc<dyn CommandExecutor>,
        notifier: Arc<dyn Notifier>,
        breakpoints: Arc<dyn BreakpointStore>,
    ) -> Self {
        Self {
            commands,
            notifier,
            breakpoints,
        }
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}

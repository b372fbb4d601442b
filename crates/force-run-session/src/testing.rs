//! Host fakes shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use force_run_core::{
    Breakpoint, BreakpointStore, CommandExecutor, DebugSession, HostError, HostServices, Notifier,
    ProtocolError,
};
use serde_json::Value;
use tokio::sync::Notify;

use crate::storage::MemoryBreakpointStore;

/// Command executor that records every command.
///
/// When `temp_breakpoint` is set, executing a command drops it into the
/// store, the way run to cursor leaves a temporary breakpoint behind. When
/// `gate` is set, the first command blocks until it is notified.
#[derive(Default)]
pub struct RecordingCommands {
    pub executed: Mutex<Vec<String>>,
    pub fail: bool,
    pub temp_breakpoint: Option<(Arc<MemoryBreakpointStore>, Breakpoint)>,
    pub gate: Mutex<Option<Arc<Notify>>>,
}

impl RecordingCommands {
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandExecutor for RecordingCommands {
    async fn execute(&self, command: &str) -> Result<Value, HostError> {
        self.executed.lock().unwrap().push(command.to_string());
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(HostError::Command {
                command: command.to_string(),
                message: "no debug session focused".into(),
            });
        }
        if let Some((store, bp)) = &self.temp_breakpoint {
            store.add(std::slice::from_ref(bp)).await?;
        }
        Ok(Value::Null)
    }
}

/// Notifier that records every message.
#[derive(Default)]
pub struct RecordingNotifier {
    pub infos: Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn show_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

/// Debug session that records custom requests.
pub struct FakeSession {
    id: String,
    fail: bool,
    supports_custom: bool,
    requests: Mutex<Vec<(String, Value)>>,
}

impl FakeSession {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            fail: false,
            supports_custom: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            fail: true,
            supports_custom: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn without_custom_requests(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            fail: false,
            supports_custom: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn handle(self: &Arc<Self>) -> Arc<dyn DebugSession> {
        Arc::clone(self) as Arc<dyn DebugSession>
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, command: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|(c, _)| c == command)
            .map(|(_, args)| args)
            .collect()
    }
}

#[async_trait]
impl DebugSession for FakeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports_custom_requests(&self) -> bool {
        self.supports_custom
    }

    async fn custom_request(&self, command: &str, arguments: Value) -> Result<Value, ProtocolError> {
        self.requests
            .lock()
            .unwrap()
            .push((command.to_string(), arguments));
        if self.fail {
            return Err(ProtocolError::Request {
                command: command.to_string(),
                message: "adapter rejected request".into(),
            });
        }
        Ok(Value::Null)
    }
}

/// Bundle of fakes standing in for the host.
pub struct TestHost {
    pub store: Arc<MemoryBreakpointStore>,
    pub commands: Arc<RecordingCommands>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestHost {
    pub fn new() -> Self {
        Self::with_breakpoints(Vec::new())
    }

    pub fn with_breakpoints(breakpoints: Vec<Breakpoint>) -> Self {
        Self {
            store: Arc::new(MemoryBreakpointStore::with_breakpoints(breakpoints)),
            commands: Arc::new(RecordingCommands::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    /// Run to cursor leaves `temp` in the store.
    pub fn leaving_temp_breakpoint(mut self, temp: Breakpoint) -> Self {
        self.commands = Arc::new(RecordingCommands {
            temp_breakpoint: Some((Arc::clone(&self.store), temp)),
            ..RecordingCommands::default()
        });
        self
    }

    /// The first run to cursor waits for `gate`.
    pub fn gating_first_run_to_cursor(mut self, gate: Arc<Notify>) -> Self {
        self.commands = Arc::new(RecordingCommands {
            gate: Mutex::new(Some(gate)),
            ..RecordingCommands::default()
        });
        self
    }

    /// Run to cursor fails.
    pub fn failing_run_to_cursor(mut self) -> Self {
        self.commands = Arc::new(RecordingCommands {
            fail: true,
            ..RecordingCommands::default()
        });
        self
    }

    pub fn services(&self) -> HostServices {
        HostServices::new(
            Arc::clone(&self.commands) as Arc<dyn CommandExecutor>,
            Arc::clone(&self.notifier) as Arc<dyn Notifier>,
            Arc::clone(&self.store) as Arc<dyn BreakpointStore>,
        )
    }
}

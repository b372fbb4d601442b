//! Simulated host driving force run to cursor end to end.
//!
//! Run with: cargo run -p host-sim
//!
//! Set `RUST_LOG=debug` to see every state transition.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use anyhow::Context as _;
use async_trait::async_trait;
use force_run_core::{
    Breakpoint, BreakpointStore, CommandExecutor, DebugSession, ForceRunConfig, HostError,
    HostServices, ProtocolError, ProtocolMessage, SessionId, TracingNotifier,
    protocol::{CONTINUE, SET_EXCEPTION_BREAKPOINTS},
};
use force_run_session::{ForceRunManager, storage::MemoryBreakpointStore};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Traffic seen on the simulated adapter tap.
enum Tap {
    Outgoing(SessionId, ProtocolMessage),
    Incoming(SessionId, ProtocolMessage),
    Terminated(SessionId),
}

/// A debug adapter that reaches the cursor shortly after resuming,
/// optionally throwing a few exceptions on the way.
struct SimSession {
    id: SessionId,
    tap: mpsc::UnboundedSender<Tap>,
    exceptions_ahead: AtomicU32,
}

impl SimSession {
    fn new(tap: mpsc::UnboundedSender<Tap>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            tap,
            exceptions_ahead: AtomicU32::new(0),
        })
    }

    fn handle(self: &Arc<Self>) -> Arc<dyn DebugSession> {
        Arc::clone(self) as Arc<dyn DebugSession>
    }

    fn send(&self, command: &str, arguments: Value) {
        let message = ProtocolMessage::request(command, Some(arguments));
        let _ = self.tap.send(Tap::Outgoing(self.id.clone(), message));
    }

    fn throw_exceptions(&self, count: u32) {
        self.exceptions_ahead.store(count, Ordering::SeqCst);
    }

    fn terminate(&self) {
        let _ = self.tap.send(Tap::Terminated(self.id.clone()));
    }

    /// Resume the debuggee; it stops again after a short while.
    fn resume(&self) {
        let throws = self
            .exceptions_ahead
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let reason = if throws { "exception" } else { "breakpoint" };
        let tap = self.tap.clone();
        let id = self.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let event =
                ProtocolMessage::event("stopped", Some(json!({ "reason": reason, "threadId": 1 })));
            let _ = tap.send(Tap::Incoming(id, event));
        });
    }
}

#[async_trait]
impl DebugSession for SimSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn custom_request(&self, command: &str, arguments: Value) -> Result<Value, ProtocolError> {
        self.send(command, arguments);
        if command == CONTINUE {
            self.resume();
        }
        Ok(Value::Null)
    }
}

/// Host commands; only run to cursor is understood.
struct SimCommands {
    session: Arc<SimSession>,
    store: Arc<MemoryBreakpointStore>,
    config: ForceRunConfig,
}

#[async_trait]
impl CommandExecutor for SimCommands {
    async fn execute(&self, command: &str) -> Result<Value, HostError> {
        if command != self.config.run_to_cursor_command {
            return Err(HostError::Command {
                command: command.to_string(),
                message: "unknown command".into(),
            });
        }
        let temp = Breakpoint::source(Uuid::new_v4().to_string(), "src/main.rs", 42);
        self.store.add(std::slice::from_ref(&temp)).await?;
        self.session
            .send("setBreakpoints", json!({ "source": { "path": "src/main.rs" } }));
        self.session.send(CONTINUE, json!({ "threadId": 1 }));
        self.session.resume();
        Ok(Value::Null)
    }
}

async fn dispatch(
    manager: ForceRunManager,
    session: Arc<SimSession>,
    mut rx: mpsc::UnboundedReceiver<Tap>,
) {
    while let Some(tap) = rx.recv().await {
        let result = match tap {
            Tap::Outgoing(id, message) => {
                manager.on_outgoing_message(&id, &message).await;
                Ok(false)
            }
            Tap::Incoming(id, message) => {
                manager
                    .on_incoming_message(&id, &message, Some(session.handle()))
                    .await
            }
            Tap::Terminated(id) => manager.on_session_terminated(&id).await,
        };
        if let Err(e) = result {
            tracing::error!("Dispatch failed: {e}");
        }
    }
}

async fn wait_idle(manager: &ForceRunManager) -> anyhow::Result<()> {
    let wait = async {
        let mut status = manager.status_stream();
        while let Some(pending) = status.next().await {
            if !pending {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .context("force-run did not finish")
}

fn describe(store: &MemoryBreakpointStore) -> Vec<String> {
    store
        .snapshot()
        .iter()
        .map(|bp| match (bp.location(), bp.function_name()) {
            (Some(loc), _) => format!("{}:{}", loc.path, loc.line),
            (None, Some(name)) => format!("fn {name}"),
            (None, None) => bp.id.clone(),
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let (tap_tx, tap_rx) = mpsc::unbounded_channel();
    let session = SimSession::new(tap_tx);
    let store = Arc::new(MemoryBreakpointStore::with_breakpoints(vec![
        Breakpoint::source("bp-1", "src/main.rs", 12),
        Breakpoint::source("bp-2", "src/main.rs", 42).with_condition("i > 3"),
        Breakpoint::function("bp-3", "parse_config"),
    ]));
    let config = ForceRunConfig::default();
    let host = HostServices::new(
        Arc::new(SimCommands {
            session: Arc::clone(&session),
            store: Arc::clone(&store),
            config: config.clone(),
        }),
        Arc::new(TracingNotifier),
        Arc::clone(&store) as Arc<dyn BreakpointStore>,
    );
    let manager = ForceRunManager::new(host, config);
    let dispatcher = tokio::spawn(dispatch(
        manager.clone(),
        Arc::clone(&session),
        tap_rx,
    ));

    tracing::info!(session_id = %session.id, breakpoints = ?describe(&store), "Session paused");
    session.send(SET_EXCEPTION_BREAKPOINTS, json!({ "filters": ["uncaught"] }));
    tokio::time::sleep(Duration::from_millis(10)).await;

    tracing::info!("Force run to cursor");
    manager.start(Some(session.handle())).await?;
    wait_idle(&manager).await?;
    tracing::info!(breakpoints = ?describe(&store), "Stopped at cursor");

    tracing::info!("Force run through an adapter that keeps breaking on exceptions");
    session.throw_exceptions(2);
    manager.start(Some(session.handle())).await?;
    wait_idle(&manager).await?;
    tracing::info!(breakpoints = ?describe(&store), "Stopped at cursor");

    tracing::info!("Force run without a session");
    manager.start(None).await?;

    tracing::info!("Session ends during a force run");
    manager.start(Some(session.handle())).await?;
    session.terminate();
    wait_idle(&manager).await?;
    tracing::info!(breakpoints = ?describe(&store), "Session ended");

    manager.shutdown().await?;
    dispatcher.abort();
    Ok(())
}

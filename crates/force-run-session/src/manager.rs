//! Force-run manager.
//!
//! Owns the context, serializes every operation on it, and runs the no-op
//! watchdog for each started force-run.
//!
//! The context lock is never held while waiting on the adapter or on run
//! to cursor: hosts may feed the adapter tap back into the manager before
//! those requests complete. Watchdogs are only armed and disarmed with the
//! context locked, so they always agree with the active runs.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use force_run_core::{
    DebugSession, ForceRunConfig, ForceRunContext, ForceRunError, HostServices, ProtocolMessage,
    RunId, SessionId,
};
use tokio::{
    sync::{Mutex, watch},
    task::AbortHandle,
};
use tokio_stream::wrappers::WatchStream;

use crate::{
    controller::{self, StartOutcome},
    monitor::{self, StopAction},
    restore::{self, RestoreOutcome},
};

struct Watchdog {
    run_id: RunId,
    handle: AbortHandle,
}

struct Inner {
    host: HostServices,
    config: ForceRunConfig,
    context: Mutex<ForceRunContext>,
    watchdogs: StdMutex<HashMap<SessionId, Watchdog>>,
    status: watch::Sender<bool>,
}

/// Entry point for hosts.
///
/// Cheap to clone; clones share state. Two message entry points receive
/// the adapter tap, and the host reports session termination separately.
#[derive(Clone)]
pub struct ForceRunManager {
    inner: Arc<Inner>,
}

impl ForceRunManager {
    /// Create a new manager.
    #[must_use]
    pub fn new(host: HostServices, config: ForceRunConfig) -> Self {
        let (status, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                host,
                config,
                context: Mutex::new(ForceRunContext::new()),
                watchdogs: StdMutex::new(HashMap::new()),
                status,
            }),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ForceRunConfig {
        &self.inner.config
    }

    /// Start a force-run on `session`.
    ///
    /// Must be called from within a Tokio runtime; the no-op watchdog is
    /// spawned onto it.
    ///
    /// # Errors
    /// Returns error if the breakpoint store or run to cursor fails. A
    /// failed run to cursor has already been rolled back.
    pub async fn start(
        &self,
        session: Option<Arc<dyn DebugSession>>,
    ) -> Result<StartOutcome, ForceRunError> {
        let (outcome, suppression) = {
            let mut ctx = self.inner.context.lock().await;
            let prepared = controller::prepare(session, &self.inner.host, &mut ctx).await;
            self.publish(&ctx);
            prepared?
        };
        if let Some(suppression) = suppression {
            if suppression.send().await {
                suppression.record(&mut *self.inner.context.lock().await);
            }
        }
        let (session_id, run_id) = match &outcome {
            StartOutcome::Started { session_id, run_id } => (session_id.clone(), *run_id),
            StartOutcome::NoSession | StartOutcome::AlreadyPending => return Ok(outcome),
        };

        if let Err(e) = controller::run_to_cursor(&self.inner.host, &self.inner.config).await {
            tracing::error!(%session_id, "{e}");
            let rollback = {
                let mut ctx = self.inner.context.lock().await;
                let rollback =
                    controller::abandon(&session_id, run_id, &self.inner.host, &mut ctx).await;
                self.publish(&ctx);
                rollback?
            };
            rollback.finish().await;
            return Err(e);
        }

        let ctx = self.inner.context.lock().await;
        if ctx.run(&session_id).is_some_and(|state| state.run_id == run_id) {
            self.arm_watchdog(session_id, run_id);
        } else {
            tracing::debug!(%session_id, run_id, "Force-run finished before run to cursor returned");
        }
        Ok(outcome)
    }

    /// Feed a request the host sent to the adapter.
    pub async fn on_outgoing_message(&self, session_id: &str, message: &ProtocolMessage) {
        let mut ctx = self.inner.context.lock().await;
        monitor::observe_outgoing(session_id, message, &mut ctx);
    }

    /// Feed a message the adapter sent to the host.
    ///
    /// Returns `true` if it completed a force-run.
    ///
    /// # Errors
    /// Returns error if the breakpoint store fails during restore.
    pub async fn on_incoming_message(
        &self,
        session_id: &str,
        message: &ProtocolMessage,
        session: Option<Arc<dyn DebugSession>>,
    ) -> Result<bool, ForceRunError> {
        if message.stopped().is_none() {
            return Ok(false);
        }
        let action = {
            let mut ctx = self.inner.context.lock().await;
            let action = monitor::prepare_stop(
                session_id,
                message,
                session,
                &self.inner.host,
                &self.inner.config,
                &mut ctx,
            )
            .await;
            if matches!(action, Ok(StopAction::Restored(_))) {
                self.disarm(session_id);
            }
            self.publish(&ctx);
            action?
        };

        match action {
            StopAction::Ignored => Ok(false),
            StopAction::Restored(pending) => Ok(RestoreOutcome::Restored(pending).finish().await),
            StopAction::AutoContinue(resume) => {
                if resume.send().await {
                    return Ok(false);
                }
                let outcome = {
                    let mut ctx = self.inner.context.lock().await;
                    let outcome = resume.give_up(&self.inner.host, &mut ctx).await;
                    if matches!(outcome, Ok(RestoreOutcome::Restored(_))) {
                        self.disarm(session_id);
                    }
                    self.publish(&ctx);
                    outcome?
                };
                Ok(outcome.finish().await)
            }
        }
    }

    /// Report that a session ended.
    ///
    /// # Errors
    /// Returns error if the breakpoint store fails.
    pub async fn on_session_terminated(&self, session_id: &str) -> Result<bool, ForceRunError> {
        let mut ctx = self.inner.context.lock().await;
        self.disarm(session_id);
        let restored = monitor::on_session_terminated(session_id, &self.inner.host, &mut ctx).await;
        self.publish(&ctx);
        restored
    }

    /// Restore every pending force-run now.
    ///
    /// # Errors
    /// Returns error if the breakpoint store fails.
    pub async fn cancel_all(&self) -> Result<usize, ForceRunError> {
        let cancelled = {
            let mut ctx = self.inner.context.lock().await;
            let cancelled = restore::cancel_all(&self.inner.host, &mut ctx).await;
            self.disarm_all();
            self.publish(&ctx);
            cancelled
        };
        cancelled.finish().await
    }

    /// Cancel everything before the host shuts down.
    ///
    /// # Errors
    /// Returns error if the breakpoint store fails.
    pub async fn shutdown(&self) -> Result<usize, ForceRunError> {
        tracing::debug!("Shutting down force-run manager");
        self.cancel_all().await
    }

    /// Whether any force-run is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        *self.inner.status.borrow()
    }

    /// Whether `session_id` has a force-run pending.
    pub async fn is_session_pending(&self, session_id: &str) -> bool {
        self.inner.context.lock().await.is_pending(session_id)
    }

    /// Receiver for the pending flag, for status indicators.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<bool> {
        self.inner.status.subscribe()
    }

    /// Stream of the pending flag, starting with its current value.
    #[must_use]
    pub fn status_stream(&self) -> WatchStream<bool> {
        WatchStream::new(self.subscribe_status())
    }

    fn publish(&self, ctx: &ForceRunContext) {
        let pending = ctx.any_pending();
        self.inner.status.send_if_modified(|current| {
            if *current == pending {
                false
            } else {
                *current = pending;
                true
            }
        });
    }

    fn watchdogs(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Watchdog>> {
        self.inner
            .watchdogs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Must be called with the context locked.
    fn arm_watchdog(&self, session_id: SessionId, run_id: RunId) {
        if !self.inner.config.noop_detection {
            return;
        }
        let mut watchdogs = self.watchdogs();
        if watchdogs
            .get(&session_id)
            .is_some_and(|current| current.run_id >= run_id)
        {
            tracing::debug!(%session_id, run_id, "Watchdog already armed for a newer run");
            return;
        }

        let delay = self.inner.config.noop_detection_delay();
        let manager = self.clone();
        let id = session_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            manager.fire_watchdog(&id, run_id).await;
        });

        let previous = watchdogs.insert(
            session_id,
            Watchdog {
                run_id,
                handle: task.abort_handle(),
            },
        );
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    async fn fire_watchdog(&self, session_id: &str, run_id: RunId) {
        let outcome = {
            let mut ctx = self.inner.context.lock().await;
            {
                let mut watchdogs = self.watchdogs();
                if watchdogs.get(session_id).is_some_and(|w| w.run_id == run_id) {
                    watchdogs.remove(session_id);
                }
            }
            let outcome = monitor::check_noop(session_id, run_id, &self.inner.host, &mut ctx).await;
            self.publish(&ctx);
            outcome
        };
        match outcome {
            Ok(outcome) => {
                outcome.finish().await;
            }
            Err(e) => tracing::error!(session_id, "No-op restore failed: {e}"),
        }
    }

    /// Must be called with the context locked.
    fn disarm(&self, session_id: &str) {
        if let Some(watchdog) = self.watchdogs().remove(session_id) {
            watchdog.handle.abort();
        }
    }

    /// Must be called with the context locked.
    fn disarm_all(&self) {
        for (_, watchdog) in self.watchdogs().drain() {
            watchdog.handle.abort();
        }
    }
}

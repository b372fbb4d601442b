//! Reacting to debug adapter traffic and session lifecycle.

use std::sync::Arc;

use force_run_core::{
    DebugSession, ForceRunConfig, ForceRunContext, ForceRunError, HostServices, ProtocolMessage,
    RunId, SessionId,
    protocol::CONTINUE,
};
use serde_json::{Map, Value};

use crate::restore::{self, PendingFilterRestore, RestoreOutcome};

/// Warning shown when exception stops exceed the auto-continue ceiling.
pub const TOO_MANY_EXCEPTIONS_MESSAGE: &str =
    "Force Run to Cursor stopped early: too many exceptions were thrown.";

/// Observe a request sent to the adapter.
///
/// Caches the user's exception filter configuration, unless a force-run is
/// active for the session: then the request is our own suppression call.
/// Also records that execution was resumed.
pub fn observe_outgoing(session_id: &str, message: &ProtocolMessage, ctx: &mut ForceRunContext) {
    if message.is_request(CONTINUE) {
        if let Some(state) = ctx.run_mut(session_id) {
            state.continue_observed = true;
        }
        return;
    }

    let Some(filters) = message.exception_filter_config() else {
        return;
    };
    if ctx.is_pending(session_id) {
        tracing::debug!(session_id, "Ignoring exception filter update during force-run");
        return;
    }
    tracing::debug!(session_id, filters = ?filters.filters, "Caching exception filters");
    ctx.cache_exception_filters(session_id, filters);
}

/// Resume request for an exception stop, sent once the context is released.
#[must_use = "the debuggee stays paused until the resume is sent"]
pub struct AutoContinue {
    session_id: SessionId,
    run_id: RunId,
    attempt: u32,
    session: Arc<dyn DebugSession>,
    arguments: Value,
}

impl AutoContinue {
    /// Send `continue` to the adapter.
    ///
    /// Returns `true` if the adapter accepted it.
    pub async fn send(&self) -> bool {
        let session_id = &self.session_id;
        match self
            .session
            .custom_request(CONTINUE, self.arguments.clone())
            .await
        {
            Ok(_) => {
                tracing::debug!(%session_id, attempt = self.attempt, "Resumed past exception stop");
                true
            }
            Err(e) => {
                tracing::warn!(%session_id, "Failed to resume past exception: {e}");
                false
            }
        }
    }

    /// Restore the run after the resume was rejected.
    ///
    /// Does nothing if the run already finished some other way.
    ///
    /// # Errors
    /// Returns error if the breakpoint store fails.
    pub async fn give_up(
        self,
        host: &HostServices,
        ctx: &mut ForceRunContext,
    ) -> Result<RestoreOutcome, ForceRunError> {
        let Some(state) = ctx.take_run_if(&self.session_id, self.run_id) else {
            return Ok(RestoreOutcome::Skipped);
        };
        tracing::debug!(session_id = %self.session_id, "Force-run finished");
        let pending =
            restore::restore(&self.session_id, state, Some(self.session), host, ctx).await?;
        Ok(RestoreOutcome::Restored(pending))
    }
}

/// What a `stopped` event means for a pending force-run.
#[must_use]
pub enum StopAction {
    /// Not a stop, or no force-run pending.
    Ignored,
    /// An exception stop to resume past.
    AutoContinue(AutoContinue),
    /// The force-run finished and its breakpoints are back.
    Restored(Option<PendingFilterRestore>),
}

/// Decide what a message received from the adapter means.
///
/// Only `stopped` events for a session with a pending force-run matter.
/// Anything that needs the adapter is returned rather than sent.
///
/// # Errors
/// Returns error if the breakpoint store fails during restore.
pub async fn prepare_stop(
    session_id: &str,
    message: &ProtocolMessage,
    session: Option<Arc<dyn DebugSession>>,
    host: &HostServices,
    config: &ForceRunConfig,
    ctx: &mut ForceRunContext,
) -> Result<StopAction, ForceRunError> {
    let Some(stopped) = message.stopped() else {
        return Ok(StopAction::Ignored);
    };
    let Some(state) = ctx.run_mut(session_id) else {
        return Ok(StopAction::Ignored);
    };
    let session = state.session.clone().or(session);

    if stopped.is_exception() {
        if let Some(session) = &session {
            if state.auto_continue_count < config.auto_continue_limit {
                state.auto_continue_count += 1;
                let mut args = Map::new();
                if let Some(thread_id) = stopped.thread_id {
                    args.insert("threadId".into(), thread_id.into());
                }
                return Ok(StopAction::AutoContinue(AutoContinue {
                    session_id: session_id.to_owned(),
                    run_id: state.run_id,
                    attempt: state.auto_continue_count,
                    session: Arc::clone(session),
                    arguments: Value::Object(args),
                }));
            }
            tracing::warn!(session_id, "Auto-continue limit reached");
            host.notifier.show_warning(TOO_MANY_EXCEPTIONS_MESSAGE);
        }
    }

    let Some(state) = ctx.take_run(session_id) else {
        return Ok(StopAction::Ignored);
    };
    tracing::debug!(session_id, reason = %stopped.reason, "Force-run finished");
    let pending = restore::restore(session_id, state, session, host, ctx).await?;
    Ok(StopAction::Restored(pending))
}

/// Observe a message received from the adapter.
///
/// Only `stopped` events for a session with a pending force-run matter.
/// Termination events are left to [`on_session_terminated`].
///
/// Returns `true` when the force-run finished and was restored.
///
/// # Errors
/// Returns error if the breakpoint store fails during restore.
pub async fn on_stop(
    session_id: &str,
    message: &ProtocolMessage,
    session: Option<Arc<dyn DebugSession>>,
    host: &HostServices,
    config: &ForceRunConfig,
    ctx: &mut ForceRunContext,
) -> Result<bool, ForceRunError> {
    match prepare_stop(session_id, message, session, host, config, ctx).await? {
        StopAction::Ignored => Ok(false),
        StopAction::Restored(pending) => Ok(RestoreOutcome::Restored(pending).finish().await),
        StopAction::AutoContinue(resume) => {
            if resume.send().await {
                return Ok(false);
            }
            Ok(resume.give_up(host, ctx).await?.finish().await)
        }
    }
}

/// Safety net for a session that ended.
///
/// Restores breakpoints of a pending force-run without touching the
/// protocol, and always forgets the session's exception filters.
///
/// Returns `true` if a pending force-run was restored.
///
/// # Errors
/// Returns error if the breakpoint store fails.
pub async fn on_session_terminated(
    session_id: &str,
    host: &HostServices,
    ctx: &mut ForceRunContext,
) -> Result<bool, ForceRunError> {
    ctx.forget_exception_filters(session_id);
    let Some(state) = ctx.take_run(session_id) else {
        return Ok(false);
    };
    tracing::info!(session_id, "Session ended during force-run");
    restore::settle_breakpoints(session_id, state.saved_breakpoints, host, ctx).await?;
    Ok(true)
}

/// Restore run `run_id` if execution never resumed.
///
/// Covers run to cursor turning out to be a no-op, e.g. when the cursor is
/// already on the current line.
///
/// # Errors
/// Returns error if the breakpoint store fails.
pub async fn check_noop(
    session_id: &str,
    run_id: RunId,
    host: &HostServices,
    ctx: &mut ForceRunContext,
) -> Result<RestoreOutcome, ForceRunError> {
    match ctx.run(session_id) {
        Some(state) if state.run_id == run_id && !state.continue_observed => {}
        _ => return Ok(RestoreOutcome::Skipped),
    }
    let Some(state) = ctx.take_run_if(session_id, run_id) else {
        return Ok(RestoreOutcome::Skipped);
    };
    tracing::info!(session_id, run_id, "Execution never resumed, restoring");
    let pending = restore::restore(session_id, state, None, host, ctx).await?;
    Ok(RestoreOutcome::Restored(pending))
}

//! Starting a force-run.
//!
//! Breakpoints are removed rather than disabled: run to cursor has to be
//! able to place its own temporary breakpoint on a line that already
//! carries one.

use std::sync::Arc;

use force_run_core::{
    DebugSession, ExceptionFilterState, ForceRunConfig, ForceRunContext, ForceRunError,
    HostServices, RunId, SessionId, protocol::SET_EXCEPTION_BREAKPOINTS,
};

use crate::restore::{self, RestoreOutcome};

/// Guidance shown when there is no session to force-run.
pub const NO_SESSION_MESSAGE: &str =
    "Force Run to Cursor: start debugging and pause at a breakpoint first.";

/// Result of a start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// No session was given; the user was told how to proceed.
    NoSession,
    /// A force-run is already pending for the session; nothing changed.
    AlreadyPending,
    /// Breakpoints were saved and cleared.
    Started {
        /// Session the run belongs to.
        session_id: SessionId,
        /// Identifier of the new run.
        run_id: RunId,
    },
}

/// Exception filter suppression for a run that just began.
///
/// Sent only after the context is released: the request goes out over the
/// adapter tap, which feeds the context.
#[must_use = "exception filters stay active until the suppression is sent"]
pub struct Suppression {
    session_id: SessionId,
    run_id: RunId,
    session: Arc<dyn DebugSession>,
}

impl Suppression {
    /// Ask the adapter to stop breaking on exceptions.
    ///
    /// Returns `true` if the adapter accepted the request.
    pub async fn send(&self) -> bool {
        match self
            .session
            .custom_request(
                SET_EXCEPTION_BREAKPOINTS,
                ExceptionFilterState::suppressed_arguments(),
            )
            .await
        {
            Ok(_) => true,
            Err(e) => {
                let session_id = &self.session_id;
                tracing::warn!(%session_id, "Failed to suppress exception filters: {e}");
                false
            }
        }
    }

    /// Keep the session on the run so its filters can be restored.
    ///
    /// Does nothing if the run finished while the request was in flight.
    pub fn record(self, ctx: &mut ForceRunContext) {
        let session_id = &self.session_id;
        match ctx.run_mut(session_id) {
            Some(state) if state.run_id == self.run_id => state.session = Some(self.session),
            _ => tracing::debug!(%session_id, run_id = self.run_id, "Run finished during suppression"),
        }
    }
}

/// Save and clear breakpoints.
///
/// When the session has cached exception filters, the suppression request
/// is returned for sending once the context is released.
///
/// # Errors
/// Returns error if the breakpoint store fails.
pub async fn prepare(
    session: Option<Arc<dyn DebugSession>>,
    host: &HostServices,
    ctx: &mut ForceRunContext,
) -> Result<(StartOutcome, Option<Suppression>), ForceRunError> {
    let Some(session) = session else {
        host.notifier.show_info(NO_SESSION_MESSAGE);
        return Ok((StartOutcome::NoSession, None));
    };
    let session_id = session.id().to_owned();

    if ctx.is_pending(&session_id) {
        tracing::debug!(%session_id, "Force-run already pending, ignoring");
        return Ok((StartOutcome::AlreadyPending, None));
    }

    let saved = host.breakpoints.list().await?;
    if !saved.is_empty() {
        host.breakpoints.remove(&saved).await?;
    }
    let saved_count = saved.len();
    let Some(run_id) = ctx.begin_run(session_id.clone(), saved) else {
        return Ok((StartOutcome::AlreadyPending, None));
    };
    tracing::debug!(%session_id, run_id, saved = saved_count, "Breakpoints saved and cleared");

    let suppression = (session.supports_custom_requests()
        && ctx.exception_filters(&session_id).is_some())
    .then(|| Suppression {
        session_id: session_id.clone(),
        run_id,
        session,
    });
    Ok((StartOutcome::Started { session_id, run_id }, suppression))
}

/// Save and clear breakpoints and suppress exception filters.
///
/// Does not invoke run to cursor; see [`run_to_cursor`] and [`start`].
///
/// # Errors
/// Returns error if the breakpoint store fails.
pub async fn begin(
    session: Option<Arc<dyn DebugSession>>,
    host: &HostServices,
    ctx: &mut ForceRunContext,
) -> Result<StartOutcome, ForceRunError> {
    let (outcome, suppression) = prepare(session, host, ctx).await?;
    if let Some(suppression) = suppression {
        if suppression.send().await {
            suppression.record(ctx);
        }
    }
    Ok(outcome)
}

/// Invoke the host's run to cursor command.
///
/// # Errors
/// Returns error if the command fails.
pub async fn run_to_cursor(
    host: &HostServices,
    config: &ForceRunConfig,
) -> Result<(), ForceRunError> {
    host.commands
        .execute(&config.run_to_cursor_command)
        .await
        .map(|_| ())
        .map_err(ForceRunError::RunToCursor)
}

/// Undo run `run_id` after run to cursor could not be invoked.
///
/// # Errors
/// Returns error if the breakpoint store fails.
pub async fn abandon(
    session_id: &str,
    run_id: RunId,
    host: &HostServices,
    ctx: &mut ForceRunContext,
) -> Result<RestoreOutcome, ForceRunError> {
    let Some(state) = ctx.take_run_if(session_id, run_id) else {
        return Ok(RestoreOutcome::Skipped);
    };
    let pending = restore::restore(session_id, state, None, host, ctx).await?;
    Ok(RestoreOutcome::Restored(pending))
}

/// Begin a force-run and invoke run to cursor.
///
/// If run to cursor fails the run is abandoned and the user's breakpoints
/// are put back before the error is returned.
///
/// # Errors
/// Returns error if the breakpoint store or run to cursor fails.
pub async fn start(
    session: Option<Arc<dyn DebugSession>>,
    host: &HostServices,
    config: &ForceRunConfig,
    ctx: &mut ForceRunContext,
) -> Result<StartOutcome, ForceRunError> {
    let outcome = begin(session, host, ctx).await?;
    if let StartOutcome::Started { session_id, run_id } = &outcome {
        if let Err(e) = run_to_cursor(host, config).await {
            tracing::error!(%session_id, "{e}");
            abandon(session_id, *run_id, host, ctx).await?.finish().await;
            return Err(e);
        }
    }
    Ok(outcome)
}

//! Putting a session's breakpoints and exception filters back.
//!
//! Restoration clears the store and re-adds the saved snapshot rather than
//! diffing. Anything left in the store at this point was placed by run to
//! cursor itself, never by the user.
//!
//! Breakpoints are restored while the context is held. Exception filters
//! go back over the adapter tap, which feeds the context, so they are
//! handed out as [`PendingFilterRestore`] and applied after it is released.

use std::sync::Arc;

use force_run_core::{
    Breakpoint, DebugSession, ExceptionFilterState, ForceRunContext, ForceRunError,
    ForceRunState, HostError, HostServices, SessionId, protocol::SET_EXCEPTION_BREAKPOINTS,
};

/// Exception filter configuration waiting to be re-applied.
#[must_use = "filters are only restored once applied"]
pub struct PendingFilterRestore {
    session_id: SessionId,
    session: Arc<dyn DebugSession>,
    filters: ExceptionFilterState,
}

impl PendingFilterRestore {
    /// Pending restore, if both a configuration and a session are available.
    pub fn new(
        session_id: &str,
        session: Option<Arc<dyn DebugSession>>,
        filters: Option<&ExceptionFilterState>,
    ) -> Option<Self> {
        Some(Self {
            session_id: session_id.to_owned(),
            session: session?,
            filters: filters?.clone(),
        })
    }

    /// Send the cached configuration to the adapter. Failures are logged.
    pub async fn apply(self) {
        if let Err(e) = self
            .session
            .custom_request(SET_EXCEPTION_BREAKPOINTS, self.filters.to_arguments())
            .await
        {
            tracing::warn!(session_id = %self.session_id, "Failed to restore exception filters: {e}");
        }
    }
}

/// Outcome of a step that may have finished a force-run.
#[must_use = "a finished force-run still has exception filters to restore"]
pub enum RestoreOutcome {
    /// Nothing was restored.
    Skipped,
    /// Breakpoints are back; filters may still need re-applying.
    Restored(Option<PendingFilterRestore>),
}

impl RestoreOutcome {
    /// Apply any pending filter restore.
    ///
    /// Returns `true` if a force-run was restored.
    pub async fn finish(self) -> bool {
        match self {
            Self::Skipped => false,
            Self::Restored(pending) => {
                if let Some(pending) = pending {
                    pending.apply().await;
                }
                true
            }
        }
    }
}

/// Restore the breakpoints of a finished force-run.
///
/// If another session still has a force-run pending, the breakpoints are
/// handed to it instead and come back when it finishes; see
/// [`ForceRunContext::hand_over_breakpoints`]. Either way the store is
/// cleared of what run to cursor left behind.
///
/// Exception filters are returned for re-applying only when both a cached
/// configuration and a usable session exist; `session` is consulted before
/// the handle stored in `state`.
///
/// # Errors
/// Returns error if the breakpoint store fails.
pub async fn restore(
    session_id: &str,
    state: ForceRunState,
    session: Option<Arc<dyn DebugSession>>,
    host: &HostServices,
    ctx: &mut ForceRunContext,
) -> Result<Option<PendingFilterRestore>, HostError> {
    let session = session.or(state.session);
    settle_breakpoints(session_id, state.saved_breakpoints, host, ctx).await?;
    Ok(PendingFilterRestore::new(
        session_id,
        session,
        ctx.exception_filters(session_id),
    ))
}

/// Put `saved` back, or hand it to another pending force-run.
///
/// # Errors
/// Returns error if the breakpoint store fails.
pub async fn settle_breakpoints(
    session_id: &str,
    saved: Vec<Breakpoint>,
    host: &HostServices,
    ctx: &mut ForceRunContext,
) -> Result<(), HostError> {
    let saved = ctx.hand_over_breakpoints(saved).unwrap_or_else(|| {
        tracing::debug!(session_id, "Another force-run is pending, deferring breakpoints");
        Vec::new()
    });
    restore_breakpoints(session_id, &saved, host).await
}

/// Result of cancelling every pending force-run.
#[must_use = "cancelled sessions still have exception filters to restore"]
pub struct Cancelled {
    count: usize,
    pending: Vec<PendingFilterRestore>,
    error: Option<HostError>,
}

impl Cancelled {
    /// Number of runs cancelled.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Re-apply exception filters, then report the breakpoint outcome.
    ///
    /// # Errors
    /// Returns error if the breakpoint store failed during cancel.
    pub async fn finish(self) -> Result<usize, ForceRunError> {
        for pending in self.pending {
            pending.apply().await;
        }
        match self.error {
            Some(e) => Err(e.into()),
            None => Ok(self.count),
        }
    }
}

/// Restore the breakpoints of every pending force-run.
///
/// The breakpoint store is shared between sessions, so it is cleared once
/// and the snapshots of all runs are re-added together, in start order.
/// Exception filters are left in the returned [`Cancelled`]. The exception
/// filter cache is left alone; those sessions are still live.
pub async fn cancel_all(host: &HostServices, ctx: &mut ForceRunContext) -> Cancelled {
    let mut runs = ctx.drain_runs();
    if runs.is_empty() {
        return Cancelled {
            count: 0,
            pending: Vec::new(),
            error: None,
        };
    }
    runs.sort_by_key(|(_, state)| state.run_id);

    let mut saved: Vec<Breakpoint> = Vec::new();
    for (_, state) in &runs {
        for bp in &state.saved_breakpoints {
            if !saved.iter().any(|s| s.id == bp.id) {
                saved.push(bp.clone());
            }
        }
    }
    let error = restore_breakpoints("*", &saved, host).await.err();
    if let Some(e) = &error {
        tracing::error!("Failed to restore breakpoints on cancel: {e}");
    }

    let count = runs.len();
    let pending = runs
        .into_iter()
        .filter_map(|(session_id, state)| {
            PendingFilterRestore::new(
                &session_id,
                state.session,
                ctx.exception_filters(&session_id),
            )
        })
        .collect();
    tracing::info!(count, "Cancelled pending force-runs");

    Cancelled {
        count,
        pending,
        error,
    }
}

/// Clear the store and re-add `saved`, in order.
///
/// # Errors
/// Returns error if the breakpoint store fails.
pub async fn restore_breakpoints(
    session_id: &str,
    saved: &[Breakpoint],
    host: &HostServices,
) -> Result<(), HostError> {
    let leftover = host.breakpoints.list().await?;
    if !leftover.is_empty() {
        tracing::debug!(session_id, count = leftover.len(), "Removing leftover breakpoints");
        host.breakpoints.remove(&leftover).await?;
    }
    if !saved.is_empty() {
        host.breakpoints.add(saved).await?;
    }
    tracing::info!(session_id, restored = saved.len(), "Breakpoints restored");
    Ok(())
}

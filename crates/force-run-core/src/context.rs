//! Per-session force-run bookkeeping.

use std::{collections::HashMap, sync::Arc};

use crate::{
    traits::DebugSession,
    types::{Breakpoint, ExceptionFilterState, SessionId},
};

/// Identifies one force-run; a session's successive runs get increasing ids.
pub type RunId = u64;

/// State of an in-flight force-run.
///
/// Exists only between a successful start and the matching restore.
#[derive(Clone)]
pub struct ForceRunState {
    /// Run identifier.
    pub run_id: RunId,
    /// Breakpoints removed at start, in original order.
    pub saved_breakpoints: Vec<Breakpoint>,
    /// Exception stops resumed so far.
    pub auto_continue_count: u32,
    /// Session handle, kept only when exception suppression succeeded.
    pub session: Option<Arc<dyn DebugSession>>,
    /// Whether a `continue` request went out since the run started.
    pub continue_observed: bool,
}

impl ForceRunState {
    fn new(run_id: RunId, saved_breakpoints: Vec<Breakpoint>) -> Self {
        Self {
            run_id,
            saved_breakpoints,
            auto_continue_count: 0,
            session: None,
            continue_observed: false,
        }
    }
}

impl std::fmt::Debug for ForceRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceRunState")
            .field("run_id", &self.run_id)
            .field("saved_breakpoints", &self.saved_breakpoints)
            .field("auto_continue_count", &self.auto_continue_count)
            .field("session", &self.session.as_ref().map(|s| s.id().to_owned()))
            .field("continue_observed", &self.continue_observed)
            .finish()
    }
}

/// Explicit state object passed to every force-run operation.
///
/// Holds the active-run map and the exception filter cache. Both are
/// keyed by session, so sessions never share an entry.
#[derive(Debug, Default)]
pub struct ForceRunContext {
    active_runs: HashMap<SessionId, ForceRunState>,
    exception_filters: HashMap<SessionId, ExceptionFilterState>,
    next_run_id: RunId,
}

impl ForceRunContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `session_id` has a force-run in flight.
    #[must_use]
    pub fn is_pending(&self, session_id: &str) -> bool {
        self.active_runs.contains_key(session_id)
    }

    /// Whether any session has a force-run in flight.
    #[must_use]
    pub fn any_pending(&self) -> bool {
        !self.active_runs.is_empty()
    }

    /// Sessions with a force-run in flight.
    #[must_use]
    pub fn pending_sessions(&self) -> Vec<SessionId> {
        self.active_runs.keys().cloned().collect()
    }

    /// Record a new force-run.
    ///
    /// Returns `None` and leaves the existing entry untouched if one is
    /// already pending for the session.
    pub fn begin_run(
        &mut self,
        session_id: impl Into<SessionId>,
        saved_breakpoints: Vec<Breakpoint>,
    ) -> Option<RunId> {
        let session_id = session_id.into();
        if self.active_runs.contains_key(&session_id) {
            return None;
        }
        self.next_run_id += 1;
        let run_id = self.next_run_id;
        self.active_runs
            .insert(session_id, ForceRunState::new(run_id, saved_breakpoints));
        Some(run_id)
    }

    /// Borrow a session's force-run state.
    #[must_use]
    pub fn run(&self, session_id: &str) -> Option<&ForceRunState> {
        self.active_runs.get(session_id)
    }

    /// Mutably borrow a session's force-run state.
    pub fn run_mut(&mut self, session_id: &str) -> Option<&mut ForceRunState> {
        self.active_runs.get_mut(session_id)
    }

    /// Remove and return a session's force-run state.
    pub fn take_run(&mut self, session_id: &str) -> Option<ForceRunState> {
        self.active_runs.remove(session_id)
    }

    /// Remove a session's force-run state only if it is run `run_id`.
    pub fn take_run_if(&mut self, session_id: &str, run_id: RunId) -> Option<ForceRunState> {
        match self.active_runs.get(session_id) {
            Some(state) if state.run_id == run_id => self.active_runs.remove(session_id),
            _ => None,
        }
    }

    /// Hand a finished run's breakpoints to the oldest run still pending.
    ///
    /// The breakpoint store is shared between sessions, so breakpoints put
    /// back while another force-run is in flight would be hit by it, and its
    /// own restore would clear them again. The receiving run re-adds them,
    /// after its own snapshot, when it finishes.
    ///
    /// Returns the breakpoints unchanged when no run is pending.
    pub fn hand_over_breakpoints(&mut self, saved: Vec<Breakpoint>) -> Option<Vec<Breakpoint>> {
        let Some(target) = self.active_runs.values_mut().min_by_key(|state| state.run_id) else {
            return Some(saved);
        };
        for bp in saved {
            if !target.saved_breakpoints.iter().any(|s| s.id == bp.id) {
                target.saved_breakpoints.push(bp);
            }
        }
        None
    }

    /// Remove every pending force-run.
    pub fn drain_runs(&mut self) -> Vec<(SessionId, ForceRunState)> {
        self.active_runs.drain().collect()
    }

    /// Cached exception filter configuration for a session.
    #[must_use]
    pub fn exception_filters(&self, session_id: &str) -> Option<&ExceptionFilterState> {
        self.exception_filters.get(session_id)
    }

    /// Replace a session's cached exception filter configuration.
    pub fn cache_exception_filters(
        &mut self,
        session_id: impl Into<SessionId>,
        state: ExceptionFilterState,
    ) {
        self.exception_filters.insert(session_id.into(), state);
    }

    /// Drop a session's cached exception filter configuration.
    pub fn forget_exception_filters(&mut self, session_id: &str) -> Option<ExceptionFilterState> {
        self.exception_filters.remove(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_run_is_exclusive_per_session() {
        let mut ctx = ForceRunContext::new();
        let a = Breakpoint::source("1", "a.rs", 1);

        let first = ctx.begin_run("s1", vec![a.clone()]);
        assert!(first.is_some());
        assert!(ctx.begin_run("s1", vec![]).is_none());
        assert_eq!(ctx.run("s1").unwrap().saved_breakpoints, vec![a]);

        assert!(ctx.begin_run("s2", vec![]).is_some());
        assert_eq!(ctx.pending_sessions().len(), 2);
    }

    #[test]
    fn test_take_run_if_checks_run_id() {
        let mut ctx = ForceRunContext::new();
        let old = ctx.begin_run("s1", vec![]).unwrap();
        ctx.take_run("s1");
        let new = ctx.begin_run("s1", vec![]).unwrap();

        assert_ne!(old, new);
        assert!(ctx.take_run_if("s1", old).is_none());
        assert!(ctx.is_pending("s1"));
        assert!(ctx.take_run_if("s1", new).is_some());
        assert!(!ctx.any_pending());
    }

    #[test]
    fn test_hand_over_goes_to_oldest_pending_run() {
        let mut ctx = ForceRunContext::new();
        let a = Breakpoint::source("1", "a.rs", 1);
        let b = Breakpoint::source("2", "a.rs", 2);

        assert_eq!(ctx.hand_over_breakpoints(vec![a.clone()]), Some(vec![a.clone()]));

        ctx.begin_run("s1", vec![a.clone()]);
        ctx.begin_run("s2", vec![]);
        assert!(ctx.hand_over_breakpoints(vec![a.clone(), b.clone()]).is_none());

        assert_eq!(ctx.run("s1").unwrap().saved_breakpoints, vec![a, b]);
        assert!(ctx.run("s2").unwrap().saved_breakpoints.is_empty());
    }

    #[test]
    fn test_exception_filter_cache_is_last_write_wins() {
        let mut ctx = ForceRunContext::new();
        ctx.cache_exception_filters("s1", ExceptionFilterState::with_filters(["a", "b"]));
        ctx.cache_exception_filters("s1", ExceptionFilterState::with_filters(["c"]));
        assert_eq!(
            ctx.exception_filters("s1").unwrap().filters,
            vec!["c".to_string()]
        );
        assert!(ctx.forget_exception_filters("s1").is_some());
        assert!(ctx.exception_filters("s1").is_none());
    }
}

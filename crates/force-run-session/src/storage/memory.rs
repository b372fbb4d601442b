//! In-memory breakpoint store.

use std::sync::RwLock;

use async_trait::async_trait;
use force_run_core::{Breakpoint, BreakpointStore, HostError};

/// In-memory breakpoint store.
///
/// Useful for headless hosts and tests. Breakpoints are matched by id
/// on removal; adding keeps insertion order.
#[derive(Debug, Default)]
pub struct MemoryBreakpointStore {
    breakpoints: RwLock<Vec<Breakpoint>>,
}

impl MemoryBreakpointStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `breakpoints`.
    #[must_use]
    pub const fn with_breakpoints(breakpoints: Vec<Breakpoint>) -> Self {
        Self {
            breakpoints: RwLock::new(breakpoints),
        }
    }

    /// Current contents, or empty if the lock is poisoned.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Breakpoint> {
        self.breakpoints
            .read()
            .map(|bps| bps.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BreakpointStore for MemoryBreakpointStore {
    async fn list(&self) -> Result<Vec<Breakpoint>, HostError> {
        Ok(self
            .breakpoints
            .read()
            .map_err(|e| HostError::Breakpoints(e.to_string()))?
            .clone())
    }

    async fn add(&self, breakpoints: &[Breakpoint]) -> Result<(), HostError> {
        self.breakpoints
            .write()
            .map_err(|e| HostError::Breakpoints(e.to_string()))?
            .extend_from_slice(breakpoints);
        Ok(())
    }

    async fn remove(&self, breakpoints: &[Breakpoint]) -> Result<(), HostError> {
        self.breakpoints
            .write()
            .map_err(|e| HostError::Breakpoints(e.to_string()))?
            .retain(|bp| !breakpoints.iter().any(|r| r.id == bp.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_list_remove() {
        let store = MemoryBreakpointStore::new();
        let a = Breakpoint::source("a", "main.rs", 1);
        let b = Breakpoint::function("b", "run");
        let c = Breakpoint::source("c", "lib.rs", 9);

        store.add(&[a.clone(), b.clone(), c.clone()]).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![a.clone(), b, c.clone()]);

        store.remove(&[Breakpoint::function("b", "run")]).await.unwrap();
        assert_eq!(store.snapshot(), vec![a, c]);
    }

    #[tokio::test]
    async fn test_remove_unknown_is_noop() {
        let a = Breakpoint::source("a", "main.rs", 1);
        let store = MemoryBreakpointStore::with_breakpoints(vec![a.clone()]);
        store.remove(&[Breakpoint::source("zz", "x.rs", 2)]).await.unwrap();
        assert_eq!(store.snapshot(), vec![a]);
    }
}

//! Force run to cursor state machine.
//!
//! Provides:
//! - `controller` - start a force-run
//! - `monitor` - react to adapter traffic and session termination
//! - `restore` - put breakpoints and exception filters back
//! - `ForceRunManager` - owns the context and serializes operations
//! - Breakpoint store implementations (memory)

pub mod controller;
pub mod manager;
pub mod monitor;
pub mod restore;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::StartOutcome;
pub use manager::ForceRunManager;

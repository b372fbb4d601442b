//! Core abstractions for forcing a debugger to run to the cursor.
//!
//! This crate provides the fundamental building blocks:
//! - `Breakpoint` and `ExceptionFilterState` - the state that gets saved and restored
//! - `ForceRunContext` - per-session bookkeeping passed to every operation
//! - `ProtocolMessage` - the slice of DAP traffic the state machine reacts to
//! - Host capability traits (breakpoint store, commands, notifications, sessions)

pub mod config;
pub mod context;
pub mod error;
pub mod protocol;
pub mod traits;
pub mod types;

pub use config::ForceRunConfig;
pub use context::{ForceRunContext, ForceRunState, RunId};
pub use error::{ForceRunError, HostError, ProtocolError};
pub use protocol::{ProtocolMessage, StoppedEvent};
pub use traits::{
    BreakpointStore, CommandExecutor, DebugSession, HostServices, Notifier, TracingNotifier,
};
pub use types::{
    Breakpoint, BreakpointKind, ExceptionFilterOption, ExceptionFilterState, SessionId,
    SourceLocation,
};

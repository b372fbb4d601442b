//! The slice of Debug Adapter Protocol traffic force-run reacts to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ExceptionFilterState;

/// Request that configures exception breakpoints.
pub const SET_EXCEPTION_BREAKPOINTS: &str = "setExceptionBreakpoints";
/// Request that resumes execution.
pub const CONTINUE: &str = "continue";
/// Event sent when execution pauses.
pub const STOPPED: &str = "stopped";
/// Stop reason for a thrown exception.
pub const REASON_EXCEPTION: &str = "exception";

/// A protocol message observed on a session's adapter tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    /// Client to adapter request.
    Request {
        #[serde(default)]
        seq: i64,
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Value>,
    },
    /// Adapter reply to a request.
    Response {
        #[serde(default)]
        seq: i64,
        #[serde(default)]
        request_seq: i64,
        success: bool,
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
    /// Adapter initiated event.
    Event {
        #[serde(default)]
        seq: i64,
        event: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
}

/// Body of a `stopped` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEvent {
    /// Why execution stopped (`"breakpoint"`, `"step"`, `"exception"`, ...).
    #[serde(default)]
    pub reason: String,
    /// Thread that stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
}

impl StoppedEvent {
    /// Whether the stop was caused by an exception.
    #[must_use]
    pub fn is_exception(&self) -> bool {
        self.reason == REASON_EXCEPTION
    }
}

impl ProtocolMessage {
    /// Build a request message.
    #[must_use]
    pub fn request(command: impl Into<String>, arguments: Option<Value>) -> Self {
        Self::Request {
            seq: 0,
            command: command.into(),
            arguments,
        }
    }

    /// Build an event message.
    #[must_use]
    pub fn event(event: impl Into<String>, body: Option<Value>) -> Self {
        Self::Event {
            seq: 0,
            event: event.into(),
            body,
        }
    }

    /// Parse a raw JSON message.
    ///
    /// # Errors
    /// Returns error if the text is not a request, response or event.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Whether this is a request for `command`.
    #[must_use]
    pub fn is_request(&self, command: &str) -> bool {
        matches!(self, Self::Request { command: c, .. } if c == command)
    }

    /// Exception filter configuration carried by a `setExceptionBreakpoints` request.
    ///
    /// A request without arguments clears every filter. Arguments that do
    /// not parse yield `None`, like any other message.
    #[must_use]
    pub fn exception_filter_config(&self) -> Option<ExceptionFilterState> {
        match self {
            Self::Request {
                command, arguments, ..
            } if command == SET_EXCEPTION_BREAKPOINTS => match arguments {
                Some(args) => match serde_json::from_value(args.clone()) {
                    Ok(config) => Some(config),
                    Err(e) => {
                        tracing::debug!("Malformed exception filter arguments: {e}");
                        None
                    }
                },
                None => Some(ExceptionFilterState::default()),
            },
            _ => None,
        }
    }

    /// Body of a `stopped` event.
    #[must_use]
    pub fn stopped(&self) -> Option<StoppedEvent> {
        match self {
            Self::Event { event, body, .. } if event == STOPPED => Some(
                body.as_ref()
                    .and_then(|b| serde_json::from_value(b.clone()).ok())
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}

//! Force-run configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Built-in run to cursor command of the host.
pub const DEFAULT_RUN_TO_CURSOR_COMMAND: &str = "editor.debug.action.runToCursor";

/// Exception stops resumed automatically before giving up.
pub const DEFAULT_AUTO_CONTINUE_LIMIT: u32 = 3;

/// Delay before a run that never resumed is treated as a no-op.
pub const DEFAULT_NOOP_DETECTION_DELAY_MS: u64 = 500;

/// Tunables for force-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceRunConfig {
    /// Command invoked to run to the cursor.
    pub run_to_cursor_command: String,
    /// Maximum exception stops resumed per force-run.
    pub auto_continue_limit: u32,
    /// No-op detection delay, in milliseconds.
    pub noop_detection_delay_ms: u64,
    /// Whether the no-op watchdog is armed at all.
    pub noop_detection: bool,
}

impl Default for ForceRunConfig {
    fn default() -> Self {
        Self {
            run_to_cursor_command: DEFAULT_RUN_TO_CURSOR_COMMAND.to_string(),
            auto_continue_limit: DEFAULT_AUTO_CONTINUE_LIMIT,
            noop_detection_delay_ms: DEFAULT_NOOP_DETECTION_DELAY_MS,
            noop_detection: true,
        }
    }
}

impl ForceRunConfig {
    /// Parse settings from JSON; missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or a value has the wrong type.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Override the run to cursor command.
    #[must_use]
    pub fn with_run_to_cursor_command(mut self, command: impl Into<String>) -> Self {
        self.run_to_cursor_command = command.into();
        self
    }

    /// Override the auto-continue ceiling.
    #[must_use]
    pub const fn with_auto_continue_limit(mut self, limit: u32) -> Self {
        self.auto_continue_limit = limit;
        self
    }

    /// Override the no-op detection delay.
    #[must_use]
    pub const fn with_noop_detection_delay(mut self, delay: Duration) -> Self {
        self.noop_detection_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Turn the no-op watchdog on or off.
    #[must_use]
    pub const fn with_noop_detection(mut self, enabled: bool) -> Self {
        self.noop_detection = enabled;
        self
    }

    /// No-op detection delay.
    #[must_use]
    pub const fn noop_detection_delay(&self) -> Duration {
        Duration::from_millis(self.noop_detection_delay_ms)
    }
}

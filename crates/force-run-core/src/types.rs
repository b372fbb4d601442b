//! Breakpoint and exception filter data model.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Session identifier.
///
/// Opaque key handed out by the host for one live debug session.
pub type SessionId = String;

/// A position in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    /// Path or URI of the source file.
    pub path: String,
    /// One-based line number.
    pub line: u32,
    /// One-based column, when the breakpoint is pinned to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl SourceLocation {
    /// Create a line-level location.
    #[must_use]
    pub fn new(path: impl Into<String>, line: u32) -> Self {
        Self {
            path: path.into(),
            line,
            column: None,
        }
    }

    /// Pin the location to a column.
    #[must_use]
    pub const fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }
}

/// Breakpoint variant.
///
/// The host tags every breakpoint with its variant when handing it over.
/// Force-run logic never branches on it; it only carries it through a
/// save/restore cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BreakpointKind {
    /// Line breakpoint in a source file.
    Source { location: SourceLocation },
    /// Breakpoint on entry to a named function.
    Function {
        #[serde(rename = "functionName")]
        function_name: String,
    },
    /// Column-level breakpoint placed inside a line.
    Inline { location: SourceLocation },
    /// Breakpoint triggered by access to a data location.
    Data {
        #[serde(rename = "dataId")]
        data_id: String,
        #[serde(rename = "accessType", default, skip_serializing_if = "Option::is_none")]
        access_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// A user-configured breakpoint as reported by the host's breakpoint store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    /// Host-assigned identifier; the store matches on it when removing.
    pub id: String,
    /// Whether the breakpoint is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Conditional expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Hit count condition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_condition: Option<String>,
    /// Log message (turns the breakpoint into a logpoint).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_message: Option<String>,
    /// Variant-specific data.
    #[serde(flatten)]
    pub kind: BreakpointKind,
}

const fn default_enabled() -> bool {
    true
}

impl Breakpoint {
    /// Create an enabled breakpoint of the given kind.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: BreakpointKind) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            condition: None,
            hit_condition: None,
            log_message: None,
            kind,
        }
    }

    /// Line breakpoint at `path:line`.
    #[must_use]
    pub fn source(id: impl Into<String>, path: impl Into<String>, line: u32) -> Self {
        Self::new(
            id,
            BreakpointKind::Source {
                location: SourceLocation::new(path, line),
            },
        )
    }

    /// Function breakpoint on `name`.
    #[must_use]
    pub fn function(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(
            id,
            BreakpointKind::Function {
                function_name: name.into(),
            },
        )
    }

    /// Attach a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Source location, for source and inline breakpoints.
    #[must_use]
    pub const fn location(&self) -> Option<&SourceLocation> {
        match &self.kind {
            BreakpointKind::Source { location } | BreakpointKind::Inline { location } => {
                Some(location)
            }
            BreakpointKind::Function { .. } | BreakpointKind::Data { .. } => None,
        }
    }

    /// Function name, for function breakpoints.
    #[must_use]
    pub fn function_name(&self) -> Option<&str> {
        match &self.kind {
            BreakpointKind::Function { function_name } => Some(function_name),
            _ => None,
        }
    }
}

/// One exception filter together with its condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionFilterOption {
    /// Filter identifier, e.g. `"uncaught"`.
    pub filter_id: String,
    /// Condition the exception must satisfy to break.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// The user's "break on exception" settings for one session.
///
/// Mirrors the arguments of a DAP `setExceptionBreakpoints` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionFilterState {
    /// Enabled filter identifiers.
    #[serde(default)]
    pub filters: Vec<String>,
    /// Filters with per-filter conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_options: Option<Vec<ExceptionFilterOption>>,
}

impl ExceptionFilterState {
    /// State with the given filters enabled and no conditions.
    #[must_use]
    pub fn with_filters<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filters: filters.into_iter().map(Into::into).collect(),
            filter_options: None,
        }
    }

    /// Request arguments that re-apply this configuration.
    #[must_use]
    pub fn to_arguments(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "filters": self.filters }))
    }

    /// Request arguments that disable every exception filter.
    #[must_use]
    pub fn suppressed_arguments() -> Value {
        json!({ "filters": [] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoint_accessors() {
        let line = Breakpoint::source("1", "/src/main.rs", 10);
        assert_eq!(line.location().map(|l| l.line), Some(10));
        assert_eq!(line.function_name(), None);

        let func = Breakpoint::function("2", "main");
        assert!(func.location().is_none());
        assert_eq!(func.function_name(), Some("main"));

        let data = Breakpoint::new(
            "3",
            BreakpointKind::Data {
                data_id: "x".into(),
                access_type: Some("write".into()),
                description: None,
            },
        );
        assert!(data.location().is_none());
        assert!(data.function_name().is_none());
    }

    #[test]
    fn test_breakpoint_tagged_serialization() {
        let bp = Breakpoint::new(
            "7",
            BreakpointKind::Inline {
                location: SourceLocation::new("a.rs", 4).with_column(12),
            },
        )
        .with_condition("x > 1");
        let json = serde_json::to_value(&bp).unwrap();
        assert_eq!(json["type"], "inline");
        assert_eq!(json["location"]["column"], 12);
        assert_eq!(json["condition"], "x > 1");

        let parsed: Breakpoint = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, bp);
    }

    #[test]
    fn test_exception_filter_arguments() {
        let state = ExceptionFilterState::with_filters(["uncaught"]);
        assert_eq!(state.to_arguments(), json!({ "filters": ["uncaught"] }));
        assert_eq!(
            ExceptionFilterState::suppressed_arguments(),
            json!({ "filters": [] })
        );

        let conditioned = ExceptionFilterState {
            filters: vec![],
            filter_options: Some(vec![ExceptionFilterOption {
                filter_id: "raised".into(),
                condition: Some("ValueError".into()),
            }]),
        };
        assert_eq!(
            conditioned.to_arguments(),
            json!({
                "filters": [],
                "filterOptions": [{ "filterId": "raised", "condition": "ValueError" }]
            })
        );
    }
}

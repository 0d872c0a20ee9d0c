use serde::Serialize;
use std::time::Duration;

use crate::descriptor::StrategyKind;
use crate::engine::diagnostics::DiagnosticReport;
use crate::page::ElementRef;

/// What happened when one strategy was evaluated against the live page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Exactly one match satisfying the policy gates.
    Matched,
    /// Zero matches.
    NoMatch,
    /// More than one match; the engine refuses to guess between them.
    Ambiguous,
    /// A single match that failed the visibility/enabled gates.
    NotActionable,
    /// The query itself failed.
    Error(String),
}

/// Record of one strategy evaluation, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyAttempt {
    pub kind: StrategyKind,
    pub value: String,
    pub outcome: AttemptOutcome,
    pub match_count: usize,
}

/// Every strategy's final attempt record for one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attempts {
    pub tried: Vec<StrategyAttempt>,
    /// Wall time spent polling before giving up.
    pub elapsed: Duration,
    /// The caller aborted the wait before the budget ran out.
    pub cancelled: bool,
}

/// Result of resolving a descriptor against the current page.
///
/// Created fresh per resolution attempt and consumed immediately; never
/// cache one across page mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Exactly one live match via the strategy at `strategy_index`.
    Found {
        element: ElementRef,
        strategy_index: usize,
    },
    /// No strategy produced a usable match within the budget.
    NotFound(Attempts),
    /// The best any strategy did was multiple matches. `count` and
    /// `strategy_index` describe the highest-priority ambiguous strategy.
    Ambiguous {
        count: usize,
        strategy_index: usize,
        attempts: Attempts,
    },
}

impl ResolutionOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionOutcome::Found { .. })
    }

    pub fn element(&self) -> Option<&ElementRef> {
        match self {
            ResolutionOutcome::Found { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn attempts(&self) -> Option<&Attempts> {
        match self {
            ResolutionOutcome::Found { .. } => None,
            ResolutionOutcome::NotFound(attempts) => Some(attempts),
            ResolutionOutcome::Ambiguous { attempts, .. } => Some(attempts),
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.attempts().is_some_and(|a| a.cancelled)
    }
}

/// Failure classification carried on every failed action or assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// No strategy matched within budget. Often the expected outcome for
    /// absence assertions; callers decide.
    NotFound,
    /// One or more strategies matched several nodes.
    Ambiguous { count: usize },
    /// A previously resolved handle went away and one bounded re-resolution
    /// did not recover it.
    StaleElement,
    /// Observed state did not match intent (a rejected fill, a failed text
    /// or attribute assertion, an element that stayed visible).
    ValueMismatch { expected: String, actual: String },
    /// The caller's cancellation signal fired.
    Cancelled,
    /// The page provider failed mid-action.
    Backend { message: String },
}

/// Result of an action or assertion.
///
/// Never a panic, never an opaque timeout: failures always carry the
/// diagnostics report with the per-strategy breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResult {
    Ok {
        /// Read-back value for `read` actions and text assertions.
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    Failed {
        reason: FailureReason,
        diagnostics: DiagnosticReport,
    },
}

impl ActionResult {
    pub fn ok() -> Self {
        ActionResult::Ok { value: None }
    }

    pub fn ok_with(value: impl Into<String>) -> Self {
        ActionResult::Ok {
            value: Some(value.into()),
        }
    }

    pub fn failed(reason: FailureReason, diagnostics: DiagnosticReport) -> Self {
        ActionResult::Failed {
            reason,
            diagnostics,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ActionResult::Ok { .. })
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            ActionResult::Ok { value } => value.as_deref(),
            ActionResult::Failed { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&FailureReason> {
        match self {
            ActionResult::Ok { .. } => None,
            ActionResult::Failed { reason, .. } => Some(reason),
        }
    }

    pub fn diagnostics(&self) -> Option<&DiagnosticReport> {
        match self {
            ActionResult::Ok { .. } => None,
            ActionResult::Failed { diagnostics, .. } => Some(diagnostics),
        }
    }
}

/// Interaction to perform on a resolved element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Click,
    /// Replace the element's value, then verify the page kept it.
    Fill(String),
    /// Read the element's current value (or text for non-inputs).
    Read,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click => "click",
            Action::Fill(_) => "fill",
            Action::Read => "read",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_accessors() {
        let found = ResolutionOutcome::Found {
            element: ElementRef::new("e1"),
            strategy_index: 0,
        };
        assert!(found.is_found());
        assert_eq!(found.element().unwrap().as_str(), "e1");
        assert!(found.attempts().is_none());

        let not_found = ResolutionOutcome::NotFound(Attempts {
            cancelled: true,
            ..Attempts::default()
        });
        assert!(!not_found.is_found());
        assert!(not_found.was_cancelled());
    }

    #[test]
    fn test_action_result_helpers() {
        let ok = ActionResult::ok_with("100");
        assert!(ok.is_ok());
        assert_eq!(ok.value(), Some("100"));
        assert!(ok.reason().is_none());
    }

    #[test]
    fn test_failure_reason_serializes_kind() {
        let json = serde_json::to_string(&FailureReason::Ambiguous { count: 3 }).unwrap();
        assert!(json.contains("ambiguous"));
        assert!(json.contains('3'));
    }

    #[test]
    fn test_action_names() {
        assert_eq!(Action::Click.name(), "click");
        assert_eq!(Action::Fill("x".into()).name(), "fill");
        assert_eq!(Action::Read.name(), "read");
    }
}

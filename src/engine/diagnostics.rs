//! Structured failure reports.
//!
//! A bare timeout is useless to whoever has to fix the test; every report
//! carries the full per-strategy breakdown plus a bounded markup excerpt so a
//! better strategy can be authored without re-running anything.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::outcome::{AttemptOutcome, ResolutionOutcome, StrategyAttempt};

/// Hard cap on the markup excerpt embedded in a report.
pub const MAX_EXCERPT_CHARS: usize = 2_048;

/// Page state gathered by the caller before building a report. Collecting it
/// up front keeps [`report`] a pure value builder.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub page_url: String,
    /// Markup around the best candidate, already fetched from the provider.
    pub markup_excerpt: Option<String>,
}

/// Everything a human needs to diagnose a failed step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub page_url: String,
    pub timestamp: DateTime<Utc>,
    /// Wall time spent polling before the terminal outcome.
    pub elapsed_ms: u64,
    pub cancelled: bool,
    /// Index of the strategy that matched, when resolution succeeded but the
    /// step failed later (stale element, value mismatch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_strategy_index: Option<usize>,
    /// One row per strategy, in priority order, from the final poll.
    pub attempts: Vec<StrategyAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markup_excerpt: Option<String>,
}

/// Build a report from a resolution outcome. Pure: no page access, no
/// side effects beyond constructing the value.
pub fn report(context: &ReportContext, outcome: &ResolutionOutcome) -> DiagnosticReport {
    let (matched_strategy_index, attempts, elapsed_ms, cancelled) = match outcome {
        ResolutionOutcome::Found { strategy_index, .. } => {
            (Some(*strategy_index), Vec::new(), 0, false)
        }
        ResolutionOutcome::NotFound(attempts) => (
            None,
            attempts.tried.clone(),
            attempts.elapsed.as_millis() as u64,
            attempts.cancelled,
        ),
        ResolutionOutcome::Ambiguous {
            strategy_index,
            attempts,
            ..
        } => (
            Some(*strategy_index),
            attempts.tried.clone(),
            attempts.elapsed.as_millis() as u64,
            attempts.cancelled,
        ),
    };

    DiagnosticReport {
        page_url: context.page_url.clone(),
        timestamp: Utc::now(),
        elapsed_ms,
        cancelled,
        matched_strategy_index,
        attempts,
        markup_excerpt: context
            .markup_excerpt
            .as_deref()
            .map(|excerpt| truncate_excerpt(excerpt, MAX_EXCERPT_CHARS)),
    }
}

/// Cap an excerpt, marking the cut the way the page HTML dump does.
pub fn truncate_excerpt(excerpt: &str, max_chars: usize) -> String {
    if excerpt.chars().count() <= max_chars {
        return excerpt.to_string();
    }
    let kept: String = excerpt.chars().take(max_chars).collect();
    format!(
        "{}\n...[truncated, showing {}/{} chars]",
        kept,
        max_chars,
        excerpt.chars().count()
    )
}

impl DiagnosticReport {
    /// Outcome rows that matched more than one node.
    pub fn ambiguous_attempts(&self) -> impl Iterator<Item = &StrategyAttempt> {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, AttemptOutcome::Ambiguous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::StrategyKind;
    use crate::outcome::Attempts;
    use crate::page::ElementRef;
    use std::time::Duration;

    fn sample_attempts() -> Attempts {
        Attempts {
            tried: vec![
                StrategyAttempt {
                    kind: StrategyKind::TestId,
                    value: "submit-order".into(),
                    outcome: AttemptOutcome::NoMatch,
                    match_count: 0,
                },
                StrategyAttempt {
                    kind: StrategyKind::Css,
                    value: ".btn-primary".into(),
                    outcome: AttemptOutcome::Ambiguous,
                    match_count: 2,
                },
            ],
            elapsed: Duration::from_millis(5_012),
            cancelled: false,
        }
    }

    #[test]
    fn test_report_not_found_keeps_every_attempt() {
        let outcome = ResolutionOutcome::NotFound(sample_attempts());
        let context = ReportContext {
            page_url: "file:///terminal.html".into(),
            markup_excerpt: Some("<main>...</main>".into()),
        };
        let built = report(&context, &outcome);
        assert_eq!(built.attempts.len(), 2);
        assert_eq!(built.elapsed_ms, 5_012);
        assert_eq!(built.page_url, "file:///terminal.html");
        assert!(built.matched_strategy_index.is_none());
        assert_eq!(built.ambiguous_attempts().count(), 1);
    }

    #[test]
    fn test_report_found_records_strategy_index() {
        let outcome = ResolutionOutcome::Found {
            element: ElementRef::new("e1"),
            strategy_index: 1,
        };
        let built = report(&ReportContext::default(), &outcome);
        assert_eq!(built.matched_strategy_index, Some(1));
        assert!(built.attempts.is_empty());
    }

    #[test]
    fn test_excerpt_is_capped() {
        let long = "x".repeat(MAX_EXCERPT_CHARS * 2);
        let context = ReportContext {
            page_url: String::new(),
            markup_excerpt: Some(long),
        };
        let built = report(&context, &ResolutionOutcome::NotFound(Attempts::default()));
        let excerpt = built.markup_excerpt.unwrap();
        assert!(excerpt.contains("truncated"));
        assert!(excerpt.len() < MAX_EXCERPT_CHARS + 100);
    }

    #[test]
    fn test_truncate_short_excerpt_untouched() {
        assert_eq!(truncate_excerpt("<div/>", 100), "<div/>");
    }

    #[test]
    fn test_report_serializes_to_json() {
        let outcome = ResolutionOutcome::NotFound(sample_attempts());
        let built = report(&ReportContext::default(), &outcome);
        let json = serde_json::to_string_pretty(&built).unwrap();
        assert!(json.contains("test-id"));
        assert!(json.contains("no_match"));
        assert!(json.contains("ambiguous"));
    }
}

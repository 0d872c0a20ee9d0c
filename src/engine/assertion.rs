//! State assertions with the resolver's wait discipline.
//!
//! Absence is a first-class success case here: `Hidden` holds exactly when
//! resolution comes back empty or every current match is invisible. Treating
//! every `NotFound` as a failure is the false-negative trap this module
//! exists to avoid.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::descriptor::StrategyDescriptor;
use crate::engine::action::diagnose;
use crate::engine::resolve::resolve;
use crate::outcome::{
    ActionResult, AttemptOutcome, Attempts, FailureReason, ResolutionOutcome, StrategyAttempt,
};
use crate::page::{ElementRef, PageError, PageProvider};
use crate::policy::WaitPolicy;

/// Post-condition evaluated against a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatePredicate {
    /// Exactly one match exists and is visible.
    Visible,
    /// No visible match exists (absent counts as hidden).
    Hidden,
    /// The resolved element's text equals the expected string.
    TextEquals(String),
    /// The resolved element carries the attribute with the expected value.
    AttributeEquals { name: String, value: String },
}

impl StatePredicate {
    pub fn describe(&self) -> String {
        match self {
            StatePredicate::Visible => "visible".into(),
            StatePredicate::Hidden => "hidden".into(),
            StatePredicate::TextEquals(text) => format!("text == {text:?}"),
            StatePredicate::AttributeEquals { name, value } => {
                format!("[{name}] == {value:?}")
            }
        }
    }
}

/// Poll until the predicate holds or the budget runs out.
///
/// Successful assertions return `Ok` (with the observed text for the text
/// and attribute predicates); failures carry the usual diagnostics report.
pub async fn assert_state<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    predicate: &StatePredicate,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
) -> ActionResult
where
    P: PageProvider + ?Sized,
{
    match predicate {
        StatePredicate::Visible => assert_visible(page, descriptor, policy, cancel).await,
        StatePredicate::Hidden => assert_hidden(page, descriptor, policy, cancel).await,
        StatePredicate::TextEquals(_) | StatePredicate::AttributeEquals { .. } => {
            assert_reading(page, descriptor, predicate, policy, cancel).await
        }
    }
}

/// Visibility assertion is a plain resolution with the visible gate forced on.
async fn assert_visible<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
) -> ActionResult
where
    P: PageProvider + ?Sized,
{
    let gated = policy.clone().with_require_visible(true);
    match resolve(page, descriptor, &gated, cancel).await {
        ResolutionOutcome::Found { .. } => ActionResult::ok(),
        outcome => {
            let reason = match &outcome {
                ResolutionOutcome::Ambiguous { count, .. } => {
                    FailureReason::Ambiguous { count: *count }
                }
                _ if outcome.was_cancelled() => FailureReason::Cancelled,
                _ => FailureReason::NotFound,
            };
            ActionResult::failed(reason, diagnose(page, &outcome).await)
        }
    }
}

/// Hidden succeeds when no strategy currently yields a visible match —
/// the explicit inversion of the visibility assertion.
async fn assert_hidden<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
) -> ActionResult
where
    P: PageProvider + ?Sized,
{
    let started = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return cancelled_failure(page, started).await;
        }

        if let Ok(false) = any_visible_match(page, descriptor).await {
            debug!("hidden assertion holds");
            return ActionResult::ok();
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            // Still visible at the deadline: report what we saw, with the
            // full strategy breakdown.
            let outcome = pending_outcome(page, descriptor, elapsed).await;
            return ActionResult::failed(
                FailureReason::ValueMismatch {
                    expected: "hidden".into(),
                    actual: "visible".into(),
                },
                diagnose(page, &outcome).await,
            );
        }

        let nap = policy.poll_interval.min(policy.remaining(elapsed));
        tokio::select! {
            () = cancel.cancelled() => return cancelled_failure(page, started).await,
            () = tokio::time::sleep(nap) => {}
        }
    }
}

/// Shared loop for predicates that read a value off the resolved element.
async fn assert_reading<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    predicate: &StatePredicate,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
) -> ActionResult
where
    P: PageProvider + ?Sized,
{
    let started = Instant::now();
    let mut last_observed: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            return cancelled_failure(page, started).await;
        }

        // One probe pass per tick; the outer loop owns the wait budget.
        let single_pass = policy.clone().with_timeout(Duration::ZERO);
        if let ResolutionOutcome::Found { element, .. } =
            resolve(page, descriptor, &single_pass, cancel).await
        {
            match observe(page, &element, predicate).await {
                Ok((true, observed)) => {
                    debug!(predicate = %predicate.describe(), "assertion holds");
                    return ActionResult::ok_with(observed);
                }
                Ok((false, observed)) => last_observed = Some(observed),
                Err(_) => {}
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            let outcome = pending_outcome(page, descriptor, elapsed).await;
            let reason = match last_observed {
                Some(actual) => FailureReason::ValueMismatch {
                    expected: expected_value(predicate),
                    actual,
                },
                None => FailureReason::NotFound,
            };
            return ActionResult::failed(reason, diagnose(page, &outcome).await);
        }

        let nap = policy.poll_interval.min(policy.remaining(elapsed));
        tokio::select! {
            () = cancel.cancelled() => return cancelled_failure(page, started).await,
            () = tokio::time::sleep(nap) => {}
        }
    }
}

/// Read the predicate's target off the element and compare.
async fn observe<P>(
    page: &P,
    element: &ElementRef,
    predicate: &StatePredicate,
) -> Result<(bool, String), PageError>
where
    P: PageProvider + ?Sized,
{
    match predicate {
        StatePredicate::TextEquals(expected) => {
            let actual = page.read_text(element).await?;
            Ok((actual == *expected, actual))
        }
        StatePredicate::AttributeEquals { name, value } => {
            let actual = page.attribute(element, name).await?.unwrap_or_default();
            Ok((actual == *value, actual))
        }
        // Visible/Hidden never reach the reading loop.
        StatePredicate::Visible | StatePredicate::Hidden => Ok((false, String::new())),
    }
}

fn expected_value(predicate: &StatePredicate) -> String {
    match predicate {
        StatePredicate::TextEquals(text) => text.clone(),
        StatePredicate::AttributeEquals { value, .. } => value.clone(),
        other => other.describe(),
    }
}

/// True when any strategy currently has at least one visible match.
async fn any_visible_match<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
) -> Result<bool, PageError>
where
    P: PageProvider + ?Sized,
{
    for strategy in descriptor.strategies() {
        let matches = match page.query(strategy, descriptor.scope()).await {
            Ok(matches) => matches,
            Err(_) => continue,
        };
        for element in &matches {
            if let Ok(snapshot) = page.snapshot(element).await {
                if snapshot.visible {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

/// One ungated sweep over the strategies, recording what each currently
/// matches. Unlike the resolver's probe this never early-returns: a report
/// for a failed assertion needs every row, including strategies that did
/// match the (wrong-state) element.
async fn pending_outcome<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    elapsed: Duration,
) -> ResolutionOutcome
where
    P: PageProvider + ?Sized,
{
    let mut tried = Vec::with_capacity(descriptor.len());
    for strategy in descriptor.strategies() {
        let attempt = match page.query(strategy, descriptor.scope()).await {
            Ok(matches) => StrategyAttempt {
                kind: strategy.kind(),
                value: strategy.value_string(),
                outcome: match matches.len() {
                    0 => AttemptOutcome::NoMatch,
                    1 => AttemptOutcome::Matched,
                    _ => AttemptOutcome::Ambiguous,
                },
                match_count: matches.len(),
            },
            Err(err) => StrategyAttempt {
                kind: strategy.kind(),
                value: strategy.value_string(),
                outcome: AttemptOutcome::Error(err.to_string()),
                match_count: 0,
            },
        };
        tried.push(attempt);
    }
    ResolutionOutcome::NotFound(Attempts {
        tried,
        elapsed,
        cancelled: false,
    })
}

async fn cancelled_failure<P>(page: &P, started: Instant) -> ActionResult
where
    P: PageProvider + ?Sized,
{
    let outcome = ResolutionOutcome::NotFound(Attempts {
        tried: Vec::new(),
        elapsed: started.elapsed(),
        cancelled: true,
    });
    ActionResult::failed(FailureReason::Cancelled, diagnose(page, &outcome).await)
}

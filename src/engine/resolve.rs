//! Multi-strategy resolution with wait/retry semantics.
//!
//! The resolver re-queries the live page on every poll; nodes are never
//! cached across polls because the page may re-render between them (price
//! feeds, async hydration). Priority beats availability: a higher-priority
//! strategy that matches exactly once wins even when a lower-priority one
//! also would, and "first of many" is never silently picked.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::descriptor::{Strategy, StrategyDescriptor};
use crate::outcome::{AttemptOutcome, Attempts, ResolutionOutcome, StrategyAttempt};
use crate::page::{ElementRef, PageError, PageProvider};
use crate::policy::WaitPolicy;

/// One full pass over the descriptor's strategies against the current page.
pub(crate) enum Probe {
    /// A strategy produced exactly one gated match.
    Found {
        element: ElementRef,
        strategy_index: usize,
    },
    /// No strategy qualified this pass; try again until the budget runs out.
    Pending {
        tried: Vec<StrategyAttempt>,
        /// Highest-priority strategy that matched several nodes, with count.
        ambiguous: Option<(usize, usize)>,
    },
}

/// Evaluate every strategy once, in priority order.
pub(crate) async fn probe<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    policy: &WaitPolicy,
) -> Probe
where
    P: PageProvider + ?Sized,
{
    let mut tried = Vec::with_capacity(descriptor.len());
    let mut ambiguous: Option<(usize, usize)> = None;

    for (strategy_index, strategy) in descriptor.strategies().iter().enumerate() {
        match page.query(strategy, descriptor.scope()).await {
            Ok(matches) => match matches.as_slice() {
                [] => tried.push(attempt(strategy, AttemptOutcome::NoMatch, 0)),
                [only] => {
                    let element = only.clone();
                    match gates_pass(page, &element, policy).await {
                        Ok(true) => {
                            debug!(
                                strategy = %strategy,
                                strategy_index,
                                element = %element,
                                "resolved"
                            );
                            return Probe::Found {
                                element,
                                strategy_index,
                            };
                        }
                        Ok(false) => {
                            tried.push(attempt(strategy, AttemptOutcome::NotActionable, 1));
                        }
                        Err(err) => tried.push(attempt(
                            strategy,
                            AttemptOutcome::Error(err.to_string()),
                            1,
                        )),
                    }
                }
                many => {
                    let count = many.len();
                    trace!(strategy = %strategy, count, "ambiguous match");
                    if ambiguous.is_none() {
                        ambiguous = Some((strategy_index, count));
                    }
                    tried.push(attempt(strategy, AttemptOutcome::Ambiguous, count));
                }
            },
            Err(err) => {
                trace!(strategy = %strategy, error = %err, "query failed");
                tried.push(attempt(strategy, AttemptOutcome::Error(err.to_string()), 0));
            }
        }
    }

    Probe::Pending { tried, ambiguous }
}

/// Resolve a descriptor within the policy budget.
///
/// Returns `Found` the moment any strategy yields exactly one gated match;
/// otherwise polls until timeout and reports `Ambiguous` (something matched,
/// more than once) or `NotFound` (nothing usable), each with one attempt
/// record per strategy. Cancellation aborts promptly with the flag set.
pub async fn resolve<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
) -> ResolutionOutcome
where
    P: PageProvider + ?Sized,
{
    let started = Instant::now();
    loop {
        if cancel.is_cancelled() {
            return cancelled_outcome(Vec::new(), started);
        }

        let (tried, ambiguous) = match probe(page, descriptor, policy).await {
            Probe::Found {
                element,
                strategy_index,
            } => {
                return ResolutionOutcome::Found {
                    element,
                    strategy_index,
                }
            }
            Probe::Pending { tried, ambiguous } => (tried, ambiguous),
        };

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            let attempts = Attempts {
                tried,
                elapsed,
                cancelled: false,
            };
            return match ambiguous {
                Some((strategy_index, count)) => ResolutionOutcome::Ambiguous {
                    count,
                    strategy_index,
                    attempts,
                },
                None => ResolutionOutcome::NotFound(attempts),
            };
        }

        let nap = policy.poll_interval.min(policy.remaining(elapsed));
        tokio::select! {
            () = cancel.cancelled() => return cancelled_outcome(tried, started),
            () = tokio::time::sleep(nap) => {}
        }
    }
}

async fn gates_pass<P>(
    page: &P,
    element: &ElementRef,
    policy: &WaitPolicy,
) -> Result<bool, PageError>
where
    P: PageProvider + ?Sized,
{
    if !policy.require_visible && !policy.require_enabled {
        return Ok(true);
    }
    let snapshot = page.snapshot(element).await?;
    Ok((!policy.require_visible || snapshot.visible)
        && (!policy.require_enabled || snapshot.enabled))
}

fn attempt(strategy: &Strategy, outcome: AttemptOutcome, match_count: usize) -> StrategyAttempt {
    StrategyAttempt {
        kind: strategy.kind(),
        value: strategy.value_string(),
        outcome,
        match_count,
    }
}

fn cancelled_outcome(tried: Vec<StrategyAttempt>, started: Instant) -> ResolutionOutcome {
    ResolutionOutcome::NotFound(Attempts {
        tried,
        elapsed: started.elapsed(),
        cancelled: true,
    })
}

//! Action execution against a resolved element.
//!
//! A handle that resolved a moment ago may already be gone: price-feed
//! re-renders detach and rebuild nodes between resolution and interaction.
//! The executor therefore re-validates actionability immediately before
//! acting and, on invalidation, spends one more resolution out of the same
//! policy budget before declaring the element stale.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::descriptor::StrategyDescriptor;
use crate::engine::diagnostics::{report, ReportContext, MAX_EXCERPT_CHARS};
use crate::engine::resolve::resolve;
use crate::outcome::{Action, ActionResult, FailureReason, ResolutionOutcome};
use crate::page::{ElementRef, PageError, PageProvider};
use crate::policy::WaitPolicy;

/// Execute `action` against the element carried by `outcome`.
///
/// Anything other than `Found` short-circuits to `Failed` with the outcome
/// embedded as diagnostics; the executor never acts on an absent or
/// ambiguous element. The caller must already hold the page's action lock.
pub async fn act<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    outcome: ResolutionOutcome,
    action: &Action,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
) -> ActionResult
where
    P: PageProvider + ?Sized,
{
    let element = match &outcome {
        ResolutionOutcome::Found { element, .. } => element.clone(),
        ResolutionOutcome::NotFound(attempts) => {
            let reason = if attempts.cancelled {
                FailureReason::Cancelled
            } else {
                FailureReason::NotFound
            };
            return ActionResult::failed(reason, diagnose(page, &outcome).await);
        }
        ResolutionOutcome::Ambiguous { count, .. } => {
            return ActionResult::failed(
                FailureReason::Ambiguous { count: *count },
                diagnose(page, &outcome).await,
            );
        }
    };

    if cancel.is_cancelled() {
        return ActionResult::failed(FailureReason::Cancelled, diagnose(page, &outcome).await);
    }

    // The handle may have gone stale between resolution and now; allow one
    // bounded re-resolution before escalating.
    let element = match ensure_actionable(page, descriptor, element, policy, cancel).await {
        Ok(element) => element,
        Err(failure) => {
            return ActionResult::failed(failure, diagnose(page, &outcome).await);
        }
    };

    match perform(page, &element, action).await {
        Ok(value) => match value {
            Some(value) => ActionResult::ok_with(value),
            None => ActionResult::ok(),
        },
        Err(failure) => {
            let mut diagnostics = diagnose(page, &outcome).await;
            if let Ok(excerpt) = page
                .markup_excerpt(Some(&element), MAX_EXCERPT_CHARS)
                .await
            {
                diagnostics.markup_excerpt = Some(excerpt);
            }
            ActionResult::failed(failure, diagnostics)
        }
    }
}

/// Re-check actionability; on a stale or blocked handle, re-resolve once.
async fn ensure_actionable<P>(
    page: &P,
    descriptor: &StrategyDescriptor,
    element: ElementRef,
    policy: &WaitPolicy,
    cancel: &CancellationToken,
) -> Result<ElementRef, FailureReason>
where
    P: PageProvider + ?Sized,
{
    match check_ready(page, &element).await {
        Ok(true) => return Ok(element),
        Ok(false) | Err(PageError::Stale(_)) => {}
        Err(err) => {
            return Err(FailureReason::Backend {
                message: err.to_string(),
            })
        }
    }

    warn!(element = %element, "handle no longer actionable, re-resolving once");
    match resolve(page, descriptor, policy, cancel).await {
        ResolutionOutcome::Found { element, .. } => match check_ready(page, &element).await {
            Ok(true) => Ok(element),
            Ok(false) | Err(PageError::Stale(_)) => Err(FailureReason::StaleElement),
            Err(err) => Err(FailureReason::Backend {
                message: err.to_string(),
            }),
        },
        outcome if outcome.was_cancelled() => Err(FailureReason::Cancelled),
        _ => Err(FailureReason::StaleElement),
    }
}

async fn check_ready<P>(page: &P, element: &ElementRef) -> Result<bool, PageError>
where
    P: PageProvider + ?Sized,
{
    let actionability = page.actionability(element).await?;
    Ok(actionability.ready())
}

/// The interaction itself. `fill` reads the value back: inputs that reject
/// or transform text fail with `ValueMismatch` instead of passing silently.
async fn perform<P>(
    page: &P,
    element: &ElementRef,
    action: &Action,
) -> Result<Option<String>, FailureReason>
where
    P: PageProvider + ?Sized,
{
    match action {
        Action::Click => {
            page.click(element).await.map_err(backend)?;
            debug!(element = %element, "clicked");
            Ok(None)
        }
        Action::Fill(text) => {
            page.fill(element, text).await.map_err(backend)?;
            let actual = page.read_value(element).await.map_err(backend)?;
            if actual != *text {
                return Err(FailureReason::ValueMismatch {
                    expected: text.clone(),
                    actual,
                });
            }
            debug!(element = %element, "filled");
            Ok(None)
        }
        Action::Read => {
            let value = page.read_value(element).await.map_err(backend)?;
            Ok(Some(value))
        }
    }
}

fn backend(err: PageError) -> FailureReason {
    match err {
        PageError::Stale(_) => FailureReason::StaleElement,
        other => FailureReason::Backend {
            message: other.to_string(),
        },
    }
}

/// Gather page state and build the diagnostics report for an outcome.
pub async fn diagnose<P>(page: &P, outcome: &ResolutionOutcome) -> crate::engine::diagnostics::DiagnosticReport
where
    P: PageProvider + ?Sized,
{
    let context = ReportContext {
        page_url: page.url().await,
        markup_excerpt: page
            .markup_excerpt(outcome.element(), MAX_EXCERPT_CHARS)
            .await
            .ok(),
    };
    report(&context, outcome)
}

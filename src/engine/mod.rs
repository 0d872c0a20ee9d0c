//! The resolution/action/assertion engine.
//!
//! One [`Engine`] wraps one page provider. Resolutions are read-only and may
//! run concurrently; actions mutate the page and are serialized through an
//! advisory lock so simulated user input never races itself.

pub mod action;
pub mod assertion;
pub mod diagnostics;
pub mod resolve;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::descriptor::StrategyDescriptor;
use crate::outcome::{Action, ActionResult, ResolutionOutcome};
use crate::page::PageProvider;
use crate::policy::WaitPolicy;

pub use assertion::StatePredicate;
pub use diagnostics::{report, DiagnosticReport, ReportContext, MAX_EXCERPT_CHARS};

/// Engine facade over one page provider.
pub struct Engine<P: PageProvider + ?Sized> {
    action_lock: Mutex<()>,
    page: Arc<P>,
}

impl<P: PageProvider + ?Sized> Engine<P> {
    pub fn new(page: Arc<P>) -> Self {
        Self {
            action_lock: Mutex::new(()),
            page,
        }
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    /// Resolve a descriptor to at most one live element. See
    /// [`resolve::resolve`] for the full wait/priority/ambiguity contract.
    pub async fn resolve(
        &self,
        descriptor: &StrategyDescriptor,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> ResolutionOutcome {
        resolve::resolve(self.page.as_ref(), descriptor, policy, cancel).await
    }

    /// Execute an action against an already-resolved outcome. Holds the
    /// page's action lock for the duration of the interaction.
    pub async fn act(
        &self,
        descriptor: &StrategyDescriptor,
        outcome: ResolutionOutcome,
        action: &Action,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> ActionResult {
        let _guard = self.action_lock.lock().await;
        action::act(
            self.page.as_ref(),
            descriptor,
            outcome,
            action,
            policy,
            cancel,
        )
        .await
    }

    /// Resolve, then act: the common one-step path for test code.
    pub async fn perform(
        &self,
        descriptor: &StrategyDescriptor,
        action: &Action,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> ActionResult {
        let outcome = self.resolve(descriptor, policy, cancel).await;
        self.act(descriptor, outcome, action, policy, cancel).await
    }

    /// Evaluate a state predicate with the resolver's wait discipline.
    /// Assertions never mutate the page, so they skip the action lock.
    pub async fn assert_state(
        &self,
        descriptor: &StrategyDescriptor,
        predicate: &StatePredicate,
        policy: &WaitPolicy,
        cancel: &CancellationToken,
    ) -> ActionResult {
        assertion::assert_state(self.page.as_ref(), descriptor, predicate, policy, cancel).await
    }

    /// Build a diagnostics report for an outcome, including current page URL
    /// and a bounded markup excerpt.
    pub async fn diagnose(&self, outcome: &ResolutionOutcome) -> DiagnosticReport {
        action::diagnose(self.page.as_ref(), outcome).await
    }
}

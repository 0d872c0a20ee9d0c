//! holdfast: resilient element resolution and action execution for
//! end-to-end web UI tests.
//!
//! Test steps describe *what* they address — an ordered
//! [`StrategyDescriptor`] of locator strategies, most stable first — and the
//! [`Engine`] turns that into a live element handle against a
//! [`page::PageProvider`], executes actions and assertions with bounded
//! polling, and reports failures with a per-strategy breakdown instead of an
//! opaque timeout.

pub mod browser;
pub mod descriptor;
pub mod engine;
pub mod healer;
pub mod outcome;
pub mod page;
pub mod policy;
pub mod selectors;

pub use descriptor::{DescriptorError, Strategy, StrategyDescriptor, StrategyKind};
pub use engine::{DiagnosticReport, Engine, StatePredicate};
pub use healer::{Healer, HealerConfig, HealingSuggestion};
pub use outcome::{
    Action, ActionResult, AttemptOutcome, Attempts, FailureReason, ResolutionOutcome,
    StrategyAttempt,
};
pub use page::{Actionability, ElementRef, NodeSnapshot, PageError, PageProvider};
pub use policy::WaitPolicy;

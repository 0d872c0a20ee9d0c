//! Abstract page capability set the engine resolves against.
//!
//! The engine never talks to a concrete automation product; it goes through
//! [`PageProvider`]. Two providers ship with the crate: an in-memory page
//! model for tests ([`memory::MemoryPage`]) and a CDP-backed one
//! (`crate::browser::CdpPage`).

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::descriptor::Strategy;

/// Opaque handle to a DOM node, bound to one resolution.
///
/// Valid only until the page mutates under it; a stale ref must surface as
/// [`PageError::Stale`], never be silently re-bound to a different node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Introspection record for one element: everything the engine needs for
/// gating, diagnostics, and healing suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Actionability snapshot taken immediately before an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actionability {
    /// Node is still part of the document.
    pub attached: bool,
    pub visible: bool,
    /// Nothing else is rendered on top of the node's center point.
    pub unobscured: bool,
    pub enabled: bool,
}

impl Actionability {
    pub fn ready(&self) -> bool {
        self.attached && self.visible && self.unobscured && self.enabled
    }
}

/// Faults raised by a page provider.
#[derive(Debug, Error, Clone)]
pub enum PageError {
    /// A strategy query could not be evaluated (bad selector, unsupported
    /// feature, script failure). Recorded per attempt, not fatal to the call.
    #[error("query failed: {0}")]
    Query(String),

    /// The element ref no longer maps to an attached node.
    #[error("stale element ref {0}")]
    Stale(ElementRef),

    /// Transport or backend failure (CDP connection, page gone).
    #[error("page backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for PageError {
    fn from(err: anyhow::Error) -> Self {
        PageError::Query(err.to_string())
    }
}

/// Node-query and interaction primitives supplied by the page under test.
///
/// Queries must re-inspect the live page on every call; the engine re-queries
/// between polls and relies on providers not caching node sets. Only `click`
/// and `fill` mutate the page.
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// All elements currently matching the strategy, in document order.
    /// `scope` restricts the search to a previously resolved subtree.
    async fn query(
        &self,
        strategy: &Strategy,
        scope: Option<&ElementRef>,
    ) -> Result<Vec<ElementRef>, PageError>;

    /// Introspect one element. Fails with [`PageError::Stale`] when the ref
    /// is no longer attached.
    async fn snapshot(&self, element: &ElementRef) -> Result<NodeSnapshot, PageError>;

    /// Actionability check for one element, including obstruction.
    async fn actionability(&self, element: &ElementRef) -> Result<Actionability, PageError>;

    /// Simulate a user click on the element.
    async fn click(&self, element: &ElementRef) -> Result<(), PageError>;

    /// Replace the element's value with `text`, firing the page's usual
    /// input events. The element may transform what it accepts; the action
    /// executor reads the value back to verify.
    async fn fill(&self, element: &ElementRef, text: &str) -> Result<(), PageError>;

    /// Current value for value-bearing controls, trimmed text otherwise.
    async fn read_value(&self, element: &ElementRef) -> Result<String, PageError>;

    /// Trimmed text content of the element.
    async fn read_text(&self, element: &ElementRef) -> Result<String, PageError>;

    /// An attribute's current value, `None` when absent.
    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, PageError>;

    /// URL of the document, for diagnostics.
    async fn url(&self) -> String;

    /// Size-capped markup excerpt around `near` (or the document root when
    /// `None`), so a failed resolution can be re-authored without re-running.
    async fn markup_excerpt(
        &self,
        near: Option<&ElementRef>,
        max_chars: usize,
    ) -> Result<String, PageError>;
}

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::page::ElementRef;

/// One way of locating a UI element on the page.
///
/// Variants are ordered here roughly by how well they survive markup
/// refactors: role/label and attribute-based strategies keep working when the
/// DOM is restructured, while `Css` and `XPath` bind to document structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Strategy {
    /// ARIA role plus accessible name (e.g. role "button", name "Submit").
    RoleLabel { role: String, name: String },
    /// Test-id attribute value (`data-testid` by default, see the provider).
    TestId(String),
    /// Associated form label text.
    Label(String),
    /// Input placeholder text.
    Placeholder(String),
    /// Visible text content (substring, case-insensitive).
    Text(String),
    /// Raw CSS selector.
    Css(String),
    /// Raw XPath expression.
    #[serde(rename = "xpath")]
    XPath(String),
}

/// Strategy discriminant, used in attempt records and healing suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    RoleLabel,
    TestId,
    Label,
    Placeholder,
    Text,
    Css,
    #[serde(rename = "xpath")]
    XPath,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RoleLabel => "role+label",
            StrategyKind::TestId => "test-id",
            StrategyKind::Label => "label",
            StrategyKind::Placeholder => "placeholder",
            StrategyKind::Text => "text",
            StrategyKind::Css => "css",
            StrategyKind::XPath => "xpath",
        }
    }

    /// Whether this strategy addresses elements by document structure.
    /// Structural strategies break when markup is reordered, so a descriptor
    /// must carry at least one non-structural strategy.
    pub fn is_structural(&self) -> bool {
        matches!(self, StrategyKind::Css | StrategyKind::XPath)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::RoleLabel { .. } => StrategyKind::RoleLabel,
            Strategy::TestId(_) => StrategyKind::TestId,
            Strategy::Label(_) => StrategyKind::Label,
            Strategy::Placeholder(_) => StrategyKind::Placeholder,
            Strategy::Text(_) => StrategyKind::Text,
            Strategy::Css(_) => StrategyKind::Css,
            Strategy::XPath(_) => StrategyKind::XPath,
        }
    }

    pub fn is_structural(&self) -> bool {
        self.kind().is_structural()
    }

    /// Human-readable form of the strategy's target, for attempt records.
    pub fn value_string(&self) -> String {
        match self {
            Strategy::RoleLabel { role, name } => format!("{role}[name={name}]"),
            Strategy::TestId(v)
            | Strategy::Label(v)
            | Strategy::Placeholder(v)
            | Strategy::Text(v)
            | Strategy::Css(v)
            | Strategy::XPath(v) => v.clone(),
        }
    }

    /// Convenience constructor for role+label strategies.
    pub fn role_label(role: impl Into<String>, name: impl Into<String>) -> Self {
        Strategy::RoleLabel {
            role: role.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.kind(), self.value_string())
    }
}

/// Rejection reasons for descriptors that cannot be resolved safely.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// No strategies at all.
    #[error("descriptor has no strategies")]
    Empty,

    /// Every strategy binds to document structure; a single markup reorder
    /// would silently resolve the wrong element.
    #[error("descriptor only carries structural strategies (css/xpath); add a role, test-id, label, or text strategy")]
    StructuralOnly,

    /// A strategy value is empty or whitespace.
    #[error("strategy {0} has an empty value")]
    EmptyValue(String),
}

/// An ordered set of candidate strategies for one logical element.
///
/// Ordering is priority: the most stable strategy first. Construction
/// validates the set, so a resolved `StrategyDescriptor` is always usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    strategies: Vec<Strategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<ElementRef>,
}

impl StrategyDescriptor {
    /// Build a descriptor, rejecting empty or purely structural sets.
    pub fn new(strategies: Vec<Strategy>) -> Result<Self, DescriptorError> {
        if strategies.is_empty() {
            return Err(DescriptorError::Empty);
        }
        for strategy in &strategies {
            if strategy_value_is_blank(strategy) {
                return Err(DescriptorError::EmptyValue(strategy.kind().to_string()));
            }
        }
        if strategies.iter().all(Strategy::is_structural) {
            return Err(DescriptorError::StructuralOnly);
        }
        Ok(Self {
            strategies,
            scope: None,
        })
    }

    /// Restrict all queries to the subtree rooted at a previously resolved
    /// element. The scope handle follows the same staleness rules as any
    /// other `ElementRef`.
    pub fn with_scope(mut self, scope: ElementRef) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn scope(&self) -> Option<&ElementRef> {
        self.scope.as_ref()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

fn strategy_value_is_blank(strategy: &Strategy) -> bool {
    match strategy {
        Strategy::RoleLabel { role, name } => role.trim().is_empty() || name.trim().is_empty(),
        Strategy::TestId(v)
        | Strategy::Label(v)
        | Strategy::Placeholder(v)
        | Strategy::Text(v)
        | Strategy::Css(v)
        | Strategy::XPath(v) => v.trim().is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_accepts_mixed_strategies() {
        let descriptor = StrategyDescriptor::new(vec![
            Strategy::TestId("submit-order".into()),
            Strategy::Css(".btn-primary".into()),
        ])
        .unwrap();
        assert_eq!(descriptor.len(), 2);
    }

    #[test]
    fn test_descriptor_rejects_empty() {
        assert_eq!(
            StrategyDescriptor::new(vec![]).unwrap_err(),
            DescriptorError::Empty
        );
    }

    #[test]
    fn test_descriptor_rejects_structural_only() {
        let err = StrategyDescriptor::new(vec![Strategy::Css(".nav-links a:nth-child(2)".into())])
            .unwrap_err();
        assert_eq!(err, DescriptorError::StructuralOnly);

        let err = StrategyDescriptor::new(vec![
            Strategy::Css(".menu-item".into()),
            Strategy::XPath("//input[@id='quantity-input']".into()),
        ])
        .unwrap_err();
        assert_eq!(err, DescriptorError::StructuralOnly);
    }

    #[test]
    fn test_descriptor_rejects_blank_values() {
        let err =
            StrategyDescriptor::new(vec![Strategy::TestId("  ".into())]).unwrap_err();
        assert!(matches!(err, DescriptorError::EmptyValue(_)));
    }

    #[test]
    fn test_structural_classification() {
        assert!(Strategy::Css("#x".into()).is_structural());
        assert!(Strategy::XPath("//a".into()).is_structural());
        assert!(!Strategy::TestId("x".into()).is_structural());
        assert!(!Strategy::role_label("button", "Submit").is_structural());
        assert!(!Strategy::Text("Submit".into()).is_structural());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(StrategyKind::RoleLabel.as_str(), "role+label");
        assert_eq!(StrategyKind::TestId.as_str(), "test-id");
        assert_eq!(StrategyKind::XPath.as_str(), "xpath");
    }

    #[test]
    fn test_strategy_serde_round_trip() {
        let strategy = Strategy::role_label("button", "Submit Order");
        let json = serde_json::to_string(&strategy).unwrap();
        assert!(json.contains("role-label"));
        let back: Strategy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, strategy);
    }
}

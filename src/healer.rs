//! Healing suggestions for broken strategies.
//!
//! When a strategy stops matching, the page snapshots collected at failure
//! time usually still contain the intended element under a more stable
//! address. The healer ranks replacement strategies by how well each kind
//! survives markup refactors, so a human (or a tool) can swap the broken
//! locator for a durable one without re-running the suite.

use serde::Serialize;

use crate::descriptor::{Strategy, StrategyKind};
use crate::page::NodeSnapshot;

/// Base confidence per strategy kind. Role and label addressing survive
/// refactors best; raw css/xpath are the fallbacks of last resort.
fn base_confidence(kind: StrategyKind) -> f64 {
    match kind {
        StrategyKind::RoleLabel => 0.95,
        StrategyKind::Label => 0.90,
        StrategyKind::TestId => 0.85,
        StrategyKind::Placeholder => 0.80,
        StrategyKind::Text => 0.60,
        StrategyKind::Css => 0.30,
        StrategyKind::XPath => 0.20,
    }
}

/// A proposed replacement for a broken strategy.
#[derive(Debug, Clone, Serialize)]
pub struct HealingSuggestion {
    pub replacement: Strategy,
    pub confidence: f64,
    pub reason: String,
}

/// Healer configuration: which kinds to consider, in which order, and the
/// confidence floor below which suggestions are dropped.
#[derive(Debug, Clone)]
pub struct HealerConfig {
    pub priority: Vec<StrategyKind>,
    pub min_confidence: f64,
}

impl Default for HealerConfig {
    fn default() -> Self {
        Self {
            priority: vec![
                StrategyKind::RoleLabel,
                StrategyKind::Label,
                StrategyKind::TestId,
                StrategyKind::Placeholder,
                StrategyKind::Text,
                StrategyKind::Css,
            ],
            min_confidence: 0.25,
        }
    }
}

/// Suggests stable replacements for broken strategies from page snapshots.
#[derive(Debug, Clone, Default)]
pub struct Healer {
    config: HealerConfig,
}

impl Healer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: HealerConfig) -> Self {
        Self { config }
    }

    /// Rank replacement strategies for `broken`, best first.
    ///
    /// The broken strategy's own kind is never suggested back — if that kind
    /// were reliable here, it would not have broken.
    pub fn suggest(
        &self,
        broken: &Strategy,
        snapshots: &[NodeSnapshot],
    ) -> Vec<HealingSuggestion> {
        let broken_kind = broken.kind();
        let mut suggestions = Vec::new();

        for &kind in &self.config.priority {
            if kind == broken_kind {
                continue;
            }
            let Some(snapshot) = best_snapshot_for(kind, snapshots) else {
                continue;
            };
            let Some(replacement) = build_strategy(kind, snapshot) else {
                continue;
            };
            let confidence = confidence_for(kind, snapshot);
            if confidence < self.config.min_confidence {
                continue;
            }
            suggestions.push(HealingSuggestion {
                reason: reason_for(kind, snapshot),
                replacement,
                confidence,
            });
        }

        suggestions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions
    }
}

/// First snapshot carrying the data the kind needs.
fn best_snapshot_for(kind: StrategyKind, snapshots: &[NodeSnapshot]) -> Option<&NodeSnapshot> {
    snapshots.iter().find(|s| match kind {
        StrategyKind::RoleLabel => s.role.is_some(),
        StrategyKind::Label => s.label.is_some(),
        StrategyKind::TestId => s.test_id.is_some(),
        StrategyKind::Placeholder => s.placeholder.is_some(),
        StrategyKind::Text => s.text.as_deref().is_some_and(|t| t.len() > 2),
        StrategyKind::Css => {
            s.attributes.contains_key("id") || s.attributes.contains_key("class")
        }
        StrategyKind::XPath => false,
    })
}

fn build_strategy(kind: StrategyKind, snapshot: &NodeSnapshot) -> Option<Strategy> {
    match kind {
        StrategyKind::RoleLabel => {
            let role = snapshot.role.clone()?;
            let name = snapshot
                .label
                .clone()
                .or_else(|| snapshot.text.clone())?;
            Some(Strategy::RoleLabel { role, name })
        }
        StrategyKind::Label => snapshot.label.clone().map(Strategy::Label),
        StrategyKind::TestId => snapshot.test_id.clone().map(Strategy::TestId),
        StrategyKind::Placeholder => snapshot.placeholder.clone().map(Strategy::Placeholder),
        StrategyKind::Text => snapshot.text.clone().map(Strategy::Text),
        StrategyKind::Css => {
            if let Some(id) = snapshot.attributes.get("id") {
                return Some(Strategy::Css(format!("#{id}")));
            }
            let first_class = snapshot
                .attributes
                .get("class")?
                .split_whitespace()
                .next()?
                .to_string();
            Some(Strategy::Css(format!(".{first_class}")))
        }
        StrategyKind::XPath => None,
    }
}

fn confidence_for(kind: StrategyKind, snapshot: &NodeSnapshot) -> f64 {
    let mut confidence = base_confidence(kind);
    if kind == StrategyKind::RoleLabel && snapshot.role.is_none() {
        confidence *= 0.5;
    }
    if kind == StrategyKind::Text {
        if let Some(text) = &snapshot.text {
            if text.len() < 3 {
                confidence *= 0.7;
            }
        }
    }
    confidence.min(1.0)
}

fn reason_for(kind: StrategyKind, snapshot: &NodeSnapshot) -> String {
    match kind {
        StrategyKind::RoleLabel => format!(
            "ARIA role '{}' is resilient to DOM changes",
            snapshot.role.as_deref().unwrap_or("generic")
        ),
        StrategyKind::Label => format!(
            "Label '{}' provides stable form targeting",
            snapshot.label.as_deref().unwrap_or_default()
        ),
        StrategyKind::TestId => format!(
            "Test id '{}' is the most stable selector",
            snapshot.test_id.as_deref().unwrap_or_default()
        ),
        StrategyKind::Placeholder => format!(
            "Placeholder '{}' targets inputs reliably",
            snapshot.placeholder.as_deref().unwrap_or_default()
        ),
        StrategyKind::Text => format!(
            "Text '{}' matches visible content",
            snapshot.text.as_deref().unwrap_or_default()
        ),
        StrategyKind::Css => "Fallback to CSS selector using class/id".to_string(),
        StrategyKind::XPath => "Fallback to XPath selector".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshots() -> Vec<NodeSnapshot> {
        let mut search_attrs = BTreeMap::new();
        search_attrs.insert("class".to_string(), "search-input".to_string());
        let mut price_attrs = BTreeMap::new();
        price_attrs.insert("id".to_string(), "price-display".to_string());
        vec![
            NodeSnapshot {
                tag: "button".into(),
                role: Some("button".into()),
                label: Some("Submit".into()),
                text: Some("Submit Order".into()),
                ..NodeSnapshot::default()
            },
            NodeSnapshot {
                tag: "input".into(),
                label: Some("Username".into()),
                placeholder: Some("Enter username".into()),
                ..NodeSnapshot::default()
            },
            NodeSnapshot {
                tag: "div".into(),
                test_id: Some("trade-panel".into()),
                text: Some("Trading Panel".into()),
                ..NodeSnapshot::default()
            },
            NodeSnapshot {
                tag: "input".into(),
                placeholder: Some("Search".into()),
                attributes: search_attrs,
                ..NodeSnapshot::default()
            },
            NodeSnapshot {
                tag: "span".into(),
                text: Some("Price".into()),
                attributes: price_attrs,
                ..NodeSnapshot::default()
            },
        ]
    }

    #[test]
    fn test_role_suggested_first_for_broken_css() {
        let healer = Healer::new();
        let suggestions = healer.suggest(&Strategy::Css(".submit-btn".into()), &snapshots());
        assert!(!suggestions.is_empty());
        assert_eq!(suggestions[0].replacement.kind(), StrategyKind::RoleLabel);
        assert!((suggestions[0].confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sorted_by_confidence_descending() {
        let healer = Healer::new();
        let suggestions = healer.suggest(&Strategy::Css(".unknown".into()), &snapshots());
        for pair in suggestions.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_never_suggests_broken_kind() {
        let healer = Healer::new();
        let suggestions =
            healer.suggest(&Strategy::role_label("button", "Submit"), &snapshots());
        assert!(suggestions
            .iter()
            .all(|s| s.replacement.kind() != StrategyKind::RoleLabel));
    }

    #[test]
    fn test_text_confidence_below_role() {
        let healer = Healer::new();
        let suggestions = healer.suggest(&Strategy::Css(".btn".into()), &snapshots());
        let text = suggestions
            .iter()
            .find(|s| s.replacement.kind() == StrategyKind::Text)
            .unwrap();
        assert!(text.confidence < 0.7);
    }

    #[test]
    fn test_min_confidence_filters() {
        let healer = Healer::with_config(HealerConfig {
            min_confidence: 0.8,
            ..HealerConfig::default()
        });
        let suggestions = healer.suggest(&Strategy::XPath("//div[3]".into()), &snapshots());
        assert!(suggestions.iter().all(|s| s.confidence >= 0.8));
        assert!(suggestions
            .iter()
            .all(|s| !s.replacement.kind().is_structural()));
    }

    #[test]
    fn test_css_fallback_prefers_id() {
        let healer = Healer::new();
        let only_span = vec![snapshots().pop().unwrap()];
        let suggestions = healer.suggest(&Strategy::Text("gone".into()), &only_span);
        let css = suggestions
            .iter()
            .find(|s| s.replacement.kind() == StrategyKind::Css)
            .unwrap();
        assert_eq!(css.replacement, Strategy::Css("#price-display".into()));
    }

    #[test]
    fn test_no_snapshots_no_suggestions() {
        let healer = Healer::new();
        assert!(healer
            .suggest(&Strategy::Css(".x".into()), &[])
            .is_empty());
    }
}

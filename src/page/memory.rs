//! In-memory page model.
//!
//! A deliberately small stand-in for a real document: enough structure to
//! exercise every engine path (multi-strategy resolution, ambiguity, gating,
//! staleness, input transformation) without a browser. Test code drives page
//! mutation through the handle methods while the engine polls concurrently.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::descriptor::Strategy;
use crate::page::{Actionability, ElementRef, NodeSnapshot, PageError, PageProvider};

/// Default attribute consulted by the test-id strategy. The page under test
/// owns the convention; override with [`MemoryPage::with_test_id_attribute`].
pub const DEFAULT_TEST_ID_ATTRIBUTE: &str = "data-testid";

type InputTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// One element in the model. Build with the chained setters, then
/// [`MemoryPage::insert`] it.
#[derive(Debug, Clone, Default)]
pub struct MemoryNode {
    tag: String,
    role: Option<String>,
    label: Option<String>,
    text: String,
    value: String,
    placeholder: Option<String>,
    attributes: BTreeMap<String, String>,
    visible: bool,
    enabled: bool,
    obscured: bool,
    clicks: u64,
}

impl MemoryNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            visible: true,
            enabled: true,
            ..Self::default()
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Append a class to the `class` attribute.
    pub fn class(mut self, class: &str) -> Self {
        let classes = self.attributes.entry("class".into()).or_default();
        if classes.is_empty() {
            *classes = class.to_string();
        } else {
            classes.push(' ');
            classes.push_str(class);
        }
        self
    }

    pub fn test_id(self, id: impl Into<String>) -> Self {
        self.attr(DEFAULT_TEST_ID_ATTRIBUTE, id)
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

struct Entry {
    token: String,
    parent: Option<String>,
    node: MemoryNode,
}

struct Inner {
    url: String,
    next_ref: u64,
    entries: Vec<Entry>,
    input_transform: Option<InputTransform>,
}

/// The in-memory page provider.
pub struct MemoryPage {
    test_id_attribute: String,
    inner: Mutex<Inner>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPage {
    pub fn new() -> Self {
        Self {
            test_id_attribute: DEFAULT_TEST_ID_ATTRIBUTE.to_string(),
            inner: Mutex::new(Inner {
                url: "about:blank".to_string(),
                next_ref: 0,
                entries: Vec::new(),
                input_transform: None,
            }),
        }
    }

    pub fn with_url(self, url: impl Into<String>) -> Self {
        self.lock().url = url.into();
        self
    }

    /// Use a different attribute for the test-id strategy.
    pub fn with_test_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.test_id_attribute = attribute.into();
        self
    }

    /// Add a top-level node; returns its handle.
    pub fn insert(&self, node: MemoryNode) -> ElementRef {
        self.insert_inner(node, None)
    }

    /// Add a node inside the subtree of `parent` (for scoped queries).
    pub fn insert_child(&self, parent: &ElementRef, node: MemoryNode) -> ElementRef {
        self.insert_inner(node, Some(parent.as_str().to_string()))
    }

    fn insert_inner(&self, node: MemoryNode, parent: Option<String>) -> ElementRef {
        let mut inner = self.lock();
        inner.next_ref += 1;
        let token = format!("e{}", inner.next_ref);
        inner.entries.push(Entry {
            token: token.clone(),
            parent,
            node,
        });
        ElementRef::new(token)
    }

    /// Detach a node. Its handle goes stale; a later insert mints a new one.
    pub fn remove(&self, element: &ElementRef) -> bool {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.token != element.as_str());
        inner.entries.len() != before
    }

    pub fn set_visible(&self, element: &ElementRef, visible: bool) {
        self.update(element, |node| node.visible = visible);
    }

    pub fn set_enabled(&self, element: &ElementRef, enabled: bool) {
        self.update(element, |node| node.enabled = enabled);
    }

    pub fn set_obscured(&self, element: &ElementRef, obscured: bool) {
        self.update(element, |node| node.obscured = obscured);
    }

    pub fn set_text(&self, element: &ElementRef, text: impl Into<String>) {
        let text = text.into();
        self.update(element, move |node| node.text = text.clone());
    }

    pub fn set_value(&self, element: &ElementRef, value: impl Into<String>) {
        let value = value.into();
        self.update(element, move |node| node.value = value.clone());
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.lock().url = url.into();
    }

    /// Simulate an input that rewrites what is typed into it (masking,
    /// normalization). Applied by `fill` before the value lands.
    pub fn set_input_transform<F>(&self, transform: F)
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.lock().input_transform = Some(Arc::new(transform));
    }

    pub fn clear_input_transform(&self) {
        self.lock().input_transform = None;
    }

    /// How many times the node has been clicked.
    pub fn click_count(&self, element: &ElementRef) -> u64 {
        self.lock()
            .entries
            .iter()
            .find(|e| e.token == element.as_str())
            .map(|e| e.node.clicks)
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn update(&self, element: &ElementRef, f: impl Fn(&mut MemoryNode)) {
        let mut inner = self.lock();
        if let Some(entry) = inner
            .entries
            .iter_mut()
            .find(|e| e.token == element.as_str())
        {
            f(&mut entry.node);
        }
    }

    fn with_entry<T>(
        &self,
        element: &ElementRef,
        f: impl FnOnce(&Entry) -> T,
    ) -> Result<T, PageError> {
        let inner = self.lock();
        inner
            .entries
            .iter()
            .find(|e| e.token == element.as_str())
            .map(f)
            .ok_or_else(|| PageError::Stale(element.clone()))
    }

    fn in_scope(inner: &Inner, entry: &Entry, scope: Option<&ElementRef>) -> bool {
        let Some(scope) = scope else { return true };
        let mut parent = entry.parent.as_deref();
        while let Some(token) = parent {
            if token == scope.as_str() {
                return true;
            }
            parent = inner
                .entries
                .iter()
                .find(|e| e.token == token)
                .and_then(|e| e.parent.as_deref());
        }
        false
    }

    fn snapshot_of(&self, node: &MemoryNode) -> NodeSnapshot {
        NodeSnapshot {
            tag: node.tag.clone(),
            role: node.role.clone(),
            label: node.label.clone(),
            text: if node.text.is_empty() {
                None
            } else {
                Some(node.text.clone())
            },
            placeholder: node.placeholder.clone(),
            test_id: node.attributes.get(&self.test_id_attribute).cloned(),
            attributes: node.attributes.clone(),
            visible: node.visible,
            enabled: node.enabled,
        }
    }
}

#[async_trait]
impl PageProvider for MemoryPage {
    async fn query(
        &self,
        strategy: &Strategy,
        scope: Option<&ElementRef>,
    ) -> Result<Vec<ElementRef>, PageError> {
        let inner = self.lock();
        let mut matches = Vec::new();
        for entry in &inner.entries {
            if !Self::in_scope(&inner, entry, scope) {
                continue;
            }
            if node_matches(&entry.node, strategy, &self.test_id_attribute)? {
                matches.push(ElementRef::new(entry.token.clone()));
            }
        }
        Ok(matches)
    }

    async fn snapshot(&self, element: &ElementRef) -> Result<NodeSnapshot, PageError> {
        self.with_entry(element, |entry| self.snapshot_of(&entry.node))
    }

    async fn actionability(&self, element: &ElementRef) -> Result<Actionability, PageError> {
        let inner = self.lock();
        let entry = inner.entries.iter().find(|e| e.token == element.as_str());
        Ok(match entry {
            Some(entry) => Actionability {
                attached: true,
                visible: entry.node.visible,
                unobscured: !entry.node.obscured,
                enabled: entry.node.enabled,
            },
            None => Actionability {
                attached: false,
                visible: false,
                unobscured: false,
                enabled: false,
            },
        })
    }

    async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
        let mut inner = self.lock();
        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.token == element.as_str())
            .ok_or_else(|| PageError::Stale(element.clone()))?;
        entry.node.clicks += 1;
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> Result<(), PageError> {
        let mut inner = self.lock();
        let transform = inner.input_transform.clone();
        let entry = inner
            .entries
            .iter_mut()
            .find(|e| e.token == element.as_str())
            .ok_or_else(|| PageError::Stale(element.clone()))?;
        entry.node.value = match transform {
            Some(transform) => transform(text),
            None => text.to_string(),
        };
        Ok(())
    }

    async fn read_value(&self, element: &ElementRef) -> Result<String, PageError> {
        self.with_entry(element, |entry| {
            if matches!(entry.node.tag.as_str(), "input" | "textarea" | "select") {
                entry.node.value.clone()
            } else {
                entry.node.text.trim().to_string()
            }
        })
    }

    async fn read_text(&self, element: &ElementRef) -> Result<String, PageError> {
        self.with_entry(element, |entry| entry.node.text.trim().to_string())
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        self.with_entry(element, |entry| entry.node.attributes.get(name).cloned())
    }

    async fn url(&self) -> String {
        self.lock().url.clone()
    }

    async fn markup_excerpt(
        &self,
        near: Option<&ElementRef>,
        max_chars: usize,
    ) -> Result<String, PageError> {
        let inner = self.lock();
        let rendered = match near {
            Some(element) => inner
                .entries
                .iter()
                .find(|e| e.token == element.as_str())
                .map(|e| render_node(&e.node))
                .ok_or_else(|| PageError::Stale(element.clone()))?,
            None => inner
                .entries
                .iter()
                .map(|e| render_node(&e.node))
                .collect::<Vec<_>>()
                .join("\n"),
        };
        Ok(crate::engine::diagnostics::truncate_excerpt(
            &rendered, max_chars,
        ))
    }
}

/// Whether a node satisfies one strategy. Query errors (unsupported selector
/// syntax) surface as `PageError::Query` and land in the attempt record.
fn node_matches(
    node: &MemoryNode,
    strategy: &Strategy,
    test_id_attribute: &str,
) -> Result<bool, PageError> {
    Ok(match strategy {
        Strategy::RoleLabel { role, name } => {
            node.role.as_deref() == Some(role.as_str())
                && accessible_name(node).is_some_and(|n| n.eq_ignore_ascii_case(name.trim()))
        }
        Strategy::TestId(id) => node.attributes.get(test_id_attribute) == Some(id),
        Strategy::Label(label) => node
            .label
            .as_deref()
            .is_some_and(|l| l.trim().eq_ignore_ascii_case(label.trim())),
        Strategy::Placeholder(placeholder) => {
            node.placeholder.as_deref() == Some(placeholder.as_str())
        }
        Strategy::Text(needle) => node
            .text
            .to_lowercase()
            .contains(&needle.trim().to_lowercase()),
        Strategy::Css(selector) => matches_css(node, selector)?,
        Strategy::XPath(expr) => matches_xpath(node, expr)?,
    })
}

fn accessible_name(node: &MemoryNode) -> Option<String> {
    node.label
        .clone()
        .or_else(|| node.attributes.get("aria-label").cloned())
        .or_else(|| {
            let text = node.text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
}

/// Minimal CSS support: `tag`, `#id`, `.class`, `[attr]`, `[attr=value]`,
/// compounded. Combinators and pseudo-classes are rejected as query errors,
/// which the resolver records per attempt.
fn matches_css(node: &MemoryNode, selector: &str) -> Result<bool, PageError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(PageError::Query("empty css selector".into()));
    }
    if selector.contains(|c: char| " >+~:".contains(c)) {
        return Err(PageError::Query(format!(
            "unsupported css selector {selector:?} (combinators and pseudo-classes are not modeled)"
        )));
    }

    let mut rest = selector;
    let tag: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if !tag.is_empty() {
        if !node.tag.eq_ignore_ascii_case(&tag) {
            return Ok(false);
        }
        rest = &rest[tag.len()..];
    }

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('#') {
            let (id, remainder) = take_simple_token(after);
            if node.attributes.get("id").map(String::as_str) != Some(id) {
                return Ok(false);
            }
            rest = remainder;
        } else if let Some(after) = rest.strip_prefix('.') {
            let (class, remainder) = take_simple_token(after);
            let has_class = node
                .attributes
                .get("class")
                .is_some_and(|classes| classes.split_whitespace().any(|c| c == class));
            if !has_class {
                return Ok(false);
            }
            rest = remainder;
        } else if let Some(after) = rest.strip_prefix('[') {
            let Some(end) = after.find(']') else {
                return Err(PageError::Query(format!(
                    "unterminated attribute selector in {selector:?}"
                )));
            };
            let body = &after[..end];
            let matched = match body.split_once('=') {
                Some((name, value)) => {
                    let value = value.trim_matches(|c| c == '"' || c == '\'');
                    node.attributes.get(name.trim()).map(String::as_str) == Some(value)
                }
                None => node.attributes.contains_key(body.trim()),
            };
            if !matched {
                return Ok(false);
            }
            rest = &after[end + 1..];
        } else {
            return Err(PageError::Query(format!(
                "unsupported css selector {selector:?}"
            )));
        }
    }

    Ok(true)
}

fn take_simple_token(input: &str) -> (&str, &str) {
    let end = input
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(input.len());
    (&input[..end], &input[end..])
}

/// Minimal XPath support: `//tag`, `//*`, optionally with one
/// `[@attr='value']` predicate. Anything else is a query error.
fn matches_xpath(node: &MemoryNode, expr: &str) -> Result<bool, PageError> {
    let Some(rest) = expr.trim().strip_prefix("//") else {
        return Err(PageError::Query(format!(
            "unsupported xpath {expr:?} (only //tag[@attr='value'] forms are modeled)"
        )));
    };

    let (tag_part, predicate) = match rest.split_once('[') {
        Some((tag, pred)) => (tag, Some(pred)),
        None => (rest, None),
    };

    if tag_part != "*" && !node.tag.eq_ignore_ascii_case(tag_part) {
        return Ok(false);
    }

    if let Some(predicate) = predicate {
        let Some(body) = predicate.strip_suffix(']') else {
            return Err(PageError::Query(format!("unterminated predicate in {expr:?}")));
        };
        let Some(attr_expr) = body.strip_prefix('@') else {
            return Err(PageError::Query(format!(
                "unsupported xpath predicate in {expr:?}"
            )));
        };
        let Some((name, value)) = attr_expr.split_once('=') else {
            return Err(PageError::Query(format!(
                "unsupported xpath predicate in {expr:?}"
            )));
        };
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        return Ok(node.attributes.get(name.trim()).map(String::as_str) == Some(value));
    }

    Ok(true)
}

fn render_node(node: &MemoryNode) -> String {
    let mut attrs = String::new();
    for (name, value) in &node.attributes {
        attrs.push_str(&format!(" {name}=\"{value}\""));
    }
    if !node.visible {
        attrs.push_str(" hidden");
    }
    if !node.enabled {
        attrs.push_str(" disabled");
    }
    format!("<{tag}{attrs}>{text}</{tag}>", tag = node.tag, text = node.text)
}

//! `PageProvider` over a live CDP page.
//!
//! Matched elements are handed back as ref tokens minted by an in-page
//! registry (`window.__holdfast`). A token maps to one concrete node; when
//! that node leaves the document the token reports stale instead of being
//! re-bound, which is what lets the engine detect handles invalidated by
//! asynchronous re-renders.

use async_trait::async_trait;
use chromiumoxide::page::Page;
use serde_json::Value;

use crate::descriptor::Strategy;
use crate::engine::diagnostics::truncate_excerpt;
use crate::page::{Actionability, ElementRef, NodeSnapshot, PageError, PageProvider};
use crate::selectors;

/// Default attribute consulted by the test-id strategy; the page under test
/// owns the convention.
pub const DEFAULT_TEST_ID_ATTRIBUTE: &str = "data-testid";

/// CDP-backed page provider.
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
    test_id_attribute: String,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            test_id_attribute: DEFAULT_TEST_ID_ATTRIBUTE.to_string(),
        }
    }

    /// Use a different attribute for the test-id strategy.
    pub fn with_test_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.test_id_attribute = attribute.into();
        self
    }

    async fn eval(&self, js: String) -> Result<Value, PageError> {
        let result = self
            .page
            .evaluate(js)
            .await
            .map_err(|e| PageError::Backend(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| PageError::Backend(e.to_string()))
    }

    /// Run a script against one registered element. The script sees `el` in
    /// scope; a vanished token short-circuits to a stale marker.
    async fn eval_on(&self, element: &ElementRef, body: &str) -> Result<Value, PageError> {
        let js = format!(
            r#"(() => {{
                {prelude}
                const el = byToken({token});
                if (!el) return {{ stale: true }};
                try {{
                    {body}
                }} catch (e) {{
                    return {{ error: String(e) }};
                }}
            }})()"#,
            prelude = REGISTRY_PRELUDE,
            token = selectors::js_string(element.as_str())?,
            body = body
        );
        let value = self.eval(js).await?;
        if value.get("stale").and_then(Value::as_bool) == Some(true) {
            return Err(PageError::Stale(element.clone()));
        }
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(PageError::Backend(error.to_string()));
        }
        Ok(value)
    }
}

/// Shared by every script: the token registry and its two lookups.
const REGISTRY_PRELUDE: &str = r#"
    const reg = (window.__holdfast = window.__holdfast || {
        seq: 0,
        refs: new Map(),
        tokens: new WeakMap()
    });
    const tokenFor = (el) => {
        let token = reg.tokens.get(el);
        if (!token) {
            token = 'e' + (++reg.seq);
            reg.tokens.set(el, token);
            reg.refs.set(token, el);
        }
        return token;
    };
    const byToken = (token) => {
        const el = reg.refs.get(token);
        return el && el.isConnected ? el : null;
    };
"#;

#[async_trait]
impl PageProvider for CdpPage {
    async fn query(
        &self,
        strategy: &Strategy,
        scope: Option<&ElementRef>,
    ) -> Result<Vec<ElementRef>, PageError> {
        let collector = selectors::collect_js(strategy, &self.test_id_attribute)
            .map_err(|e| PageError::Query(e.to_string()))?;
        let root = match scope {
            Some(scope) => format!("byToken({})", selectors::js_string(scope.as_str())?),
            None => "document".to_string(),
        };
        let js = format!(
            r#"(() => {{
                {prelude}
                const root = {root};
                if (!root) return {{ staleScope: true }};
                let found;
                try {{
                    found = {collector};
                }} catch (e) {{
                    return {{ error: String(e) }};
                }}
                return {{ tokens: found.map(tokenFor) }};
            }})()"#,
            prelude = REGISTRY_PRELUDE,
            root = root,
            collector = collector
        );

        let value = self.eval(js).await?;
        if value.get("staleScope").and_then(Value::as_bool) == Some(true) {
            return Err(PageError::Stale(
                scope.cloned().unwrap_or_else(|| ElementRef::new("scope")),
            ));
        }
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(PageError::Query(error.to_string()));
        }
        let tokens = value
            .get("tokens")
            .and_then(Value::as_array)
            .ok_or_else(|| PageError::Query("malformed query result".into()))?;
        Ok(tokens
            .iter()
            .filter_map(Value::as_str)
            .map(ElementRef::new)
            .collect())
    }

    async fn snapshot(&self, element: &ElementRef) -> Result<NodeSnapshot, PageError> {
        let body = format!(
            r#"
            const style = getComputedStyle(el);
            const rect = el.getBoundingClientRect();
            const attrs = {{}};
            for (const attr of el.attributes || []) {{
                attrs[attr.name] = attr.value;
            }}
            const label = el.labels && el.labels.length > 0
                ? el.labels[0].textContent.trim()
                : el.getAttribute('aria-label');
            return {{
                tag: el.tagName.toLowerCase(),
                role: el.getAttribute('role'),
                label: label,
                text: (el.textContent || '').trim().substring(0, 200) || null,
                placeholder: el.getAttribute('placeholder'),
                testId: el.getAttribute({test_attr}),
                attributes: attrs,
                visible: style.display !== 'none'
                    && style.visibility !== 'hidden'
                    && parseFloat(style.opacity) > 0
                    && rect.width > 0
                    && rect.height > 0,
                enabled: !el.disabled
            }};"#,
            test_attr = selectors::js_string(&self.test_id_attribute)?
        );
        let value = self.eval_on(element, &body).await?;
        Ok(parse_snapshot(&value))
    }

    async fn actionability(&self, element: &ElementRef) -> Result<Actionability, PageError> {
        let body = r#"
            el.scrollIntoView({ block: 'center', inline: 'center', behavior: 'instant' });
            const rect = el.getBoundingClientRect();
            const style = getComputedStyle(el);
            const visible = style.display !== 'none'
                && style.visibility !== 'hidden'
                && parseFloat(style.opacity) > 0
                && rect.width > 0
                && rect.height > 0;
            const cx = rect.left + rect.width / 2;
            const cy = rect.top + rect.height / 2;
            const topEl = document.elementFromPoint(cx, cy);
            const unobscured = !!topEl && (el === topEl || el.contains(topEl) || topEl.contains(el));
            return { attached: true, visible, unobscured, enabled: !el.disabled };"#;
        match self.eval_on(element, body).await {
            Ok(value) => Ok(Actionability {
                attached: true,
                visible: value.get("visible").and_then(Value::as_bool).unwrap_or(false),
                unobscured: value
                    .get("unobscured")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                enabled: value.get("enabled").and_then(Value::as_bool).unwrap_or(false),
            }),
            Err(PageError::Stale(_)) => Ok(Actionability {
                attached: false,
                visible: false,
                unobscured: false,
                enabled: false,
            }),
            Err(err) => Err(err),
        }
    }

    async fn click(&self, element: &ElementRef) -> Result<(), PageError> {
        // Hybrid strategy: synthesized mouse events when the node is visible
        // and unobscured, plain el.click() otherwise.
        let body = r#"
            const rect = el.getBoundingClientRect();
            const x = rect.left + rect.width / 2;
            const y = rect.top + rect.height / 2;
            const style = getComputedStyle(el);
            const visible = style.display !== 'none'
                && style.visibility !== 'hidden'
                && parseFloat(style.opacity) > 0;
            const topEl = document.elementFromPoint(x, y);
            const unobscured = !!topEl && (el === topEl || el.contains(topEl) || topEl.contains(el));
            if (visible && unobscured) {
                const opts = { bubbles: true, cancelable: true, clientX: x, clientY: y, button: 0 };
                el.dispatchEvent(new MouseEvent('mousemove', opts));
                el.dispatchEvent(new MouseEvent('mousedown', opts));
                el.dispatchEvent(new MouseEvent('mouseup', opts));
                el.dispatchEvent(new MouseEvent('click', opts));
                return { method: 'mouse_event' };
            }
            el.click();
            return { method: 'js_click' };"#;
        let value = self.eval_on(element, body).await?;
        tracing::debug!(
            method = value.get("method").and_then(serde_json::Value::as_str).unwrap_or("?"),
            "clicked"
        );
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> Result<(), PageError> {
        let body = format!(
            r#"
            el.scrollIntoView({{ block: 'center', behavior: 'instant' }});
            el.focus();
            const text = {text};
            if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA') {{
                const setter = Object.getOwnPropertyDescriptor(
                    window.HTMLInputElement.prototype, 'value'
                )?.set || Object.getOwnPropertyDescriptor(
                    window.HTMLTextAreaElement.prototype, 'value'
                )?.set;
                if (setter) {{
                    setter.call(el, text);
                }} else {{
                    el.value = text;
                }}
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            }} else if (el.isContentEditable) {{
                el.textContent = text;
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            }} else {{
                return {{ error: 'element does not accept text input' }};
            }}
            return {{ ok: true }};"#,
            text = selectors::js_string(text)?
        );
        self.eval_on(element, &body).await?;
        Ok(())
    }

    async fn read_value(&self, element: &ElementRef) -> Result<String, PageError> {
        let body = r#"
            if (el.tagName === 'INPUT' || el.tagName === 'TEXTAREA' || el.tagName === 'SELECT') {
                return { value: String(el.value) };
            }
            return { value: (el.textContent || '').trim() };"#;
        let value = self.eval_on(element, body).await?;
        Ok(value
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn read_text(&self, element: &ElementRef) -> Result<String, PageError> {
        let value = self
            .eval_on(element, "return { value: (el.textContent || '').trim() };")
            .await?;
        Ok(value
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, PageError> {
        let body = format!(
            "return {{ value: el.getAttribute({name}) }};",
            name = selectors::js_string(name)?
        );
        let value = self.eval_on(element, &body).await?;
        Ok(value
            .get("value")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn url(&self) -> String {
        match self.page.url().await {
            Ok(Some(url)) => url,
            _ => String::new(),
        }
    }

    async fn markup_excerpt(
        &self,
        near: Option<&ElementRef>,
        max_chars: usize,
    ) -> Result<String, PageError> {
        let html = match near {
            Some(element) => {
                let value = self.eval_on(element, "return { value: el.outerHTML };").await?;
                value
                    .get("value")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            }
            None => {
                let value = self
                    .eval("document.body ? document.body.outerHTML : ''".to_string())
                    .await?;
                value.as_str().unwrap_or_default().to_string()
            }
        };
        Ok(truncate_excerpt(&html, max_chars))
    }
}

fn parse_snapshot(value: &Value) -> NodeSnapshot {
    let string_field = |name: &str| {
        value
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let attributes = value
        .get("attributes")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default();

    NodeSnapshot {
        tag: value
            .get("tag")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        role: string_field("role"),
        label: string_field("label"),
        text: string_field("text"),
        placeholder: string_field("placeholder"),
        test_id: string_field("testId"),
        attributes,
        visible: value.get("visible").and_then(Value::as_bool).unwrap_or(false),
        enabled: value.get("enabled").and_then(Value::as_bool).unwrap_or(false),
    }
}

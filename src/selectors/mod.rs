//! JS query generation for the CDP-backed page provider.
//!
//! Each submodule emits a JavaScript expression that, given a `root` element
//! in scope, evaluates to an array of matching elements. `collect_js`
//! dispatches on the strategy kind; the provider wraps the collector in its
//! element-registry script so matches come back as stable ref tokens.

pub mod attr;
pub mod css;
pub mod role;
pub mod text;
pub mod xpath;

use anyhow::Result;

use crate::descriptor::Strategy;

/// JS expression producing an array of elements matching `strategy`,
/// evaluated against the free variable `root` (an Element or Document).
pub fn collect_js(strategy: &Strategy, test_id_attribute: &str) -> Result<String> {
    Ok(match strategy {
        Strategy::Css(selector) => css::collect_js(selector)?,
        Strategy::Text(needle) => text::collect_js(needle)?,
        Strategy::XPath(expr) => xpath::collect_js(expr)?,
        Strategy::RoleLabel { role, name } => role::collect_js(role, name)?,
        Strategy::TestId(id) => attr::test_id_js(test_id_attribute, id)?,
        Strategy::Label(label) => attr::label_js(label)?,
        Strategy::Placeholder(placeholder) => attr::placeholder_js(placeholder)?,
    })
}

/// Encode a Rust string as a JS string literal.
pub(crate) fn js_string(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_collector() {
        let js = collect_js(&Strategy::Css(".btn-primary".into()), "data-testid").unwrap();
        assert!(js.contains("querySelectorAll"));
        assert!(js.contains(".btn-primary"));
    }

    #[test]
    fn test_test_id_collector_uses_configured_attribute() {
        let js = collect_js(&Strategy::TestId("submit-order".into()), "data-qa").unwrap();
        assert!(js.contains("data-qa"));
        assert!(js.contains("submit-order"));
    }

    #[test]
    fn test_text_collector_walks_text_nodes() {
        let js = collect_js(&Strategy::Text("Submit".into()), "data-testid").unwrap();
        assert!(js.contains("createTreeWalker"));
        assert!(js.contains("Submit"));
    }

    #[test]
    fn test_xpath_collector_snapshots_ordered_nodes() {
        let js = collect_js(
            &Strategy::XPath("//input[@id='quantity-input']".into()),
            "data-testid",
        )
        .unwrap();
        assert!(js.contains("document.evaluate"));
        assert!(js.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
    }

    #[test]
    fn test_role_collector_filters_by_accessible_name() {
        let js =
            collect_js(&Strategy::role_label("button", "Submit Order"), "data-testid").unwrap();
        assert!(js.contains("role"));
        assert!(js.contains("Submit Order"));
        assert!(js.contains("aria-label"));
    }

    #[test]
    fn test_label_collector_follows_for_attribute() {
        let js = collect_js(&Strategy::Label("Symbol".into()), "data-testid").unwrap();
        assert!(js.contains("label"));
        assert!(js.contains("htmlFor"));
    }

    #[test]
    fn test_placeholder_collector() {
        let js = collect_js(&Strategy::Placeholder("Search".into()), "data-testid").unwrap();
        assert!(js.contains("placeholder"));
        assert!(js.contains("Search"));
    }

    #[test]
    fn test_js_string_escapes_quotes() {
        let encoded = js_string(r#"a"b"#).unwrap();
        assert_eq!(encoded, r#""a\"b""#);
    }
}

use anyhow::Result;

use super::js_string;

/// Collect elements matching an XPath expression, evaluated with `root` as
/// the context node.
pub fn collect_js(expr: &str) -> Result<String> {
    Ok(format!(
        r#"(() => {{
            const doc = root.ownerDocument || root;
            const xpathResult = doc.evaluate(
                {expr},
                root,
                null,
                XPathResult.ORDERED_NODE_SNAPSHOT_TYPE,
                null
            );
            const results = [];
            for (let i = 0; i < xpathResult.snapshotLength; i++) {{
                const el = xpathResult.snapshotItem(i);
                if (el.nodeType === Node.ELEMENT_NODE) {{
                    results.push(el);
                }}
            }}
            return results;
        }})()"#,
        expr = js_string(expr)?
    ))
}

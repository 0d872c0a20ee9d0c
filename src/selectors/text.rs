use anyhow::Result;

use super::js_string;

/// Collect elements whose text content contains `needle`, case-insensitive.
///
/// Walks text nodes and reports each parent element once, in document order,
/// so nested containers don't produce duplicate matches for the same text.
pub fn collect_js(needle: &str) -> Result<String> {
    Ok(format!(
        r#"(() => {{
            const target = {needle}.toLowerCase();
            const scope = root.nodeType === Node.DOCUMENT_NODE ? root.body : root;
            const walker = (root.ownerDocument || root).createTreeWalker(
                scope,
                NodeFilter.SHOW_TEXT,
                null
            );
            const seen = new Set();
            const results = [];
            while (walker.nextNode()) {{
                const node = walker.currentNode;
                if (node.textContent.trim().toLowerCase().includes(target)) {{
                    const el = node.parentElement;
                    if (el && !seen.has(el)) {{
                        seen.add(el);
                        results.push(el);
                    }}
                }}
            }}
            return results;
        }})()"#,
        needle = js_string(needle)?
    ))
}

use anyhow::Result;

use super::js_string;

/// Collect elements by the page's test-id attribute.
pub fn test_id_js(attribute: &str, id: &str) -> Result<String> {
    Ok(format!(
        "Array.from(root.querySelectorAll('[' + {attr} + '=' + JSON.stringify({id}) + ']'))",
        attr = js_string(attribute)?,
        id = js_string(id)?
    ))
}

/// Collect form controls associated with a `<label>` whose text matches,
/// via `for`/`htmlFor`, label nesting, or `aria-label`.
pub fn label_js(label: &str) -> Result<String> {
    Ok(format!(
        r#"(() => {{
            const wanted = {label}.trim().toLowerCase();
            const doc = root.ownerDocument || root;
            const results = [];
            const seen = new Set();
            const add = (el) => {{ if (el && !seen.has(el)) {{ seen.add(el); results.push(el); }} }};
            for (const labelEl of root.querySelectorAll('label')) {{
                if (labelEl.textContent.trim().toLowerCase() !== wanted) continue;
                if (labelEl.htmlFor) {{
                    add(doc.getElementById(labelEl.htmlFor));
                }} else {{
                    add(labelEl.querySelector('input, textarea, select'));
                }}
            }}
            for (const el of root.querySelectorAll('[aria-label]')) {{
                if (el.getAttribute('aria-label').trim().toLowerCase() === wanted) add(el);
            }}
            return results;
        }})()"#,
        label = js_string(label)?
    ))
}

/// Collect inputs by exact placeholder text.
pub fn placeholder_js(placeholder: &str) -> Result<String> {
    Ok(format!(
        "Array.from(root.querySelectorAll('[placeholder=' + JSON.stringify({placeholder}) + ']'))",
        placeholder = js_string(placeholder)?
    ))
}

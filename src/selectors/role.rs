use anyhow::Result;

use super::js_string;

/// Collect elements by ARIA role and accessible name.
///
/// Candidates carry either an explicit `role` attribute or a tag whose
/// implicit role matches; the accessible name is taken from `aria-label`, an
/// associated `<label>`, or the trimmed text content, compared
/// case-insensitively.
pub fn collect_js(role: &str, name: &str) -> Result<String> {
    Ok(format!(
        r#"(() => {{
            const role = {role};
            const name = {name}.trim().toLowerCase();
            const implicit = {{
                button: 'button, input[type="button"], input[type="submit"]',
                link: 'a[href]',
                textbox: 'input:not([type]), input[type="text"], textarea',
                checkbox: 'input[type="checkbox"]',
                radio: 'input[type="radio"]',
                combobox: 'select',
                heading: 'h1, h2, h3, h4, h5, h6'
            }};
            let selector = '[role=' + JSON.stringify(role) + ']';
            if (implicit[role]) {{
                selector += ', ' + implicit[role];
            }}
            const accessibleName = (el) => {{
                const aria = el.getAttribute('aria-label');
                if (aria) return aria.trim();
                if (el.labels && el.labels.length > 0) {{
                    return el.labels[0].textContent.trim();
                }}
                const value = el.value || '';
                if (value) return String(value).trim();
                return (el.textContent || '').trim();
            }};
            return Array.from(root.querySelectorAll(selector))
                .filter((el) => accessibleName(el).toLowerCase() === name);
        }})()"#,
        role = js_string(role)?,
        name = js_string(name)?
    ))
}

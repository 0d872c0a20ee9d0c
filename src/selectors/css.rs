use anyhow::Result;

use super::js_string;

/// Collect elements matching a CSS selector under `root`.
pub fn collect_js(selector: &str) -> Result<String> {
    Ok(format!(
        "Array.from(root.querySelectorAll({sel}))",
        sel = js_string(selector)?
    ))
}

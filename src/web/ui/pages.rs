//! HTML page rendering.
//!
//! Templates are read once from the `templates/` directory; an inline
//! fallback keeps the challenge working when the file is missing.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::error;

const TEMPLATE_DIR: &str = "templates";
const TEMPLATE_NAMES: &[&str] = &["challenge.html"];
static TEMPLATES: OnceLock<HashMap<String, Arc<str>>> = OnceLock::new();

/// Pre-loads all templates into memory.
pub fn preload_templates() {
    let _ = get_template_map();
}

fn get_template_map() -> &'static HashMap<String, Arc<str>> {
    TEMPLATES.get_or_init(|| {
        let mut m = HashMap::new();
        for name in TEMPLATE_NAMES {
            let path = Path::new(TEMPLATE_DIR).join(name);
            match fs::read_to_string(&path) {
                Ok(content) => {
                    m.insert((*name).to_string(), Arc::from(content));
                }
                Err(e) => {
                    error!(file = name, error = %e, "Failed to load UI template, using inline fallback");
                }
            }
        }
        m
    })
}

fn load_template(filename: &str) -> Option<Arc<str>> {
    get_template_map().get(filename).cloned()
}

const FALLBACK_CHALLENGE: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<title>Checking your browser</title>\
<noscript><meta http-equiv=\"refresh\" content=\"{{DELAY_SECS}}\"></noscript></head>\
<body><p>Checking your browser...</p>\
<noscript><p>JavaScript is required to continue.</p></noscript>\
<script>document.cookie = \"{{COOKIE}}\";\
setTimeout(function () { window.location.reload(); }, {{DELAY_MS}});</script>\
</body></html>";

/// Renders the self-reloading verification page.
///
/// `cookie` is the client-side cookie string the page script writes before
/// reloading the current path after `delay_ms`.
#[must_use]
pub fn get_challenge_page(cookie: &str, delay_ms: u64) -> String {
    let template =
        load_template("challenge.html").map_or_else(|| FALLBACK_CHALLENGE.to_string(), |t| t.to_string());

    template
        .replace("{{COOKIE}}", &escape_js_string(cookie))
        .replace("{{DELAY_MS}}", &delay_ms.to_string())
        .replace("{{DELAY_SECS}}", &delay_ms.div_ceil(1000).max(1).to_string())
}

fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '\n' | '\r' => {}
            c => out.push(c),
        }
    }
    out
}

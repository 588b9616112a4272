//! Safe message-template substitution.
//!
//! Templates use `{name}` placeholders. A template referencing a placeholder
//! the variable set does not define is returned verbatim instead of raising;
//! the caller proceeds with the unexpanded text (fail-soft).

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use tracing::warn;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("invalid placeholder pattern"));

pub fn render(template: &str, vars: &HashMap<&'static str, String>) -> String {
    if template.is_empty() {
        return String::new();
    }

    for captures in PLACEHOLDER.captures_iter(template) {
        let name = &captures[1];
        if !vars.contains_key(name) {
            warn!(placeholder = name, "undefined template placeholder, leaving template unexpanded");
            return template.to_string();
        }
    }

    PLACEHOLDER
        .replace_all(template, |captures: &Captures| {
            vars.get(&captures[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

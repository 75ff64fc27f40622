//! Placeholder rendering for notification title/message templates.
//!
//! Templates use `{name}` placeholders. Substituted values are inserted
//! verbatim and never re-scanned, so user-provided text containing braces
//! cannot trigger further substitution.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("valid placeholder regex"));

/// Renders `template` with the given `(name, value)` bindings.
///
/// Unknown placeholders are left untouched.
pub fn render_template(template: &str, bindings: &[(&str, &str)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let name = &caps[1];
            bindings
                .iter()
                .find(|(key, _)| *key == name)
                .map_or_else(|| caps[0].to_string(), |(_, value)| (*value).to_string())
        })
        .into_owned()
}

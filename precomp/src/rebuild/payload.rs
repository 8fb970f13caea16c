use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use indexmap::IndexMap;
use tracing::{error, warn};

use crate::code::{Parser, minify};

/// Helpers every bootstrap carries, whatever the compiler asks for.
pub const RUNTIME_SUPPORT: &[(&str, &str)] = &[
    (
        "compare_equal",
        r#"(helper compare_equal ("a" "b") (== (cmp (param "a") (param "b")) 0))"#,
    ),
    (
        "less_than",
        r#"(helper less_than ("a" "b") (< (cmp (param "a") (param "b")) 0))"#,
    ),
    (
        "greater_than",
        r#"(helper greater_than ("a" "b") (> (cmp (param "a") (param "b")) 0))"#,
    ),
    // the current tick has run for more than 500 ms
    ("is_stuck", r#"(helper is_stuck () (> (elapsed) 500))"#),
];

pub const DATA_URL_PREFIX: &str = "data:text/plain;base64,";

pub const UNSANDBOXED_NOTICE: &str =
    "; You need to allow this extension to load unsandboxed in order to run the project.";

/// Assemble the bootstrap source: runtime support first, then the
/// compiler's helpers. A helper that does not parse is logged and left out.
pub fn bootstrap_source(helpers: &IndexMap<String, String>, version: &str, compact: bool) -> String {
    let mut accepted: IndexMap<&str, String> = IndexMap::new();
    let candidates = RUNTIME_SUPPORT
        .iter()
        .map(|(name, source)| (*name, *source))
        .chain(helpers.iter().map(|(name, source)| (name.as_str(), source.as_str())));

    for (name, source) in candidates {
        if accepted.contains_key(name) {
            warn!(helper = name, "duplicate helper, keeping the first definition");
            continue;
        }
        if let Err(e) = Parser::new(source, 0).parse_helper() {
            error!(helper = name, error = %e, "malformed runtime helper, skipping");
            continue;
        }
        let text = if compact {
            match minify(source) {
                Ok(text) => text,
                Err(e) => {
                    error!(helper = name, error = %e, "cannot size-reduce runtime helper, skipping");
                    continue;
                }
            }
        } else {
            source.to_string()
        };
        accepted.insert(name, text);
    }

    let mut out = format!("(bootstrap {}", crate::code::quote(version));
    for text in accepted.values() {
        out.push(if compact { ' ' } else { '\n' });
        out.push_str(text);
    }
    out.push(')');
    if compact {
        minify(&out).unwrap_or(out)
    } else {
        out
    }
}

/// Encode the bootstrap source as the shim's extension URL.
pub fn data_url(bootstrap: &str) -> String {
    let document = format!("{UNSANDBOXED_NOTICE}\n{bootstrap}");
    format!("{DATA_URL_PREFIX}{}", STANDARD.encode(document))
}

/// Inverse of [`data_url`]: the decoded document, notice line included.
pub fn decode_data_url(url: &str) -> Option<String> {
    let encoded = url.strip_prefix(DATA_URL_PREFIX)?;
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

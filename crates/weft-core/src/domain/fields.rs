//! Field resolver: one level of templating over flat key/value payloads.
//!
//! Payloads are scraped or imported as flat string-keyed maps; derived
//! values (joined names, formatted labels) are expressed as `CONCAT`/`FORMAT`
//! keys instead of being precomputed by every submission path.

use serde_json::{Map, Value};

/// Resolve `key` against `data`.
///
/// 1. A literal hit in `data` wins, template-looking or not.
/// 2. Otherwise `TYPE:SPEC` keys are evaluated:
///    - `CONCAT:sep|ref|ref|...` joins the resolved refs with `sep`.
///    - `FORMAT:template|ref|ref|...` replaces every `%N%` occurrence in
///      the template with the N-th resolved ref.
///    Refs are trimmed and resolved recursively, so a ref may itself be a
///    `TYPE:SPEC` expression. The outer key is parsed exactly once.
/// 3. Anything else resolves to `None`.
pub fn resolve(data: &Map<String, Value>, key: &str) -> Option<Value> {
    if let Some(value) = data.get(key) {
        return Some(value.clone());
    }

    let (kind, spec) = key.split_once(':')?;
    match kind {
        "CONCAT" => {
            let mut tokens = spec.split('|');
            let separator = tokens.next()?;
            let parts: Vec<String> = tokens
                .map(|reference| {
                    resolve(data, reference.trim())
                        .map(render)
                        .unwrap_or_default()
                })
                .collect();
            Some(Value::String(parts.join(separator)))
        }
        "FORMAT" => {
            let mut tokens = spec.split('|');
            let template = tokens.next()?;
            let mut out = template.to_string();
            for (index, reference) in tokens.enumerate() {
                let resolved = resolve(data, reference.trim())
                    .map(render)
                    .unwrap_or_default();
                out = out.replace(&format!("%{}%", index + 1), &resolved);
            }
            Some(Value::String(out))
        }
        _ => None,
    }
}

/// String form used when a resolved value is substituted into a template.
fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

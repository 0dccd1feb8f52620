// PHP literal serialization for snippet arguments

use serde_json::Value;

/// Render a JSON value as a PHP source literal
///
/// Objects become associative `array('k' => v)`, arrays become positional
/// `array(v, ...)`. Strings are single-quoted so no interpolation happens
/// on the remote side.
pub fn php_literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(php_literal).collect();
            format!("array({})", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{} => {}", quote(k), php_literal(v)))
                .collect();
            format!("array({})", entries.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

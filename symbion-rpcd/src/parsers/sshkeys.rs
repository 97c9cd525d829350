//! Authorized keys list handling

use serde_json::Value;

/// Non-blank lines, trimmed, in file order
pub fn parse_authorized_keys(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render the file body for a list of keys.
///
/// Entries that are not strings, are blank, or span several lines are
/// skipped. Every key is written on its own newline-terminated line.
pub fn render_authorized_keys(keys: &[Value]) -> String {
    keys.iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|key| !key.is_empty() && !key.contains(['\n', '\r']))
        .fold(String::new(), |mut body, key| {
            body.push_str(key);
            body.push('\n');
            body
        })
}

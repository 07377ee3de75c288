//! Path lookup inside JSON records.
//!
//! Grammar: keys separated by `.`, optional bracketed indices or quoted keys per
//! segment (`items[0].name`, `m[1][2]`, `labels["app.kubernetes.io/name"]`).
//! Numeric keys index arrays, so `items.0.name` and `items[0].name` are the same path.

#![forbid(unsafe_code)]

use serde_json::Value;

/// Split a path into its keys.
pub fn parse_path(path: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut chars = path.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if !cur.is_empty() { out.push(std::mem::take(&mut cur)); }
            }
            '[' => {
                if !cur.is_empty() { out.push(std::mem::take(&mut cur)); }
                let quote = match chars.peek() {
                    Some(&q) if q == '"' || q == '\'' => { chars.next(); Some(q) }
                    _ => None,
                };
                let mut key = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match quote {
                        Some(q) if c == q && chars.peek() == Some(&']') => {
                            chars.next();
                            closed = true;
                            break;
                        }
                        None if c == ']' => {
                            closed = true;
                            break;
                        }
                        _ => key.push(c),
                    }
                }
                if !closed {
                    // Unterminated bracket: keep the text as a literal key.
                    let mut lit = String::from("[");
                    if let Some(q) = quote { lit.push(q); }
                    lit.push_str(&key);
                    cur = lit;
                    continue;
                }
                out.push(key);
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() { out.push(cur); }
    out
}

/// Look up `path` inside `root`. Returns `None` when any key along the way is absent.
///
/// A key that literally equals the whole path (e.g. `"a.b"`) wins over the split form.
/// A present `null` is returned as a value.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if let Value::Object(map) = root {
        if let Some(v) = map.get(path) { return Some(v); }
    }
    let keys = parse_path(path);
    if keys.is_empty() { return None; }
    let mut cur = root;
    for key in keys.iter() {
        cur = match cur {
            Value::Object(map) => map.get(key.as_str())?,
            Value::Array(arr) => arr.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

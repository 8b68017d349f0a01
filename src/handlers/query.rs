//! Query-string decoding with bracket nesting.
//!
//! `name[like]=%a%` becomes `{"name": {"like": "%a%"}}`, `id[in][]=a&id[in][]=b`
//! becomes `{"id": {"in": ["a", "b"]}}` and repeated plain keys collect into a
//! list. Values stay strings; the validator coerces them.

use serde_json::{Map, Value};

pub fn parse_query(raw: Option<&str>) -> Value {
    let mut root = Map::new();
    if let Some(raw) = raw {
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let segments = split_key(&key);
            insert(&mut root, &segments, value.into_owned());
        }
    }
    Value::Object(root)
}

/// `a[b][]` → `["a", "b", ""]`. Keys with unbalanced brackets are kept whole.
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 {
        return vec![key.to_string()];
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(close) => {
                segments.push(stripped[..close].to_string());
                rest = &stripped[close + 1..];
            }
            None => return vec![key.to_string()],
        }
    }
    if !rest.is_empty() {
        return vec![key.to_string()];
    }
    segments
}

fn insert(target: &mut Map<String, Value>, segments: &[String], value: String) {
    let Some((key, rest)) = segments.split_first() else {
        return;
    };

    match rest.first().map(String::as_str) {
        None => {
            let entry = target.entry(key.clone()).or_insert(Value::Null);
            *entry = match entry.take() {
                Value::Array(mut items) => {
                    items.push(Value::String(value));
                    Value::Array(items)
                }
                previous @ Value::String(_) => Value::Array(vec![previous, Value::String(value)]),
                _ => Value::String(value),
            };
        }
        Some("") => {
            let entry = target.entry(key.clone()).or_insert_with(|| Value::Array(vec![]));
            *entry = match entry.take() {
                Value::Array(mut items) => {
                    items.push(Value::String(value));
                    Value::Array(items)
                }
                previous @ Value::String(_) => Value::Array(vec![previous, Value::String(value)]),
                _ => Value::Array(vec![Value::String(value)]),
            };
        }
        Some(_) => {
            let entry = target
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(nested) = entry {
                insert(nested, rest, value);
            }
        }
    }
}

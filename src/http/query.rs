//! Query string and urlencoded form decoding into value trees.
//!
//! Keys use the bracket syntax storefront clients send:
//! `a=1&a=2` → `{"a":["1","2"]}`, `a[b]=1` → `{"a":{"b":"1"}}`,
//! `a[]=1` → `{"a":["1"]}`. Without tree decoding, an operator hidden in
//! `user[$ne]=x` would never be seen as a mapping key.
//!
//! Every key must decode completely into bracket segments. Stray text around
//! brackets, unbalanced brackets and nesting past [`MAX_KEY_DEPTH`] are
//! rejected, since re-encoding such leftovers could assemble a fresh
//! `[$op]` segment that a bracket-syntax parser downstream would honor.

use serde_json::{Map, Value};
use thiserror::Error;
use url::form_urlencoded;

/// Deepest bracket nesting accepted in a key.
pub const MAX_KEY_DEPTH: usize = 5;

/// A key that does not decode into bracket segments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed key {0:?}")]
pub struct MalformedKey(pub String);

/// Decode an urlencoded string into a mapping.
pub fn decode(input: &str) -> Result<Value, MalformedKey> {
    let mut root = Map::new();
    for (key, value) in form_urlencoded::parse(input.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        let path = split_key(&key).ok_or_else(|| MalformedKey(key.to_string()))?;
        insert(&mut root, &path, Value::String(value.into_owned()));
    }
    Ok(Value::Object(root))
}

/// Encode a value tree back into an urlencoded string.
///
/// Scalars inside arrays use `key[]`; composite array elements use `key[i]`.
/// Empty mappings and lists have no pairs of their own and are written as
/// `key=` so the key survives, arriving downstream as an empty string.
pub fn encode(value: &Value) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Value::Object(map) = value {
        for (key, child) in map {
            encode_into(&mut serializer, key, child);
        }
    }
    serializer.finish()
}

/// One step in a decoded key path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Push,
}

fn split_key(key: &str) -> Option<Vec<Segment>> {
    let open = key.find('[').unwrap_or(key.len());
    let head = &key[..open];
    if head.is_empty() || head.contains(']') {
        return None;
    }

    let mut path = vec![Segment::Key(head.to_string())];
    let mut rest = &key[open..];

    while !rest.is_empty() {
        if path.len() > MAX_KEY_DEPTH {
            return None;
        }
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        let name = &inner[..close];
        if name.contains('[') {
            return None;
        }
        path.push(if name.is_empty() {
            Segment::Push
        } else {
            Segment::Key(name.to_string())
        });
        rest = &inner[close + 1..];
    }

    Some(path)
}

fn insert(map: &mut Map<String, Value>, path: &[Segment], value: Value) {
    let Some((Segment::Key(head), tail)) = path.split_first() else {
        return;
    };

    if tail.is_empty() {
        match map.get_mut(head) {
            Some(existing) => append(existing, value),
            None => {
                map.insert(head.clone(), value);
            }
        }
        return;
    }

    let slot = map.entry(head.clone()).or_insert_with(|| match tail[0] {
        Segment::Push => Value::Array(Vec::new()),
        Segment::Key(_) => Value::Object(Map::new()),
    });
    insert_into(slot, tail, value);
}

fn insert_into(slot: &mut Value, path: &[Segment], value: Value) {
    match (&path[0], slot) {
        (Segment::Push, Value::Array(items)) => {
            let rest = &path[1..];
            if rest.is_empty() {
                items.push(value);
            } else {
                let mut child = Map::new();
                insert_named(&mut child, rest, value);
                items.push(Value::Object(child));
            }
        }
        (Segment::Key(_), Value::Object(map)) => insert(map, path, value),
        (_, other) => {
            // Shape conflict such as `a=1&a[b]=2`: keep both as a list.
            let mut nested = Map::new();
            insert_named(&mut nested, path, value);
            append(other, Value::Object(nested));
        }
    }
}

fn insert_named(map: &mut Map<String, Value>, path: &[Segment], value: Value) {
    match path.first() {
        Some(Segment::Key(_)) => insert(map, path, value),
        Some(Segment::Push) => {
            // `a[][]=x` style: collapse the anonymous level into a list under "".
            let slot = map
                .entry(String::new())
                .or_insert_with(|| Value::Array(Vec::new()));
            insert_into(slot, path, value);
        }
        None => {}
    }
}

fn append(existing: &mut Value, value: Value) {
    match existing {
        Value::Array(items) => items.push(value),
        other => {
            let previous = std::mem::take(other);
            *other = Value::Array(vec![previous, value]);
        }
    }
}

fn encode_into(serializer: &mut form_urlencoded::Serializer<'_, String>, key: &str, value: &Value) {
    match value {
        Value::Object(map) if map.is_empty() => {
            serializer.append_pair(key, "");
        }
        Value::Array(items) if items.is_empty() => {
            serializer.append_pair(key, "");
        }
        Value::Object(map) => {
            for (child_key, child) in map {
                encode_into(serializer, &format!("{key}[{child_key}]"), child);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        encode_into(serializer, &format!("{key}[{index}]"), item)
                    }
                    scalar => encode_into(serializer, &format!("{key}[]"), scalar),
                }
            }
        }
        Value::String(s) => {
            serializer.append_pair(key, s);
        }
        Value::Null => {
            serializer.append_pair(key, "");
        }
        scalar => {
            serializer.append_pair(key, &scalar.to_string());
        }
    }
}

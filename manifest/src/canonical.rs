use serde_json::Value;

/// Deterministic byte encoding of a JSON value: object keys sorted by
/// Unicode code point, no insignificant whitespace, arrays kept in order.
/// This is the exact byte sequence the signer signs and the verifier
/// re-derives; it must agree across independent implementations.
pub fn canonical_encode(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out.into_bytes()
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => {
            // serde_json's own string encoder gives us exactly the escaping
            // JSON requires, nothing more.
            out.push_str(&serde_json::to_string(s).unwrap_or_default());
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(*key).unwrap_or_default());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_by_code_point() {
        let value = json!({"z": 1, "a": 2, "m": 3});
        assert_eq!(canonical_encode(&value), br#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn has_no_insignificant_whitespace() {
        let value = json!({"files": {"b.txt": "aa", "a.txt": "bb"}, "version": "1.0.0.0"});
        let encoded = String::from_utf8(canonical_encode(&value)).unwrap();
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn preserves_array_order() {
        let value = json!([3, 1, 2]);
        assert_eq!(canonical_encode(&value), b"[3,1,2]");
    }

    #[test]
    fn nested_objects_sort_at_every_level() {
        let value = json!({"b": {"z": 1, "a": 2}, "a": true});
        assert_eq!(canonical_encode(&value), br#"{"a":true,"b":{"a":2,"z":1}}"#);
    }

    #[test]
    fn stable_under_key_reordering_of_equivalent_input() {
        let a = json!({"version": "1.0.0.0", "files": {"x": "h1", "y": "h2"}});
        let b = json!({"files": {"y": "h2", "x": "h1"}, "version": "1.0.0.0"});
        assert_eq!(canonical_encode(&a), canonical_encode(&b));
    }

    #[test]
    fn escapes_only_what_json_requires() {
        let value = json!({"key": "hello \"world\"\nnewline"});
        let encoded = String::from_utf8(canonical_encode(&value)).unwrap();
        assert_eq!(encoded, r#"{"key":"hello \"world\"\nnewline"}"#);
    }
}

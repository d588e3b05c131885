//! Conversion between plain JSON and the typed value encoding used by the
//! Firestore REST API (`{"stringValue": "..."}`, `{"doubleValue": 1.5}`, ...).

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Map, Value};

pub fn encode_fields(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .map(|(key, value)| (key.clone(), encode(value)))
        .collect()
}

pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) if !n.is_f64() => json!({ "integerValue": i.to_string() }),
            _ => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode).collect::<Vec<_>>() } })
        }
        Value::Object(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>> {
    fields
        .iter()
        .map(|(key, value)| {
            decode(value)
                .with_context(|| format!("Invalid value for field {key:?}"))
                .map(|v| (key.clone(), v))
        })
        .collect()
}

pub fn decode(value: &Value) -> Result<Value> {
    let typed = value
        .as_object()
        .and_then(|obj| obj.iter().next())
        .map(|(kind, v)| (kind.as_str(), v))
        .ok_or_else(|| anyhow!("Expected a typed value object, got {value}"))?;

    match typed {
        ("nullValue", _) => Ok(Value::Null),
        ("booleanValue", v) => Ok(v.clone()),
        ("stringValue", v) | ("timestampValue", v) | ("referenceValue", v) => Ok(v.clone()),
        ("integerValue", Value::String(s)) => {
            let i: i64 = s.parse().with_context(|| format!("Invalid integerValue {s:?}"))?;
            Ok(Value::from(i))
        }
        ("integerValue", v) => Ok(v.clone()),
        ("doubleValue", Value::String(s)) => {
            let f: f64 = s.parse().with_context(|| format!("Invalid doubleValue {s:?}"))?;
            Ok(Value::from(f))
        }
        ("doubleValue", v) => Ok(v.clone()),
        ("arrayValue", v) => {
            let items = v
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(items))
        }
        ("mapValue", v) => {
            let fields = match v.get("fields").and_then(Value::as_object) {
                Some(fields) => decode_fields(fields)?,
                None => Map::new(),
            };
            Ok(Value::Object(fields))
        }
        (other, _) => Err(anyhow!("Unsupported value type {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_numbers_by_kind() {
        assert_eq!(encode(&json!(12)), json!({ "integerValue": "12" }));
        assert_eq!(encode(&json!(12.5)), json!({ "doubleValue": 12.5 }));
        assert_eq!(encode(&json!(null)), json!({ "nullValue": null }));
    }

    #[test]
    fn decodes_what_it_encodes_for_nested_values() {
        let original = json!({
            "amount": 1234.56,
            "count": 3,
            "notes": "NF 1",
            "tags": ["a", "b"],
            "extra": { "flag": true },
        });
        let encoded = encode_fields(original.as_object().unwrap());
        let decoded = decode_fields(&encoded).unwrap();
        assert_eq!(Value::Object(decoded), original);
    }

    #[test]
    fn rejects_unknown_value_types() {
        assert!(decode(&json!({ "geoPointValue": {} })).is_err());
        assert!(decode(&json!("bare")).is_err());
    }
}

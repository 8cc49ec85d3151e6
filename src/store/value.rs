//! Firestore typed-value codec
//!
//! Firestore's REST surface wraps every field in a one-key object naming its
//! type (`{"stringValue": "x"}`, `{"integerValue": "10"}`, ...). Records are
//! plain JSON everywhere else in the crate, so values are unwrapped on the way
//! in and wrapped again for query filters.

use crate::error::{DashboardError, Result};
use serde_json::{json, Map, Number, Value};

/// Decode a Firestore `fields` map into plain JSON
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Decode a single typed value
pub fn decode_value(value: &Value) -> Result<Value> {
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("value is not an object", value))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| malformed("empty value", value))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| malformed("bad booleanValue", value)),
        // int64 travels as a decimal string
        "integerValue" => {
            let n = match inner {
                Value::String(s) => s
                    .parse::<i64>()
                    .map_err(|_| malformed("bad integerValue", value))?,
                Value::Number(n) => n
                    .as_i64()
                    .ok_or_else(|| malformed("bad integerValue", value))?,
                _ => return Err(malformed("bad integerValue", value)),
            };
            Ok(Value::Number(n.into()))
        }
        "doubleValue" => {
            let f = match inner {
                Value::Number(n) => n.as_f64(),
                // NaN and the infinities are sent as strings
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| malformed("bad doubleValue", value))?;
            Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
        }
        "timestampValue" | "stringValue" | "bytesValue" | "referenceValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| malformed("bad string-like value", value)),
        "geoPointValue" => Ok(json!({
            "latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
            "longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
        })),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values
                    .iter()
                    .map(decode_value)
                    .collect::<Result<Vec<_>>>()?,
                // An empty array omits `values`
                None => Vec::new(),
                Some(_) => return Err(malformed("bad arrayValue", value)),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => match inner.get("fields") {
            Some(Value::Object(fields)) => Ok(Value::Object(decode_fields(fields)?)),
            None => Ok(Value::Object(Map::new())),
            Some(_) => Err(malformed("bad mapValue", value)),
        },
        other => Err(DashboardError::Malformed(format!(
            "unknown Firestore value kind: {}",
            other
        ))),
    }
}

/// Encode plain JSON as a typed value
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => json!({
            "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(fields) => {
            let encoded: Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect();
            json!({ "mapValue": { "fields": encoded } })
        }
    }
}

fn malformed(what: &str, value: &Value) -> DashboardError {
    DashboardError::Malformed(format!("{}: {}", what, value))
}

use serde_json::{Map, Number, Value as Json};
use stratum::Value;

/// JSON rendering of a dynamic value. Rich scalars become strings, bytes
/// become arrays of integers and tagged values become single-key objects.
pub(crate) fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(flag) => Json::Bool(*flag),
        Value::Int(v) => Json::Number((*v).into()),
        Value::UInt(v) => Json::Number((*v).into()),
        Value::Float32(v) => float(f64::from(v.0)),
        Value::Float64(v) => float(v.0),
        Value::String(text) => Json::String(text.clone()),
        Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Decimal(d) => Json::String(d.to_string()),
        Value::Timestamp(ts) => Json::String(ts.to_rfc3339()),
        Value::NaiveTimestamp(ts) => Json::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Value::Date(d) => Json::String(d.to_string()),
        Value::Time(t) => Json::String(t.to_string()),
        Value::Uuid(u) => Json::String(u.to_string()),
        Value::Ulid(u) => Json::String(u.to_string()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => {
            if entries.iter().all(|(key, _)| matches!(key, Value::String(_))) {
                let object: Map<String, Json> = entries
                    .iter()
                    .filter_map(|(key, entry)| {
                        key.as_str().map(|k| (k.to_string(), value_to_json(entry)))
                    })
                    .collect();
                Json::Object(object)
            } else {
                Json::Array(
                    entries
                        .iter()
                        .map(|(key, entry)| {
                            Json::Array(vec![value_to_json(key), value_to_json(entry)])
                        })
                        .collect(),
                )
            }
        }
        Value::Record(fields) => Json::Object(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), value_to_json(field)))
                .collect(),
        ),
        Value::Tagged(tagged) => {
            let mut object = Map::new();
            object.insert(tagged.tag.clone(), value_to_json(&tagged.value));
            Json::Object(object)
        }
    }
}

fn float(v: f64) -> Json {
    Number::from_f64(v).map_or(Json::Null, Json::Number)
}

pub(crate) fn json_to_value(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(flag) => Value::Bool(flag),
        Json::Number(number) => {
            if let Some(v) = number.as_i64() {
                Value::Int(v)
            } else if let Some(v) = number.as_u64() {
                Value::UInt(v)
            } else {
                Value::from(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(text) => Value::String(text),
        Json::Array(items) => Value::List(items.into_iter().map(json_to_value).collect()),
        Json::Object(object) => Value::Record(
            object
                .into_iter()
                .map(|(name, field)| (name, json_to_value(field)))
                .collect(),
        ),
    }
}

//! Dynamic value tree for opaque telemetry payloads.
//!
//! Provider and sensor payloads are not schema-controlled, so they travel
//! through the relay as a tagged union and are stored without interpretation.
//! The only field the relay reads back is the `timestamp` it writes itself.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

/// A string-keyed map of values: the unit of storage.
pub type Document = BTreeMap<String, Value>;

/// One node in a telemetry payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON `null`.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Integral number fitting in `i64`.
    Integer(i64),
    /// Any other number.
    Double(f64),
    /// UTF-8 text.
    String(String),
    /// A resolved instant, as produced by the store.
    Timestamp(DateTime<Utc>),
    /// Ordered list.
    Array(Vec<Value>),
    /// Nested map.
    Map(Document),
    /// Write-only sentinel: the store substitutes its own write time.
    ServerTimestamp,
}

impl Value {
    /// Borrow the text when this is a [`Value::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    /// Return the instant when this is a [`Value::Timestamp`].
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(at) => Some(*at),
            _ => None,
        }
    }

    /// Borrow the map when this is a [`Value::Map`].
    pub fn as_map(&self) -> Option<&Document> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Replace every [`Value::ServerTimestamp`] below this node with `now`.
    pub fn resolve_server_timestamps(&mut self, now: DateTime<Utc>) {
        match self {
            Self::ServerTimestamp => *self = Self::Timestamp(now),
            Self::Array(items) => items
                .iter_mut()
                .for_each(|item| item.resolve_server_timestamps(now)),
            Self::Map(map) => resolve_document_timestamps(map, now),
            _ => {}
        }
    }

    /// Render as plain JSON; timestamps become RFC 3339 strings.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null | Self::ServerTimestamp => JsonValue::Null,
            Self::Bool(flag) => JsonValue::Bool(*flag),
            Self::Integer(number) => JsonValue::Number(Number::from(*number)),
            Self::Double(number) => Number::from_f64(*number)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Self::String(text) => JsonValue::String(text.clone()),
            Self::Timestamp(at) => {
                JsonValue::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => JsonValue::Object(document_to_json(map)),
        }
    }
}

/// Resolve server timestamps across a whole document.
pub fn resolve_document_timestamps(document: &mut Document, now: DateTime<Utc>) {
    document
        .values_mut()
        .for_each(|value| value.resolve_server_timestamps(now));
}

/// Render a document as a JSON object.
pub fn document_to_json(document: &Document) -> JsonMap<String, JsonValue> {
    document
        .iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect()
}

/// Convert a JSON object into a document.
pub fn document_from_json(object: JsonMap<String, JsonValue>) -> Document {
    object
        .into_iter()
        .map(|(key, value)| (key, Value::from(value)))
        .collect()
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(flag) => Self::Bool(flag),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => Self::Integer(integer),
                None => Self::Double(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(text) => Self::String(text),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            JsonValue::Object(object) => Self::Map(document_from_json(object)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

#[cfg(test)]
mod tests {
    //! Conversion and sentinel-resolution coverage.

    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[rstest]
    #[case::integer(json!(42), Value::Integer(42))]
    #[case::negative(json!(-7), Value::Integer(-7))]
    #[case::double(json!(21.5), Value::Double(21.5))]
    #[case::text(json!("Hall"), Value::String("Hall".into()))]
    #[case::flag(json!(true), Value::Bool(true))]
    #[case::null(json!(null), Value::Null)]
    fn scalars_convert_from_json(#[case] input: JsonValue, #[case] expected: Value) {
        assert_eq!(Value::from(input), expected);
    }

    #[test]
    fn nested_objects_become_maps() {
        let value = Value::from(json!({"outer": {"inner": [1, "two"]}}));
        let outer = value
            .as_map()
            .and_then(|map| map.get("outer"))
            .and_then(Value::as_map)
            .expect("outer map");
        assert_eq!(
            outer.get("inner"),
            Some(&Value::Array(vec![
                Value::Integer(1),
                Value::String("two".into())
            ]))
        );
    }

    #[test]
    fn resolves_sentinels_at_every_depth() {
        let mut document = Document::from([
            ("timestamp".to_owned(), Value::ServerTimestamp),
            (
                "nested".to_owned(),
                Value::Map(Document::from([(
                    "seen".to_owned(),
                    Value::Array(vec![Value::ServerTimestamp]),
                )])),
            ),
        ]);

        resolve_document_timestamps(&mut document, instant());

        assert_eq!(document.get("timestamp"), Some(&Value::Timestamp(instant())));
        assert_eq!(
            Value::Map(document).to_json(),
            json!({
                "timestamp": "2024-01-01T00:00:00Z",
                "nested": {"seen": ["2024-01-01T00:00:00Z"]}
            })
        );
    }

    #[test]
    fn unknown_fields_pass_through_unchanged() {
        let payload = json!({"humidity": 40, "firmware": {"rev": "b2"}, "extra": [null]});
        let JsonValue::Object(object) = payload.clone() else {
            panic!("fixture is an object");
        };
        let document = document_from_json(object);
        assert_eq!(JsonValue::Object(document_to_json(&document)), payload);
    }
}
